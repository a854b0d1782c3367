//! Simulation telemetry streamed over the connection
//!
//! A [`SampleSource`] produces [`PositionRecord`]s, an [`Encoder`] turns them
//! into bytes and the [`Publisher`] pushes them to the connected peer on a
//! fixed interval. Payloads coming back from the peer can be decoded with
//! [`Command::decode`].

mod command;
mod publisher;
mod record;
mod source;

pub use command::Command;
pub use publisher::{Publisher, PublisherStats};
pub use record::{ChannelState, Position, PositionRecord, EARTH_RADIUS_M};
pub use source::{Encoder, JsonEncoder, SampleSource, StaticSource};
