//! Inbound control commands
//!
//! Peers steer the simulation with small JSON objects tagged by `cmd`:
//!
//! ```json
//! {"cmd": "glide", "node_id": "blue-1", "position": {"x": 10.0, "y": 0.0, "z": -5.0}}
//! {"cmd": "pause"}
//! ```
//!
//! Decoding is offered as a helper; what a command does is up to the
//! application's message handler.

use serde::{Deserialize, Serialize};

use super::record::Position;
use crate::error::{Error, Result};

/// A command sent by the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Move a node towards a target position
    Glide {
        /// Node to move
        node_id: String,
        /// Target position
        position: Position,
    },
    /// Pause sampling
    Pause,
    /// Resume sampling
    Resume,
}

impl Command {
    /// Decode a command from an inbound payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::Command(e.to_string()))
    }

    /// Encode the command as JSON
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::Glide { .. } => "glide",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}
