//! Periodic sample publishing
//!
//! The publisher pulls a sample from its [`SampleSource`] on every tick,
//! encodes it and hands the bytes to [`Server::send`]. Ticks that find no
//! connected peer are skipped without touching the source.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::source::{Encoder, JsonEncoder, SampleSource};
use crate::config::PublisherConfig;
use crate::server::Server;

/// Counters reported when a publisher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Samples handed to the server
    pub published: u64,
    /// Ticks skipped because no peer was connected
    pub skipped: u64,
    /// Ticks where sampling or encoding failed
    pub failed: u64,
}

/// Streams samples from a source to the connected peer
pub struct Publisher<S, E = JsonEncoder> {
    server: Server,
    source: S,
    encoder: E,
    interval: Duration,
}

impl<S: SampleSource + 'static> Publisher<S, JsonEncoder> {
    /// Create a publisher with JSON encoding and a one second interval
    #[must_use]
    pub fn new(server: Server, source: S) -> Self {
        Self {
            server,
            source,
            encoder: JsonEncoder,
            interval: Duration::from_secs(1),
        }
    }

    /// Create a publisher using the configured interval
    #[must_use]
    pub fn from_config(server: Server, source: S, config: &PublisherConfig) -> Self {
        Self::new(server, source).with_interval(config.interval())
    }
}

impl<S, E> Publisher<S, E>
where
    S: SampleSource + 'static,
    E: Encoder + 'static,
{
    /// Replace the encoder
    #[must_use]
    pub fn with_encoder<E2: Encoder + 'static>(self, encoder: E2) -> Publisher<S, E2> {
        Publisher {
            server: self.server,
            source: self.source,
            encoder,
            interval: self.interval,
        }
    }

    /// Set the interval between samples
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Run on a background task until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<PublisherStats> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) -> PublisherStats {
        let mut stats = PublisherStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Publisher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.server.is_connected() {
                stats.skipped += 1;
                continue;
            }

            let record = match self.source.sample().await {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to sample");
                    stats.failed += 1;
                    continue;
                }
            };

            match self.encoder.encode(&record) {
                Ok(bytes) => {
                    tracing::trace!(len = bytes.len(), nodes = record.positions.len(), "Publishing sample");
                    self.server.send(bytes);
                    stats.published += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to encode sample");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            published = stats.published,
            skipped = stats.skipped,
            failed = stats.failed,
            "Publisher stopped"
        );
        stats
    }
}
