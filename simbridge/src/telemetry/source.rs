//! Producer and encoder interfaces for samples

use async_trait::async_trait;

use super::record::PositionRecord;
use crate::error::Result;

/// Pull interface to whatever produces samples
#[async_trait]
pub trait SampleSource: Send {
    /// Produce the current sample
    async fn sample(&mut self) -> Result<PositionRecord>;
}

/// Turns a sample into the bytes sent to the peer
pub trait Encoder: Send + Sync {
    /// Encode one sample
    fn encode(&self, record: &PositionRecord) -> Result<Vec<u8>>;
}

/// JSON encoding of samples
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, record: &PositionRecord) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(record)?)
    }
}

/// A source that always returns the same sample, restamped at each pull
#[derive(Debug, Clone)]
pub struct StaticSource {
    record: PositionRecord,
}

impl StaticSource {
    /// Create a source around a fixed record
    #[must_use]
    pub fn new(record: PositionRecord) -> Self {
        Self { record }
    }
}

#[async_trait]
impl SampleSource for StaticSource {
    async fn sample(&mut self) -> Result<PositionRecord> {
        let mut record = self.record.clone();
        record.time = chrono::Utc::now();
        Ok(record)
    }
}
