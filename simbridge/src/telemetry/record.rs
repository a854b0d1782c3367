//! Position and channel-state samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean Earth radius used for geographic conversion, in metres
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Cartesian position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Position {
    /// Create a position from its coordinates
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Straight-line distance to another position
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Position shifted by an offset
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Latitude and longitude in degrees, treating the position as
    /// Earth-centred coordinates
    #[must_use]
    pub fn to_geographic(&self) -> (f64, f64) {
        let lat = (self.z / EARTH_RADIUS_M).clamp(-1.0, 1.0).asin().to_degrees();
        let lon = self.y.atan2(self.x).to_degrees();
        (lat, lon)
    }
}

/// State of one communication channel at sampling time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Channel identifier
    pub id: String,
    /// Transmitting with at least one live link
    pub active: bool,
    /// Enabled and not busy
    pub available: bool,
}

impl ChannelState {
    /// Derive the channel state from its raw flags
    #[must_use]
    pub fn from_flags(
        id: impl Into<String>,
        transmitting: bool,
        has_links: bool,
        enabled: bool,
        busy: bool,
    ) -> Self {
        Self {
            id: id.into(),
            active: transmitting && has_links,
            available: enabled && !busy,
        }
    }
}

/// One sample of node positions and channel states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Sampling time
    pub time: DateTime<Utc>,
    /// Node positions keyed by node id
    pub positions: BTreeMap<String, Position>,
    /// Channel states
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelState>,
}

impl PositionRecord {
    /// Create an empty record stamped with the current time
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Create an empty record for the given time
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            positions: BTreeMap::new(),
            channels: Vec::new(),
        }
    }

    /// Add a node position
    #[must_use]
    pub fn with_position(mut self, node_id: impl Into<String>, position: Position) -> Self {
        self.positions.insert(node_id.into(), position);
        self
    }

    /// Add a channel state
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelState) -> Self {
        self.channels.push(channel);
        self
    }

    /// Whether two nodes are both present and within `range` metres
    #[must_use]
    pub fn within_range(&self, a: &str, b: &str, range: f64) -> bool {
        match (self.positions.get(a), self.positions.get(b)) {
            (Some(pa), Some(pb)) => pa.distance_to(pb) <= range,
            _ => false,
        }
    }
}
