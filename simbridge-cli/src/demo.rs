//! Demo position producer
//!
//! Nodes cruise on concentric circles at 30 knots. A `glide` command sends a
//! node in a straight line to a target where it holds; `pause` and `resume`
//! freeze and restart simulated time.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use simbridge::prelude::*;

/// Cruise speed in knots
const CRUISE_KNOTS: f64 = 30.0;
const METRES_PER_SECOND_PER_KNOT: f64 = 0.514444;
const BASE_RADIUS_M: f64 = 1000.0;
const RADIUS_STEP_M: f64 = 250.0;
/// Nodes closer than this to the lead node have a live link
const LINK_RANGE_M: f64 = 1500.0;

fn cruise_speed() -> f64 {
    CRUISE_KNOTS * METRES_PER_SECOND_PER_KNOT
}

fn node_id(index: usize) -> String {
    format!("blue-{}", index + 1)
}

/// Handle for steering a running [`OrbitSource`] from the message callback
#[derive(Debug, Clone, Default)]
pub struct DemoControl {
    paused: Arc<AtomicBool>,
    targets: Arc<Mutex<HashMap<String, Position>>>,
}

impl DemoControl {
    /// Apply a decoded command
    pub fn apply(&self, command: Command) {
        match command {
            Command::Glide { node_id, position } => {
                self.targets.lock().insert(node_id, position);
            }
            Command::Pause => self.paused.store(true, Ordering::SeqCst),
            Command::Resume => self.paused.store(false, Ordering::SeqCst),
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn target(&self, node_id: &str) -> Option<Position> {
        self.targets.lock().get(node_id).copied()
    }
}

/// Sample source producing orbiting nodes
#[derive(Debug)]
pub struct OrbitSource {
    nodes: usize,
    sim_seconds: f64,
    last_sample: Option<Instant>,
    /// Positions of nodes that left their orbit
    gliding: HashMap<String, Position>,
    control: DemoControl,
}

impl OrbitSource {
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes: nodes.max(1),
            sim_seconds: 0.0,
            last_sample: None,
            gliding: HashMap::new(),
            control: DemoControl::default(),
        }
    }

    pub fn control(&self) -> DemoControl {
        self.control.clone()
    }

    fn orbit_position(&self, index: usize, sim_seconds: f64) -> Position {
        let radius = BASE_RADIUS_M + RADIUS_STEP_M * index as f64;
        let phase = TAU * index as f64 / self.nodes as f64;
        let angle = phase + cruise_speed() * sim_seconds / radius;
        Position::new(radius * angle.cos(), radius * angle.sin(), 0.0)
    }

    /// Advance simulated time by `dt` seconds
    fn advance(&mut self, dt: f64) {
        let start_seconds = self.sim_seconds;
        self.sim_seconds += dt;
        let step = cruise_speed() * dt;

        for index in 0..self.nodes {
            let id = node_id(index);
            let Some(target) = self.control.target(&id) else {
                continue;
            };

            let current = self
                .gliding
                .get(&id)
                .copied()
                .unwrap_or_else(|| self.orbit_position(index, start_seconds));

            let remaining = current.distance_to(&target);
            let next = if remaining <= step {
                target
            } else {
                let t = step / remaining;
                Position::new(
                    current.x + (target.x - current.x) * t,
                    current.y + (target.y - current.y) * t,
                    current.z + (target.z - current.z) * t,
                )
            };
            self.gliding.insert(id, next);
        }
    }

    fn record(&self) -> PositionRecord {
        let mut record = PositionRecord::now();
        for index in 0..self.nodes {
            let id = node_id(index);
            let position = self
                .gliding
                .get(&id)
                .copied()
                .unwrap_or_else(|| self.orbit_position(index, self.sim_seconds));
            record = record.with_position(id, position);
        }

        let lead = node_id(0);
        let paused = self.control.is_paused();
        for index in 1..self.nodes {
            let id = node_id(index);
            let linked = record.within_range(&lead, &id, LINK_RANGE_M);
            record = record.with_channel(ChannelState::from_flags(
                format!("{lead}/{id}"),
                !paused,
                linked,
                true,
                paused,
            ));
        }
        record
    }
}

#[async_trait]
impl SampleSource for OrbitSource {
    async fn sample(&mut self) -> Result<PositionRecord> {
        let now = Instant::now();
        let dt = self
            .last_sample
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_sample = Some(now);

        if !self.control.is_paused() {
            self.advance(dt);
        }
        Ok(self.record())
    }
}
