//! Core traits for fogsim components

use crate::types::{NodeId, Position, Tier, Velocity};
use serde::{Deserialize, Serialize};

/// One node as reported by a mobility source at a given frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub tier: Tier,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub speed: f64,
    /// Heading in degrees
    #[serde(default)]
    pub heading: f64,
    /// Power budget; tier default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Coverage radius; tier default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_radius: Option<f64>,
}

impl NodeRecord {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Velocity {
        Velocity::new(self.speed, self.heading)
    }
}

/// A task creation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    pub power_needed: f64,
    pub size: f64,
    /// Absolute deadline (simulation time)
    pub deadline: f64,
    pub creator: NodeId,
    pub creation_time: f64,
}

/// A named circular coverage zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl ZoneRecord {
    pub fn center(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Source of node positions, task events and zone layout.
///
/// The engine only ever reads through this trait; trace parsing and
/// synthetic generation live behind it.
pub trait MobilityFeed {
    /// Index of the current frame (starts at 0)
    fn time_index(&self) -> usize;

    /// Nodes present in the current frame
    fn current_nodes(&self) -> &[NodeRecord];

    /// Move to the next frame. Returns `None` when the trace is exhausted.
    fn advance(&mut self) -> Option<&[NodeRecord]>;

    /// Every task creation event, in any order
    fn tasks(&self) -> &[TaskRecord];

    /// Fog nodes that never move and are not part of the frames
    fn fixed_fog_nodes(&self) -> &[NodeRecord];

    /// Zone layout (static for the whole run)
    fn zones(&self) -> &[ZoneRecord];
}
