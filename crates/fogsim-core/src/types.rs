//! Core types shared across fogsim components

use serde::{Deserialize, Serialize};

/// Unique identifier for a node (user device, fog node or cloud)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Role of a node in the compute fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    User,
    Fog,
    Cloud,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::User => write!(f, "user"),
            Tier::Fog => write!(f, "fog"),
            Tier::Cloud => write!(f, "cloud"),
        }
    }
}

/// A point on the simulation plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to another point
    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear extrapolation along `velocity` for `dt` time units
    pub fn advanced(&self, velocity: Velocity, dt: f64) -> Position {
        let heading = velocity.heading.to_radians();
        Position {
            x: self.x + velocity.speed * dt * heading.cos(),
            y: self.y + velocity.speed * dt * heading.sin(),
        }
    }
}

/// Speed plus heading in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub speed: f64,
    pub heading: f64,
}

impl Velocity {
    pub fn new(speed: f64, heading: f64) -> Self {
        Self { speed, heading }
    }

    pub fn stationary() -> Self {
        Self::default()
    }
}
