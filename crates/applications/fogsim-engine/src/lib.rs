//! fogsim Engine
//!
//! Tick-driven placement-and-migration engine for a three-tier
//! user / fog / cloud fabric.
//!
//! ```text
//! MobilityFeed ──► Simulator ──► Topology ──► ZoneBroadcaster ──► CoverageZone
//!                                   │                                  │
//!                                   ├── backpressure queue             └── PlacementStrategy
//!                                   ├── NodeRegistry                        (random / heuristic /
//!                                   └── SimulationMetrics                    table learning)
//! ```

pub mod broadcaster;
pub mod config;
pub mod feed;
pub mod learner;
pub mod metrics;
pub mod node;
pub mod simulator;
pub mod strategy;
pub mod task;
pub mod topology;
pub mod zone;

pub use broadcaster::ZoneBroadcaster;
pub use config::{SimulationConfig, StrategyKind, TableMode};
pub use feed::{GeneratorParams, Scenario, ScenarioFeed, ScenarioGenerator};
pub use learner::{DecisionTable, QuantizedAction, QuantizedState};
pub use metrics::{SimulationMetrics, SimulationReport};
pub use node::{Node, NodeRegistry};
pub use simulator::Simulator;
pub use strategy::PlacementStrategy;
pub use task::{Task, TaskOutcome};
pub use topology::Topology;
pub use zone::CoverageZone;
