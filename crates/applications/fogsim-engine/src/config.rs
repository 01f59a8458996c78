//! Simulation configuration
//!
//! Every tunable of a run lives in [`SimulationConfig`]. Defaults reproduce
//! the reference setup (fog power 15, cloud power 30, 199 ticks, queue of 20).
//! A config can be loaded from JSON; missing fields fall back to defaults.

use fogsim_core::{FogsimError, Position, Result, Tier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Placement strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    /// Uniform pick over zone members, no feasibility filter
    Random,
    /// No zones at all; uniform pick over every fog node
    FullyRandom,
    /// Farthest-first scan, minimum current + predicted distance
    Heuristic,
    /// Decision table with max-value bootstrap
    TableLearning,
    /// Decision table with mean-value bootstrap
    TableLearningVariant,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Random,
        StrategyKind::FullyRandom,
        StrategyKind::Heuristic,
        StrategyKind::TableLearning,
        StrategyKind::TableLearningVariant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::FullyRandom => "fully_random",
            StrategyKind::Heuristic => "heuristic",
            StrategyKind::TableLearning => "table-learning",
            StrategyKind::TableLearningVariant => "table-learning-variant",
        }
    }

    /// Strategies that keep a decision table per zone
    pub fn is_learning(&self) -> bool {
        matches!(
            self,
            StrategyKind::TableLearning | StrategyKind::TableLearningVariant
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = FogsimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(StrategyKind::Random),
            "fully_random" | "fully-random" => Ok(StrategyKind::FullyRandom),
            "heuristic" => Ok(StrategyKind::Heuristic),
            "table-learning" | "table_learning" | "q_learning" => Ok(StrategyKind::TableLearning),
            "table-learning-variant" | "table_learning_variant" | "a3c" => {
                Ok(StrategyKind::TableLearningVariant)
            }
            _ => Err(FogsimError::UnknownStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = FogsimError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Whether decision tables are trained from scratch or restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// Start empty, persist at shutdown
    #[default]
    Offline,
    /// Restore at startup; a missing table is fatal
    Online,
}

impl FromStr for TableMode {
    type Err = FogsimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(TableMode::Offline),
            "online" => Ok(TableMode::Online),
            other => Err(FogsimError::config(format!(
                "unknown table mode '{other}' (expected offline or online)"
            ))),
        }
    }
}

/// Per-tier capacity and reach defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierDefaults {
    pub fog_power: f64,
    pub fog_coverage: f64,
    pub cloud_power: f64,
    pub cloud_coverage: f64,
    pub cloud_x: f64,
    pub cloud_y: f64,
    pub user_power: f64,
    pub user_coverage: f64,
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self {
            fog_power: 15.0,
            fog_coverage: 3.0,
            cloud_power: 30.0,
            cloud_coverage: 100.0,
            cloud_x: 50.0,
            cloud_y: 50.0,
            user_power: 0.0,
            user_coverage: 0.0,
        }
    }
}

impl TierDefaults {
    pub fn power(&self, tier: Tier) -> f64 {
        match tier {
            Tier::User => self.user_power,
            Tier::Fog => self.fog_power,
            Tier::Cloud => self.cloud_power,
        }
    }

    pub fn coverage(&self, tier: Tier) -> f64 {
        match tier {
            Tier::User => self.user_coverage,
            Tier::Fog => self.fog_coverage,
            Tier::Cloud => self.cloud_coverage,
        }
    }

    pub fn cloud_position(&self) -> Position {
        Position::new(self.cloud_x, self.cloud_y)
    }
}

/// Linear cost model for execution and transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Size units processed per time unit
    pub processing_rate: f64,
    pub packet_cost_per_meter: f64,
    pub task_cost_per_meter: f64,
    pub migration_overhead: f64,
    pub cloud_processing_overhead: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            processing_rate: 2.0,
            packet_cost_per_meter: 0.001,
            task_cost_per_meter: 0.005,
            migration_overhead: 0.01,
            cloud_processing_overhead: 0.5,
        }
    }
}

impl CostModel {
    /// Pure execution time for a task of the given size
    pub fn execution_time(&self, size: f64) -> f64 {
        size / self.processing_rate
    }

    /// Transfer cost: task shipped out and back, plus the result packet
    pub fn distance_cost(&self, distance: f64) -> f64 {
        2.0 * self.task_cost_per_meter * distance + self.packet_cost_per_meter * distance
    }

    /// Projected time from creation to result delivery
    pub fn processing_time(&self, size: f64, distance: f64, is_cloud: bool, migrated: bool) -> f64 {
        let mut total = self.execution_time(size) + self.distance_cost(distance);
        if is_cloud {
            total += self.cloud_processing_overhead;
        }
        if migrated {
            total += self.migration_overhead;
        }
        total
    }

    /// True when the projected processing time fits inside `slack`
    pub fn time_budget_ok(
        &self,
        slack: f64,
        size: f64,
        distance: f64,
        is_cloud: bool,
        migrated: bool,
    ) -> bool {
        self.processing_time(size, distance, is_cloud, migrated) <= slack
    }
}

/// Closed range an attribute is binned over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinRange {
    pub min: f64,
    pub max: f64,
}

impl BinRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Binning ranges for task attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRanges {
    pub power: BinRange,
    pub size: BinRange,
    pub deadline: BinRange,
    pub creator_x: BinRange,
    pub creator_y: BinRange,
    pub creator_speed: BinRange,
    pub creator_heading: BinRange,
}

impl Default for TaskRanges {
    fn default() -> Self {
        Self {
            power: BinRange::new(0.0, 3.0),
            size: BinRange::new(0.0, 3.0),
            deadline: BinRange::new(0.0, 100.0),
            creator_x: BinRange::new(0.0, 10.0),
            creator_y: BinRange::new(0.0, 10.0),
            creator_speed: BinRange::new(0.0, 3.0),
            creator_heading: BinRange::new(0.0, 360.0),
        }
    }
}

/// Binning ranges for fog node attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRanges {
    pub x: BinRange,
    pub y: BinRange,
    pub speed: BinRange,
    pub heading: BinRange,
    pub power: BinRange,
}

impl Default for NodeRanges {
    fn default() -> Self {
        Self {
            x: BinRange::new(0.0, 10.0),
            y: BinRange::new(0.0, 10.0),
            speed: BinRange::new(0.0, 3.0),
            heading: BinRange::new(0.0, 360.0),
            power: BinRange::new(0.0, 20.0),
        }
    }
}

/// Largest level count whose bin indices fit a context byte
pub const MAX_LEVELS: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    /// Number of evenly spaced edges per range
    pub levels: usize,
    pub task: TaskRanges,
    pub node: NodeRanges,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            levels: 5,
            task: TaskRanges::default(),
            node: NodeRanges::default(),
        }
    }
}

/// Decision table hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    /// Learning rate of the mean-bootstrap variant
    pub variant_alpha: f64,
    /// Discount of the mean-bootstrap variant
    pub variant_gamma: f64,
    /// Maximum distance at which a stored state stands in for a new one
    pub state_threshold: f64,
    /// Maximum distance at which a stored action stands in for a new one
    pub action_threshold: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.6,
            epsilon: 0.1,
            variant_alpha: 0.01,
            variant_gamma: 0.99,
            state_threshold: 10.0,
            action_threshold: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Candidates the heuristic strategy evaluates per decision
    pub heuristic_branching_factor: usize,
    /// Zones a drifting node may join when re-zoned
    pub rezone_limit: usize,
    /// A fog offer is taken only when nearer than this fraction of the cloud distance
    pub offer_cloud_ratio: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            heuristic_branching_factor: 10,
            rezone_limit: 3,
            offer_cloud_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub mode: TableMode,
    pub directory: PathBuf,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            mode: TableMode::Offline,
            directory: PathBuf::from("tables"),
        }
    }
}

/// Full configuration of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub strategy: StrategyKind,
    /// Length of one tick in simulation time units
    pub tick_length: f64,
    /// Number of ticks to simulate
    pub duration: usize,
    /// Backpressure queue capacity
    pub queue_capacity: usize,
    /// Seed for every RNG in the run
    pub seed: u64,
    pub tiers: TierDefaults,
    pub costs: CostModel,
    pub quantization: QuantizationConfig,
    pub learning: LearningConfig,
    pub placement: PlacementConfig,
    pub tables: TableConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Heuristic,
            tick_length: 1.0,
            duration: 199,
            queue_capacity: 20,
            seed: 42,
            tiers: TierDefaults::default(),
            costs: CostModel::default(),
            quantization: QuantizationConfig::default(),
            learning: LearningConfig::default(),
            placement: PlacementConfig::default(),
            tables: TableConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a config from a JSON file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_length > 0.0) {
            return Err(FogsimError::config("tick_length must be positive"));
        }
        if !(self.costs.processing_rate > 0.0) {
            return Err(FogsimError::config("processing_rate must be positive"));
        }
        if !(2..=MAX_LEVELS).contains(&self.quantization.levels) {
            return Err(FogsimError::config(format!(
                "quantization levels must be within 2..={MAX_LEVELS}"
            )));
        }
        if !(0.0..=1.0).contains(&self.learning.epsilon) {
            return Err(FogsimError::config("epsilon must be within [0, 1]"));
        }
        if self.learning.state_threshold < 0.0 || self.learning.action_threshold < 0.0 {
            return Err(FogsimError::config("table thresholds must be non-negative"));
        }
        if self.placement.heuristic_branching_factor == 0 {
            return Err(FogsimError::config("heuristic_branching_factor must be at least 1"));
        }
        if !(self.placement.offer_cloud_ratio > 0.0) {
            return Err(FogsimError::config("offer_cloud_ratio must be positive"));
        }
        Ok(())
    }
}
