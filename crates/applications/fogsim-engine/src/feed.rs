//! Mobility and task feeds
//!
//! A [`Scenario`] is a recorded trace: one frame of node positions per tick,
//! the task creation events, the fixed fog nodes and the zone layout.
//! [`ScenarioFeed`] replays it through the [`MobilityFeed`] trait and
//! [`ScenarioGenerator`] synthesizes one:
//! - vehicles and mobile fog nodes on a bouncing random walk
//! - fixed fog nodes scattered over the area
//! - a 2×2 grid of zones
//! - Poisson task arrivals with short deadlines

use fogsim_core::{
    FogsimError, MobilityFeed, NodeId, NodeRecord, Result, Tier, TaskRecord, ZoneRecord,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Node positions at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub nodes: Vec<NodeRecord>,
}

/// A complete recorded or generated trace
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub fixed_fog_nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let scenario: Scenario = serde_json::from_str(&raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject traces the engine cannot replay
    pub fn validate(&self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(FogsimError::scenario("scenario has no frames"));
        }

        let mut zone_names = HashSet::new();
        for zone in &self.zones {
            if !(zone.radius > 0.0) {
                return Err(FogsimError::scenario(format!(
                    "zone {} has non-positive radius",
                    zone.name
                )));
            }
            if !zone_names.insert(zone.name.as_str()) {
                return Err(FogsimError::scenario(format!("duplicate zone {}", zone.name)));
            }
        }

        if let Some(node) = self.fixed_fog_nodes.iter().find(|n| n.tier != Tier::Fog) {
            return Err(FogsimError::scenario(format!(
                "fixed node {} is not a fog node",
                node.id
            )));
        }

        let known: HashSet<&NodeId> = self
            .frames
            .iter()
            .flat_map(|f| f.nodes.iter())
            .chain(self.fixed_fog_nodes.iter())
            .map(|n| &n.id)
            .collect();
        if let Some(task) = self.tasks.iter().find(|t| !known.contains(&t.creator)) {
            return Err(FogsimError::scenario(format!(
                "task {} created by unknown node {}",
                task.id, task.creator
            )));
        }
        Ok(())
    }
}

/// Replays a [`Scenario`] frame by frame
#[derive(Debug, Clone)]
pub struct ScenarioFeed {
    scenario: Scenario,
    index: usize,
}

impl ScenarioFeed {
    pub fn new(scenario: Scenario) -> Result<Self> {
        scenario.validate()?;
        Ok(Self { scenario, index: 0 })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }
}

impl MobilityFeed for ScenarioFeed {
    fn time_index(&self) -> usize {
        self.index
    }

    fn current_nodes(&self) -> &[NodeRecord] {
        self.scenario
            .frames
            .get(self.index)
            .map(|f| f.nodes.as_slice())
            .unwrap_or(&[])
    }

    fn advance(&mut self) -> Option<&[NodeRecord]> {
        if self.index + 1 >= self.scenario.frames.len() {
            return None;
        }
        self.index += 1;
        Some(self.scenario.frames[self.index].nodes.as_slice())
    }

    fn tasks(&self) -> &[TaskRecord] {
        &self.scenario.tasks
    }

    fn fixed_fog_nodes(&self) -> &[NodeRecord] {
        &self.scenario.fixed_fog_nodes
    }

    fn zones(&self) -> &[ZoneRecord] {
        &self.scenario.zones
    }
}

/// Knobs of the synthetic scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    /// Side of the square area
    pub area: f64,
    pub frames: usize,
    pub tick_length: f64,
    pub vehicles: usize,
    pub mobile_fog_nodes: usize,
    pub fixed_fog_nodes: usize,
    /// Mean task arrivals per tick
    pub task_rate: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Largest speed change per tick, either direction
    pub speed_jitter: f64,
    /// Largest heading change per tick in degrees, either direction
    pub heading_jitter: f64,
    pub fixed_fog_power: (f64, f64),
    pub fixed_fog_coverage: (f64, f64),
    pub task_power: (f64, f64),
    pub task_size: (f64, f64),
    /// Deadline offset from creation, whole ticks
    pub deadline_offset: (u32, u32),
    pub zone_radius: f64,
}

/// Sampling bounds must be finite and ordered
fn check_range(name: &str, (low, high): (f64, f64)) -> Result<()> {
    if low.is_finite() && high.is_finite() && low <= high {
        Ok(())
    } else {
        Err(FogsimError::config(format!(
            "generator {name} range {low}..={high} is invalid"
        )))
    }
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            area: 10.0,
            frames: 200,
            tick_length: 1.0,
            vehicles: 20,
            mobile_fog_nodes: 4,
            fixed_fog_nodes: 4,
            task_rate: 3.0,
            min_speed: 1.0,
            max_speed: 3.0,
            speed_jitter: 0.5,
            heading_jitter: 30.0,
            fixed_fog_power: (5.0, 20.0),
            fixed_fog_coverage: (4.0, 5.0),
            task_power: (1.0, 3.0),
            task_size: (1.0, 3.0),
            deadline_offset: (1, 5),
            zone_radius: 4.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Walker {
    id: NodeId,
    tier: Tier,
    x: f64,
    y: f64,
    speed: f64,
    heading: f64,
}

impl Walker {
    fn record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id.clone(),
            tier: self.tier,
            x: self.x,
            y: self.y,
            speed: self.speed,
            heading: self.heading,
            power: None,
            coverage_radius: None,
        }
    }
}

/// Seeded synthetic scenario source
pub struct ScenarioGenerator {
    params: GeneratorParams,
    rng: ChaCha8Rng,
}

impl ScenarioGenerator {
    pub fn new(params: GeneratorParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> Result<Scenario> {
        let p = self.params.clone();
        if p.frames == 0 {
            return Err(FogsimError::config("generator needs at least one frame"));
        }
        if !(p.area.is_finite() && p.area > 0.0) || !(p.tick_length > 0.0) {
            return Err(FogsimError::config("generator area and tick length must be positive"));
        }
        check_range("speed", (p.min_speed, p.max_speed))?;
        check_range("speed jitter", (0.0, p.speed_jitter))?;
        check_range("heading jitter", (0.0, p.heading_jitter))?;
        check_range("fixed fog power", p.fixed_fog_power)?;
        check_range("fixed fog coverage", p.fixed_fog_coverage)?;
        check_range("task power", p.task_power)?;
        check_range("task size", p.task_size)?;
        if p.deadline_offset.0 > p.deadline_offset.1 {
            return Err(FogsimError::config("generator deadline offset range is inverted"));
        }
        let arrivals = Poisson::new(p.task_rate.max(f64::MIN_POSITIVE))
            .map_err(|e| FogsimError::config(format!("task rate {}: {e}", p.task_rate)))?;

        let mut walkers = Vec::with_capacity(p.vehicles + p.mobile_fog_nodes);
        for i in 0..p.vehicles {
            walkers.push(self.spawn(format!("veh{i}"), Tier::User));
        }
        for i in 0..p.mobile_fog_nodes {
            walkers.push(self.spawn(format!("mfog{i}"), Tier::Fog));
        }

        let fixed_fog_nodes: Vec<NodeRecord> = (0..p.fixed_fog_nodes)
            .map(|i| NodeRecord {
                id: NodeId::new(format!("ffog{i}")),
                tier: Tier::Fog,
                x: self.rng.gen_range(0.0..=p.area),
                y: self.rng.gen_range(0.0..=p.area),
                speed: 0.0,
                heading: 0.0,
                power: Some(self.rng.gen_range(p.fixed_fog_power.0..=p.fixed_fog_power.1)),
                coverage_radius: Some(
                    self.rng
                        .gen_range(p.fixed_fog_coverage.0..=p.fixed_fog_coverage.1),
                ),
            })
            .collect();

        let mut frames = Vec::with_capacity(p.frames);
        let mut tasks = Vec::new();
        let mut next_task = 0u64;
        for index in 0..p.frames {
            let time = index as f64 * p.tick_length;
            frames.push(Frame {
                time,
                nodes: walkers.iter().map(Walker::record).collect(),
            });

            if p.vehicles > 0 {
                let count = arrivals.sample(&mut self.rng) as usize;
                for _ in 0..count {
                    let creator = self.rng.gen_range(0..p.vehicles);
                    let offset = self.rng.gen_range(p.deadline_offset.0..=p.deadline_offset.1);
                    tasks.push(TaskRecord {
                        id: next_task,
                        power_needed: self.rng.gen_range(p.task_power.0..=p.task_power.1),
                        size: self.rng.gen_range(p.task_size.0..=p.task_size.1),
                        deadline: time + f64::from(offset) * p.tick_length,
                        creator: walkers[creator].id.clone(),
                        creation_time: time,
                    });
                    next_task += 1;
                }
            }

            for walker in &mut walkers {
                self.step(walker);
            }
        }

        let zones = [(0.3, 0.3), (0.3, 0.7), (0.7, 0.3), (0.7, 0.7)]
            .iter()
            .enumerate()
            .map(|(i, (fx, fy))| ZoneRecord {
                name: format!("zone{i}"),
                x: fx * p.area,
                y: fy * p.area,
                radius: p.zone_radius * p.area / 10.0,
            })
            .collect();

        Ok(Scenario {
            frames,
            tasks,
            fixed_fog_nodes,
            zones,
        })
    }

    fn spawn(&mut self, id: String, tier: Tier) -> Walker {
        let p = &self.params;
        Walker {
            id: NodeId::new(id),
            tier,
            x: self.rng.gen_range(0.0..=p.area),
            y: self.rng.gen_range(0.0..=p.area),
            speed: self.rng.gen_range(p.min_speed..=p.max_speed),
            heading: self.rng.gen_range(0.0..360.0),
        }
    }

    /// Jitter speed and heading, move one tick, bounce off the borders
    fn step(&mut self, walker: &mut Walker) {
        let p = &self.params;
        let dv = self.rng.gen_range(-p.speed_jitter..=p.speed_jitter);
        let dh = self.rng.gen_range(-p.heading_jitter..=p.heading_jitter);
        walker.speed = (walker.speed + dv).clamp(0.0, p.max_speed);
        walker.heading = (walker.heading + dh).rem_euclid(360.0);

        let rad = walker.heading.to_radians();
        let mut x = walker.x + walker.speed * p.tick_length * rad.cos();
        let mut y = walker.y + walker.speed * p.tick_length * rad.sin();
        if x < 0.0 {
            x = -x;
            walker.heading = (180.0 - walker.heading).rem_euclid(360.0);
        } else if x > p.area {
            x = 2.0 * p.area - x;
            walker.heading = (180.0 - walker.heading).rem_euclid(360.0);
        }
        if y < 0.0 {
            y = -y;
            walker.heading = (-walker.heading).rem_euclid(360.0);
        } else if y > p.area {
            y = 2.0 * p.area - y;
            walker.heading = (-walker.heading).rem_euclid(360.0);
        }
        walker.x = x.clamp(0.0, p.area);
        walker.y = y.clamp(0.0, p.area);
    }
}
