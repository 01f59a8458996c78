//! Tick-driven simulator
//!
//! Each tick runs, in order:
//! 1. drain the backpressure queue (overflow drops, then retries)
//! 2. place tasks created during this tick
//! 3. advance the mobility feed and move nodes
//! 4. sweep every zone for completions, migrations and re-zoning
//! 5. close the per-tick metrics window

use fogsim_core::{MobilityFeed, Result, TaskRecord};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{SimulationConfig, TableMode};
use crate::metrics::SimulationReport;
use crate::node::Node;
use crate::task::Task;
use crate::topology::Topology;

pub struct Simulator<F: MobilityFeed> {
    feed: F,
    topology: Topology,
    pending: VecDeque<TaskRecord>,
    ticks: usize,
    exhausted: bool,
}

impl<F: MobilityFeed> Simulator<F> {
    pub fn new(feed: F, config: SimulationConfig) -> Result<Self> {
        let mut topology = Topology::new(config, feed.zones())?;
        for record in feed.fixed_fog_nodes() {
            topology.add_node(Node::from_record(record, &topology.config().tiers));
        }
        topology.sync_nodes(feed.current_nodes());

        let mut tasks = feed.tasks().to_vec();
        tasks.sort_by(|a, b| a.creation_time.total_cmp(&b.creation_time));

        Ok(Self {
            feed,
            topology,
            pending: tasks.into(),
            ticks: 0,
            exhausted: false,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Simulation clock at the start of the current tick
    pub fn now(&self) -> f64 {
        self.ticks as f64 * self.topology.config().tick_length
    }

    /// Run one tick. Returns false once the feed has no further frames.
    pub fn step(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let tick = self.topology.config().tick_length;
        let now = self.now();

        self.topology.process_queue(now);

        while self
            .pending
            .front()
            .is_some_and(|t| t.creation_time < now + tick)
        {
            if let Some(record) = self.pending.pop_front() {
                let task = Task::from_record(&record, &self.topology.config().costs);
                self.topology.submit(task);
            }
        }

        match self.feed.advance() {
            Some(nodes) => self.topology.sync_nodes(nodes),
            None => self.exhausted = true,
        }

        self.ticks += 1;
        self.topology.sweep(self.now());
        self.topology.metrics_mut().end_tick();

        debug!(
            tick = self.ticks,
            frame = self.feed.time_index(),
            queued = self.topology.queue().len(),
            in_flight = self.topology.in_flight(),
            "tick complete"
        );
        !self.exhausted
    }

    /// Run up to the configured duration, or until the feed ends
    pub fn run(&mut self) -> SimulationReport {
        let duration = self.topology.config().duration;
        info!(
            strategy = %self.topology.config().strategy,
            duration,
            zones = self.topology.zones().len(),
            tasks = self.pending.len(),
            "simulation started"
        );
        while self.ticks < duration {
            if !self.step() {
                info!(tick = self.ticks, "mobility feed exhausted");
                break;
            }
        }
        let report = self.report();
        info!(
            tasks = report.total_tasks,
            migrations = report.migrations,
            deadline_misses = report.deadline_misses,
            "simulation finished"
        );
        report
    }

    pub fn report(&self) -> SimulationReport {
        self.topology.metrics().report(
            self.topology.config().strategy.as_str(),
            self.ticks,
            self.topology.in_flight(),
        )
    }

    /// Save decision tables when training from scratch. Online runs leave
    /// the restored tables untouched.
    pub fn persist_tables(&self) -> Result<Vec<PathBuf>> {
        let config = self.topology.config();
        if !config.strategy.is_learning() || config.tables.mode != TableMode::Offline {
            return Ok(Vec::new());
        }
        self.topology.persist_tables(&config.tables.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Frame, Scenario, ScenarioFeed};
    use fogsim_core::{NodeId, NodeRecord, Tier, ZoneRecord};

    fn record(id: &str, tier: Tier, x: f64, y: f64) -> NodeRecord {
        NodeRecord {
            id: NodeId::new(id),
            tier,
            x,
            y,
            speed: 0.0,
            heading: 0.0,
            power: None,
            coverage_radius: None,
        }
    }

    fn static_scenario(frames: usize, tasks: Vec<TaskRecord>) -> Scenario {
        Scenario {
            frames: (0..frames)
                .map(|i| Frame {
                    time: i as f64,
                    nodes: vec![record("u", Tier::User, 1.0, 1.0)],
                })
                .collect(),
            tasks,
            fixed_fog_nodes: vec![NodeRecord {
                power: Some(5.0),
                coverage_radius: Some(10.0),
                ..record("f", Tier::Fog, 0.0, 0.0)
            }],
            zones: vec![ZoneRecord {
                name: "z".to_string(),
                x: 0.0,
                y: 0.0,
                radius: 5.0,
            }],
        }
    }

    fn task(id: u64, creation_time: f64) -> TaskRecord {
        TaskRecord {
            id,
            power_needed: 1.0,
            size: 1.0,
            deadline: creation_time + 5.0,
            creator: NodeId::new("u"),
            creation_time,
        }
    }

    #[test]
    fn test_tasks_enter_on_their_tick() {
        let feed = ScenarioFeed::new(static_scenario(10, vec![task(1, 0.0), task(2, 2.5)])).unwrap();
        let mut sim = Simulator::new(feed, SimulationConfig::default()).unwrap();

        assert!(sim.step());
        assert_eq!(sim.topology().metrics().total_tasks, 1);
        assert!(sim.step());
        assert_eq!(sim.topology().metrics().total_tasks, 1);
        assert!(sim.step());
        assert_eq!(sim.topology().metrics().total_tasks, 2);
    }

    #[test]
    fn test_run_stops_when_feed_ends() {
        let feed = ScenarioFeed::new(static_scenario(4, vec![task(1, 0.0)])).unwrap();
        let mut sim = Simulator::new(feed, SimulationConfig::default()).unwrap();
        let report = sim.run();

        assert_eq!(report.ticks, 4);
        assert_eq!(report.total_tasks, 1);
        assert_eq!(report.on_time, 1);
        assert_eq!(report.in_flight, 0);
        assert_eq!(report.migrations_per_tick.len(), 4);
    }

    #[test]
    fn test_run_respects_duration() {
        let feed = ScenarioFeed::new(static_scenario(50, Vec::new())).unwrap();
        let config = SimulationConfig {
            duration: 7,
            ..SimulationConfig::default()
        };
        let mut sim = Simulator::new(feed, config).unwrap();
        assert_eq!(sim.run().ticks, 7);
        assert_eq!(sim.now(), 7.0);
    }

    #[test]
    fn test_offline_tables_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulationConfig::default();
        config.strategy = crate::config::StrategyKind::TableLearning;
        config.tables.directory = dir.path().to_path_buf();

        let feed = ScenarioFeed::new(static_scenario(5, vec![task(1, 0.0)])).unwrap();
        let mut sim = Simulator::new(feed, config).unwrap();
        sim.run();
        let written = sim.persist_tables().unwrap();
        assert_eq!(written, vec![dir.path().join("z_decision_table.json")]);
        assert!(written[0].exists());
    }
}
