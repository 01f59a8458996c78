//! Run metrics
//!
//! [`SimulationMetrics`] is owned by the orchestrator and threaded through
//! every call that changes a counter. Nothing in the engine reads it back to
//! make a decision.

use fogsim_core::{NodeId, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::task::TaskOutcome;

/// Counters accumulated over one run
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    pub total_tasks: usize,
    pub cloud_tasks: usize,
    pub migrations: usize,
    pub deadline_misses: usize,
    pub on_time: usize,
    pub late: usize,
    pub dropped: usize,
    /// Admissions per fog node
    pub fog_task_counts: BTreeMap<NodeId, usize>,
    pub migrations_per_tick: Vec<usize>,
    pub deadline_misses_per_tick: Vec<usize>,
    tick_migrations: usize,
    tick_deadline_misses: usize,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every counter for a fresh run
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_task_created(&mut self) {
        self.total_tasks += 1;
    }

    pub fn record_assignment(&mut self, node: &NodeId, tier: Tier) {
        match tier {
            Tier::Cloud => self.cloud_tasks += 1,
            Tier::Fog => *self.fog_task_counts.entry(node.clone()).or_insert(0) += 1,
            Tier::User => {}
        }
    }

    pub fn record_migration(&mut self) {
        self.migrations += 1;
        self.tick_migrations += 1;
    }

    pub fn record_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::OnTime => self.on_time += 1,
            TaskOutcome::Late => self.late += 1,
            TaskOutcome::Dropped => self.dropped += 1,
        }
        if outcome != TaskOutcome::OnTime {
            self.deadline_misses += 1;
            self.tick_deadline_misses += 1;
        }
    }

    /// Close the per-tick window
    pub fn end_tick(&mut self) {
        self.migrations_per_tick.push(self.tick_migrations);
        self.deadline_misses_per_tick.push(self.tick_deadline_misses);
        self.tick_migrations = 0;
        self.tick_deadline_misses = 0;
    }

    /// Migrations over total tasks, in percent
    pub fn migration_ratio(&self) -> f64 {
        percent(self.migrations, self.total_tasks)
    }

    /// Deadline misses over total tasks, in percent
    pub fn deadline_miss_ratio(&self) -> f64 {
        percent(self.deadline_misses, self.total_tasks)
    }

    pub fn report(&self, strategy: &str, ticks: usize, in_flight: usize) -> SimulationReport {
        let counts: Vec<usize> = self.fog_task_counts.values().copied().collect();
        let fog_assignments = if counts.is_empty() {
            None
        } else {
            Some(AssignmentSpread {
                nodes: counts.len(),
                min: counts.iter().copied().min().unwrap_or(0),
                max: counts.iter().copied().max().unwrap_or(0),
                average: counts.iter().sum::<usize>() as f64 / counts.len() as f64,
            })
        };

        SimulationReport {
            strategy: strategy.to_string(),
            ticks,
            total_tasks: self.total_tasks,
            cloud_tasks: self.cloud_tasks,
            migrations: self.migrations,
            deadline_misses: self.deadline_misses,
            on_time: self.on_time,
            late: self.late,
            dropped: self.dropped,
            in_flight,
            migration_ratio: self.migration_ratio(),
            deadline_miss_ratio: self.deadline_miss_ratio(),
            fog_assignments,
            fog_task_counts: self
                .fog_task_counts
                .iter()
                .map(|(id, count)| (id.to_string(), *count))
                .collect(),
            migrations_per_tick: self.migrations_per_tick.clone(),
            deadline_misses_per_tick: self.deadline_misses_per_tick.clone(),
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Min/avg/max admissions across fog nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSpread {
    pub nodes: usize,
    pub min: usize,
    pub max: usize,
    pub average: f64,
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub strategy: String,
    pub ticks: usize,
    pub total_tasks: usize,
    pub cloud_tasks: usize,
    pub migrations: usize,
    pub deadline_misses: usize,
    pub on_time: usize,
    pub late: usize,
    pub dropped: usize,
    /// Tasks still queued or running when the run ended
    pub in_flight: usize,
    pub migration_ratio: f64,
    pub deadline_miss_ratio: f64,
    pub fog_assignments: Option<AssignmentSpread>,
    pub fog_task_counts: BTreeMap<String, usize>,
    pub migrations_per_tick: Vec<usize>,
    pub deadline_misses_per_tick: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_tick_series() {
        let mut metrics = SimulationMetrics::new();
        metrics.record_migration();
        metrics.record_outcome(TaskOutcome::Late);
        metrics.end_tick();
        metrics.record_outcome(TaskOutcome::OnTime);
        metrics.record_outcome(TaskOutcome::Dropped);
        metrics.end_tick();

        assert_eq!(metrics.migrations_per_tick, vec![1, 0]);
        assert_eq!(metrics.deadline_misses_per_tick, vec![1, 1]);
        assert_eq!(metrics.deadline_misses, 2);
        assert_eq!((metrics.on_time, metrics.late, metrics.dropped), (1, 1, 1));
    }

    #[test]
    fn test_report_ratios_and_spread() {
        let mut metrics = SimulationMetrics::new();
        for _ in 0..4 {
            metrics.record_task_created();
        }
        metrics.record_assignment(&NodeId::new("fog-a"), Tier::Fog);
        metrics.record_assignment(&NodeId::new("fog-a"), Tier::Fog);
        metrics.record_assignment(&NodeId::new("fog-b"), Tier::Fog);
        metrics.record_assignment(&NodeId::new("cloud"), Tier::Cloud);
        metrics.record_migration();

        let report = metrics.report("heuristic", 10, 0);
        assert_eq!(report.cloud_tasks, 1);
        assert_eq!(report.migration_ratio, 25.0);
        let spread = report.fog_assignments.unwrap();
        assert_eq!((spread.nodes, spread.min, spread.max), (2, 1, 2));
        assert_eq!(spread.average, 1.5);
    }

    #[test]
    fn test_reset() {
        let mut metrics = SimulationMetrics::new();
        metrics.record_task_created();
        metrics.end_tick();
        metrics.reset();
        assert_eq!(metrics.total_tasks, 0);
        assert!(metrics.migrations_per_tick.is_empty());
        assert_eq!(metrics.deadline_miss_ratio(), 0.0);
    }
}
