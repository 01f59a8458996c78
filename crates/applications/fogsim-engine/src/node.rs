//! Compute nodes: user devices, fog nodes and the cloud
//!
//! Capacity invariant: the sum of `power_needed` over a node's active tasks
//! plus its remaining `power` always equals the budget it started with.
//! [`Node::admit`] and [`Node::release`] are the only ways tasks enter and
//! leave the active set.

use fogsim_core::{NodeId, NodeRecord, Position, Tier, Velocity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{CostModel, TierDefaults};
use crate::metrics::SimulationMetrics;
use crate::task::{Task, TaskOutcome, TaskResult};

/// Every node in the run, keyed by id. Zones refer to members by id only.
pub type NodeRegistry = BTreeMap<NodeId, Node>;

/// Public attributes of a node, copied onto a task at admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeId,
    pub tier: Tier,
    pub position: Position,
    pub velocity: Velocity,
    pub power: f64,
    pub coverage_radius: f64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub tier: Tier,
    pub position: Position,
    pub velocity: Velocity,
    /// Remaining power budget
    pub power: f64,
    pub coverage_radius: f64,
    tasks: Vec<Task>,
}

impl Node {
    pub fn new(
        id: NodeId,
        tier: Tier,
        position: Position,
        velocity: Velocity,
        power: f64,
        coverage_radius: f64,
    ) -> Self {
        Self {
            id,
            tier,
            position,
            velocity,
            power,
            coverage_radius,
            tasks: Vec::new(),
        }
    }

    /// Build a node from a feed record, filling gaps from the tier defaults
    pub fn from_record(record: &NodeRecord, defaults: &TierDefaults) -> Self {
        Self::new(
            record.id.clone(),
            record.tier,
            record.position(),
            record.velocity(),
            record.power.unwrap_or_else(|| defaults.power(record.tier)),
            record
                .coverage_radius
                .unwrap_or_else(|| defaults.coverage(record.tier)),
        )
    }

    /// The cloud node at its configured position
    pub fn cloud(defaults: &TierDefaults) -> Self {
        Self::new(
            NodeId::new("cloud"),
            Tier::Cloud,
            defaults.cloud_position(),
            Velocity::stationary(),
            defaults.cloud_power,
            defaults.cloud_coverage,
        )
    }

    /// Move to the position reported by the feed. Power and tasks are kept.
    pub fn apply_record(&mut self, record: &NodeRecord) {
        self.position = record.position();
        self.velocity = record.velocity();
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node: self.id.clone(),
            tier: self.tier,
            position: self.position,
            velocity: self.velocity,
            power: self.power,
            coverage_radius: self.coverage_radius,
        }
    }

    pub fn can_host(&self, task: &Task) -> bool {
        self.power >= task.power_needed
    }

    /// Start running `task` here.
    ///
    /// Callers must have checked [`Node::can_host`] first.
    pub fn admit(&mut self, mut task: Task, metrics: &mut SimulationMetrics) {
        debug_assert!(
            self.can_host(&task),
            "node {} admitted task {} without capacity ({} < {})",
            self.id,
            task.id,
            self.power,
            task.power_needed
        );
        task.assignment = Some(self.snapshot());
        task.assigned_node = Some(self.id.clone());
        self.power -= task.power_needed;
        metrics.record_assignment(&self.id, self.tier);
        debug!(node = %self.id, task = task.id, power_left = self.power, "task admitted");
        self.tasks.push(task);
    }

    /// Remove a task from the active set and restore its power
    pub fn release(&mut self, task_id: u64) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == task_id)?;
        let task = self.tasks.remove(index);
        self.power += task.power_needed;
        Some(task)
    }

    /// True once the result of `task` would have reached a creator at
    /// `creator_position`, using the distance as it is right now.
    pub fn completion_due(
        &self,
        task: &Task,
        now: f64,
        creator_position: Position,
        costs: &CostModel,
    ) -> bool {
        let distance = self.position.distance_to(creator_position);
        let finish = task.creation_time
            + costs.processing_time(task.size, distance, self.tier == Tier::Cloud, task.migrated);
        now >= finish
    }

    /// Accept a finished task's result on this (creator) node
    pub fn deliver(&self, task: &mut Task, now: f64) -> TaskOutcome {
        task.deadline_missed = now > task.deadline;
        task.assigned_node = None;
        let outcome = if task.deadline_missed {
            TaskOutcome::Late
        } else {
            TaskOutcome::OnTime
        };
        task.result = Some(TaskResult {
            outcome,
            resolved_at: now,
        });
        debug!(node = %self.id, task = task.id, ?outcome, "task result delivered");
        outcome
    }

    pub fn predicted_position(&self, dt: f64) -> Position {
        self.position.advanced(self.velocity, dt)
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        self.position.distance_to(other.position)
    }

    /// Distance between both nodes' extrapolated positions after `dt`
    pub fn distance_in_future(&self, other: &Node, dt: f64) -> f64 {
        self.predicted_position(dt)
            .distance_to(other.predicted_position(dt))
    }

    pub fn in_range(&self, position: Position) -> bool {
        self.position.distance_to(position) <= self.coverage_radius
    }
}
