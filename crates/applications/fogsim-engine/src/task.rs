//! Computational tasks and their lifecycle
//!
//! A task lives in exactly one place at a time: the backpressure queue or
//! the active set of a single node. On completion it is released from the
//! node and delivered to its creator, which stamps the [`TaskResult`].

use fogsim_core::{NodeId, TaskRecord};
use serde::{Deserialize, Serialize};

use crate::config::CostModel;
use crate::learner::DecisionContext;
use crate::node::NodeSnapshot;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    OnTime,
    Late,
    /// Evicted from an overflowing queue
    Dropped,
}

/// Result payload stamped on delivery or drop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub outcome: TaskOutcome,
    pub resolved_at: f64,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub power_needed: f64,
    pub size: f64,
    /// Absolute deadline
    pub deadline: f64,
    /// Reset to the retry time each time the task leaves the queue
    pub creation_time: f64,
    /// `size / processing_rate`
    pub exec_time: f64,
    pub creator: NodeId,
    /// Node currently running the task; cleared on delivery
    pub assigned_node: Option<NodeId>,
    /// Public attributes of the assignee at admission, kept after delivery
    pub assignment: Option<NodeSnapshot>,
    pub result: Option<TaskResult>,
    pub migrated: bool,
    pub deadline_missed: bool,
    /// Decision table key recorded at admission by learning strategies
    pub decision_context: Option<DecisionContext>,
}

impl Task {
    pub fn new(
        id: u64,
        power_needed: f64,
        size: f64,
        deadline: f64,
        creator: NodeId,
        creation_time: f64,
        costs: &CostModel,
    ) -> Self {
        Self {
            id,
            power_needed,
            size,
            deadline,
            creation_time,
            exec_time: costs.execution_time(size),
            creator,
            assigned_node: None,
            assignment: None,
            result: None,
            migrated: false,
            deadline_missed: false,
            decision_context: None,
        }
    }

    pub fn from_record(record: &TaskRecord, costs: &CostModel) -> Self {
        Self::new(
            record.id,
            record.power_needed,
            record.size,
            record.deadline,
            record.creator.clone(),
            record.creation_time,
            costs,
        )
    }

    /// Time left between the (possibly retried) creation time and the deadline
    pub fn deadline_slack(&self) -> f64 {
        self.deadline - self.creation_time
    }

    pub fn is_active(&self) -> bool {
        self.assigned_node.is_some()
    }

    /// Mark as discarded from the queue
    pub fn drop_at(&mut self, now: f64) {
        self.deadline_missed = true;
        self.result = Some(TaskResult {
            outcome: TaskOutcome::Dropped,
            resolved_at: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_time_and_slack() {
        let costs = CostModel::default();
        let mut task = Task::new(7, 1.0, 3.0, 12.0, NodeId::new("car-1"), 4.0, &costs);
        assert_eq!(task.exec_time, 1.5);
        assert_eq!(task.deadline_slack(), 8.0);

        // Retrying from the queue shrinks the slack
        task.creation_time = 10.0;
        assert_eq!(task.deadline_slack(), 2.0);
        assert!(!task.is_active());
    }

    #[test]
    fn test_drop_marks_deadline_miss() {
        let costs = CostModel::default();
        let mut task = Task::new(1, 1.0, 1.0, 5.0, NodeId::new("u"), 0.0, &costs);
        task.drop_at(3.0);
        assert!(task.deadline_missed);
        assert_eq!(
            task.result,
            Some(TaskResult {
                outcome: TaskOutcome::Dropped,
                resolved_at: 3.0
            })
        );
    }
}
