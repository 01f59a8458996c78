//! Coverage zones
//!
//! A zone is a named circle with a set of fog node members. Members are
//! referenced by id and resolved through the [`NodeRegistry`]; a node may be
//! a member of several zones at once. Candidate choice is delegated to the
//! zone's [`PlacementStrategy`], everything else is shared behavior.

use fogsim_core::{NodeId, Position, Tier, ZoneRecord};
use tracing::{debug, trace};

use crate::config::CostModel;
use crate::learner::DecisionTable;
use crate::metrics::SimulationMetrics;
use crate::node::{Node, NodeRegistry};
use crate::strategy::{PlacementStrategy, SelectionContext};
use crate::task::{Task, TaskOutcome};

/// A zone's proposal to run a task on one of its members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub zone: String,
    pub candidate: NodeId,
}

/// Outcome of [`CoverageZone::accept_offer`]
#[derive(Debug)]
pub enum Admission {
    Admitted(NodeId),
    /// The candidate no longer qualifies; the task goes back to the caller
    Rejected(Task),
}

/// What a zone's tick hands back to the orchestrator
#[derive(Debug, Default)]
pub struct ZoneTick {
    /// Tasks released from members, awaiting delivery
    pub completed: Vec<Task>,
    /// Members that left the zone's radius
    pub departed: Vec<NodeId>,
}

/// Capacity, reach and time budget of `candidate` for `task` sent by `requester`
pub fn is_feasible(candidate: &Node, requester: &Node, task: &Task, costs: &CostModel) -> bool {
    candidate.can_host(task)
        && candidate.in_range(requester.position)
        && costs.time_budget_ok(
            task.deadline_slack(),
            task.size,
            candidate.distance_to(requester),
            candidate.tier == Tier::Cloud,
            false,
        )
}

#[derive(Debug)]
pub struct CoverageZone {
    pub name: String,
    pub center: Position,
    pub radius: f64,
    members: Vec<NodeId>,
    strategy: Box<dyn PlacementStrategy>,
}

impl CoverageZone {
    pub fn new(
        name: impl Into<String>,
        center: Position,
        radius: f64,
        strategy: Box<dyn PlacementStrategy>,
    ) -> Self {
        Self {
            name: name.into(),
            center,
            radius,
            members: Vec::new(),
            strategy,
        }
    }

    pub fn from_record(record: &ZoneRecord, strategy: Box<dyn PlacementStrategy>) -> Self {
        Self::new(record.name.clone(), record.center(), record.radius, strategy)
    }

    pub fn covers(&self, position: Position) -> bool {
        self.center.distance_to(position) <= self.radius
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn is_member(&self, id: &NodeId) -> bool {
        self.members.contains(id)
    }

    /// Add a member. Returns false if it already was one.
    pub fn admit_member(&mut self, id: NodeId) -> bool {
        if self.is_member(&id) {
            return false;
        }
        self.members.push(id);
        true
    }

    pub fn remove_member(&mut self, id: &NodeId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != id);
        self.members.len() != before
    }

    pub fn decision_table(&self) -> Option<&DecisionTable> {
        self.strategy.decision_table()
    }

    /// Members resolved through the registry, in membership order
    pub fn member_nodes<'a>(&self, nodes: &'a NodeRegistry) -> Vec<&'a Node> {
        self.members.iter().filter_map(|id| nodes.get(id)).collect()
    }

    /// Members that can take the task right now. Empty is a normal answer.
    pub fn feasible_candidates<'a>(
        &self,
        nodes: &'a NodeRegistry,
        requester: &Node,
        task: &Task,
        costs: &CostModel,
    ) -> Vec<&'a Node> {
        self.member_nodes(nodes)
            .into_iter()
            .filter(|candidate| is_feasible(candidate, requester, task, costs))
            .collect()
    }

    pub fn select_candidate(
        &mut self,
        nodes: &NodeRegistry,
        requester: &Node,
        task: &Task,
        costs: &CostModel,
    ) -> Option<NodeId> {
        let members = self.member_nodes(nodes);
        let feasible = self.feasible_candidates(nodes, requester, task, costs);
        let ctx = SelectionContext {
            zone: &self.name,
            members: &members,
            feasible: &feasible,
            requester,
            task,
        };
        self.strategy.select_candidate(&ctx)
    }

    /// Propose a member, or nothing if the requester is outside the zone
    pub fn make_offer(
        &mut self,
        nodes: &NodeRegistry,
        requester: &Node,
        task: &Task,
        costs: &CostModel,
    ) -> Option<Offer> {
        if !self.covers(requester.position) {
            return None;
        }
        let candidate = self.select_candidate(nodes, requester, task, costs)?;
        trace!(zone = %self.name, task = task.id, %candidate, "offer made");
        Some(Offer {
            zone: self.name.clone(),
            candidate,
        })
    }

    /// Admit the task on the offered candidate if it still qualifies
    pub fn accept_offer(
        &mut self,
        nodes: &mut NodeRegistry,
        requester: &NodeId,
        task: Task,
        offer: &Offer,
        costs: &CostModel,
        metrics: &mut SimulationMetrics,
    ) -> Admission {
        let still_feasible = self.is_member(&offer.candidate)
            && match (nodes.get(&offer.candidate), nodes.get(requester)) {
                (Some(candidate), Some(requester)) => is_feasible(candidate, requester, &task, costs),
                _ => false,
            };
        if !still_feasible {
            debug!(zone = %self.name, task = task.id, candidate = %offer.candidate, "offer no longer valid");
            return Admission::Rejected(task);
        }

        let task_id = task.id;
        if let Some(candidate) = nodes.get_mut(&offer.candidate) {
            candidate.admit(task, metrics);
        }

        let context = {
            let members = self.member_nodes(nodes);
            match (
                nodes.get(&offer.candidate),
                nodes.get(requester),
            ) {
                (Some(assignee), Some(creator)) => assignee
                    .task(task_id)
                    .and_then(|t| self.strategy.admission_context(&members, assignee, t, creator)),
                _ => None,
            }
        };
        if let Some(context) = context {
            if let Some(admitted) = nodes
                .get_mut(&offer.candidate)
                .and_then(|n| n.task_mut(task_id))
            {
                admitted.decision_context = Some(context);
            }
        }

        Admission::Admitted(offer.candidate.clone())
    }

    /// Release finished tasks from members and evict members that left the radius
    pub fn tick(&self, nodes: &mut NodeRegistry, now: f64, costs: &CostModel) -> ZoneTick {
        let mut result = ZoneTick::default();

        for member in &self.members {
            let due: Vec<u64> = match nodes.get(member) {
                Some(node) => node
                    .tasks()
                    .iter()
                    .filter(|task| match nodes.get(&task.creator) {
                        Some(creator) => node.completion_due(task, now, creator.position, costs),
                        None => true,
                    })
                    .map(|task| task.id)
                    .collect(),
                None => continue,
            };
            if let Some(node) = nodes.get_mut(member) {
                result
                    .completed
                    .extend(due.into_iter().filter_map(|id| node.release(id)));
            }
        }

        result.departed = self
            .members
            .iter()
            .filter(|id| {
                nodes
                    .get(*id)
                    .is_some_and(|node| !self.covers(node.position))
            })
            .cloned()
            .collect();

        result
    }

    /// Drop members reported by [`CoverageZone::tick`] as departed
    pub fn evict(&mut self, departed: &[NodeId]) {
        self.members.retain(|m| !departed.contains(m));
    }

    /// Hand a finished task to its creator and let the strategy learn from it
    pub fn deliver(&mut self, task: &mut Task, nodes: &NodeRegistry, now: f64) -> Option<TaskOutcome> {
        let creator = nodes.get(&task.creator)?;
        let outcome = creator.deliver(task, now);
        let members = self.member_nodes(nodes);
        self.strategy.record_delivery(&members, task, creator);
        Some(outcome)
    }
}
