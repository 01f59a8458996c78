//! Candidate selection strategies
//!
//! A zone delegates "which member should run this task" to a
//! [`PlacementStrategy`]. Coverage, feasibility and offer handling stay on
//! the zone; strategies only choose.

use fogsim_core::{NodeId, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Debug;
use tracing::debug;

use crate::config::{SimulationConfig, StrategyKind, TableMode};
use crate::learner::{
    self, DecisionContext, DecisionTable, MaxValueRule, MeanValueRule, Quantizer, UpdateRule,
};
use crate::node::Node;
use crate::task::Task;

/// Everything a strategy may look at when choosing
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub zone: &'a str,
    /// All zone members, in membership order
    pub members: &'a [&'a Node],
    /// Members passing the capacity, range and time checks
    pub feasible: &'a [&'a Node],
    pub requester: &'a Node,
    pub task: &'a Task,
}

/// Placement strategy interface
pub trait PlacementStrategy: Send + Debug {
    /// Strategy name
    fn name(&self) -> &str;

    /// Pick a member for the task, or `None` to make no offer
    fn select_candidate(&mut self, ctx: &SelectionContext<'_>) -> Option<NodeId>;

    /// Key to remember on a task this zone just admitted
    fn admission_context(
        &self,
        _members: &[&Node],
        _assignee: &Node,
        _task: &Task,
        _creator: &Node,
    ) -> Option<DecisionContext> {
        None
    }

    /// Learn from a task whose result this zone delivered. Returns the reward used.
    fn record_delivery(&mut self, _members: &[&Node], _task: &Task, _creator: &Node) -> Option<f64> {
        None
    }

    fn decision_table(&self) -> Option<&DecisionTable> {
        None
    }
}

/// Minimum of current plus predicted distance; first of equal scores wins
fn closest_over_time<'a>(
    candidates: impl IntoIterator<Item = &'a &'a Node>,
    requester: &Node,
    horizon: f64,
) -> Option<&'a Node> {
    let mut best: Option<(&Node, f64)> = None;
    for node in candidates {
        let score = node.distance_to(requester) + node.distance_in_future(requester, horizon);
        if best.is_none_or(|(_, min)| score < min) {
            best = Some((*node, score));
        }
    }
    best.map(|(node, _)| node)
}

/// Uniform pick over every member
#[derive(Debug)]
pub struct RandomStrategy {
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl PlacementStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn select_candidate(&mut self, ctx: &SelectionContext<'_>) -> Option<NodeId> {
        ctx.members.choose(&mut self.rng).map(|node| node.id.clone())
    }
}

/// Farthest-first scan over members, bounded by a branching factor
#[derive(Debug, Clone)]
pub struct HeuristicStrategy {
    branching_factor: usize,
}

impl HeuristicStrategy {
    pub fn new(branching_factor: usize) -> Self {
        Self { branching_factor }
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PlacementStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn select_candidate(&mut self, ctx: &SelectionContext<'_>) -> Option<NodeId> {
        let mut ordered: Vec<&Node> = ctx.members.to_vec();
        ordered.sort_by(|a, b| {
            b.distance_to(ctx.requester)
                .total_cmp(&a.distance_to(ctx.requester))
        });
        closest_over_time(
            ordered.iter().take(self.branching_factor),
            ctx.requester,
            ctx.task.exec_time,
        )
        .map(|node| node.id.clone())
    }
}

/// Decision-table strategy with ε-greedy exploration
#[derive(Debug)]
pub struct TableLearningStrategy {
    label: &'static str,
    table: DecisionTable,
    rule: Box<dyn UpdateRule>,
    quantizer: Quantizer,
    epsilon: f64,
    rng: ChaCha8Rng,
}

impl TableLearningStrategy {
    pub fn new(
        label: &'static str,
        table: DecisionTable,
        rule: Box<dyn UpdateRule>,
        quantizer: Quantizer,
        epsilon: f64,
        seed: u64,
    ) -> Self {
        Self {
            label,
            table,
            rule,
            quantizer,
            epsilon,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Q-learning flavour
    pub fn max_value(table: DecisionTable, config: &SimulationConfig, seed: u64) -> Self {
        Self::new(
            "table-learning",
            table,
            Box::new(MaxValueRule::from_config(&config.learning)),
            Quantizer::new(config.quantization.clone()),
            config.learning.epsilon,
            seed,
        )
    }

    /// Mean-bootstrap flavour
    pub fn mean_value(table: DecisionTable, config: &SimulationConfig, seed: u64) -> Self {
        Self::new(
            "table-learning-variant",
            table,
            Box::new(MeanValueRule::from_config(&config.learning)),
            Quantizer::new(config.quantization.clone()),
            config.learning.epsilon,
            seed,
        )
    }

    pub fn table(&self) -> &DecisionTable {
        &self.table
    }
}

impl PlacementStrategy for TableLearningStrategy {
    fn name(&self) -> &str {
        self.label
    }

    fn select_candidate(&mut self, ctx: &SelectionContext<'_>) -> Option<NodeId> {
        if ctx.feasible.is_empty() {
            return None;
        }
        if self.epsilon > 0.0 && self.rng.gen_bool(self.epsilon) {
            return ctx.feasible.choose(&mut self.rng).map(|node| node.id.clone());
        }

        let state = self
            .quantizer
            .state(ctx.members.iter().copied(), ctx.task, ctx.requester);
        let candidates: Vec<_> = ctx
            .feasible
            .iter()
            .map(|node| self.quantizer.action(node))
            .collect();
        if let Some(node) = self.table.suggest(&state, &candidates) {
            return Some(node);
        }

        debug!(zone = ctx.zone, task = ctx.task.id, "no table suggestion, using distance fallback");
        closest_over_time(ctx.feasible, ctx.requester, ctx.task.exec_time)
            .map(|node| node.id.clone())
    }

    fn admission_context(
        &self,
        members: &[&Node],
        assignee: &Node,
        task: &Task,
        creator: &Node,
    ) -> Option<DecisionContext> {
        let action = match &task.assignment {
            Some(snapshot) => self.quantizer.action_from_snapshot(snapshot),
            None => self.quantizer.action(assignee),
        };
        Some(DecisionContext {
            state: self.quantizer.state(members.iter().copied(), task, creator),
            action,
        })
    }

    fn record_delivery(&mut self, members: &[&Node], task: &Task, creator: &Node) -> Option<f64> {
        let context = task.decision_context.as_ref()?;
        let next_state = self.quantizer.state(members.iter().copied(), task, creator);
        let reward = learner::reward(task.deadline_missed, task.migrated);
        let value = self
            .table
            .update(context, reward, &next_state, self.rule.as_ref());
        debug!(
            zone = self.table.zone(),
            task = task.id,
            reward,
            value,
            rule = self.rule.name(),
            "decision table updated"
        );
        Some(reward)
    }

    fn decision_table(&self) -> Option<&DecisionTable> {
        Some(&self.table)
    }
}

/// Build the strategy for one zone.
///
/// Learning strategies restore their table from disk in online mode; a
/// missing or unreadable table is an error. Returns `None` for
/// [`StrategyKind::FullyRandom`], which runs without zones.
pub fn build_strategy(
    kind: StrategyKind,
    zone_index: usize,
    zone: &str,
    config: &SimulationConfig,
) -> Result<Option<Box<dyn PlacementStrategy>>> {
    let seed = config.seed.wrapping_add(zone_index as u64 + 1);
    let strategy: Box<dyn PlacementStrategy> = match kind {
        StrategyKind::FullyRandom => return Ok(None),
        StrategyKind::Random => Box::new(RandomStrategy::new(seed)),
        StrategyKind::Heuristic => Box::new(HeuristicStrategy::new(
            config.placement.heuristic_branching_factor,
        )),
        StrategyKind::TableLearning | StrategyKind::TableLearningVariant => {
            let table = match config.tables.mode {
                TableMode::Offline => DecisionTable::new(zone, &config.learning),
                TableMode::Online => {
                    DecisionTable::load(zone, &config.tables.directory, &config.learning)?
                }
            };
            if kind == StrategyKind::TableLearning {
                Box::new(TableLearningStrategy::max_value(table, config, seed))
            } else {
                Box::new(TableLearningStrategy::mean_value(table, config, seed))
            }
        }
    };
    Ok(Some(strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostModel, LearningConfig};
    use fogsim_core::{FogsimError, Position, Tier, Velocity};

    fn fog(id: &str, x: f64, y: f64) -> Node {
        Node::new(
            NodeId::new(id),
            Tier::Fog,
            Position::new(x, y),
            Velocity::stationary(),
            10.0,
            5.0,
        )
    }

    fn user() -> Node {
        Node::new(
            NodeId::new("user"),
            Tier::User,
            Position::new(0.0, 0.0),
            Velocity::stationary(),
            0.0,
            0.0,
        )
    }

    fn task() -> Task {
        Task::new(1, 1.0, 2.0, 50.0, NodeId::new("user"), 0.0, &CostModel::default())
    }

    #[test]
    fn test_heuristic_picks_closest_within_branching_factor() {
        let nodes = [fog("far", 4.0, 0.0), fog("near", 1.0, 0.0), fog("mid", 2.0, 0.0)];
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let task = task();
        let ctx = SelectionContext {
            zone: "z",
            members: &members,
            feasible: &members,
            requester: &requester,
            task: &task,
        };

        assert_eq!(
            HeuristicStrategy::new(10).select_candidate(&ctx),
            Some(NodeId::new("near"))
        );
        // Only the two farthest are evaluated
        assert_eq!(
            HeuristicStrategy::new(2).select_candidate(&ctx),
            Some(NodeId::new("mid"))
        );
    }

    #[test]
    fn test_heuristic_tie_keeps_first_evaluated() {
        let nodes = [fog("east", 2.0, 0.0), fog("west", -2.0, 0.0)];
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let task = task();
        let ctx = SelectionContext {
            zone: "z",
            members: &members,
            feasible: &[],
            requester: &requester,
            task: &task,
        };
        assert_eq!(
            HeuristicStrategy::default().select_candidate(&ctx),
            Some(NodeId::new("east"))
        );
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let nodes: Vec<Node> = (0..8).map(|i| fog(&format!("fog-{i}"), i as f64, 0.0)).collect();
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let task = task();
        let ctx = SelectionContext {
            zone: "z",
            members: &members,
            feasible: &[],
            requester: &requester,
            task: &task,
        };

        let mut a = RandomStrategy::new(7);
        let mut b = RandomStrategy::new(7);
        for _ in 0..20 {
            let pick = a.select_candidate(&ctx);
            assert!(pick.is_some());
            assert_eq!(pick, b.select_candidate(&ctx));
        }

        let empty = SelectionContext { members: &[], ..ctx };
        assert_eq!(a.select_candidate(&empty), None);
    }

    #[test]
    fn test_learning_without_feasible_offers_nothing() {
        let config = SimulationConfig::default();
        let mut strategy = TableLearningStrategy::max_value(
            DecisionTable::new("z", &config.learning),
            &config,
            1,
        );
        let nodes = [fog("a", 1.0, 0.0)];
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let task = task();
        let ctx = SelectionContext {
            zone: "z",
            members: &members,
            feasible: &[],
            requester: &requester,
            task: &task,
        };
        assert_eq!(strategy.select_candidate(&ctx), None);
    }

    #[test]
    fn test_learning_falls_back_to_distance_then_follows_table() {
        let mut config = SimulationConfig::default();
        config.learning.epsilon = 0.0;
        let mut strategy = TableLearningStrategy::max_value(
            DecisionTable::new("z", &config.learning),
            &config,
            1,
        );
        let nodes = [fog("a", 3.0, 0.0), fog("b", 1.0, 0.0)];
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let task = task();
        let ctx = SelectionContext {
            zone: "z",
            members: &members,
            feasible: &members,
            requester: &requester,
            task: &task,
        };

        // Empty table: closest feasible
        assert_eq!(strategy.select_candidate(&ctx), Some(NodeId::new("b")));

        let quantizer = Quantizer::new(config.quantization.clone());
        let state = quantizer.state(members.iter().copied(), &task, &requester);
        strategy
            .table
            .insert(state, quantizer.action(&nodes[0]), 5.0);
        assert_eq!(strategy.select_candidate(&ctx), Some(NodeId::new("a")));
    }

    #[test]
    fn test_record_delivery_applies_migration_penalty() {
        let config = SimulationConfig::default();
        let mut strategy = TableLearningStrategy::mean_value(
            DecisionTable::new("z", &config.learning),
            &config,
            1,
        );
        let nodes = [fog("a", 1.0, 0.0)];
        let members: Vec<&Node> = nodes.iter().collect();
        let requester = user();
        let mut task = task();

        // No context recorded: nothing to learn
        assert_eq!(strategy.record_delivery(&members, &task, &requester), None);

        task.decision_context = strategy.admission_context(&members, &nodes[0], &task, &requester);
        task.migrated = true;
        assert_eq!(strategy.record_delivery(&members, &task, &requester), Some(-10.0));
        assert_eq!(strategy.table().len(), 1);
    }

    #[test]
    fn test_online_mode_requires_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimulationConfig::default();
        config.tables.mode = TableMode::Online;
        config.tables.directory = dir.path().to_path_buf();

        let err = build_strategy(StrategyKind::TableLearning, 0, "zone-0", &config);
        assert!(matches!(err, Err(FogsimError::DecisionTable { .. })));

        DecisionTable::new("zone-0", &LearningConfig::default())
            .save(dir.path())
            .unwrap();
        let strategy = build_strategy(StrategyKind::TableLearning, 0, "zone-0", &config)
            .unwrap()
            .unwrap();
        assert_eq!(strategy.name(), "table-learning");
        assert!(build_strategy(StrategyKind::FullyRandom, 0, "zone-0", &config)
            .unwrap()
            .is_none());
    }
}
