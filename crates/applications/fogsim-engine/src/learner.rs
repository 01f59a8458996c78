//! Approximate-match decision table
//!
//! A zone's table maps a quantized [`QuantizedState`] (the task plus every
//! fog node in the zone) to values for [`QuantizedAction`]s (a candidate node
//! and its quantized attributes). Lookups never fail: an unseen state falls
//! back to the nearest stored one within `state_threshold`, or gets a fresh
//! empty entry. Actions within a state generalize the same way.
//!
//! How the next state's values are bootstrapped is pluggable through
//! [`UpdateRule`]: [`MaxValueRule`] is plain Q-learning, [`MeanValueRule`]
//! averages instead.

use fogsim_core::{FogsimError, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{BinRange, LearningConfig, MAX_LEVELS, QuantizationConfig};
use crate::node::{Node, NodeSnapshot};
use crate::task::Task;

/// Binned (x, y, speed, heading, power) of a fog node
pub type NodeContext = [u8; 5];

/// Binned (power, size, deadline, creator x, creator y, creator speed, creator heading)
pub type TaskContext = [u8; 7];

const ON_TIME_REWARD: f64 = 10.0;
const LATE_PENALTY: f64 = -10.0;
const MIGRATION_PENALTY: f64 = -20.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizedState {
    pub nodes: Vec<NodeContext>,
    pub task: TaskContext,
}

impl QuantizedState {
    /// Distance between two states.
    ///
    /// Every node vector of the shorter list is paired with its nearest
    /// vector in the longer one; squared distances are summed with the
    /// squared task distance. Equal-length lists are ordered so the result
    /// does not depend on argument order.
    pub fn distance(&self, other: &QuantizedState) -> f64 {
        let (short, long) = if (self.nodes.len(), &self.nodes) <= (other.nodes.len(), &other.nodes) {
            (self, other)
        } else {
            (other, self)
        };

        let nodes: u32 = short
            .nodes
            .iter()
            .map(|a| {
                long.nodes
                    .iter()
                    .map(|b| squared_distance(a, b))
                    .min()
                    .unwrap_or(0)
            })
            .sum();
        let task = squared_distance(&self.task, &other.task);

        f64::from(nodes + task).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizedAction {
    pub node: NodeId,
    pub context: NodeContext,
}

impl QuantizedAction {
    /// Distance between the node attributes; the id plays no part
    pub fn distance(&self, other: &QuantizedAction) -> f64 {
        f64::from(squared_distance(&self.context, &other.context)).sqrt()
    }
}

/// Key of the table entry a placement decision was made under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub state: QuantizedState,
    pub action: QuantizedAction,
}

fn squared_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = u32::from(x.abs_diff(*y));
            d * d
        })
        .sum()
}

/// Turns continuous node and task attributes into bin indices
#[derive(Debug, Clone)]
pub struct Quantizer {
    config: QuantizationConfig,
}

impl Quantizer {
    pub fn new(config: QuantizationConfig) -> Self {
        Self { config }
    }

    /// Number of the `levels` evenly spaced edges over `range` that are ≤ `value`
    pub fn bin(&self, value: f64, range: BinRange) -> u8 {
        let levels = self.config.levels.clamp(2, MAX_LEVELS);
        let step = (range.max - range.min) / (levels - 1) as f64;
        let count = (0..levels)
            .filter(|i| range.min + step * (*i as f64) <= value)
            .count();
        u8::try_from(count).unwrap_or(u8::MAX)
    }

    pub fn node_context(&self, node: &Node) -> NodeContext {
        let r = &self.config.node;
        [
            self.bin(node.position.x, r.x),
            self.bin(node.position.y, r.y),
            self.bin(node.velocity.speed, r.speed),
            self.bin(node.velocity.heading, r.heading),
            self.bin(node.power, r.power),
        ]
    }

    pub fn snapshot_context(&self, snapshot: &NodeSnapshot) -> NodeContext {
        let r = &self.config.node;
        [
            self.bin(snapshot.position.x, r.x),
            self.bin(snapshot.position.y, r.y),
            self.bin(snapshot.velocity.speed, r.speed),
            self.bin(snapshot.velocity.heading, r.heading),
            self.bin(snapshot.power, r.power),
        ]
    }

    pub fn task_context(&self, task: &Task, creator: &Node) -> TaskContext {
        let r = &self.config.task;
        [
            self.bin(task.power_needed, r.power),
            self.bin(task.size, r.size),
            self.bin(task.deadline, r.deadline),
            self.bin(creator.position.x, r.creator_x),
            self.bin(creator.position.y, r.creator_y),
            self.bin(creator.velocity.speed, r.creator_speed),
            self.bin(creator.velocity.heading, r.creator_heading),
        ]
    }

    pub fn state<'a>(
        &self,
        members: impl IntoIterator<Item = &'a Node>,
        task: &Task,
        creator: &Node,
    ) -> QuantizedState {
        QuantizedState {
            nodes: members.into_iter().map(|n| self.node_context(n)).collect(),
            task: self.task_context(task, creator),
        }
    }

    pub fn action(&self, node: &Node) -> QuantizedAction {
        QuantizedAction {
            node: node.id.clone(),
            context: self.node_context(node),
        }
    }

    pub fn action_from_snapshot(&self, snapshot: &NodeSnapshot) -> QuantizedAction {
        QuantizedAction {
            node: snapshot.node.clone(),
            context: self.snapshot_context(snapshot),
        }
    }
}

/// Reward for a delivered task
pub fn reward(deadline_missed: bool, migrated: bool) -> f64 {
    let mut reward = if deadline_missed {
        LATE_PENALTY
    } else {
        ON_TIME_REWARD
    };
    if migrated {
        reward += MIGRATION_PENALTY;
    }
    reward
}

/// Value update applied after a task is delivered
pub trait UpdateRule: Send + std::fmt::Debug {
    fn name(&self) -> &str;

    fn alpha(&self) -> f64;

    fn gamma(&self) -> f64;

    /// Estimate of the next state's value from its action values.
    /// Called with a non-empty slice only.
    fn bootstrap(&self, next_values: &[f64]) -> f64;

    fn updated(&self, current: f64, reward: f64, next_values: &[f64]) -> f64 {
        let next = if next_values.is_empty() {
            0.0
        } else {
            self.bootstrap(next_values)
        };
        current + self.alpha() * (reward + self.gamma() * next - current)
    }
}

/// Q-learning: bootstrap from the best next action
#[derive(Debug, Clone)]
pub struct MaxValueRule {
    pub alpha: f64,
    pub gamma: f64,
}

impl MaxValueRule {
    pub fn from_config(config: &LearningConfig) -> Self {
        Self {
            alpha: config.alpha,
            gamma: config.gamma,
        }
    }
}

impl UpdateRule for MaxValueRule {
    fn name(&self) -> &str {
        "max"
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn bootstrap(&self, next_values: &[f64]) -> f64 {
        next_values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Bootstrap from the mean of the next actions
#[derive(Debug, Clone)]
pub struct MeanValueRule {
    pub alpha: f64,
    pub gamma: f64,
}

impl MeanValueRule {
    pub fn from_config(config: &LearningConfig) -> Self {
        Self {
            alpha: config.variant_alpha,
            gamma: config.variant_gamma,
        }
    }
}

impl UpdateRule for MeanValueRule {
    fn name(&self) -> &str {
        "mean"
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn bootstrap(&self, next_values: &[f64]) -> f64 {
        next_values.iter().sum::<f64>() / next_values.len() as f64
    }
}

#[derive(Debug, Clone)]
struct TableEntry {
    state: QuantizedState,
    actions: Vec<(QuantizedAction, f64)>,
}

impl TableEntry {
    /// Actions holding a value. Zero is what an unvisited action reads as and
    /// is never persisted, so it takes no part in matching either.
    fn valued(&self) -> impl Iterator<Item = &(QuantizedAction, f64)> {
        self.actions.iter().filter(|(_, v)| *v != 0.0)
    }

    fn has_values(&self) -> bool {
        self.valued().next().is_some()
    }
}

/// Per-zone decision table
#[derive(Debug, Clone)]
pub struct DecisionTable {
    zone: String,
    entries: Vec<TableEntry>,
    index: HashMap<QuantizedState, usize>,
    state_threshold: f64,
    action_threshold: f64,
}

impl DecisionTable {
    pub fn new(zone: impl Into<String>, config: &LearningConfig) -> Self {
        Self {
            zone: zone.into(),
            entries: Vec::new(),
            index: HashMap::new(),
            state_threshold: config.state_threshold,
            action_threshold: config.action_threshold,
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Number of stored states
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact state, or the nearest stored one within the threshold.
    ///
    /// Only entries holding at least one value are candidates, so a table
    /// answers the same before and after a save/load round trip.
    pub fn find_state(&self, state: &QuantizedState) -> Option<usize> {
        if let Some(&idx) = self.index.get(state) {
            if self.entries[idx].has_values() {
                return Some(idx);
            }
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if !entry.has_values() {
                continue;
            }
            let d = state.distance(&entry.state);
            if best.is_none_or(|(_, min)| d < min) {
                best = Some((idx, d));
            }
        }
        best.filter(|(_, d)| *d <= self.state_threshold)
            .map(|(idx, _)| idx)
    }

    /// Like [`DecisionTable::find_state`], creating an empty entry when nothing matches
    pub fn resolve_state(&mut self, state: &QuantizedState) -> usize {
        if let Some(idx) = self.find_state(state) {
            return idx;
        }
        if let Some(&idx) = self.index.get(state) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(TableEntry {
            state: state.clone(),
            actions: Vec::new(),
        });
        self.index.insert(state.clone(), idx);
        idx
    }

    /// Stored value for `action` under the entry, or the nearest action's within the threshold
    pub fn action_value(&self, entry: usize, action: &QuantizedAction) -> Option<f64> {
        let entry = self.entries.get(entry)?;
        if let Some((_, value)) = entry.valued().find(|(a, _)| a == action) {
            return Some(*value);
        }
        let mut best: Option<(f64, f64)> = None;
        for (stored, value) in entry.valued() {
            let d = action.distance(stored);
            if best.is_none_or(|(min, _)| d < min) {
                best = Some((d, *value));
            }
        }
        best.filter(|(d, _)| *d <= self.action_threshold)
            .map(|(_, value)| value)
    }

    /// Values of every action stored under the state nearest to `state`
    pub fn state_values(&self, state: &QuantizedState) -> Vec<f64> {
        self.find_state(state)
            .map(|idx| self.entries[idx].valued().map(|(_, v)| *v).collect())
            .unwrap_or_default()
    }

    /// Highest valued candidate, or `None` if the matched entry has no actions yet
    pub fn suggest(
        &mut self,
        state: &QuantizedState,
        candidates: &[QuantizedAction],
    ) -> Option<NodeId> {
        let idx = self.resolve_state(state);
        if !self.entries[idx].has_values() {
            return None;
        }
        let mut best: Option<(&QuantizedAction, f64)> = None;
        for candidate in candidates {
            let value = self.action_value(idx, candidate).unwrap_or(0.0);
            if best.is_none_or(|(_, max)| value > max) {
                best = Some((candidate, value));
            }
        }
        best.map(|(action, _)| action.node.clone())
    }

    /// Apply one update for a delivered task and return the new value
    pub fn update(
        &mut self,
        context: &DecisionContext,
        reward: f64,
        next_state: &QuantizedState,
        rule: &dyn UpdateRule,
    ) -> f64 {
        let idx = self.resolve_state(&context.state);
        let current = self.action_value(idx, &context.action).unwrap_or(0.0);
        let next_values = self.state_values(next_state);
        let value = rule.updated(current, reward, &next_values);
        self.set_value(idx, context.action.clone(), value);
        value
    }

    fn set_value(&mut self, entry: usize, action: QuantizedAction, value: f64) {
        let actions = &mut self.entries[entry].actions;
        match actions.iter_mut().find(|(a, _)| *a == action) {
            Some((_, v)) => *v = value,
            None => actions.push((action, value)),
        }
    }

    /// Insert a state-action value directly
    pub fn insert(&mut self, state: QuantizedState, action: QuantizedAction, value: f64) {
        let idx = match self.index.get(&state) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.index.insert(state.clone(), idx);
                self.entries.push(TableEntry {
                    state,
                    actions: Vec::new(),
                });
                idx
            }
        };
        self.set_value(idx, action, value);
    }

    /// File a zone's table is stored in
    pub fn path_for(directory: &Path, zone: &str) -> PathBuf {
        directory.join(format!("{zone}_decision_table.json"))
    }

    pub fn to_document(&self) -> TableDocument {
        let states = self
            .entries
            .iter()
            .filter_map(|entry| {
                let actions: Vec<ActionValue> = entry
                    .valued()
                    .map(|(action, value)| ActionValue {
                        action: action.clone(),
                        value: *value,
                    })
                    .collect();
                (!actions.is_empty()).then(|| StateDocument {
                    state: entry.state.clone(),
                    actions,
                })
            })
            .collect();
        TableDocument {
            zone: self.zone.clone(),
            states,
        }
    }

    pub fn from_document(document: TableDocument, config: &LearningConfig) -> Self {
        let mut table = Self::new(document.zone, config);
        for entry in document.states {
            for ActionValue { action, value } in entry.actions {
                if value != 0.0 {
                    table.insert(entry.state.clone(), action, value);
                }
            }
        }
        table
    }

    /// Write the table to `<directory>/<zone>_decision_table.json`
    pub fn save(&self, directory: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(directory)?;
        let path = Self::path_for(directory, &self.zone);
        let document = self.to_document();
        std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        info!(zone = %self.zone, states = document.states.len(), path = %path.display(), "decision table saved");
        Ok(path)
    }

    /// Restore a zone's table; a missing or corrupt file is an error
    pub fn load(zone: &str, directory: &Path, config: &LearningConfig) -> Result<Self> {
        let path = Self::path_for(directory, zone);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| FogsimError::decision_table(zone, &path, e))?;
        let document: TableDocument = serde_json::from_str(&raw)
            .map_err(|e| FogsimError::decision_table(zone, &path, e))?;
        if document.zone != zone {
            return Err(FogsimError::decision_table(
                zone,
                &path,
                format!("file belongs to zone {}", document.zone),
            ));
        }
        let table = Self::from_document(document, config);
        info!(zone, states = table.len(), "decision table restored");
        Ok(table)
    }
}

/// On-disk form of a [`DecisionTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub zone: String,
    pub states: Vec<StateDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub state: QuantizedState,
    pub actions: Vec<ActionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub action: QuantizedAction,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogsim_core::{Position, Tier, Velocity};

    fn state(nodes: Vec<NodeContext>, task: TaskContext) -> QuantizedState {
        QuantizedState { nodes, task }
    }

    fn action(id: &str, context: NodeContext) -> QuantizedAction {
        QuantizedAction {
            node: NodeId::new(id),
            context,
        }
    }

    fn table() -> DecisionTable {
        DecisionTable::new("zone-a", &LearningConfig::default())
    }

    #[test]
    fn test_bin_counts_edges_at_or_below() {
        let q = Quantizer::new(QuantizationConfig::default());
        let range = BinRange::new(0.0, 3.0);
        // edges 0, 0.75, 1.5, 2.25, 3
        assert_eq!(q.bin(-1.0, range), 0);
        assert_eq!(q.bin(0.0, range), 1);
        assert_eq!(q.bin(0.8, range), 2);
        assert_eq!(q.bin(2.25, range), 4);
        assert_eq!(q.bin(3.0, range), 5);
        assert_eq!(q.bin(400.0, range), 5);
    }

    #[test]
    fn test_bin_never_wraps() {
        let q = Quantizer::new(QuantizationConfig {
            levels: 300,
            ..QuantizationConfig::default()
        });
        let range = BinRange::new(0.0, 1.0);
        assert_eq!(q.bin(1000.0, range), u8::MAX);
        assert!(q.bin(0.5, range) < q.bin(1000.0, range));
    }

    #[test]
    fn test_node_context() {
        let q = Quantizer::new(QuantizationConfig::default());
        let node = Node::new(
            NodeId::new("fog-1"),
            Tier::Fog,
            Position::new(5.0, 9.0),
            Velocity::new(1.0, 180.0),
            15.0,
            3.0,
        );
        // x edges 0,2.5,5,7.5,10; power edges 0,5,10,15,20
        assert_eq!(q.node_context(&node), [3, 4, 2, 3, 4]);
    }

    #[test]
    fn test_state_distance() {
        let a = state(vec![[1, 1, 1, 1, 1]], [0; 7]);
        let b = state(vec![[1, 1, 1, 1, 3], [4, 4, 4, 4, 4]], [0, 0, 0, 0, 0, 0, 1]);
        // nearest pair 4, task 1
        assert!((a.distance(&b) - 5f64.sqrt()).abs() < 1e-12);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_equal_length_distance_is_symmetric() {
        let a = state(vec![[0; 5], [0; 5]], [0; 7]);
        let b = state(vec![[0; 5], [5; 5]], [0; 7]);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_find_state_threshold() {
        let mut t = table();
        let stored = state(vec![[1; 5]], [1; 7]);
        t.insert(stored.clone(), action("a", [1; 5]), 2.0);
        let idx = t.find_state(&stored).unwrap();
        assert_eq!(t.len(), 1);

        // distance 3 is within the default threshold of 10
        let near = state(vec![[1, 1, 1, 1, 4]], [1; 7]);
        assert_eq!(t.find_state(&near), Some(idx));

        let far = state(vec![[5; 5]], [5; 7]);
        assert_eq!(t.find_state(&far), None);
        t.resolve_state(&far);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_suggest_requires_known_actions() {
        let mut t = table();
        let s = state(vec![[1; 5], [2; 5]], [1; 7]);
        let candidates = vec![action("a", [1; 5]), action("b", [2; 5])];
        assert_eq!(t.suggest(&s, &candidates), None);
        assert_eq!(t.len(), 1);

        t.insert(s.clone(), action("b", [2; 5]), 4.0);
        t.insert(s.clone(), action("a", [1; 5]), 1.0);
        assert_eq!(t.suggest(&s, &candidates), Some(NodeId::new("b")));
    }

    #[test]
    fn test_nearest_action_generalizes() {
        let mut t = table();
        let s = state(vec![[1; 5]], [1; 7]);
        t.insert(s.clone(), action("a", [1, 1, 1, 1, 1]), 7.0);
        let idx = t.find_state(&s).unwrap();

        assert_eq!(t.action_value(idx, &action("z", [1, 1, 1, 1, 2])), Some(7.0));

        let mut strict = DecisionTable::new(
            "zone-a",
            &LearningConfig {
                action_threshold: 0.5,
                ..LearningConfig::default()
            },
        );
        strict.insert(s.clone(), action("a", [1, 1, 1, 1, 1]), 7.0);
        assert_eq!(strict.action_value(0, &action("z", [1, 1, 1, 1, 2])), None);
    }

    #[test]
    fn test_q_learning_update() {
        let mut t = table();
        let rule = MaxValueRule::from_config(&LearningConfig::default());
        let s = state(vec![[1; 5]], [1; 7]);
        let ctx = DecisionContext {
            state: s.clone(),
            action: action("a", [1; 5]),
        };
        // 0 + 0.1 * (10 + 0.6 * 0 - 0)
        let v = t.update(&ctx, 10.0, &state(vec![[4; 5]], [4; 7]), &rule);
        assert!((v - 1.0).abs() < 1e-12);

        // next state resolves to the same entry, max next = 1.0
        let v = t.update(&ctx, 10.0, &s, &rule);
        assert!((v - (1.0 + 0.1 * (10.0 + 0.6 - 1.0))).abs() < 1e-12);
    }

    #[test]
    fn test_rules_bootstrap_differently() {
        let values = [2.0, 4.0, 9.0];
        let max = MaxValueRule { alpha: 1.0, gamma: 1.0 };
        let mean = MeanValueRule { alpha: 1.0, gamma: 1.0 };
        assert_eq!(max.updated(0.0, 0.0, &values), 9.0);
        assert_eq!(mean.updated(0.0, 0.0, &values), 5.0);
        assert_eq!(mean.updated(0.0, 1.0, &[]), 1.0);
    }

    #[test]
    fn test_reward() {
        assert_eq!(reward(false, false), 10.0);
        assert_eq!(reward(true, false), -10.0);
        assert_eq!(reward(false, true), -10.0);
        assert_eq!(reward(true, true), -30.0);
    }

    #[test]
    fn test_unvalued_states_do_not_match() {
        let mut t = table();
        let visited = state(vec![[1; 5]], [1; 7]);
        let candidates = vec![action("a", [1; 5])];
        assert_eq!(t.suggest(&visited, &candidates), None);
        assert_eq!(t.len(), 1);
        assert_eq!(t.find_state(&visited), None);

        let valued = state(vec![[1; 5]], [1, 1, 1, 1, 1, 1, 4]);
        t.insert(valued.clone(), action("a", [1; 5]), 3.0);
        let query = state(vec![[1; 5]], [1, 1, 1, 1, 1, 1, 2]);
        assert_eq!(t.find_state(&query), t.find_state(&valued));

        // revisiting reuses the stored entry instead of adding another
        t.suggest(&visited, &candidates);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_zero_values_are_ignored_by_lookups() {
        let mut t = table();
        let s = state(vec![[1; 5]], [1; 7]);
        t.insert(s.clone(), action("a", [1; 5]), 0.0);
        assert_eq!(t.find_state(&s), None);

        t.insert(s.clone(), action("b", [1, 1, 1, 1, 2]), 6.0);
        let idx = t.find_state(&s).unwrap();
        assert_eq!(t.action_value(idx, &action("a", [1; 5])), Some(6.0));
        assert_eq!(t.state_values(&s), vec![6.0]);
    }

    #[test]
    fn test_document_skips_empty_and_zero() {
        let mut t = table();
        let empty = state(vec![[3; 5]], [3; 7]);
        t.resolve_state(&empty);
        let s = state(vec![[1; 5]], [1; 7]);
        t.insert(s.clone(), action("a", [1; 5]), 0.0);
        t.insert(s.clone(), action("b", [2; 5]), -2.5);

        let doc = t.to_document();
        assert_eq!(doc.states.len(), 1);
        assert_eq!(doc.states[0].actions.len(), 1);
        assert_eq!(doc.states[0].actions[0].value, -2.5);
    }

    #[test]
    fn test_reload_matches_like_the_live_table() {
        let mut t = table();
        t.suggest(&state(vec![[1; 5]], [1; 7]), &[action("a", [1; 5])]);
        t.insert(state(vec![[1; 5]], [1, 1, 1, 1, 1, 1, 4]), action("a", [1; 5]), 5.0);
        let query = state(vec![[1; 5]], [1, 1, 1, 1, 1, 1, 2]);

        let dir = tempfile::tempdir().unwrap();
        t.save(dir.path()).unwrap();
        let restored = DecisionTable::load("zone-a", dir.path(), &LearningConfig::default()).unwrap();

        assert!(t.find_state(&query).is_some());
        assert!(restored.find_state(&query).is_some());
        assert_eq!(t.state_values(&query), restored.state_values(&query));
    }

    #[test]
    fn test_load_missing_table_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DecisionTable::load("zone-x", dir.path(), &LearningConfig::default());
        assert!(matches!(err, Err(FogsimError::DecisionTable { zone, .. }) if zone == "zone-x"));
    }

    #[test]
    fn test_load_corrupt_table_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(DecisionTable::path_for(dir.path(), "zone-x"), "{ not json").unwrap();
        let err = DecisionTable::load("zone-x", dir.path(), &LearningConfig::default());
        assert!(matches!(err, Err(FogsimError::DecisionTable { .. })));
    }
}
