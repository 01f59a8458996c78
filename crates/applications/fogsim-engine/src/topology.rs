//! Placement orchestrator
//!
//! [`Topology`] is the single writer of the run: it owns the node registry,
//! the zone roster, the backpressure queue and the metrics. Zones only ever
//! touch nodes through the registry it lends them.
//!
//! ```text
//! task ──► target zones ──► broadcast ──► nearest offer < ratio × cloud distance?
//!                                             │ yes: accept (re-validated)
//!                                             │ no / all rejected
//!                                             ▼
//!                                     cloud admission ──► else queue
//! ```

use fogsim_core::{NodeId, NodeRecord, Result, Tier, ZoneRecord};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::broadcaster::ZoneBroadcaster;
use crate::config::{SimulationConfig, StrategyKind};
use crate::metrics::SimulationMetrics;
use crate::node::{Node, NodeRegistry};
use crate::strategy::build_strategy;
use crate::task::{Task, TaskOutcome};
use crate::zone::{Admission, CoverageZone, is_feasible};

pub struct Topology {
    config: SimulationConfig,
    nodes: NodeRegistry,
    cloud: NodeId,
    broadcaster: ZoneBroadcaster,
    queue: VecDeque<Task>,
    metrics: SimulationMetrics,
    fully_random: bool,
    rng: ChaCha8Rng,
}

impl Topology {
    /// Build the fabric: the cloud node plus one zone per record, each with
    /// its own strategy. Fully random mode builds no zones.
    pub fn new(config: SimulationConfig, zones: &[ZoneRecord]) -> Result<Self> {
        config.validate()?;
        let fully_random = config.strategy == StrategyKind::FullyRandom;

        let mut roster = Vec::new();
        if !fully_random {
            for (index, record) in zones.iter().enumerate() {
                if let Some(strategy) = build_strategy(config.strategy, index, &record.name, &config)? {
                    roster.push(CoverageZone::from_record(record, strategy));
                }
            }
        }

        let cloud = Node::cloud(&config.tiers);
        let cloud_id = cloud.id.clone();
        let mut nodes = NodeRegistry::new();
        nodes.insert(cloud_id.clone(), cloud);

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            nodes,
            cloud: cloud_id,
            broadcaster: ZoneBroadcaster::new(roster),
            queue: VecDeque::new(),
            metrics: SimulationMetrics::new(),
            fully_random,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn cloud_id(&self) -> &NodeId {
        &self.cloud
    }

    pub fn zones(&self) -> &[CoverageZone] {
        self.broadcaster.zones()
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut SimulationMetrics {
        &mut self.metrics
    }

    pub fn queue(&self) -> &VecDeque<Task> {
        &self.queue
    }

    /// Tasks queued or running
    pub fn in_flight(&self) -> usize {
        self.queue.len() + self.nodes.values().map(|n| n.tasks().len()).sum::<usize>()
    }

    /// Register a node. Fog nodes join every zone covering them.
    pub fn add_node(&mut self, node: Node) {
        let id = node.id.clone();
        let tier = node.tier;
        self.nodes.insert(id.clone(), node);
        if tier == Tier::Fog {
            self.zone_node(&id, None);
        }
    }

    /// Apply one feed frame: move known nodes, register new ones
    pub fn sync_nodes(&mut self, records: &[NodeRecord]) {
        for record in records {
            match self.nodes.get_mut(&record.id) {
                Some(node) => node.apply_record(record),
                None => {
                    debug!(node = %record.id, tier = %record.tier, "node joined");
                    self.add_node(Node::from_record(record, &self.config.tiers));
                }
            }
        }
    }

    /// Add a node that drifted out of a zone to the zones now covering it,
    /// stopping after the re-zoning cap. Returns the number of covering zones visited.
    pub fn reassign_moved_node(&mut self, id: &NodeId) -> usize {
        self.zone_node(id, Some(self.config.placement.rezone_limit))
    }

    fn zone_node(&mut self, id: &NodeId, limit: Option<usize>) -> usize {
        let Some(position) = self.nodes.get(id).map(|n| n.position) else {
            return 0;
        };
        let mut assigned = 0;
        for index in self.broadcaster.zones_covering(position) {
            if let Some(zone) = self.broadcaster.zone_mut(index) {
                zone.admit_member(id.clone());
            }
            assigned += 1;
            if limit.is_some_and(|cap| assigned >= cap) {
                break;
            }
        }
        assigned
    }

    /// Place a newly created task. A task whose creator is not registered is
    /// counted and dropped.
    pub fn submit(&mut self, task: Task) {
        self.metrics.record_task_created();
        self.assign(task);
    }

    /// Zones covering the requester now and after `horizon`; falls back to
    /// the current ones when the two sets do not overlap
    pub fn target_zones(&self, requester: &Node, horizon: f64) -> Vec<usize> {
        let current = self.broadcaster.zones_covering(requester.position);
        let predicted = self
            .broadcaster
            .zones_covering(requester.predicted_position(horizon));
        let both: Vec<usize> = current
            .iter()
            .copied()
            .filter(|i| predicted.contains(i))
            .collect();
        if both.is_empty() { current } else { both }
    }

    /// Run the placement protocol for one task
    pub fn assign(&mut self, mut task: Task) {
        if !self.nodes.contains_key(&task.creator) {
            warn!(task = task.id, creator = %task.creator, "task creator unknown, dropping task");
            task.drop_at(task.creation_time);
            self.metrics.record_outcome(TaskOutcome::Dropped);
            return;
        }
        if self.fully_random {
            self.assign_fully_random(task);
            return;
        }

        let requester_id = task.creator.clone();
        let Some(requester) = self.nodes.get(&requester_id) else {
            return;
        };
        let targets = self.target_zones(requester, task.exec_time);
        let cloud_distance = self
            .nodes
            .get(&self.cloud)
            .map(|cloud| cloud.distance_to(requester))
            .unwrap_or(f64::INFINITY);
        let mut offers: Vec<_> = self
            .broadcaster
            .broadcast(&targets, &self.nodes, requester, &task, &self.config.costs)
            .into_iter()
            .filter_map(|offer| {
                let distance = self.nodes.get(&offer.candidate)?.distance_to(requester);
                Some((offer, distance))
            })
            .collect();

        let threshold = self.config.placement.offer_cloud_ratio * cloud_distance;
        let mut task = task;
        loop {
            let mut nearest: Option<(usize, f64)> = None;
            for (i, (_, distance)) in offers.iter().enumerate() {
                if nearest.is_none_or(|(_, min)| *distance < min) {
                    nearest = Some((i, *distance));
                }
            }
            let Some((index, distance)) = nearest else {
                break;
            };
            if distance >= threshold {
                debug!(task = task.id, distance, threshold, "nearest offer too far, trying cloud");
                break;
            }

            let (offer, _) = offers.remove(index);
            let Some(zone) = self
                .broadcaster
                .zone_index(&offer.zone)
                .and_then(|i| self.broadcaster.zone_mut(i))
            else {
                continue;
            };
            match zone.accept_offer(
                &mut self.nodes,
                &requester_id,
                task,
                &offer,
                &self.config.costs,
                &mut self.metrics,
            ) {
                Admission::Admitted(_) => return,
                Admission::Rejected(rejected) => task = rejected,
            }
        }

        self.admit_to_cloud_or_enqueue(task);
    }

    /// Fully random mode: one uniformly chosen fog node, checked directly
    fn assign_fully_random(&mut self, task: Task) {
        let fog: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.tier == Tier::Fog)
            .map(|n| n.id.clone())
            .collect();
        let Some(pick) = fog.choose(&mut self.rng).cloned() else {
            self.admit_to_cloud_or_enqueue(task);
            return;
        };

        let feasible = match (self.nodes.get(&pick), self.nodes.get(&task.creator)) {
            (Some(candidate), Some(requester)) => {
                is_feasible(candidate, requester, &task, &self.config.costs)
            }
            _ => false,
        };
        if feasible {
            if let Some(node) = self.nodes.get_mut(&pick) {
                node.admit(task, &mut self.metrics);
                return;
            }
        }
        self.enqueue(task);
    }

    fn admit_to_cloud_or_enqueue(&mut self, task: Task) {
        let accepted = match (self.nodes.get(&self.cloud), self.nodes.get(&task.creator)) {
            (Some(cloud), Some(requester)) => {
                cloud.can_host(&task)
                    && cloud.in_range(requester.position)
                    && self.config.costs.time_budget_ok(
                        task.deadline_slack(),
                        task.size,
                        cloud.distance_to(requester),
                        true,
                        false,
                    )
            }
            _ => false,
        };
        if accepted {
            if let Some(cloud) = self.nodes.get_mut(&self.cloud) {
                cloud.admit(task, &mut self.metrics);
                return;
            }
        }
        self.enqueue(task);
    }

    fn enqueue(&mut self, task: Task) {
        debug!(task = task.id, queued = self.queue.len() + 1, "task queued");
        self.queue.push_back(task);
    }

    /// Evict the oldest tasks beyond capacity, then retry the rest from `now`
    pub fn process_queue(&mut self, now: f64) {
        while self.queue.len() > self.config.queue_capacity {
            if let Some(mut task) = self.queue.pop_front() {
                task.drop_at(now);
                self.metrics.record_outcome(TaskOutcome::Dropped);
                warn!(task = task.id, capacity = self.config.queue_capacity, "queue overflow, task dropped");
            }
        }

        let pending = std::mem::take(&mut self.queue);
        for mut task in pending {
            task.creation_time = now;
            debug!(task = task.id, "retrying queued task");
            self.assign(task);
        }
    }

    /// One completion sweep over every zone, then over hosts outside any zone
    pub fn sweep(&mut self, now: f64) {
        for index in 0..self.broadcaster.len() {
            let Some(zone) = self.broadcaster.zone(index) else {
                continue;
            };
            let tick = zone.tick(&mut self.nodes, now, &self.config.costs);

            for task in tick.completed {
                self.route_result(index, task, now);
            }

            if !tick.departed.is_empty() {
                if let Some(zone) = self.broadcaster.zone_mut(index) {
                    zone.evict(&tick.departed);
                }
                for id in &tick.departed {
                    let joined = self.reassign_moved_node(id);
                    debug!(node = %id, zone = index, joined, "node left zone");
                }
            }
        }

        self.sweep_unzoned(now);
        self.rezone_stray_fog();
    }

    /// Fog nodes that drifted out of every zone rejoin once a zone covers them again
    fn rezone_stray_fog(&mut self) {
        let strays: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.tier == Tier::Fog)
            .filter(|n| !self.broadcaster.zones().iter().any(|z| z.is_member(&n.id)))
            .filter(|n| !self.broadcaster.zones_covering(n.position).is_empty())
            .map(|n| n.id.clone())
            .collect();
        for id in &strays {
            let joined = self.reassign_moved_node(id);
            debug!(node = %id, joined, "node rejoined");
        }
    }

    /// Deliver through the zone covering the creator, else through the
    /// zone nearest to it (a migration)
    fn route_result(&mut self, from: usize, mut task: Task, now: f64) {
        let Some(creator_position) = self.nodes.get(&task.creator).map(|n| n.position) else {
            warn!(task = task.id, creator = %task.creator, "creator vanished, result discarded");
            return;
        };

        let covers = self
            .broadcaster
            .zone(from)
            .is_some_and(|z| z.covers(creator_position));
        let target = if covers {
            from
        } else {
            self.broadcaster.nearest_zone(creator_position).unwrap_or(from)
        };

        if target != from {
            task.migrated = true;
            self.metrics.record_migration();
            info!(
                task = task.id,
                from = %self.broadcaster.zone(from).map_or("?", |z| z.name.as_str()),
                to = %self.broadcaster.zone(target).map_or("?", |z| z.name.as_str()),
                "result migrated"
            );
        }

        let outcome = match self.broadcaster.zone_mut(target) {
            Some(zone) => zone.deliver(&mut task, &self.nodes, now),
            None => None,
        };
        if let Some(outcome) = outcome {
            self.metrics.record_outcome(outcome);
        }
    }

    /// Cloud and fog nodes with no zone deliver straight to the creator
    fn sweep_unzoned(&mut self, now: f64) {
        let hosts: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.tier != Tier::User && !n.tasks().is_empty())
            .filter(|n| !self.broadcaster.zones().iter().any(|z| z.is_member(&n.id)))
            .map(|n| n.id.clone())
            .collect();

        for host in hosts {
            let due: Vec<u64> = match self.nodes.get(&host) {
                Some(node) => node
                    .tasks()
                    .iter()
                    .filter(|task| match self.nodes.get(&task.creator) {
                        Some(creator) => {
                            node.completion_due(task, now, creator.position, &self.config.costs)
                        }
                        None => true,
                    })
                    .map(|task| task.id)
                    .collect(),
                None => continue,
            };

            let released: Vec<Task> = match self.nodes.get_mut(&host) {
                Some(node) => due.into_iter().filter_map(|id| node.release(id)).collect(),
                None => continue,
            };
            for mut task in released {
                match self.nodes.get(&task.creator) {
                    Some(creator) => {
                        let outcome = creator.deliver(&mut task, now);
                        self.metrics.record_outcome(outcome);
                    }
                    None => {
                        warn!(task = task.id, creator = %task.creator, "creator vanished, result discarded")
                    }
                }
            }
        }
    }

    /// Write every zone's decision table into `directory`
    pub fn persist_tables(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        self.broadcaster
            .zones()
            .iter()
            .filter_map(|zone| zone.decision_table())
            .map(|table| table.save(directory))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogsim_core::{Position, Velocity};

    fn zone_record(name: &str, x: f64, y: f64, radius: f64) -> ZoneRecord {
        ZoneRecord {
            name: name.to_string(),
            x,
            y,
            radius,
        }
    }

    fn node(id: &str, tier: Tier, x: f64, y: f64, power: f64, radius: f64) -> Node {
        Node::new(NodeId::new(id), tier, Position::new(x, y), Velocity::stationary(), power, radius)
    }

    fn task(id: u64, power: f64, deadline: f64, creator: &str) -> Task {
        Task::new(id, power, 2.0, deadline, NodeId::new(creator), 0.0, &SimulationConfig::default().costs)
    }

    #[test]
    fn test_fog_nodes_join_covering_zones() {
        let zones = [zone_record("a", 0.0, 0.0, 5.0), zone_record("b", 6.0, 0.0, 5.0)];
        let mut topo = Topology::new(SimulationConfig::default(), &zones).unwrap();
        topo.add_node(node("fog", Tier::Fog, 3.0, 0.0, 10.0, 3.0));
        topo.add_node(node("user", Tier::User, 3.0, 0.0, 0.0, 0.0));

        assert!(topo.zones()[0].is_member(&NodeId::new("fog")));
        assert!(topo.zones()[1].is_member(&NodeId::new("fog")));
        assert!(!topo.zones()[0].is_member(&NodeId::new("user")));
    }

    #[test]
    fn test_rezone_limit() {
        let zones: Vec<_> = (0..5).map(|i| zone_record(&format!("z{i}"), 0.0, 0.0, 10.0)).collect();
        let mut topo = Topology::new(SimulationConfig::default(), &zones).unwrap();
        topo.nodes.insert(NodeId::new("fog"), node("fog", Tier::Fog, 1.0, 1.0, 10.0, 3.0));

        assert_eq!(topo.reassign_moved_node(&NodeId::new("fog")), 3);
        let memberships = topo
            .zones()
            .iter()
            .filter(|z| z.is_member(&NodeId::new("fog")))
            .count();
        assert_eq!(memberships, 3);
    }

    #[test]
    fn test_target_zones_prefers_overlap_with_prediction() {
        let zones = [zone_record("a", 0.0, 0.0, 3.0), zone_record("b", 2.0, 0.0, 3.0)];
        let topo = Topology::new(SimulationConfig::default(), &zones).unwrap();
        let mut mover = node("u", Tier::User, 1.0, 0.0, 0.0, 0.0);
        mover.velocity = Velocity::new(2.0, 0.0);

        // at t+2 it is at (5, 0): only b
        assert_eq!(topo.target_zones(&mover, 2.0), vec![1]);
        // far future leaves both: fall back to current
        assert_eq!(topo.target_zones(&mover, 50.0), vec![0, 1]);
    }

    #[test]
    fn test_unplaceable_task_goes_to_cloud() {
        let mut config = SimulationConfig::default();
        config.tiers.cloud_x = 0.0;
        config.tiers.cloud_y = 0.0;
        let mut topo = Topology::new(config, &[]).unwrap();
        topo.add_node(node("user", Tier::User, 3.0, 4.0, 0.0, 0.0));

        topo.submit(task(1, 2.0, 50.0, "user"));
        assert_eq!(topo.node(topo.cloud_id()).unwrap().power, 28.0);
        assert_eq!(topo.metrics().cloud_tasks, 1);
        assert!(topo.queue().is_empty());
    }

    #[test]
    fn test_cloud_respects_time_budget() {
        let mut config = SimulationConfig::default();
        config.tiers.cloud_x = 0.0;
        config.tiers.cloud_y = 0.0;
        let mut topo = Topology::new(config, &[]).unwrap();
        topo.add_node(node("user", Tier::User, 0.0, 0.0, 0.0, 0.0));

        // exec 1.0 + cloud overhead 0.5 > slack 1.2
        topo.submit(task(1, 1.0, 1.2, "user"));
        assert_eq!(topo.queue().len(), 1);
        assert_eq!(topo.metrics().cloud_tasks, 0);
    }

    #[test]
    fn test_unknown_creator_is_dropped() {
        let mut topo = Topology::new(SimulationConfig::default(), &[]).unwrap();
        topo.submit(task(1, 1.0, 10.0, "ghost"));
        assert_eq!(topo.metrics().total_tasks, 1);
        assert_eq!(topo.metrics().dropped, 1);
        assert_eq!(topo.metrics().deadline_misses, 1);
        assert_eq!(topo.in_flight(), 0);
    }

    #[test]
    fn test_unknown_creator_is_dropped_in_fully_random_mode() {
        let mut config = SimulationConfig::default();
        config.strategy = StrategyKind::FullyRandom;
        let mut topo = Topology::new(config, &[]).unwrap();
        topo.add_node(node("fog", Tier::Fog, 0.0, 0.0, 5.0, 3.0));
        topo.submit(task(1, 1.0, 10.0, "ghost"));
        assert!(topo.queue().is_empty());
        assert_eq!(topo.metrics().dropped, 1);
        assert_eq!(topo.metrics().total_tasks, 1);
    }

    #[test]
    fn test_fog_node_rejoins_after_leaving_every_zone() {
        let zones = [zone_record("a", 0.0, 0.0, 5.0)];
        let mut topo = Topology::new(SimulationConfig::default(), &zones).unwrap();
        topo.add_node(node("fog", Tier::Fog, 0.0, 0.0, 5.0, 3.0));
        let fog = NodeId::new("fog");
        assert!(topo.zones()[0].is_member(&fog));

        let at = |x: f64| NodeRecord {
            id: NodeId::new("fog"),
            tier: Tier::Fog,
            x,
            y: 0.0,
            speed: 0.0,
            heading: 0.0,
            power: None,
            coverage_radius: None,
        };

        topo.sync_nodes(&[at(30.0)]);
        topo.sweep(1.0);
        assert!(!topo.zones()[0].is_member(&fog));

        topo.sync_nodes(&[at(0.0)]);
        topo.sweep(2.0);
        assert!(topo.zones()[0].is_member(&fog));
        topo.sweep(3.0);
        assert_eq!(topo.zones()[0].members(), &[fog]);
    }

    #[test]
    fn test_fully_random_admits_directly() {
        let mut config = SimulationConfig::default();
        config.strategy = StrategyKind::FullyRandom;
        let zones = [zone_record("a", 0.0, 0.0, 5.0)];
        let mut topo = Topology::new(config, &zones).unwrap();
        assert!(topo.zones().is_empty());

        topo.add_node(node("fog", Tier::Fog, 1.0, 0.0, 5.0, 3.0));
        topo.add_node(node("user", Tier::User, 0.0, 0.0, 0.0, 0.0));
        topo.submit(task(1, 2.0, 50.0, "user"));
        assert_eq!(topo.node(&NodeId::new("fog")).unwrap().power, 3.0);

        // infeasible pick is queued, not sent to the cloud
        topo.submit(task(2, 4.0, 50.0, "user"));
        assert_eq!(topo.queue().len(), 1);

        // unzoned fog node delivers directly
        topo.sweep(2.0);
        assert_eq!(topo.node(&NodeId::new("fog")).unwrap().power, 5.0);
        assert_eq!(topo.metrics().on_time, 1);
    }
}
