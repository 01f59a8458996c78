//! Zone roster and offer fan-out

use fogsim_core::Position;

use crate::config::CostModel;
use crate::node::{Node, NodeRegistry};
use crate::task::Task;
use crate::zone::{CoverageZone, Offer};

/// Owns every zone and fans a task out to a subset of them
#[derive(Debug, Default)]
pub struct ZoneBroadcaster {
    zones: Vec<CoverageZone>,
}

impl ZoneBroadcaster {
    pub fn new(zones: Vec<CoverageZone>) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[CoverageZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone_index(&self, name: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name == name)
    }

    pub fn zone(&self, index: usize) -> Option<&CoverageZone> {
        self.zones.get(index)
    }

    pub fn zone_mut(&mut self, index: usize) -> Option<&mut CoverageZone> {
        self.zones.get_mut(index)
    }

    /// Indices of the zones whose circle contains `position`, in roster order
    pub fn zones_covering(&self, position: Position) -> Vec<usize> {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.covers(position))
            .map(|(i, _)| i)
            .collect()
    }

    /// Zone whose centre is closest to `position`; the first one wins ties
    pub fn nearest_zone(&self, position: Position) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, zone) in self.zones.iter().enumerate() {
            let d = zone.center.distance_to(position);
            if best.is_none_or(|(_, min)| d < min) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Ask every target zone for an offer and collect the ones made
    pub fn broadcast(
        &mut self,
        targets: &[usize],
        nodes: &NodeRegistry,
        requester: &Node,
        task: &Task,
        costs: &CostModel,
    ) -> Vec<Offer> {
        targets
            .iter()
            .filter_map(|&i| {
                self.zones
                    .get_mut(i)?
                    .make_offer(nodes, requester, task, costs)
            })
            .collect()
    }
}
