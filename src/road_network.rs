use std::any::Any;
use std::collections::{BTreeSet, VecDeque};

use crate::buildings::Building;
use crate::city::ConnectivityGraph;

/// Road tiles and the links between orthogonally adjacent ones.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    nodes: BTreeSet<(u32, u32)>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.nodes.contains(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn neighbors(&self, x: u32, y: u32) -> Vec<(u32, u32)> {
        let mut out = Vec::with_capacity(4);
        if x > 0 && self.contains(x - 1, y) {
            out.push((x - 1, y));
        }
        if self.contains(x + 1, y) {
            out.push((x + 1, y));
        }
        if y > 0 && self.contains(x, y - 1) {
            out.push((x, y - 1));
        }
        if self.contains(x, y + 1) {
            out.push((x, y + 1));
        }
        out
    }

    fn reachable_from(&self, start: (u32, u32)) -> BTreeSet<(u32, u32)> {
        let mut seen = BTreeSet::new();
        if !self.nodes.contains(&start) {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some((x, y)) = queue.pop_front() {
            for next in self.neighbors(x, y) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    pub fn connected(&self, a: (u32, u32), b: (u32, u32)) -> bool {
        self.reachable_from(a).contains(&b)
    }

    /// Number of disjoint road networks.
    pub fn component_count(&self) -> usize {
        let mut unvisited = self.nodes.clone();
        let mut count = 0;
        while let Some(start) = unvisited.pop_first() {
            for node in self.reachable_from(start) {
                unvisited.remove(&node);
            }
            count += 1;
        }
        count
    }
}

impl ConnectivityGraph for RoadNetwork {
    fn update_tile(&mut self, x: u32, y: u32, building: Option<&Building>) {
        match building {
            Some(building) if building.kind().is_connectivity() => {
                self.nodes.insert((x, y));
            }
            _ => {
                self.nodes.remove(&(x, y));
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingType;
    use crate::city::CityBuilder;

    #[test]
    fn city_keeps_network_in_sync() {
        let mut city = CityBuilder::new(5)
            .with_connectivity(RoadNetwork::new())
            .build();
        city.place_building(0, 0, BuildingType::Road).unwrap();
        city.place_building(1, 0, BuildingType::Road).unwrap();
        city.place_building(3, 0, BuildingType::Road).unwrap();
        city.place_building(2, 2, BuildingType::Residential).unwrap();

        let network = city.connectivity::<RoadNetwork>().unwrap();
        assert_eq!(network.len(), 3);
        assert!(!network.contains(2, 2));
        assert!(network.connected((0, 0), (1, 0)));
        assert!(!network.connected((0, 0), (3, 0)));
        assert_eq!(network.component_count(), 2);

        city.place_building(2, 0, BuildingType::Road).unwrap();
        assert_eq!(city.connectivity::<RoadNetwork>().unwrap().component_count(), 1);

        city.bulldoze(1, 0).unwrap();
        let network = city.connectivity::<RoadNetwork>().unwrap();
        assert!(!network.contains(1, 0));
        assert_eq!(network.component_count(), 2);
    }
}
