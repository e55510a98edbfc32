use std::any::Any;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::buildings::{Building, BuildingConfigurations, BuildingType};
use crate::config::ResidentRules;
use crate::manager::CityManager;
use crate::services::SimService;

/// Largest grid edge accepted from scenarios and save files.
pub const MAX_CITY_SIZE: u32 = 256;

/// One grid cell. Created with the city and never moved.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    x: u32,
    y: u32,
    size: u32,
    building: Option<Building>,
}

impl Tile {
    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn id(&self) -> usize {
        (self.x * self.size + self.y) as usize
    }

    pub fn building(&self) -> Option<&Building> {
        self.building.as_ref()
    }

    pub fn building_mut(&mut self) -> Option<&mut Building> {
        self.building.as_mut()
    }

    pub fn distance_to(&self, other: &Tile) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    fn simulate(&mut self) {
        if let Some(building) = self.building.as_mut() {
            building.tick();
        }
    }
}

/// Emitted for a changed tile and each of its orthogonal neighbours so a renderer
/// can refresh adjacency-dependent visuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileChange {
    pub x: u32,
    pub y: u32,
    pub building: Option<BuildingType>,
}

/// External collaborator tracking connectivity-class buildings (roads).
pub trait ConnectivityGraph: Send {
    fn update_tile(&mut self, x: u32, y: u32, building: Option<&Building>);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("tile ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is already occupied by {existing}")]
    Occupied {
        x: i32,
        y: i32,
        existing: BuildingType,
    },
    #[error("no configuration for building type {0}")]
    ConfigurationMissing(BuildingType),
}

pub struct CityBuilder {
    size: u32,
    configurations: Arc<BuildingConfigurations>,
    resident_rules: ResidentRules,
    services: Vec<Box<dyn SimService>>,
    connectivity: Option<Box<dyn ConnectivityGraph>>,
}

impl CityBuilder {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            configurations: Arc::new(BuildingConfigurations::default()),
            resident_rules: ResidentRules::default(),
            services: Vec::new(),
            connectivity: None,
        }
    }

    pub fn with_configurations(mut self, configurations: Arc<BuildingConfigurations>) -> Self {
        self.configurations = configurations;
        self
    }

    pub fn with_resident_rules(mut self, rules: ResidentRules) -> Self {
        self.resident_rules = rules;
        self
    }

    pub fn with_service(mut self, service: impl SimService + 'static) -> Self {
        self.services.push(Box::new(service));
        self
    }

    pub fn push_service(&mut self, service: Box<dyn SimService>) {
        self.services.push(service);
    }

    pub fn with_connectivity(mut self, graph: impl ConnectivityGraph + 'static) -> Self {
        self.connectivity = Some(Box::new(graph));
        self
    }

    /// Sizes above `MAX_CITY_SIZE` are clamped.
    pub fn build(self) -> City {
        let size = self.size.min(MAX_CITY_SIZE);
        if size < self.size {
            warn!(requested = self.size, size, "city size clamped");
        }
        let mut tiles = Vec::with_capacity(size as usize * size as usize);
        for x in 0..size {
            for y in 0..size {
                tiles.push(Tile {
                    x,
                    y,
                    size,
                    building: None,
                });
            }
        }
        City {
            size,
            tiles,
            services: self.services,
            sim_time: 0,
            configurations: self.configurations,
            resident_rules: self.resident_rules,
            connectivity: self.connectivity,
            tile_changes: Vec::new(),
        }
    }
}

pub struct City {
    size: u32,
    tiles: Vec<Tile>,
    services: Vec<Box<dyn SimService>>,
    sim_time: u64,
    configurations: Arc<BuildingConfigurations>,
    resident_rules: ResidentRules,
    connectivity: Option<Box<dyn ConnectivityGraph>>,
    tile_changes: Vec<TileChange>,
}

impl City {
    pub fn new(size: u32) -> Self {
        CityBuilder::new(size).build()
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sim_time(&self) -> u64 {
        self.sim_time
    }

    pub fn configurations(&self) -> &BuildingConfigurations {
        &self.configurations
    }

    pub fn resident_rules(&self) -> &ResidentRules {
        &self.resident_rules
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|service| service.name()).collect()
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let size = self.size as i64;
        let (x, y) = (x as i64, y as i64);
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some((x * size + y) as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|index| &self.tiles[index])
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).map(|index| &mut self.tiles[index])
    }

    /// All tiles, `x` outer and `y` inner.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.tiles.iter().filter_map(Tile::building)
    }

    pub fn building_counts(&self) -> BTreeMap<BuildingType, usize> {
        let mut counts = BTreeMap::new();
        for building in self.buildings() {
            *counts.entry(building.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Sum of residents over every tile. Recomputed on each call.
    pub fn population(&self) -> u64 {
        self.buildings()
            .filter_map(Building::residents)
            .map(|residents| residents.count() as u64)
            .sum()
    }

    pub fn neighbors(&self, x: u32, y: u32) -> Vec<&Tile> {
        let (x, y) = (x as i32, y as i32);
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter_map(|(nx, ny)| self.tile(nx, ny))
            .collect()
    }

    pub fn place_building(
        &mut self,
        x: i32,
        y: i32,
        kind: BuildingType,
    ) -> Result<&Building, PlacementError> {
        let index = self
            .index(x, y)
            .ok_or(PlacementError::OutOfBounds { x, y })?;
        if let Some(existing) = &self.tiles[index].building {
            return Err(PlacementError::Occupied {
                x,
                y,
                existing: existing.kind(),
            });
        }
        let config = self
            .configurations
            .get(kind)
            .ok_or(PlacementError::ConfigurationMissing(kind))?;
        let (ux, uy) = (x as u32, y as u32);
        let building = Building::from_config(kind, ux, uy, config, &self.resident_rules);

        if kind.is_connectivity() {
            if let Some(graph) = self.connectivity.as_mut() {
                graph.update_tile(ux, uy, Some(&building));
            }
        }
        self.notify_neighborhood(ux, uy, Some(kind));
        debug!(x, y, %kind, "building placed");

        Ok(&*self.tiles[index].building.insert(building))
    }

    pub fn bulldoze(&mut self, x: i32, y: i32) -> Option<Building> {
        let index = self.index(x, y)?;
        let building = self.tiles[index].building.take()?;
        let (ux, uy) = (x as u32, y as u32);
        if building.kind().is_connectivity() {
            if let Some(graph) = self.connectivity.as_mut() {
                graph.update_tile(ux, uy, None);
            }
        }
        self.notify_neighborhood(ux, uy, None);
        debug!(x, y, kind = %building.kind(), "building bulldozed");
        Some(building)
    }

    fn notify_neighborhood(&mut self, x: u32, y: u32, center: Option<BuildingType>) {
        self.tile_changes.push(TileChange {
            x,
            y,
            building: center,
        });
        let changes: Vec<TileChange> = self
            .neighbors(x, y)
            .into_iter()
            .map(|tile| TileChange {
                x: tile.x,
                y: tile.y,
                building: tile.building().map(Building::kind),
            })
            .collect();
        self.tile_changes.extend(changes);
    }

    /// Hand queued tile-changed notifications to the renderer side.
    pub fn drain_tile_changes(&mut self) -> Vec<TileChange> {
        std::mem::take(&mut self.tile_changes)
    }

    pub fn connectivity<T: 'static>(&self) -> Option<&T> {
        self.connectivity
            .as_ref()
            .and_then(|graph| graph.as_any().downcast_ref::<T>())
    }

    pub fn simulate(&mut self, steps: u32, manager: &CityManager) {
        let happiness = manager.happiness();
        let pollution = manager.pollution();
        let rules = self.resident_rules;
        for _ in 0..steps {
            let mut services = std::mem::take(&mut self.services);
            for service in services.iter_mut() {
                service.simulate(self);
            }
            services.append(&mut self.services);
            self.services = services;

            for tile in self.tiles.iter_mut() {
                if let Some(building) = tile.building.as_mut() {
                    let powered = building.power.is_fully_powered();
                    if let Some(capacity) = building.capacity() {
                        // Capping at the threshold blocks growth but keeps decline.
                        let happiness = if rules.growth_requires_power && !powered {
                            happiness.min(rules.growth_happiness_threshold)
                        } else {
                            happiness
                        };
                        if let Some(residents) = building.residents_mut() {
                            residents.simulate(happiness, pollution, capacity, &rules);
                        }
                    }
                }
                tile.simulate();
            }
        }
        self.sim_time += 1;
    }

    /// Breadth-first search over 4-connected tiles, pruned at `max_distance`
    /// (Manhattan) from `start`.
    pub fn find_tile<F>(&self, start: (i32, i32), predicate: F, max_distance: u32) -> Option<&Tile>
    where
        F: Fn(&Tile) -> bool,
    {
        let start_tile = self.tile(start.0, start.1)?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start_tile]);
        while let Some(tile) = queue.pop_front() {
            if !visited.insert(tile.id()) {
                continue;
            }
            if start_tile.distance_to(tile) > max_distance {
                continue;
            }
            if predicate(tile) {
                return Some(tile);
            }
            queue.extend(
                self.neighbors(tile.x, tile.y)
                    .into_iter()
                    .filter(|neighbor| !visited.contains(&neighbor.id())),
            );
        }
        None
    }
}
