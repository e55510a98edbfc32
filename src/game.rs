use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buildings::{BuildingConfigurations, BuildingStatus, BuildingType, UnknownBuildingType};
use crate::city::{City, CityBuilder, PlacementError, TileChange};
use crate::config::{EconomyRules, ResidentRules, ServiceSettings};
use crate::manager::{CityManager, StatsOutcome};
use crate::persistence::{self, KeyValueStore, PersistenceError, RebuildFailure, SaveRecord};
use crate::road_network::RoadNetwork;
use crate::services::standard_services;

/// What a click on a tile does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Select,
    Bulldoze,
    Build(BuildingType),
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Select => f.write_str("select"),
            Tool::Bulldoze => f.write_str("bulldoze"),
            Tool::Build(kind) => write!(f, "{kind}"),
        }
    }
}

impl FromStr for Tool {
    type Err = UnknownBuildingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Tool::Select),
            "bulldoze" => Ok(Tool::Bulldoze),
            other => other.parse().map(Tool::Build),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ToolOutcome {
    Selected {
        x: i32,
        y: i32,
        building: Option<BuildingType>,
    },
    Built {
        x: i32,
        y: i32,
        building: BuildingType,
        cost: f64,
    },
    Bulldozed {
        x: i32,
        y: i32,
        building: BuildingType,
    },
    NothingToBulldoze {
        x: i32,
        y: i32,
    },
    InsufficientFunds {
        building: BuildingType,
        cost: f64,
        revenue: f64,
    },
    Rejected {
        reason: String,
    },
    GameOver,
}

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub city_size: u32,
    pub economy: EconomyRules,
    pub residents: ResidentRules,
    pub services: ServiceSettings,
    pub configurations: Arc<BuildingConfigurations>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            city_size: 16,
            economy: EconomyRules::default(),
            residents: ResidentRules::default(),
            services: ServiceSettings::default(),
            configurations: Arc::new(BuildingConfigurations::default()),
        }
    }
}

/// Everything a display needs after a tick or an action.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub city_size: u32,
    pub revenue: f64,
    pub population: u64,
    pub pollution: f64,
    pub happiness: f64,
    pub lifespan: f64,
    pub maintenance_cost: f64,
    pub building_counts: BTreeMap<BuildingType, usize>,
    pub road_networks: usize,
    pub paused: bool,
    pub game_over: bool,
    pub tile_changes: Vec<TileChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileView {
    pub x: u32,
    pub y: u32,
    pub building: BuildingType,
    pub status: BuildingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residents: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    pub power_required: f64,
    pub power_supplied: f64,
    pub road_access: bool,
}

/// Headless orchestrator: owns the grid, the manager and the save store.
pub struct Game {
    settings: GameSettings,
    city: City,
    manager: CityManager,
    store: Box<dyn KeyValueStore>,
    paused: bool,
    game_over: bool,
}

impl Game {
    pub fn new(settings: GameSettings, store: Box<dyn KeyValueStore>) -> Self {
        let city = fresh_city(&settings, settings.city_size);
        let manager = CityManager::new(settings.economy, settings.configurations.clone());
        Self {
            settings,
            city,
            manager,
            store,
            paused: false,
            game_over: false,
        }
    }

    pub fn city(&self) -> &City {
        &self.city
    }

    pub fn city_mut(&mut self) -> &mut City {
        &mut self.city
    }

    pub fn manager(&self) -> &CityManager {
        &self.manager
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn apply_tool(&mut self, tool: Tool, x: i32, y: i32) -> ToolOutcome {
        if self.game_over {
            return ToolOutcome::GameOver;
        }
        match tool {
            Tool::Select => {
                let building = self
                    .city
                    .tile(x, y)
                    .and_then(|tile| tile.building())
                    .map(|building| building.kind());
                debug!(x, y, ?building, "tile selected");
                ToolOutcome::Selected { x, y, building }
            }
            Tool::Bulldoze => match self.city.bulldoze(x, y) {
                Some(removed) => ToolOutcome::Bulldozed {
                    x,
                    y,
                    building: removed.kind(),
                },
                None => ToolOutcome::NothingToBulldoze { x, y },
            },
            Tool::Build(kind) => self.build(kind, x, y),
        }
    }

    fn build(&mut self, kind: BuildingType, x: i32, y: i32) -> ToolOutcome {
        let Some(cost) = self.settings.configurations.get(kind).map(|config| config.cost) else {
            return ToolOutcome::Rejected {
                reason: PlacementError::ConfigurationMissing(kind).to_string(),
            };
        };
        let revenue = self.manager.revenue();
        if revenue < cost {
            debug!(%kind, cost, revenue, "not enough revenue to build");
            return ToolOutcome::InsufficientFunds {
                building: kind,
                cost,
                revenue,
            };
        }
        self.manager.deduct_revenue(cost);
        match self.city.place_building(x, y, kind) {
            Ok(_) => ToolOutcome::Built {
                x,
                y,
                building: kind,
                cost,
            },
            Err(err) => {
                self.manager.credit_revenue(cost);
                debug!(x, y, %kind, error = %err, "placement failed, cost refunded");
                ToolOutcome::Rejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Places a building without charging for it. Used to seed scenarios.
    pub fn place_free(&mut self, kind: BuildingType, x: i32, y: i32) -> Result<(), PlacementError> {
        self.city.place_building(x, y, kind).map(|_| ())
    }

    /// One simulation step. Does nothing while paused or after game over.
    pub fn tick(&mut self) -> Option<StatsOutcome> {
        if self.paused || self.game_over {
            return None;
        }
        self.city.simulate(1, &self.manager);
        let population = self.city.population();
        let outcome = self.manager.simulate_stats(self.city.buildings(), population);
        if outcome.game_over {
            self.game_over = true;
            warn!(
                tick = self.city.sim_time(),
                revenue = self.manager.revenue(),
                "revenue fell below zero, game over"
            );
        }
        Some(outcome)
    }

    pub fn run(&mut self, ticks: u64) -> u64 {
        self.run_with_hook(ticks, |_| {})
    }

    /// Runs up to `ticks` steps, calling `hook` after each one. Returns the number of
    /// ticks actually simulated.
    pub fn run_with_hook<F>(&mut self, ticks: u64, mut hook: F) -> u64
    where
        F: FnMut(Frame),
    {
        let mut simulated = 0;
        for _ in 0..ticks {
            if self.tick().is_none() {
                break;
            }
            simulated += 1;
            hook(self.frame());
            if self.game_over {
                break;
            }
        }
        simulated
    }

    /// Current state without consuming queued tile changes.
    pub fn snapshot(&self) -> Frame {
        let road_networks = self
            .city
            .connectivity::<RoadNetwork>()
            .map(RoadNetwork::component_count)
            .unwrap_or(0);
        Frame {
            tick: self.city.sim_time(),
            city_size: self.city.size(),
            revenue: self.manager.revenue(),
            population: self.city.population(),
            pollution: self.manager.pollution(),
            happiness: self.manager.happiness(),
            lifespan: self.manager.lifespan(),
            maintenance_cost: self.manager.maintenance_cost(),
            building_counts: self.city.building_counts(),
            road_networks,
            paused: self.paused,
            game_over: self.game_over,
            tile_changes: Vec::new(),
        }
    }

    /// Like `snapshot`, but also hands over the queued tile changes.
    pub fn frame(&mut self) -> Frame {
        let mut frame = self.snapshot();
        frame.tile_changes = self.city.drain_tile_changes();
        frame
    }

    pub fn tiles(&self) -> Vec<TileView> {
        self.city
            .buildings()
            .map(|building| {
                let (x, y) = building.position();
                TileView {
                    x,
                    y,
                    building: building.kind(),
                    status: building.status(),
                    residents: building.residents().map(|residents| residents.count()),
                    capacity: building.capacity(),
                    power_required: building.power.required,
                    power_supplied: building.power.supplied,
                    road_access: building.road_access,
                }
            })
            .collect()
    }

    pub fn save(&mut self) -> Result<SaveRecord, PersistenceError> {
        persistence::save_game(&self.manager, &self.city, self.store.as_mut())
    }

    /// Restores the saved game and rebuilds the grid from it. Returns `None` and
    /// leaves everything untouched when nothing valid is stored.
    pub fn load(&mut self) -> Option<Vec<RebuildFailure>> {
        let record = persistence::load_game(&mut self.manager, self.store.as_ref())?;
        let mut city = fresh_city(&self.settings, record.city_size);
        let failures = record.rebuild_into(&mut city);
        self.city = city;
        self.game_over = false;
        info!(
            placed = record.tiles.len() - failures.len(),
            failed = failures.len(),
            "city rebuilt from save"
        );
        Some(failures)
    }
}

fn fresh_city(settings: &GameSettings, size: u32) -> City {
    let mut builder = CityBuilder::new(size)
        .with_configurations(settings.configurations.clone())
        .with_resident_rules(settings.residents)
        .with_connectivity(RoadNetwork::new());
    for service in standard_services(&settings.services) {
        builder.push_service(service);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn game() -> Game {
        Game::new(
            GameSettings {
                city_size: 4,
                ..GameSettings::default()
            },
            Box::new(MemoryStore::new()),
        )
    }

    #[test]
    fn tools_parse_from_names() {
        assert_eq!("select".parse::<Tool>(), Ok(Tool::Select));
        assert_eq!("bulldoze".parse::<Tool>(), Ok(Tool::Bulldoze));
        assert_eq!(
            "power-plant".parse::<Tool>(),
            Ok(Tool::Build(BuildingType::PowerPlant))
        );
        assert!("stadium".parse::<Tool>().is_err());
        assert_eq!(Tool::Build(BuildingType::Road).to_string(), "road");
    }

    #[test]
    fn building_charges_cost() {
        let mut game = game();
        let outcome = game.apply_tool(Tool::Build(BuildingType::Residential), 0, 0);
        assert!(matches!(outcome, ToolOutcome::Built { cost, .. } if cost == 750.0));
        assert_eq!(game.manager().revenue(), 9_250.0);
    }

    #[test]
    fn failed_placement_is_refunded() {
        let mut game = game();
        game.apply_tool(Tool::Build(BuildingType::Road), 1, 1);
        let before = game.manager().revenue();
        let outcome = game.apply_tool(Tool::Build(BuildingType::Commercial), 1, 1);
        assert!(matches!(outcome, ToolOutcome::Rejected { .. }));
        assert_eq!(game.manager().revenue(), before);

        let outcome = game.apply_tool(Tool::Build(BuildingType::Road), 4, 0);
        assert!(matches!(outcome, ToolOutcome::Rejected { .. }));
        assert_eq!(game.manager().revenue(), before);
    }

    #[test]
    fn unaffordable_building_is_refused() {
        let mut game = Game::new(
            GameSettings {
                city_size: 4,
                economy: EconomyRules {
                    initial_revenue: 4_000.0,
                    ..EconomyRules::default()
                },
                ..GameSettings::default()
            },
            Box::new(MemoryStore::new()),
        );
        let outcome = game.apply_tool(Tool::Build(BuildingType::PowerPlant), 0, 0);
        assert!(matches!(outcome, ToolOutcome::InsufficientFunds { .. }));
        assert_eq!(game.manager().revenue(), 4_000.0);
        assert!(game.city().tile(0, 0).unwrap().building().is_none());
    }

    #[test]
    fn bulldoze_reports_empty_tiles() {
        let mut game = game();
        assert_eq!(
            game.apply_tool(Tool::Bulldoze, 2, 2),
            ToolOutcome::NothingToBulldoze { x: 2, y: 2 }
        );
        game.apply_tool(Tool::Build(BuildingType::Road), 2, 2);
        assert_eq!(
            game.apply_tool(Tool::Bulldoze, 2, 2),
            ToolOutcome::Bulldozed {
                x: 2,
                y: 2,
                building: BuildingType::Road
            }
        );
    }

    #[test]
    fn paused_game_does_not_tick() {
        let mut game = game();
        game.set_paused(true);
        assert!(game.tick().is_none());
        assert_eq!(game.city().sim_time(), 0);
        game.set_paused(false);
        assert!(game.tick().is_some());
        assert_eq!(game.city().sim_time(), 1);
    }

    #[test]
    fn frame_drains_tile_changes() {
        let mut game = game();
        game.apply_tool(Tool::Build(BuildingType::Road), 0, 0);
        game.apply_tool(Tool::Build(BuildingType::Road), 0, 1);
        let frame = game.frame();
        assert_eq!(frame.road_networks, 1);
        assert_eq!(frame.building_counts[&BuildingType::Road], 2);
        assert!(!frame.tile_changes.is_empty());
        assert!(game.frame().tile_changes.is_empty());
    }
}
