pub mod autoplay;
pub mod buildings;
pub mod city;
pub mod config;
pub mod game;
pub mod manager;
pub mod persistence;
pub mod residents;
pub mod road_network;
pub mod scenario;
pub mod services;
pub mod web;

pub use buildings::{Building, BuildingConfigurations, BuildingType};
pub use city::{City, CityBuilder, PlacementError, Tile, TileChange};
pub use game::{Game, GameSettings, Tool, ToolOutcome};
pub use manager::{CityManager, StatsOutcome};
pub use scenario::{Scenario, ScenarioLoader};
