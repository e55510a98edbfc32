use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    buildings::{BuildingConfigurations, BuildingType},
    city::MAX_CITY_SIZE,
    config::{EconomyRules, ResidentRules, ServiceSettings},
    game::{Game, GameSettings},
    persistence::KeyValueStore,
};

fn default_seed() -> u64 {
    42
}

fn default_tick_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub city_size: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub economy: EconomyRules,
    #[serde(default)]
    pub residents: ResidentRules,
    #[serde(default)]
    pub services: ServiceSettings,
    /// Building table, relative to the scenario file. Built-in table when omitted.
    #[serde(default)]
    pub buildings: Option<PathBuf>,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: BuildingType,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if scenario.city_size == 0 || scenario.city_size > MAX_CITY_SIZE {
            bail!(
                "{}: city_size must be between 1 and {MAX_CITY_SIZE}, got {}",
                path.display(),
                scenario.city_size
            );
        }
        scenario.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(scenario)
    }
}

impl Scenario {
    pub fn configurations(&self) -> Result<BuildingConfigurations> {
        match &self.buildings {
            Some(file) => {
                let path = self.base_dir.join(file);
                BuildingConfigurations::load(&path)
                    .with_context(|| format!("Failed to load building table {}", path.display()))
            }
            None => Ok(BuildingConfigurations::default()),
        }
    }

    pub fn settings(&self) -> Result<GameSettings> {
        Ok(GameSettings {
            city_size: self.city_size,
            economy: self.economy,
            residents: self.residents,
            services: self.services,
            configurations: Arc::new(self.configurations()?),
        })
    }

    /// Builds the starting game. Placements are free of charge.
    pub fn build_game(&self, store: Box<dyn KeyValueStore>) -> Result<Game> {
        let mut game = Game::new(self.settings()?, store);
        for placement in &self.placements {
            if let Err(err) = game.place_free(placement.kind, placement.x, placement.y) {
                warn!(
                    scenario = %self.name,
                    x = placement.x,
                    y = placement.y,
                    error = %err,
                    "skipping scenario placement"
                );
            }
        }
        // Initial placements are not news to a renderer that has not drawn yet.
        game.city_mut().drain_tile_changes();
        info!(
            scenario = %self.name,
            size = self.city_size,
            buildings = game.city().buildings().count(),
            "scenario loaded"
        );
        Ok(game)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(120)
    }
}
