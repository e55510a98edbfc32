//! Save/load of the city to a durable key-value store.
//!
//! A save holds the four manager scalars plus every occupied tile. Loading restores
//! the scalars right away and hands the record back so the caller can replay the
//! placements onto a fresh grid.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::buildings::BuildingType;
use crate::city::{City, PlacementError, MAX_CITY_SIZE};
use crate::manager::{CityManager, SavedStats};

/// Key every save is stored under.
pub const SAVE_KEY: &str = "citySimSaveData";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no saved game under key '{0}'")]
    Missing(String),
    #[error("saved game is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("saved game is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRecord {
    pub x: u32,
    pub y: u32,
    pub building_type: BuildingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residents: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub timestamp: DateTime<Utc>,
    pub revenue: f64,
    pub happiness: f64,
    pub pollution: f64,
    pub lifespan: f64,
    pub city_size: u32,
    pub tiles: Vec<TileRecord>,
}

/// A saved tile that could not be placed again.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildFailure {
    pub tile: TileRecord,
    pub error: PlacementError,
}

impl SaveRecord {
    pub fn capture(manager: &CityManager, city: &City) -> Self {
        let tiles = city
            .buildings()
            .map(|building| {
                let (x, y) = building.position();
                TileRecord {
                    x,
                    y,
                    building_type: building.kind(),
                    residents: building.residents().map(|residents| residents.count()),
                    building_capacity: building
                        .residents()
                        .and_then(|_| building.capacity()),
                }
            })
            .collect();
        let stats = manager.saved_stats();
        Self {
            timestamp: Utc::now(),
            revenue: stats.revenue,
            happiness: stats.happiness,
            pollution: stats.pollution,
            lifespan: stats.lifespan,
            city_size: city.size(),
            tiles,
        }
    }

    pub fn stats(&self) -> SavedStats {
        SavedStats {
            revenue: self.revenue,
            happiness: self.happiness,
            pollution: self.pollution,
            lifespan: self.lifespan,
        }
    }

    pub fn validate(&self) -> Result<(), PersistenceError> {
        if !self.revenue.is_finite() {
            return Err(PersistenceError::Invalid("revenue is not finite".into()));
        }
        if !(0.0..=100.0).contains(&self.happiness) {
            return Err(PersistenceError::Invalid(format!(
                "happiness {} outside 0..=100",
                self.happiness
            )));
        }
        if !self.pollution.is_finite() || self.pollution < 0.0 {
            return Err(PersistenceError::Invalid(format!(
                "pollution {} must be finite and non-negative",
                self.pollution
            )));
        }
        if !self.lifespan.is_finite() || self.lifespan <= 0.0 {
            return Err(PersistenceError::Invalid(format!(
                "lifespan {} must be positive",
                self.lifespan
            )));
        }
        if self.city_size == 0 || self.city_size > MAX_CITY_SIZE {
            return Err(PersistenceError::Invalid(format!(
                "city size {} outside 1..={MAX_CITY_SIZE}",
                self.city_size
            )));
        }
        Ok(())
    }

    /// Replays every saved tile onto `city`, then restores resident counts.
    /// Tiles that cannot be placed are skipped and reported.
    pub fn rebuild_into(&self, city: &mut City) -> Vec<RebuildFailure> {
        let mut failures = Vec::new();
        for record in &self.tiles {
            let x = i32::try_from(record.x).unwrap_or(i32::MAX);
            let y = i32::try_from(record.y).unwrap_or(i32::MAX);
            if let Err(error) = city.place_building(x, y, record.building_type) {
                warn!(x, y, kind = %record.building_type, %error, "failed to re-place saved building");
                failures.push(RebuildFailure {
                    tile: record.clone(),
                    error,
                });
                continue;
            }
            if let Some(count) = record.residents {
                let residents = city
                    .tile_mut(x, y)
                    .and_then(|tile| tile.building_mut())
                    .and_then(|building| building.residents_mut());
                match residents {
                    Some(residents) => residents.set_count(count),
                    None => warn!(x, y, "saved residents for a building without a residents model"),
                }
            }
        }
        failures
    }
}

pub fn save_game(
    manager: &CityManager,
    city: &City,
    store: &mut dyn KeyValueStore,
) -> Result<SaveRecord, PersistenceError> {
    let record = SaveRecord::capture(manager, city);
    let json = serde_json::to_string(&record)?;
    store.set(SAVE_KEY, &json)?;
    info!(tiles = record.tiles.len(), "game saved");
    Ok(record)
}

pub fn read_save(store: &dyn KeyValueStore) -> Result<SaveRecord, PersistenceError> {
    let json = store
        .get(SAVE_KEY)?
        .ok_or_else(|| PersistenceError::Missing(SAVE_KEY.to_string()))?;
    let record: SaveRecord = serde_json::from_str(&json)?;
    record.validate()?;
    Ok(record)
}

/// Restores the manager scalars from the store. On any failure logs and returns
/// `None`, leaving `manager` untouched.
pub fn load_game(manager: &mut CityManager, store: &dyn KeyValueStore) -> Option<SaveRecord> {
    match read_save(store) {
        Ok(record) => {
            manager.restore(record.stats());
            info!(
                tiles = record.tiles.len(),
                city_size = record.city_size,
                saved_at = %record.timestamp,
                "game loaded"
            );
            Some(record)
        }
        Err(err) => {
            warn!(error = %err, "could not load saved game");
            None
        }
    }
}
