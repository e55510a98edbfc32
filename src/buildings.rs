use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ResidentRules;
use crate::residents::Residents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingType {
    Road,
    Residential,
    Commercial,
    Industrial,
    PowerPlant,
    PowerLine,
}

impl BuildingType {
    pub const ALL: [BuildingType; 6] = [
        BuildingType::Road,
        BuildingType::Residential,
        BuildingType::Commercial,
        BuildingType::Industrial,
        BuildingType::PowerPlant,
        BuildingType::PowerLine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildingType::Road => "road",
            BuildingType::Residential => "residential",
            BuildingType::Commercial => "commercial",
            BuildingType::Industrial => "industrial",
            BuildingType::PowerPlant => "power-plant",
            BuildingType::PowerLine => "power-line",
        }
    }

    pub fn is_residential(self) -> bool {
        matches!(self, BuildingType::Residential)
    }

    /// Types tracked by the connectivity collaborator.
    pub fn is_connectivity(self) -> bool {
        matches!(self, BuildingType::Road)
    }

    pub fn conducts_power(self) -> bool {
        !matches!(self, BuildingType::Road)
    }

    pub fn needs_road_access(self) -> bool {
        !matches!(self, BuildingType::Road | BuildingType::PowerLine)
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown building type '{0}'")]
pub struct UnknownBuildingType(pub String);

impl FromStr for BuildingType {
    type Err = UnknownBuildingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownBuildingType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub cost: f64,
    pub maintenance: f64,
    pub pollution: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_output: Option<f64>,
    #[serde(default)]
    pub power_demand: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read building table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse building table: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{kind}: {field} must be a finite, non-negative number")]
    InvalidNumber { kind: BuildingType, field: &'static str },
    #[error("{0}: capacity is only valid for residential buildings")]
    UnexpectedCapacity(BuildingType),
}

/// Immutable per-type lookup table, loaded once before the first placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BuildingConfigurations {
    entries: BTreeMap<BuildingType, BuildingConfig>,
}

impl BuildingConfigurations {
    pub fn new(entries: BTreeMap<BuildingType, BuildingConfig>) -> Result<Self, ConfigError> {
        for (kind, config) in &entries {
            for (field, value) in [
                ("cost", config.cost),
                ("maintenance", config.maintenance),
                ("pollution", config.pollution),
                ("power_demand", config.power_demand),
                ("power_output", config.power_output.unwrap_or(0.0)),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidNumber { kind: *kind, field });
                }
            }
            if config.capacity.is_some() && !kind.is_residential() {
                return Err(ConfigError::UnexpectedCapacity(*kind));
            }
        }
        Ok(Self { entries })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let entries: BTreeMap<BuildingType, BuildingConfig> = serde_yaml::from_str(text)?;
        Self::new(entries)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn get(&self, kind: BuildingType) -> Option<&BuildingConfig> {
        self.entries.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingType, &BuildingConfig)> {
        self.entries.iter().map(|(kind, config)| (*kind, config))
    }
}

impl Default for BuildingConfigurations {
    fn default() -> Self {
        let entry = |cost: f64, maintenance: f64, pollution: f64, description: &str| BuildingConfig {
            cost,
            maintenance,
            pollution,
            description: description.to_string(),
            capacity: None,
            power_output: None,
            power_demand: 0.0,
        };
        let mut entries = BTreeMap::new();
        entries.insert(
            BuildingType::Road,
            entry(100.0, 10.0, 1.0, "Connects your city and allows for transport."),
        );
        entries.insert(
            BuildingType::Residential,
            BuildingConfig {
                capacity: Some(50),
                power_demand: 10.0,
                ..entry(750.0, 20.0, 2.0, "Provides housing for your citizens.")
            },
        );
        entries.insert(
            BuildingType::Commercial,
            BuildingConfig {
                power_demand: 20.0,
                ..entry(1000.0, 50.0, 5.0, "Provides jobs and services.")
            },
        );
        entries.insert(
            BuildingType::Industrial,
            BuildingConfig {
                power_demand: 40.0,
                ..entry(1200.0, 70.0, 20.0, "Provides jobs and manufactures goods.")
            },
        );
        entries.insert(
            BuildingType::PowerPlant,
            BuildingConfig {
                power_output: Some(1000.0),
                ..entry(5000.0, 250.0, 30.0, "Generates power for your city.")
            },
        );
        entries.insert(
            BuildingType::PowerLine,
            entry(50.0, 5.0, 0.0, "Transmits power across your city."),
        );
        Self { entries }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerState {
    pub required: f64,
    pub supplied: f64,
}

impl PowerState {
    pub fn is_fully_powered(&self) -> bool {
        self.supplied >= self.required
    }

    pub fn shortfall(&self) -> f64 {
        (self.required - self.supplied).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingStatus {
    #[default]
    Ok,
    NoPower,
    NoRoadAccess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    kind: BuildingType,
    x: u32,
    y: u32,
    pub maintenance_cost: f64,
    pub pollution_effect: f64,
    capacity: Option<u32>,
    residents: Option<Residents>,
    pub power: PowerState,
    pub road_access: bool,
    status: BuildingStatus,
}

impl Building {
    pub(crate) fn from_config(
        kind: BuildingType,
        x: u32,
        y: u32,
        config: &BuildingConfig,
        rules: &ResidentRules,
    ) -> Self {
        let capacity = if kind.is_residential() {
            config.capacity
        } else {
            None
        };
        if kind.is_residential() && capacity.is_none() {
            tracing::warn!(%kind, "no capacity configured, building will have no residents");
        }
        Self {
            kind,
            x,
            y,
            maintenance_cost: config.maintenance,
            pollution_effect: config.pollution,
            capacity,
            residents: capacity.map(|capacity| Residents::new(capacity, rules.initial_count)),
            power: PowerState {
                required: config.power_demand,
                supplied: 0.0,
            },
            road_access: false,
            status: BuildingStatus::Ok,
        }
    }

    pub fn kind(&self) -> BuildingType {
        self.kind
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn residents(&self) -> Option<&Residents> {
        self.residents.as_ref()
    }

    pub fn residents_mut(&mut self) -> Option<&mut Residents> {
        self.residents.as_mut()
    }

    pub fn status(&self) -> BuildingStatus {
        self.status
    }

    /// Per-tile tick hook: derive the display status from what the services wrote.
    pub fn tick(&mut self) {
        self.status = if !self.power.is_fully_powered() {
            BuildingStatus::NoPower
        } else if self.kind.needs_road_access() && !self.road_access {
            BuildingStatus::NoRoadAccess
        } else {
            BuildingStatus::Ok
        };
    }
}
