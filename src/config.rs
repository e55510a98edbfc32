use serde::{Deserialize, Serialize};

fn default_tax_rate() -> f64 {
    0.08
}

fn default_high_tax_threshold() -> f64 {
    0.1
}

fn default_pollution_weight() -> f64 {
    0.5
}

fn default_low_happiness_threshold() -> f64 {
    50.0
}

fn default_base_lifespan() -> f64 {
    100.0
}

fn default_initial_revenue() -> f64 {
    10_000.0
}

fn default_initial_happiness() -> f64 {
    100.0
}

fn default_initial_residents() -> u32 {
    20
}

fn default_growth_rate() -> f64 {
    0.05
}

fn default_decline_rate() -> f64 {
    0.05
}

fn default_growth_happiness_threshold() -> f64 {
    60.0
}

fn default_decline_pollution_threshold() -> f64 {
    100.0
}

fn default_road_access_radius() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Calibration for the city-wide economy and wellbeing formulas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomyRules {
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default = "default_high_tax_threshold")]
    pub high_tax_threshold: f64,
    #[serde(default = "default_pollution_weight")]
    pub pollution_weight: f64,
    #[serde(default = "default_low_happiness_threshold")]
    pub low_happiness_threshold: f64,
    #[serde(default = "default_base_lifespan")]
    pub base_lifespan: f64,
    #[serde(default = "default_initial_revenue")]
    pub initial_revenue: f64,
    #[serde(default = "default_initial_happiness")]
    pub initial_happiness: f64,
}

impl Default for EconomyRules {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            high_tax_threshold: default_high_tax_threshold(),
            pollution_weight: default_pollution_weight(),
            low_happiness_threshold: default_low_happiness_threshold(),
            base_lifespan: default_base_lifespan(),
            initial_revenue: default_initial_revenue(),
            initial_happiness: default_initial_happiness(),
        }
    }
}

/// Growth and decline constants for the per-building population model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidentRules {
    #[serde(default = "default_initial_residents")]
    pub initial_count: u32,
    #[serde(default = "default_growth_rate")]
    pub growth_rate: f64,
    #[serde(default = "default_decline_rate")]
    pub decline_rate: f64,
    #[serde(default = "default_growth_happiness_threshold")]
    pub growth_happiness_threshold: f64,
    #[serde(default = "default_decline_pollution_threshold")]
    pub decline_pollution_threshold: f64,
    /// Unpowered homes stop growing (they can still shrink).
    #[serde(default)]
    pub growth_requires_power: bool,
}

impl Default for ResidentRules {
    fn default() -> Self {
        Self {
            initial_count: default_initial_residents(),
            growth_rate: default_growth_rate(),
            decline_rate: default_decline_rate(),
            growth_happiness_threshold: default_growth_happiness_threshold(),
            decline_pollution_threshold: default_decline_pollution_threshold(),
            growth_requires_power: false,
        }
    }
}

/// Which city-wide services run each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_true")]
    pub power: bool,
    #[serde(default = "default_true")]
    pub road_access: bool,
    #[serde(default = "default_road_access_radius")]
    pub road_access_radius: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            power: true,
            road_access: true,
            road_access_radius: default_road_access_radius(),
        }
    }
}
