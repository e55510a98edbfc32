use std::sync::Arc;

use serde::Serialize;

use crate::buildings::{Building, BuildingConfigurations};
use crate::config::EconomyRules;

/// Revenue floor. Strictly below it the game is over.
pub const GAME_OVER_THRESHOLD: f64 = 0.0;

/// Fallback when the happiness formula produces a non-finite value.
const NEUTRAL_HAPPINESS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsOutcome {
    pub game_over: bool,
}

/// Scalars that survive a save/load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavedStats {
    pub revenue: f64,
    pub happiness: f64,
    pub pollution: f64,
    pub lifespan: f64,
}

/// Owner of the city-wide economy and wellbeing state.
///
/// Holds no spatial data: buildings and population are handed in on every tick.
#[derive(Debug, Clone)]
pub struct CityManager {
    revenue: f64,
    maintenance_cost: f64,
    pollution: f64,
    happiness: f64,
    lifespan: f64,
    rules: EconomyRules,
    configurations: Arc<BuildingConfigurations>,
}

impl CityManager {
    pub fn new(rules: EconomyRules, configurations: Arc<BuildingConfigurations>) -> Self {
        Self {
            revenue: rules.initial_revenue,
            maintenance_cost: 0.0,
            pollution: 0.0,
            happiness: rules.initial_happiness.clamp(0.0, 100.0),
            lifespan: rules.base_lifespan.max(1.0),
            rules,
            configurations,
        }
    }

    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    pub fn maintenance_cost(&self) -> f64 {
        self.maintenance_cost
    }

    pub fn pollution(&self) -> f64 {
        self.pollution
    }

    pub fn happiness(&self) -> f64 {
        self.happiness
    }

    pub fn lifespan(&self) -> f64 {
        self.lifespan
    }

    pub fn rules(&self) -> &EconomyRules {
        &self.rules
    }

    pub fn configurations(&self) -> &BuildingConfigurations {
        &self.configurations
    }

    /// Unconditional; a negative balance is only judged on the next `simulate_stats`.
    pub fn deduct_revenue(&mut self, amount: f64) {
        self.revenue -= amount;
    }

    pub fn credit_revenue(&mut self, amount: f64) {
        self.revenue += amount;
    }

    pub fn saved_stats(&self) -> SavedStats {
        SavedStats {
            revenue: self.revenue,
            happiness: self.happiness,
            pollution: self.pollution,
            lifespan: self.lifespan,
        }
    }

    pub fn restore(&mut self, stats: SavedStats) {
        self.revenue = stats.revenue;
        self.happiness = stats.happiness;
        self.pollution = stats.pollution;
        self.lifespan = stats.lifespan;
    }

    pub fn simulate_stats<'a, I>(&mut self, buildings: I, population: u64) -> StatsOutcome
    where
        I: IntoIterator<Item = &'a Building>,
    {
        let rules = self.rules;
        self.revenue += population as f64 * rules.tax_rate;

        let mut maintenance = 0.0;
        let mut pollution = 0.0;
        for building in buildings {
            if let Some(config) = self.configurations.get(building.kind()) {
                maintenance += config.maintenance;
                pollution += config.pollution;
            }
        }
        self.maintenance_cost = maintenance;
        self.pollution = pollution;
        self.revenue -= maintenance;

        self.happiness = happiness_for(&rules, pollution);
        self.lifespan = lifespan_for(&rules, self.happiness);

        StatsOutcome {
            game_over: self.revenue < GAME_OVER_THRESHOLD,
        }
    }
}

fn happiness_for(rules: &EconomyRules, pollution: f64) -> f64 {
    let mut reduction = 0.0;
    if rules.tax_rate > rules.high_tax_threshold {
        reduction += (rules.tax_rate - rules.high_tax_threshold) * 100.0;
    }
    reduction += pollution * rules.pollution_weight;
    let happiness = 100.0 - reduction;
    if happiness.is_nan() {
        NEUTRAL_HAPPINESS
    } else {
        happiness.clamp(0.0, 100.0)
    }
}

fn lifespan_for(rules: &EconomyRules, happiness: f64) -> f64 {
    let lifespan = if happiness < rules.low_happiness_threshold {
        rules.base_lifespan * (happiness / rules.low_happiness_threshold)
    } else {
        rules.base_lifespan
    };
    if lifespan.is_nan() {
        1.0
    } else {
        lifespan.max(1.0)
    }
}
