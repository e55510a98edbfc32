use serde::Serialize;

use crate::config::ResidentRules;

/// Population living in one residential building.
///
/// `count` never leaves `0..=max_capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Residents {
    count: u32,
    max_capacity: u32,
}

impl Residents {
    pub fn new(max_capacity: u32, initial_count: u32) -> Self {
        Self {
            count: initial_count.min(max_capacity),
            max_capacity,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Overwrite the count, e.g. when restoring a save. Clamped to capacity.
    pub fn set_count(&mut self, count: u32) {
        self.count = count.min(self.max_capacity);
    }

    pub fn growth_factor(happiness: f64, pollution: f64, rules: &ResidentRules) -> f64 {
        let mut factor = 0.0;
        if happiness > rules.growth_happiness_threshold {
            factor += rules.growth_rate;
        }
        if pollution > rules.decline_pollution_threshold {
            factor -= rules.decline_rate;
        }
        factor
    }

    pub fn simulate(&mut self, happiness: f64, pollution: f64, capacity: u32, rules: &ResidentRules) {
        let factor = Self::growth_factor(happiness, pollution, rules);
        let next = (self.count as f64 * (1.0 + factor)).floor();
        let upper = capacity.min(self.max_capacity) as f64;
        self.count = if next.is_nan() {
            self.count.min(capacity.min(self.max_capacity))
        } else {
            next.clamp(0.0, upper) as u32
        };
        tracing::trace!(
            count = self.count,
            capacity,
            happiness,
            pollution,
            "residents simulated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_seed_capped_by_capacity() {
        assert_eq!(Residents::new(50, 20).count(), 20);
        assert_eq!(Residents::new(8, 20).count(), 8);
    }

    #[test]
    fn grows_when_happy_and_floors() {
        let rules = ResidentRules::default();
        let mut residents = Residents::new(50, 20);
        residents.simulate(99.0, 2.0, 50, &rules);
        assert_eq!(residents.count(), 21);
        residents.simulate(99.0, 2.0, 50, &rules);
        // 21 * 1.05 = 22.05
        assert_eq!(residents.count(), 22);
    }

    #[test]
    fn neutral_when_happy_and_polluted() {
        let rules = ResidentRules::default();
        let mut residents = Residents::new(50, 20);
        residents.simulate(80.0, 150.0, 50, &rules);
        assert_eq!(residents.count(), 20);
    }

    #[test]
    fn declines_under_pollution() {
        let rules = ResidentRules::default();
        let mut residents = Residents::new(50, 20);
        residents.simulate(10.0, 150.0, 50, &rules);
        assert_eq!(residents.count(), 19);
    }

    #[test]
    fn never_exceeds_capacity() {
        let rules = ResidentRules::default();
        let mut residents = Residents::new(50, 20);
        for _ in 0..200 {
            residents.simulate(100.0, 0.0, 50, &rules);
            assert!(residents.count() <= 50);
        }
        assert_eq!(residents.count(), 50);
        residents.simulate(100.0, 0.0, 30, &rules);
        assert_eq!(residents.count(), 30);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let rules = ResidentRules::default();
        let mut a = Residents::new(50, 33);
        let mut b = Residents::new(50, 33);
        for step in 0..40 {
            let happiness = (step * 7 % 100) as f64;
            let pollution = (step * 13 % 200) as f64;
            a.simulate(happiness, pollution, 50, &rules);
            b.simulate(happiness, pollution, 50, &rules);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn set_count_is_clamped() {
        let mut residents = Residents::new(50, 20);
        residents.set_count(75);
        assert_eq!(residents.count(), 50);
    }
}
