use std::sync::Arc;

use gridcity::{
    config::EconomyRules,
    persistence::MemoryStore,
    BuildingConfigurations, BuildingType, City, CityManager, Game, GameSettings, Tool,
    ToolOutcome,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn manager(rules: EconomyRules) -> CityManager {
    CityManager::new(rules, Arc::new(BuildingConfigurations::default()))
}

#[test]
fn single_house_scenario() {
    let mut manager = manager(EconomyRules::default());
    let mut city = City::new(4);

    manager.deduct_revenue(750.0);
    let building = city.place_building(0, 0, BuildingType::Residential).unwrap();
    assert_eq!(building.residents().unwrap().count(), 20);
    assert_eq!(manager.revenue(), 9_250.0);

    let outcome = manager.simulate_stats(city.buildings(), 20);
    assert!(close(manager.revenue(), 9_231.6));
    assert_eq!(manager.maintenance_cost(), 20.0);
    assert_eq!(manager.pollution(), 2.0);
    assert!(close(manager.happiness(), 99.0));
    assert_eq!(manager.lifespan(), 100.0);
    assert!(!outcome.game_over);
}

#[test]
fn revenue_arithmetic_is_exact() {
    let mut manager = manager(EconomyRules::default());
    let mut city = City::new(5);
    city.place_building(0, 0, BuildingType::Road).unwrap();
    city.place_building(0, 1, BuildingType::Commercial).unwrap();
    city.place_building(0, 2, BuildingType::PowerLine).unwrap();

    let before = manager.revenue();
    manager.simulate_stats(city.buildings(), 125);
    let expected = before + 125.0 * 0.08 - (10.0 + 50.0 + 5.0);
    assert!(close(manager.revenue(), expected));
}

#[test]
fn game_over_boundary() {
    let mut manager = manager(EconomyRules {
        initial_revenue: 10.0,
        ..EconomyRules::default()
    });
    let mut city = City::new(2);
    city.place_building(0, 0, BuildingType::Road).unwrap();

    let outcome = manager.simulate_stats(city.buildings(), 0);
    assert_eq!(manager.revenue(), 0.0);
    assert!(!outcome.game_over);

    let outcome = manager.simulate_stats(city.buildings(), 0);
    assert_eq!(manager.revenue(), -10.0);
    assert!(outcome.game_over);
}

#[test]
fn happiness_and_lifespan_bounds_hold() {
    let taxes = [0.0, 0.08, 0.1, 0.5, 3.0];
    let pollutions = [0.0, 1.0, 50.0, 150.0, 1e6];
    for tax_rate in taxes {
        for pollution_units in pollutions {
            let mut manager = manager(EconomyRules {
                tax_rate,
                pollution_weight: pollution_units / 100.0,
                ..EconomyRules::default()
            });
            let mut city = City::new(10);
            for x in 0..10 {
                city.place_building(x, 0, BuildingType::Industrial).unwrap();
            }
            manager.simulate_stats(city.buildings(), 10);
            assert!((0.0..=100.0).contains(&manager.happiness()));
            assert!(manager.lifespan() > 0.0);
        }
    }
}

#[test]
fn game_tick_grows_residents_before_collecting_tax() {
    let mut game = Game::new(
        GameSettings {
            city_size: 4,
            ..GameSettings::default()
        },
        Box::new(MemoryStore::new()),
    );
    game.apply_tool(Tool::Build(BuildingType::Residential), 0, 0);
    let outcome = game.tick().unwrap();
    assert!(!outcome.game_over);
    assert_eq!(game.city().population(), 21);
    assert!(close(game.manager().revenue(), 9_250.0 + 21.0 * 0.08 - 20.0));
}

#[test]
fn game_over_halts_the_game() {
    let mut game = Game::new(
        GameSettings {
            city_size: 4,
            economy: EconomyRules {
                initial_revenue: 5_300.0,
                ..EconomyRules::default()
            },
            ..GameSettings::default()
        },
        Box::new(MemoryStore::new()),
    );
    // 300 left after the plant; its upkeep is 250 per tick.
    game.apply_tool(Tool::Build(BuildingType::PowerPlant), 0, 0);
    let simulated = game.run(10);
    assert_eq!(simulated, 2);
    assert!(game.is_game_over());
    assert_eq!(game.city().sim_time(), 2);

    assert!(game.tick().is_none());
    assert_eq!(game.city().sim_time(), 2);
    assert_eq!(
        game.apply_tool(Tool::Build(BuildingType::Road), 1, 1),
        ToolOutcome::GameOver
    );
}
