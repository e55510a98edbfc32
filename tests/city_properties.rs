use gridcity::{BuildingType, City, PlacementError};

#[test]
fn tiles_outside_the_grid_are_absent() {
    let city = City::new(5);
    for (x, y) in [(-1, 0), (0, -1), (5, 0), (0, 5), (-3, 9), (i32::MAX, 0), (0, i32::MIN)] {
        assert!(city.tile(x, y).is_none(), "({x}, {y}) should be out of bounds");
    }
    for x in 0..5 {
        for y in 0..5 {
            let tile = city.tile(x, y).unwrap();
            assert_eq!((tile.x() as i32, tile.y() as i32), (x, y));
        }
    }
}

#[test]
fn failed_placements_mutate_nothing() {
    let mut city = City::new(4);
    city.place_building(1, 1, BuildingType::Industrial).unwrap();
    city.drain_tile_changes();
    let before: Vec<_> = city.tiles().cloned().collect();

    assert_eq!(
        city.place_building(1, 1, BuildingType::Residential).unwrap_err(),
        PlacementError::Occupied {
            x: 1,
            y: 1,
            existing: BuildingType::Industrial
        }
    );
    assert_eq!(
        city.place_building(4, 1, BuildingType::Road).unwrap_err(),
        PlacementError::OutOfBounds { x: 4, y: 1 }
    );

    let after: Vec<_> = city.tiles().cloned().collect();
    assert_eq!(before, after);
    assert!(city.drain_tile_changes().is_empty());
}

#[test]
fn missing_configuration_is_rejected() {
    use std::sync::Arc;

    use gridcity::{BuildingConfigurations, CityBuilder};

    let table = BuildingConfigurations::from_yaml_str(
        "road:\n  cost: 100\n  maintenance: 10\n  pollution: 1\n",
    )
    .unwrap();
    let mut city = CityBuilder::new(3)
        .with_configurations(Arc::new(table))
        .build();
    assert_eq!(
        city.place_building(0, 0, BuildingType::PowerPlant).unwrap_err(),
        PlacementError::ConfigurationMissing(BuildingType::PowerPlant)
    );
    assert!(city.tile(0, 0).unwrap().building().is_none());
    assert!(city.place_building(0, 0, BuildingType::Road).is_ok());
}

#[test]
fn residential_buildings_get_residents() {
    let mut city = City::new(4);
    let building = city.place_building(2, 3, BuildingType::Residential).unwrap();
    let residents = building.residents().unwrap();
    assert_eq!(building.capacity(), Some(50));
    assert_eq!(residents.max_capacity(), 50);
    assert_eq!(residents.count(), 20);
    assert_eq!(building.maintenance_cost, 20.0);
    assert_eq!(building.pollution_effect, 2.0);

    let shop = city.place_building(0, 0, BuildingType::Commercial).unwrap();
    assert!(shop.residents().is_none());
    assert!(shop.capacity().is_none());
}

#[test]
fn bulldoze_returns_removed_building() {
    let mut city = City::new(4);
    assert!(city.bulldoze(1, 2).is_none());
    assert!(city.bulldoze(-1, 2).is_none());

    city.place_building(1, 2, BuildingType::Commercial).unwrap();
    city.drain_tile_changes();
    let removed = city.bulldoze(1, 2).unwrap();
    assert_eq!(removed.kind(), BuildingType::Commercial);
    assert_eq!(removed.position(), (1, 2));
    assert!(city.tile(1, 2).unwrap().building().is_none());
    assert_eq!(city.drain_tile_changes().len(), 5);
}

#[test]
fn population_is_sum_of_residents_and_idempotent() {
    let mut city = City::new(6);
    assert_eq!(city.population(), 0);
    for x in 0..3 {
        city.place_building(x, 0, BuildingType::Residential).unwrap();
    }
    city.place_building(5, 5, BuildingType::Industrial).unwrap();
    city.tile_mut(1, 0)
        .and_then(|tile| tile.building_mut())
        .and_then(|building| building.residents_mut())
        .unwrap()
        .set_count(37);

    let summed: u64 = city
        .buildings()
        .filter_map(|building| building.residents())
        .map(|residents| residents.count() as u64)
        .sum();
    assert_eq!(summed, 77);
    assert_eq!(city.population(), summed);
    assert_eq!(city.population(), city.population());
}

#[test]
fn sim_time_advances_once_per_call() {
    use std::sync::Arc;

    use gridcity::{config::EconomyRules, CityManager};

    let manager = CityManager::new(
        EconomyRules::default(),
        Arc::new(gridcity::BuildingConfigurations::default()),
    );
    let mut city = City::new(3);
    city.place_building(0, 0, BuildingType::Residential).unwrap();
    city.simulate(3, &manager);
    assert_eq!(city.sim_time(), 1);
    // Three growth steps at happiness 100: 20 -> 21 -> 22 -> 23.
    assert_eq!(city.population(), 23);
    city.simulate(0, &manager);
    assert_eq!(city.sim_time(), 2);
    assert_eq!(city.population(), 23);
}
