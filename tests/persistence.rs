use std::collections::BTreeSet;
use std::fs;

use gridcity::{
    persistence::{FileStore, KeyValueStore, MemoryStore, SAVE_KEY},
    BuildingType, Game, GameSettings, Tool,
};
use tempfile::tempdir;

fn triples(game: &Game) -> BTreeSet<(u32, u32, BuildingType)> {
    game.city()
        .buildings()
        .map(|building| {
            let (x, y) = building.position();
            (x, y, building.kind())
        })
        .collect()
}

fn settings(city_size: u32) -> GameSettings {
    GameSettings {
        city_size,
        ..GameSettings::default()
    }
}

#[test]
fn save_then_load_round_trips_through_files() {
    let dir = tempdir().unwrap();
    let mut game = Game::new(settings(6), Box::new(FileStore::new(dir.path())));
    for (x, kind) in [
        (0, BuildingType::Road),
        (1, BuildingType::Residential),
        (2, BuildingType::Residential),
        (3, BuildingType::PowerLine),
        (4, BuildingType::PowerPlant),
    ] {
        game.apply_tool(Tool::Build(kind), x, 0);
    }
    game.run(3);
    let saved_triples = triples(&game);
    let saved_stats = game.manager().saved_stats();
    let saved_population = game.city().population();
    game.save().unwrap();
    assert!(dir.path().join(format!("{SAVE_KEY}.json")).exists());

    // Diverge, then restore.
    game.apply_tool(Tool::Bulldoze, 0, 0);
    game.apply_tool(Tool::Build(BuildingType::Industrial), 5, 5);
    game.run(2);

    let failures = game.load().unwrap();
    assert!(failures.is_empty());
    assert_eq!(triples(&game), saved_triples);
    assert_eq!(game.manager().saved_stats(), saved_stats);
    assert_eq!(game.city().population(), saved_population);
}

#[test]
fn load_restores_the_saved_grid_size() {
    let dir = tempdir().unwrap();
    let mut small = Game::new(settings(3), Box::new(FileStore::new(dir.path())));
    small.apply_tool(Tool::Build(BuildingType::Road), 2, 2);
    small.save().unwrap();

    let mut large = Game::new(settings(10), Box::new(FileStore::new(dir.path())));
    large.load().unwrap();
    assert_eq!(large.city().size(), 3);
    assert_eq!(large.city().buildings().count(), 1);
}

#[test]
fn corrupt_save_leaves_state_untouched() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(format!("{SAVE_KEY}.json")), "not json").unwrap();
    let mut game = Game::new(settings(4), Box::new(FileStore::new(dir.path())));
    game.apply_tool(Tool::Build(BuildingType::Road), 1, 1);
    let before = triples(&game);
    let revenue = game.manager().revenue();

    assert!(game.load().is_none());
    assert_eq!(triples(&game), before);
    assert_eq!(game.manager().revenue(), revenue);
}

#[test]
fn partially_invalid_tiles_still_restore_scalars() {
    let mut store = MemoryStore::new();
    store
        .set(
            SAVE_KEY,
            r#"{
                "timestamp": "2024-03-01T08:00:00.000Z",
                "revenue": 4321.5,
                "happiness": 88,
                "pollution": 24,
                "lifespan": 100,
                "citySize": 4,
                "tiles": [
                    {"x": 0, "y": 0, "buildingType": "residential", "residents": 44, "buildingCapacity": 50},
                    {"x": 0, "y": 0, "buildingType": "road"},
                    {"x": 7, "y": 1, "buildingType": "commercial"}
                ]
            }"#,
        )
        .unwrap();
    let mut game = Game::new(settings(4), Box::new(store));
    let failures = game.load().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(game.manager().revenue(), 4_321.5);
    assert_eq!(game.manager().happiness(), 88.0);
    assert_eq!(game.city().population(), 44);
}
