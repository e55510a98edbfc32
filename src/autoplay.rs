use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::buildings::BuildingType;
use crate::game::{Game, Tool, ToolOutcome};

const PALETTE: [(Tool, u32); 7] = [
    (Tool::Build(BuildingType::Road), 6),
    (Tool::Build(BuildingType::Residential), 5),
    (Tool::Build(BuildingType::Commercial), 2),
    (Tool::Build(BuildingType::Industrial), 1),
    (Tool::Build(BuildingType::PowerLine), 2),
    (Tool::Build(BuildingType::PowerPlant), 1),
    (Tool::Bulldoze, 1),
];

/// Seeded stand-in for a player clicking on the grid.
pub struct AutoPlayer {
    rng: ChaCha8Rng,
    actions_per_tick: u32,
}

impl AutoPlayer {
    pub fn new(seed: u64) -> Self {
        Self::with_actions_per_tick(seed, 1)
    }

    pub fn with_actions_per_tick(seed: u64, actions_per_tick: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            actions_per_tick,
        }
    }

    pub fn actions_per_tick(&self) -> u32 {
        self.actions_per_tick
    }

    fn pick_tool(&mut self) -> Tool {
        let total: u32 = PALETTE.iter().map(|(_, weight)| weight).sum();
        let mut roll = self.rng.gen_range(0..total);
        for (tool, weight) in PALETTE {
            if roll < weight {
                return tool;
            }
            roll -= weight;
        }
        Tool::Select
    }

    /// Picks one tool and one tile and applies them.
    pub fn act(&mut self, game: &mut Game) -> ToolOutcome {
        let size = game.city().size().max(1) as i32;
        let tool = self.pick_tool();
        let x = self.rng.gen_range(0..size);
        let y = self.rng.gen_range(0..size);
        let outcome = game.apply_tool(tool, x, y);
        tracing::trace!(%tool, x, y, ?outcome, "autoplay action");
        outcome
    }

    /// Runs the configured number of actions, then one simulation tick.
    /// Headless play has no renderer, so queued tile changes are dropped.
    pub fn step(&mut self, game: &mut Game) {
        for _ in 0..self.actions_per_tick {
            self.act(game);
        }
        game.tick();
        game.city_mut().drain_tile_changes();
    }
}
