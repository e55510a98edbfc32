use std::collections::VecDeque;

use crate::{city::City, services::SimService};

/// Distributes each plant's output to the consumers it can reach.
///
/// Power travels through any occupied tile whose type conducts (everything but roads).
/// Plants are visited in grid scan order, and each hands out what it has left in BFS
/// order from its own tile.
pub struct PowerService;

impl PowerService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PowerService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimService for PowerService {
    fn name(&self) -> &str {
        "power"
    }

    fn simulate(&mut self, city: &mut City) {
        for tile in city.tiles_mut() {
            if let Some(building) = tile.building_mut() {
                building.power.supplied = 0.0;
            }
        }

        let plants: Vec<((u32, u32), f64)> = city
            .buildings()
            .filter_map(|building| {
                let output = city.configurations().get(building.kind())?.power_output?;
                Some((building.position(), output))
            })
            .collect();

        let size = city.size() as i64;
        for ((px, py), output) in plants {
            let mut remaining = output;
            let mut visited = vec![false; (size * size) as usize];
            let mut queue = VecDeque::from([(px as i64, py as i64)]);
            visited[(px as i64 * size + py as i64) as usize] = true;

            while remaining > 0.0 {
                let Some((x, y)) = queue.pop_front() else {
                    break;
                };
                let Some(building) = city
                    .tile_mut(x as i32, y as i32)
                    .and_then(|tile| tile.building_mut())
                else {
                    continue;
                };
                if !building.kind().conducts_power() {
                    continue;
                }
                let given = building.power.shortfall().min(remaining);
                building.power.supplied += given;
                remaining -= given;

                for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                    if nx < 0 || ny < 0 || nx >= size || ny >= size {
                        continue;
                    }
                    let index = (nx * size + ny) as usize;
                    if !visited[index] {
                        visited[index] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
    }
}
