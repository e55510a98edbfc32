use crate::{
    buildings::Building,
    city::{City, Tile},
    services::SimService,
};

/// Flags buildings that have a road within `radius` tiles.
pub struct RoadAccessService {
    radius: u32,
}

impl RoadAccessService {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }
}

fn is_road(tile: &Tile) -> bool {
    tile.building()
        .map(Building::kind)
        .is_some_and(|kind| kind.is_connectivity())
}

impl SimService for RoadAccessService {
    fn name(&self) -> &str {
        "road_access"
    }

    fn simulate(&mut self, city: &mut City) {
        let flags: Vec<((u32, u32), bool)> = city
            .buildings()
            .filter(|building| !building.kind().is_connectivity())
            .map(|building| {
                let (x, y) = building.position();
                let access = city
                    .find_tile((x as i32, y as i32), is_road, self.radius)
                    .is_some();
                ((x, y), access)
            })
            .collect();

        for ((x, y), access) in flags {
            if let Some(building) = city
                .tile_mut(x as i32, y as i32)
                .and_then(|tile| tile.building_mut())
            {
                building.road_access = access;
            }
        }
    }
}
