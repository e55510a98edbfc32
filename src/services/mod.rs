mod power;
mod road_access;

pub use power::PowerService;
pub use road_access::RoadAccessService;

use crate::city::City;
use crate::config::ServiceSettings;

/// A city-wide system run once per tick, before residents are updated.
pub trait SimService: Send {
    fn name(&self) -> &str;
    fn simulate(&mut self, city: &mut City);
}

/// Services enabled by `settings`, in run order.
pub fn standard_services(settings: &ServiceSettings) -> Vec<Box<dyn SimService>> {
    let mut services: Vec<Box<dyn SimService>> = Vec::new();
    if settings.power {
        services.push(Box::new(PowerService::new()));
    }
    if settings.road_access {
        services.push(Box::new(RoadAccessService::new(settings.road_access_radius)));
    }
    services
}
