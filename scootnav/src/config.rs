use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::{
    models::Coordinate,
    navigation::{NavigationConfig, DEFAULT_LOCATION},
    planner::PlannerConfig,
    poi_cache::PoiCacheConfig,
    position::PositionMode,
    simulator::SimulatorConfig,
};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Scooter navigation overlay service")]
pub struct Args {
    /// Address the HTTP control surface listens on
    #[arg(long, env = "SCOOTNAV_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL of the OSRM-compatible routing service
    #[arg(
        long,
        env = "SCOOTNAV_OSRM_URL",
        default_value = "https://router.project-osrm.org"
    )]
    pub osrm_url: String,

    #[arg(long, env = "SCOOTNAV_OSRM_PROFILE", default_value = "driving")]
    pub osrm_profile: String,

    /// Overpass interpreter endpoint used for POI queries
    #[arg(
        long,
        env = "SCOOTNAV_OVERPASS_URL",
        default_value = "https://overpass-api.de/api/interpreter"
    )]
    pub overpass_url: String,

    /// Timeout for outbound HTTP requests, in seconds
    #[arg(long, env = "SCOOTNAV_HTTP_TIMEOUT", default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[arg(
        long,
        env = "SCOOTNAV_POI_DEBOUNCE_MS",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poi_debounce_ms: u64,

    #[arg(
        long,
        env = "SCOOTNAV_ROUTE_DEBOUNCE_MS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub route_debounce_ms: u64,

    #[arg(
        long,
        env = "SCOOTNAV_TICK_MS",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tick_ms: u64,

    /// Where navigation positions come from
    #[arg(long, env = "SCOOTNAV_POSITION_MODE", value_enum, default_value_t = PositionMode::Simulated)]
    pub position_mode: PositionMode,

    /// Position used until the first live fix arrives
    #[arg(long, env = "SCOOTNAV_DEFAULT_LAT", default_value_t = DEFAULT_LOCATION.lat)]
    pub default_lat: f64,
    #[arg(long, env = "SCOOTNAV_DEFAULT_LON", default_value_t = DEFAULT_LOCATION.lon)]
    pub default_lon: f64,
}

impl Args {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poi_cache_config(&self) -> PoiCacheConfig {
        PoiCacheConfig {
            debounce: Duration::from_millis(self.poi_debounce_ms),
        }
    }

    pub fn navigation_config(&self) -> NavigationConfig {
        NavigationConfig {
            default_location: Coordinate::new(self.default_lat, self.default_lon),
            position_mode: self.position_mode,
            planner: PlannerConfig {
                debounce: Duration::from_millis(self.route_debounce_ms),
                ..PlannerConfig::default()
            },
            simulator: SimulatorConfig {
                tick: Duration::from_millis(self.tick_ms),
                ..SimulatorConfig::default()
            },
            ..NavigationConfig::default()
        }
    }
}
