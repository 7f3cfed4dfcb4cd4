pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod map;
pub mod models;
pub mod navigation;
pub mod planner;
pub mod poi_cache;
pub mod poi_client;
pub mod position;
pub mod routing_client;
pub mod simulator;
pub mod timer;
pub mod vehicle;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tokio::sync::{broadcast, mpsc};

use crate::error::NavError;
use crate::map::MapCommand;
use crate::models::Coordinate;
use crate::navigation::{NavigationConfig, Navigator};
use crate::poi_cache::{PoiCacheConfig, PoiViewportCache};
use crate::poi_client::PoiProvider;
use crate::routing_client::RouteProvider;

const MAP_EVENT_CAPACITY: usize = 256;
const POSITION_FEED_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub navigator: Navigator,
    pub pois: PoiViewportCache,
    pub map_events: broadcast::Sender<MapCommand>,
    pub positions: mpsc::Sender<Option<Coordinate>>,
}

impl AppState {
    /// Wires the navigator and the POI cache to one map event channel and
    /// attaches the live position feed. Must run inside a tokio runtime.
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        pois: Arc<dyn PoiProvider>,
        navigation: NavigationConfig,
        poi_cache: PoiCacheConfig,
    ) -> Result<Self, NavError> {
        let (map_events, _) = broadcast::channel(MAP_EVENT_CAPACITY);
        let map = Arc::new(map_events.clone());

        let navigator = Navigator::new(routes, map.clone(), navigation);
        let (positions, feed) = mpsc::channel(POSITION_FEED_CAPACITY);
        navigator.attach_position_feed(feed)?;

        Ok(Self {
            navigator,
            pois: PoiViewportCache::new(pois, map, poi_cache),
            map_events,
            positions,
        })
    }

    pub fn shutdown(&self) {
        self.navigator.shutdown();
        self.pois.shutdown();
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(api::get_state))
        .route(
            "/api/destination",
            put(api::put_destination).delete(api::delete_destination),
        )
        .route("/api/start", put(api::put_start).delete(api::delete_start))
        .route("/api/stops", post(api::add_stop).delete(api::clear_stops))
        .route("/api/stops/:index", delete(api::remove_stop))
        .route("/api/vehicle", put(api::put_vehicle))
        .route("/api/vehicles/presets", get(api::list_presets))
        .route("/api/navigation/start", post(api::start_navigation))
        .route("/api/navigation/cancel", post(api::cancel_navigation))
        .route("/api/locate", post(api::locate))
        .route("/api/position", post(api::post_position))
        .route("/api/viewport", post(api::post_viewport))
        .route("/api/pois", get(api::get_pois))
        .route("/api/pois/visibility", put(api::put_poi_visibility))
        .route("/api/route/gpx", get(api::route_gpx))
        .route("/api/map/events", get(api::map_events))
        .with_state(state)
}
