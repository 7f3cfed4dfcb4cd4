//! JSON handlers of the control surface. The router itself lives in the crate
//! root next to [`AppState`](crate::AppState).

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    error::NavError,
    geo::is_valid_coordinate,
    gpx_export::encode_plan_as_gpx,
    models::{
        ApiError, BoundingBox, Coordinate, Location, NavigationSnapshot, PointOfInterest, Vehicle,
    },
    routing_client::{turn_direction, TurnDirection},
    vehicle::{preset, presets, range_km},
    AppState,
};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub snapshot: NavigationSnapshot,
    pub range_km: i64,
    pub turn: Option<TurnDirection>,
}

#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub vehicle: Vehicle,
    pub range_km: i64,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        let range_km = range_km(&vehicle);
        Self { vehicle, range_km }
    }
}

/// Either a preset id (keeping the current level) or a full custom profile.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VehicleUpdate {
    Preset { preset: String },
    Custom(Vehicle),
}

#[derive(Debug, Deserialize)]
pub struct PositionUpdate {
    /// `null` reports the position as unavailable.
    pub position: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityUpdate {
    pub visible: bool,
}

#[derive(Debug, Serialize)]
pub struct PoiListResponse {
    pub visible: bool,
    pub loading: bool,
    pub pois: Vec<PointOfInterest>,
}

#[derive(Debug, Serialize)]
pub struct GpxResponse {
    pub gpx_base64: String,
}

fn status_for(err: &NavError) -> StatusCode {
    match err {
        NavError::InvalidCoordinate { .. }
        | NavError::TooFewWaypoints(_)
        | NavError::InvalidLevel(_) => StatusCode::BAD_REQUEST,
        NavError::NotPlanning
        | NavError::NoNavigationPath
        | NavError::PositionFeedAttached => StatusCode::CONFLICT,
        NavError::NoRoutePlan
        | NavError::StopNotFound(_)
        | NavError::UnknownPreset(_)
        | NavError::NoRoute(_) => StatusCode::NOT_FOUND,
        NavError::Http(_) | NavError::Status(_) | NavError::Decode(_) => StatusCode::BAD_GATEWAY,
        NavError::Gpx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: NavError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("request failed: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}

fn validate(coord: Coordinate) -> Result<(), NavError> {
    if is_valid_coordinate(coord) {
        Ok(())
    } else {
        Err(NavError::InvalidCoordinate {
            lat: coord.lat,
            lon: coord.lon,
        })
    }
}

fn state_response(state: &AppState) -> StateResponse {
    let snapshot = state.navigator.snapshot();
    StateResponse {
        range_km: range_km(&snapshot.vehicle),
        turn: snapshot
            .instruction
            .as_ref()
            .map(|m| turn_direction(&m.kind)),
        snapshot,
    }
}

fn poi_list(state: &AppState) -> PoiListResponse {
    PoiListResponse {
        visible: state.pois.is_visible(),
        loading: state.pois.is_loading(),
        pois: state.pois.snapshot(),
    }
}

pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    Json(state_response(&state))
}

pub async fn put_destination(
    State(state): State<AppState>,
    Json(destination): Json<Location>,
) -> ApiResult<Json<StateResponse>> {
    validate(destination.coords).map_err(error_response)?;
    state.navigator.set_destination(Some(destination));
    Ok(Json(state_response(&state)))
}

pub async fn delete_destination(State(state): State<AppState>) -> Json<StateResponse> {
    state.navigator.set_destination(None);
    Json(state_response(&state))
}

pub async fn put_start(
    State(state): State<AppState>,
    Json(start): Json<Location>,
) -> ApiResult<Json<StateResponse>> {
    validate(start.coords).map_err(error_response)?;
    state.navigator.set_start_point(Some(start));
    Ok(Json(state_response(&state)))
}

pub async fn delete_start(State(state): State<AppState>) -> Json<StateResponse> {
    state.navigator.set_start_point(None);
    Json(state_response(&state))
}

pub async fn add_stop(
    State(state): State<AppState>,
    Json(stop): Json<Location>,
) -> ApiResult<Json<Vec<Location>>> {
    validate(stop.coords).map_err(error_response)?;
    state.navigator.add_stop(stop);
    Ok(Json(state.navigator.snapshot().stops))
}

pub async fn remove_stop(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<Vec<Location>>> {
    state
        .navigator
        .remove_stop(index)
        .ok_or(NavError::StopNotFound(index))
        .map_err(error_response)?;
    Ok(Json(state.navigator.snapshot().stops))
}

pub async fn clear_stops(State(state): State<AppState>) -> StatusCode {
    state.navigator.clear_stops();
    StatusCode::NO_CONTENT
}

pub async fn put_vehicle(
    State(state): State<AppState>,
    Json(update): Json<VehicleUpdate>,
) -> ApiResult<Json<VehicleResponse>> {
    let vehicle = match update {
        VehicleUpdate::Preset { preset: id } => {
            let level = state.navigator.vehicle().level;
            preset(&id, level)
                .ok_or(NavError::UnknownPreset(id))
                .map_err(error_response)?
        }
        VehicleUpdate::Custom(vehicle) => {
            if vehicle.level > 100 {
                return Err(error_response(NavError::InvalidLevel(vehicle.level)));
            }
            vehicle
        }
    };
    state.navigator.set_vehicle(vehicle.clone());
    Ok(Json(vehicle.into()))
}

pub async fn list_presets(State(state): State<AppState>) -> Json<Vec<VehicleResponse>> {
    let level = state.navigator.vehicle().level;
    Json(presets(level).into_iter().map(VehicleResponse::from).collect())
}

pub async fn start_navigation(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.navigator.start_navigation().map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_navigation(State(state): State<AppState>) -> StatusCode {
    state.navigator.cancel_navigation();
    StatusCode::NO_CONTENT
}

pub async fn locate(State(state): State<AppState>) -> StatusCode {
    state.navigator.locate_user();
    StatusCode::NO_CONTENT
}

/// Forwards a fix into the live position feed.
pub async fn post_position(
    State(state): State<AppState>,
    Json(update): Json<PositionUpdate>,
) -> ApiResult<StatusCode> {
    if let Some(position) = update.position {
        validate(position).map_err(error_response)?;
    }
    if state.positions.send(update.position).await.is_err() {
        tracing::warn!("live position feed is gone, dropping fix");
        return Ok(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(StatusCode::ACCEPTED)
}

pub async fn post_viewport(
    State(state): State<AppState>,
    Json(bounds): Json<BoundingBox>,
) -> ApiResult<StatusCode> {
    validate(Coordinate::new(bounds.min_lat, bounds.min_lon)).map_err(error_response)?;
    validate(Coordinate::new(bounds.max_lat, bounds.max_lon)).map_err(error_response)?;
    state.pois.viewport_changed(bounds);
    Ok(StatusCode::ACCEPTED)
}

pub async fn get_pois(State(state): State<AppState>) -> Json<PoiListResponse> {
    Json(poi_list(&state))
}

pub async fn put_poi_visibility(
    State(state): State<AppState>,
    Json(update): Json<VisibilityUpdate>,
) -> Json<PoiListResponse> {
    state.pois.set_visible(update.visible);
    Json(poi_list(&state))
}

pub async fn route_gpx(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.navigator.snapshot();
    let plan = snapshot
        .plan
        .ok_or(NavError::NoRoutePlan)
        .map_err(error_response)?;
    let name = snapshot
        .destination
        .map(|d| d.name)
        .unwrap_or_else(|| "route".into());
    let gpx_base64 = encode_plan_as_gpx(&plan, &name).map_err(error_response)?;
    Ok(Json(GpxResponse { gpx_base64 }))
}

/// Server-sent stream of map commands for the rendering client.
pub async fn map_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.map_events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(command) => {
            let json = serde_json::to_string(&command).unwrap_or_default();
            Some(Ok(Event::default().event("map").data(json)))
        }
        Err(err) => {
            tracing::debug!("map event stream lagged: {err}");
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
