use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::NavError,
    geo::is_valid_coordinate,
    models::{Coordinate, Maneuver},
};

pub const ARRIVAL_INSTRUCTION: &str = "destination reached";
pub const DEFAULT_INSTRUCTION: &str = "follow road";

/// Normalized answer of the routing service, before vehicle costs are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub coordinates: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub maneuvers: Vec<Maneuver>,
}

/// Source of driving routes through an ordered list of waypoints.
///
/// Implementations never fail loudly: any transport, status or payload
/// problem yields `None`, and the caller keeps whatever it showed before.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn fetch_route(&self, waypoints: &[Coordinate]) -> Option<RouteSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Left,
    Right,
    Straight,
}

/// Icon class for a maneuver type such as `slight left` or `arrive`.
pub fn turn_direction(kind: &str) -> TurnDirection {
    if kind.contains("right") {
        TurnDirection::Right
    } else if kind.contains("left") {
        TurnDirection::Left
    } else {
        TurnDirection::Straight
    }
}

pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub fn new(
        base_url: impl Into<String>,
        profile: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NavError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile: profile.into(),
        })
    }

    pub fn route_url(&self, waypoints: &[Coordinate]) -> String {
        format!(
            "{}/route/v1/{}/{}",
            self.base_url,
            self.profile,
            encode_waypoints(waypoints)
        )
    }

    async fn request_route(&self, waypoints: &[Coordinate]) -> Result<RouteSummary, NavError> {
        validate_waypoints(waypoints)?;

        let url = self.route_url(waypoints);
        tracing::debug!("requesting route through {} waypoints", waypoints.len());
        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "full"),
                ("geometries", "geojson"),
                ("steps", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Status(status));
        }

        let body = response.bytes().await?;
        let payload: OsrmResponse = serde_json::from_slice(&body)?;
        normalize_route(payload)
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn fetch_route(&self, waypoints: &[Coordinate]) -> Option<RouteSummary> {
        match self.request_route(waypoints).await {
            Ok(summary) => {
                tracing::info!(
                    "route found: {:.2} km, {:.1} min, {} maneuvers",
                    summary.distance_km,
                    summary.duration_min,
                    summary.maneuvers.len()
                );
                Some(summary)
            }
            Err(err) => {
                tracing::warn!("routing failed: {err}");
                None
            }
        }
    }
}

pub fn validate_waypoints(waypoints: &[Coordinate]) -> Result<(), NavError> {
    if waypoints.len() < 2 {
        return Err(NavError::TooFewWaypoints(waypoints.len()));
    }
    match waypoints.iter().find(|c| !is_valid_coordinate(**c)) {
        Some(bad) => Err(NavError::InvalidCoordinate {
            lat: bad.lat,
            lon: bad.lon,
        }),
        None => Ok(()),
    }
}

/// `lon,lat;lon,lat;...` as routing backends expect it.
pub fn encode_waypoints(waypoints: &[Coordinate]) -> String {
    waypoints
        .iter()
        .map(|c| format!("{},{}", c.lon, c.lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Debug, Deserialize)]
pub struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    #[serde(default)]
    name: String,
    #[serde(default)]
    distance: f64,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    location: [f64; 2],
}

pub fn normalize_route(payload: OsrmResponse) -> Result<RouteSummary, NavError> {
    if payload.code != "Ok" {
        return Err(NavError::NoRoute(payload.code));
    }
    let route = payload
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| NavError::NoRoute("empty route list".into()))?;

    let coordinates: Vec<Coordinate> = route
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| Coordinate::new(*lat, *lon))
        .collect();
    if coordinates.is_empty() {
        return Err(NavError::NoRoute("empty geometry".into()));
    }

    let maneuvers = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(to_maneuver)
        .collect();

    Ok(RouteSummary {
        coordinates,
        distance_km: route.distance / 1000.0,
        duration_min: route.duration / 60.0,
        maneuvers,
    })
}

fn to_maneuver(step: OsrmStep) -> Maneuver {
    let instruction = if step.maneuver.kind == "arrive" {
        ARRIVAL_INSTRUCTION.to_string()
    } else if step.name.is_empty() {
        DEFAULT_INSTRUCTION.to_string()
    } else {
        step.name
    };
    let [lon, lat] = step.maneuver.location;
    Maneuver {
        instruction,
        kind: step.maneuver.modifier.unwrap_or(step.maneuver.kind),
        location: Coordinate::new(lat, lon),
        distance_meters: step.distance,
    }
}
