use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("a route needs at least two waypoints, got {0}")]
    TooFewWaypoints(usize),
    #[error("navigation can only start from a planned route")]
    NotPlanning,
    #[error("no navigation path available")]
    NoNavigationPath,
    #[error("no route plan available")]
    NoRoutePlan,
    #[error("no stop at index {0}")]
    StopNotFound(usize),
    #[error("unknown vehicle preset `{0}`")]
    UnknownPreset(String),
    #[error("vehicle level must be within 0..=100, got {0}")]
    InvalidLevel(u8),
    #[error("a live position feed is already attached")]
    PositionFeedAttached,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid service payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("routing service found no route ({0})")]
    NoRoute(String),
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}
