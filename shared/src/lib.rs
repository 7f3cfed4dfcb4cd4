use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A named place: a search hit, a selected POI or the user's own position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coords: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Electric,
    Petrol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VehicleKind,
    /// kWh for electric vehicles, litres for petrol ones.
    pub capacity_units: f64,
    pub consumption_per_hundred_km: f64,
    /// Battery or tank level in percent, set by hand.
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub instruction: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Coordinate,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub coordinates: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub maneuvers: Vec<Maneuver>,
    pub usage_cost_percent: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiKind {
    ChargingStation,
    Fuel,
    FastFood,
    Restaurant,
    Supermarket,
    Convenience,
    School,
    College,
    Other,
}

impl PoiKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "charging_station" => Self::ChargingStation,
            "fuel" => Self::Fuel,
            "fast_food" => Self::FastFood,
            "restaurant" => Self::Restaurant,
            "supermarket" => Self::Supermarket,
            "convenience" => Self::Convenience,
            "school" => Self::School,
            "college" => Self::College,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub coords: Coordinate,
    #[serde(rename = "type")]
    pub kind: PoiKind,
    pub name: String,
}

/// Geographic box; `min_lat`/`min_lon` are the south/west edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMode {
    #[default]
    Idle,
    Planning,
    Navigating,
}

/// Read-only view of the navigation core handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub mode: NavigationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<RoutePlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinate>,
    pub bearing: f64,
    pub zoom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Maneuver>,
    pub live_location: Coordinate,
    pub gps_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_point: Option<Location>,
    pub stops: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Location>,
    pub vehicle: Vehicle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
