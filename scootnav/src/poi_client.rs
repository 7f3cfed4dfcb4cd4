use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    error::NavError,
    geo::is_valid_coordinate,
    models::{BoundingBox, Coordinate, PoiKind, PointOfInterest},
};

/// Tag filters for the categories shown on the map.
const POI_FILTERS: [(&str, &str); 5] = [
    ("amenity", "charging_station"),
    ("amenity", "fuel"),
    ("shop", "supermarket"),
    ("amenity", "fast_food"),
    ("amenity", "school"),
];

const QUERY_TIMEOUT_SECS: u32 = 25;

/// Spatial query for points of interest inside a bounding box.
///
/// Failures are swallowed and reported as an empty batch.
#[async_trait]
pub trait PoiProvider: Send + Sync {
    async fn fetch_pois(&self, bounds: BoundingBox) -> Vec<PointOfInterest>;
}

pub struct OverpassClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OverpassClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NavError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn request_pois(&self, bounds: BoundingBox) -> Result<Vec<PointOfInterest>, NavError> {
        let query = build_query(&bounds);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("data", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Status(status));
        }

        let body = response.bytes().await?;
        let payload: OverpassResponse = serde_json::from_slice(&body)?;
        Ok(normalize_elements(payload))
    }
}

#[async_trait]
impl PoiProvider for OverpassClient {
    async fn fetch_pois(&self, bounds: BoundingBox) -> Vec<PointOfInterest> {
        match self.request_pois(bounds).await {
            Ok(pois) => {
                tracing::debug!("overpass returned {} points of interest", pois.len());
                pois
            }
            Err(err) => {
                tracing::warn!("POI query failed: {err}");
                Vec::new()
            }
        }
    }
}

/// Overpass QL selecting nodes, ways and relations for every filter, with
/// center points for area features.
pub fn build_query(bounds: &BoundingBox) -> String {
    let bbox = format!(
        "{},{},{},{}",
        bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon
    );
    let selectors: String = POI_FILTERS
        .iter()
        .map(|(key, value)| format!("nwr[\"{key}\"=\"{value}\"]({bbox});"))
        .collect();
    format!("[out:json][timeout:{QUERY_TIMEOUT_SECS}];({selectors});out center;")
}

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type", default = "default_element_type")]
    element_type: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

fn default_element_type() -> String {
    "node".to_string()
}

pub fn normalize_elements(payload: OverpassResponse) -> Vec<PointOfInterest> {
    payload
        .elements
        .into_iter()
        .filter_map(to_point_of_interest)
        .collect()
}

fn to_point_of_interest(element: OverpassElement) -> Option<PointOfInterest> {
    let coords = match (&element.center, element.lat, element.lon) {
        (Some(center), _, _) => Coordinate::new(center.lat, center.lon),
        (None, Some(lat), Some(lon)) => Coordinate::new(lat, lon),
        _ => return None,
    };
    if !is_valid_coordinate(coords) {
        return None;
    }

    let tag = element
        .tags
        .get("amenity")
        .or_else(|| element.tags.get("shop"))
        .map(String::as_str)
        .unwrap_or_default();
    let kind = PoiKind::from_tag(tag);
    let name = match element.tags.get("name") {
        Some(name) => name.clone(),
        None if kind == PoiKind::ChargingStation => "Charging station".to_string(),
        None => "Unknown".to_string(),
    };

    Some(PointOfInterest {
        id: format!("{}/{}", element.element_type, element.id),
        coords,
        kind,
        name,
    })
}
