use std::{sync::Arc, time::Duration};

use crate::{
    error::NavError,
    geo::{haversine_km, is_valid_coordinate},
    models::{Coordinate, Location, RoutePlan, Vehicle},
    routing_client::{RouteProvider, RouteSummary},
    vehicle::usage_cost_percent,
};

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Settle delay restarted on every dependency change.
    pub debounce: Duration,
    /// Live-position drift, in meters, below which the route is not recomputed.
    pub replan_threshold_m: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            replan_threshold_m: 25.0,
        }
    }
}

/// Everything a route depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerInputs {
    pub start_point: Option<Location>,
    pub stops: Vec<Location>,
    pub destination: Option<Location>,
    pub live_location: Coordinate,
    pub vehicle: Vehicle,
}

impl PlannerInputs {
    /// The explicit start point, or the live position when none is set.
    pub fn effective_origin(&self) -> Coordinate {
        self.start_point
            .as_ref()
            .map(|s| s.coords)
            .unwrap_or(self.live_location)
    }
}

#[derive(Debug)]
pub enum PlanOutcome {
    /// No destination: any plotted route must go.
    Cleared,
    Planned(RoutePlan),
    /// The routing service had nothing; keep what is shown.
    NoRoute,
    /// Inputs were unusable and no request was made; keep what is shown.
    Rejected(NavError),
}

/// `[origin, ...stops, destination]`, or an error when the origin is unusable.
/// Returns `Ok(None)` when no destination is set.
pub fn build_waypoints(inputs: &PlannerInputs) -> Result<Option<Vec<Coordinate>>, NavError> {
    let Some(destination) = &inputs.destination else {
        return Ok(None);
    };
    let origin = inputs.effective_origin();
    if !is_valid_coordinate(origin) {
        return Err(NavError::InvalidCoordinate {
            lat: origin.lat,
            lon: origin.lon,
        });
    }
    let mut waypoints = Vec::with_capacity(inputs.stops.len() + 2);
    waypoints.push(origin);
    waypoints.extend(inputs.stops.iter().map(|s| s.coords));
    waypoints.push(destination.coords);
    Ok(Some(waypoints))
}

pub fn plan_from_summary(summary: RouteSummary, vehicle: &Vehicle) -> RoutePlan {
    let usage_cost_percent = usage_cost_percent(
        summary.distance_km,
        vehicle.consumption_per_hundred_km,
        vehicle.capacity_units,
    );
    RoutePlan {
        coordinates: summary.coordinates,
        distance_km: summary.distance_km,
        duration_min: summary.duration_min,
        maneuvers: summary.maneuvers,
        usage_cost_percent,
    }
}

/// Whether the live position drifted far enough from `previous` to warrant a new route.
pub fn moved_beyond(previous: Coordinate, current: Coordinate, threshold_m: f64) -> bool {
    haversine_km(previous, current) * 1000.0 > threshold_m
}

/// Turns route inputs into a [`RoutePlan`] through a [`RouteProvider`].
pub struct RoutePlanner {
    provider: Arc<dyn RouteProvider>,
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(provider: Arc<dyn RouteProvider>, config: PlannerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub async fn plan(&self, inputs: &PlannerInputs) -> PlanOutcome {
        let waypoints = match build_waypoints(inputs) {
            Ok(Some(waypoints)) => waypoints,
            Ok(None) => return PlanOutcome::Cleared,
            Err(err) => {
                tracing::warn!("route not requested: {err}");
                return PlanOutcome::Rejected(err);
            }
        };

        match self.provider.fetch_route(&waypoints).await {
            Some(summary) => PlanOutcome::Planned(plan_from_summary(summary, &inputs.vehicle)),
            None => PlanOutcome::NoRoute,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::vehicle::default_vehicle;

    struct FixedRoute {
        summary: Option<RouteSummary>,
        calls: Mutex<Vec<Vec<Coordinate>>>,
    }

    #[async_trait]
    impl RouteProvider for FixedRoute {
        async fn fetch_route(&self, waypoints: &[Coordinate]) -> Option<RouteSummary> {
            self.calls.lock().unwrap().push(waypoints.to_vec());
            self.summary.clone()
        }
    }

    fn location(name: &str, lat: f64, lon: f64) -> Location {
        Location {
            name: name.into(),
            coords: Coordinate::new(lat, lon),
            category: None,
        }
    }

    fn inputs() -> PlannerInputs {
        PlannerInputs {
            start_point: None,
            stops: vec![location("Stop", 52.51, 13.41)],
            destination: Some(location("Dest", 52.50, 13.42)),
            live_location: Coordinate::new(52.52, 13.405),
            vehicle: default_vehicle(),
        }
    }

    fn summary(distance_km: f64) -> RouteSummary {
        RouteSummary {
            coordinates: vec![Coordinate::new(52.52, 13.405), Coordinate::new(52.50, 13.42)],
            distance_km,
            duration_min: 40.0,
            maneuvers: Vec::new(),
        }
    }

    #[test]
    fn waypoints_start_at_live_location_without_start_point() {
        let waypoints = build_waypoints(&inputs()).unwrap().unwrap();
        assert_eq!(
            waypoints,
            vec![
                Coordinate::new(52.52, 13.405),
                Coordinate::new(52.51, 13.41),
                Coordinate::new(52.50, 13.42),
            ]
        );
    }

    #[test]
    fn explicit_start_point_wins() {
        let mut inputs = inputs();
        inputs.start_point = Some(location("Home", 48.1, 11.5));
        assert_eq!(inputs.effective_origin(), Coordinate::new(48.1, 11.5));
        assert_eq!(build_waypoints(&inputs).unwrap().unwrap()[0], Coordinate::new(48.1, 11.5));
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let mut inputs = inputs();
        inputs.live_location = Coordinate::new(f64::NAN, 13.4);
        assert!(matches!(
            build_waypoints(&inputs),
            Err(NavError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn cost_follows_vehicle() {
        let plan = plan_from_summary(summary(20.0), &default_vehicle());
        assert_eq!(plan.usage_cost_percent, 24);
        assert_eq!(plan.distance_km, 20.0);
    }

    #[test]
    fn drift_threshold() {
        let a = Coordinate::new(52.52, 13.405);
        assert!(!moved_beyond(a, Coordinate::new(52.5201, 13.405), 25.0));
        assert!(moved_beyond(a, Coordinate::new(52.521, 13.405), 25.0));
    }

    #[tokio::test]
    async fn missing_destination_clears_without_request() {
        let provider = Arc::new(FixedRoute {
            summary: Some(summary(1.0)),
            calls: Mutex::new(Vec::new()),
        });
        let planner = RoutePlanner::new(provider.clone(), PlannerConfig::default());
        let mut inputs = inputs();
        inputs.destination = None;

        assert!(matches!(planner.plan(&inputs).await, PlanOutcome::Cleared));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_origin_is_rejected_without_request() {
        let provider = Arc::new(FixedRoute {
            summary: Some(summary(1.0)),
            calls: Mutex::new(Vec::new()),
        });
        let planner = RoutePlanner::new(provider.clone(), PlannerConfig::default());
        let mut inputs = inputs();
        inputs.live_location = Coordinate::new(91.0, 13.4);

        assert!(matches!(
            planner.plan(&inputs).await,
            PlanOutcome::Rejected(NavError::InvalidCoordinate { .. })
        ));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plans_and_reports_no_route() {
        let ok = RoutePlanner::new(
            Arc::new(FixedRoute {
                summary: Some(summary(20.0)),
                calls: Mutex::new(Vec::new()),
            }),
            PlannerConfig::default(),
        );
        match ok.plan(&inputs()).await {
            PlanOutcome::Planned(plan) => assert_eq!(plan.usage_cost_percent, 24),
            other => panic!("unexpected outcome {other:?}"),
        }

        let none = RoutePlanner::new(
            Arc::new(FixedRoute {
                summary: None,
                calls: Mutex::new(Vec::new()),
            }),
            PlannerConfig::default(),
        );
        assert!(matches!(none.plan(&inputs()).await, PlanOutcome::NoRoute));
    }
}
