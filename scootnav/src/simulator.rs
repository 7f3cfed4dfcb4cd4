use std::time::Duration;

use crate::{
    error::NavError,
    geo::{bearing_between, manhattan_distance},
    models::{Coordinate, Maneuver},
};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub tick: Duration,
    /// Manhattan distance, in degrees, within which a maneuver counts as reached.
    pub maneuver_threshold: f64,
    /// Bearing change ahead that triggers the close-up zoom.
    pub turn_threshold_deg: f64,
    pub cruise_zoom: f64,
    pub turn_zoom: f64,
    /// Duration of the camera move issued on every tick.
    pub camera_step_secs: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            maneuver_threshold: 0.002,
            turn_threshold_deg: 20.0,
            cruise_zoom: 17.0,
            turn_zoom: 19.0,
            camera_step_secs: 0.1,
        }
    }
}

/// One cursor update: where the marker goes, how the map is rotated and zoomed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFrame {
    pub index: usize,
    pub position: Coordinate,
    pub bearing: f64,
    pub zoom: f64,
    pub instruction: Option<Maneuver>,
}

/// First maneuver lying within `threshold` of `point`.
pub fn match_maneuver(maneuvers: &[Maneuver], point: Coordinate, threshold: f64) -> Option<&Maneuver> {
    maneuvers
        .iter()
        .find(|m| manhattan_distance(m.location, point) < threshold)
}

/// Smallest angle between two bearings, in degrees within `[0, 180]`.
pub fn bearing_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(360.0);
    delta.min(360.0 - delta)
}

/// Close-up zoom when the segment three points ahead turns away from `bearing`.
pub fn select_zoom(path: &[Coordinate], index: usize, bearing: f64, config: &SimulatorConfig) -> f64 {
    if index + 3 < path.len() {
        let ahead = bearing_between(path[index + 2], path[index + 3]);
        if bearing_delta(bearing, ahead) > config.turn_threshold_deg {
            return config.turn_zoom;
        }
    }
    config.cruise_zoom
}

/// Synthetic cursor walking a route path one point per tick.
///
/// Each tick reads the segment starting at the cursor, then advances; the
/// frame's position is the new cursor point. Once the cursor sits on the last
/// point the simulator is finished and further ticks yield nothing.
#[derive(Debug, Clone)]
pub struct NavigationSimulator {
    path: Vec<Coordinate>,
    maneuvers: Vec<Maneuver>,
    index: usize,
    config: SimulatorConfig,
}

impl NavigationSimulator {
    pub fn new(
        path: Vec<Coordinate>,
        maneuvers: Vec<Maneuver>,
        config: SimulatorConfig,
    ) -> Result<Self, NavError> {
        if path.is_empty() {
            return Err(NavError::NoNavigationPath);
        }
        Ok(Self {
            path,
            maneuvers,
            index: 0,
            config,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> Coordinate {
        self.path[self.index]
    }

    pub fn is_finished(&self) -> bool {
        self.index + 1 >= self.path.len()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn tick(&mut self) -> Option<TickFrame> {
        if self.is_finished() {
            return None;
        }
        let current = self.path[self.index];
        let next = self.path[self.index + 1];
        let bearing = bearing_between(current, next);
        let instruction =
            match_maneuver(&self.maneuvers, current, self.config.maneuver_threshold).cloned();
        let zoom = select_zoom(&self.path, self.index, bearing, &self.config);

        self.index += 1;
        Some(TickFrame {
            index: self.index,
            position: next,
            bearing,
            zoom,
            instruction,
        })
    }
}
