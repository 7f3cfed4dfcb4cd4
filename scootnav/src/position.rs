use async_trait::async_trait;
use tokio::{
    sync::watch,
    time::{Instant, Interval, MissedTickBehavior},
};

use crate::{
    geo::{bearing_between, manhattan_distance},
    models::{Coordinate, Maneuver},
    simulator::{match_maneuver, select_zoom, NavigationSimulator, SimulatorConfig, TickFrame},
};

/// Where the navigation cursor comes from. The state machine only consumes
/// frames and stops when the source runs dry.
#[async_trait]
pub trait PositionSource: Send {
    async fn next_frame(&mut self) -> Option<TickFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PositionMode {
    #[default]
    Simulated,
    Live,
}

/// Advances a [`NavigationSimulator`] on a fixed tick.
pub struct SimulatedSource {
    simulator: NavigationSimulator,
    interval: Interval,
}

impl SimulatedSource {
    pub fn new(simulator: NavigationSimulator) -> Self {
        let tick = simulator.config().tick;
        let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            simulator,
            interval,
        }
    }
}

#[async_trait]
impl PositionSource for SimulatedSource {
    async fn next_frame(&mut self) -> Option<TickFrame> {
        if self.simulator.is_finished() {
            return None;
        }
        self.interval.tick().await;
        self.simulator.tick()
    }
}

/// Follows the live position feed along a planned path.
///
/// The bearing comes from consecutive fixes; the source finishes once a fix
/// lands on the last path point.
pub struct LiveSource {
    feed: watch::Receiver<Coordinate>,
    path: Vec<Coordinate>,
    maneuvers: Vec<Maneuver>,
    config: SimulatorConfig,
    previous: Option<Coordinate>,
    bearing: f64,
    finished: bool,
}

impl LiveSource {
    pub fn new(
        mut feed: watch::Receiver<Coordinate>,
        path: Vec<Coordinate>,
        maneuvers: Vec<Maneuver>,
        config: SimulatorConfig,
    ) -> Self {
        let previous = Some(*feed.borrow_and_update());
        Self {
            feed,
            path,
            maneuvers,
            config,
            previous,
            bearing: 0.0,
            finished: false,
        }
    }

    fn nearest_index(&self, point: Coordinate) -> usize {
        self.path
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                manhattan_distance(**a, point).total_cmp(&manhattan_distance(**b, point))
            })
            .map(|(idx, _)| idx)
            .unwrap_or_default()
    }

    fn frame_for(&mut self, fix: Coordinate) -> TickFrame {
        if let Some(previous) = self.previous.filter(|p| *p != fix) {
            self.bearing = bearing_between(previous, fix);
        }
        self.previous = Some(fix);

        let index = self.nearest_index(fix);
        if let Some(last) = self.path.last() {
            self.finished = manhattan_distance(*last, fix) < self.config.maneuver_threshold;
        }

        TickFrame {
            index,
            position: fix,
            bearing: self.bearing,
            zoom: select_zoom(&self.path, index, self.bearing, &self.config),
            instruction: match_maneuver(&self.maneuvers, fix, self.config.maneuver_threshold)
                .cloned(),
        }
    }
}

#[async_trait]
impl PositionSource for LiveSource {
    async fn next_frame(&mut self) -> Option<TickFrame> {
        if self.finished {
            return None;
        }
        self.feed.changed().await.ok()?;
        let fix = *self.feed.borrow_and_update();
        Some(self.frame_for(fix))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geo::bearing;

    fn path() -> Vec<Coordinate> {
        vec![
            Coordinate::new(52.52, 13.40),
            Coordinate::new(52.521, 13.402),
            Coordinate::new(52.522, 13.404),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_source_ticks_on_schedule_and_runs_dry() {
        let sim = NavigationSimulator::new(path(), Vec::new(), SimulatorConfig::default()).unwrap();
        let mut source = SimulatedSource::new(sim);

        let started = Instant::now();
        let first = source.next_frame().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(100));
        assert_eq!(first.bearing, bearing(52.52, 13.40, 52.521, 13.402));

        assert!(source.next_frame().await.is_some());
        assert!(source.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn live_source_follows_fixes_until_arrival() {
        let (tx, rx) = watch::channel(Coordinate::new(52.52, 13.40));
        let mut source = LiveSource::new(rx, path(), Vec::new(), SimulatorConfig::default());

        tx.send(Coordinate::new(52.521, 13.402)).unwrap();
        let frame = source.next_frame().await.unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(frame.bearing, bearing(52.52, 13.40, 52.521, 13.402));

        tx.send(Coordinate::new(52.5221, 13.4041)).unwrap();
        let frame = source.next_frame().await.unwrap();
        assert_eq!(frame.index, 2);
        assert!(source.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn live_source_ends_when_feed_closes() {
        let (tx, rx) = watch::channel(Coordinate::new(52.52, 13.40));
        let mut source = LiveSource::new(rx, path(), Vec::new(), SimulatorConfig::default());
        drop(tx);
        assert!(source.next_frame().await.is_none());
    }
}
