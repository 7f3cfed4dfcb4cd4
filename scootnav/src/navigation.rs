use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::NavError,
    geo::{bounds_of, is_valid_coordinate},
    map::{MapCommand, MapSink},
    models::{
        Coordinate, Location, Maneuver, NavigationMode, NavigationSnapshot, RoutePlan, Vehicle,
    },
    planner::{moved_beyond, PlanOutcome, PlannerConfig, PlannerInputs, RoutePlanner},
    position::{LiveSource, PositionMode, PositionSource, SimulatedSource},
    routing_client::RouteProvider,
    simulator::{NavigationSimulator, SimulatorConfig, TickFrame},
    timer::TimerSlot,
    vehicle::default_vehicle,
};

/// Fallback position until the first GPS fix (Berlin).
pub const DEFAULT_LOCATION: Coordinate = Coordinate::new(52.52, 13.405);

#[derive(Debug, Clone)]
pub struct NavigationConfig {
    pub default_location: Coordinate,
    pub position_mode: PositionMode,
    pub first_lock_zoom: f64,
    pub locate_zoom: f64,
    pub locate_duration_secs: f64,
    pub cancel_zoom: f64,
    pub fit_padding_px: u32,
    pub planner: PlannerConfig,
    pub simulator: SimulatorConfig,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            default_location: DEFAULT_LOCATION,
            position_mode: PositionMode::Simulated,
            first_lock_zoom: 16.0,
            locate_zoom: 16.0,
            locate_duration_secs: 1.2,
            cancel_zoom: 15.0,
            fit_padding_px: 50,
            planner: PlannerConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// The navigation state machine: `idle`, `planning` and `navigating`.
///
/// It owns the active [`RoutePlan`], the route-planning debounce, the
/// position source driving navigation, and the live position. All mutation
/// goes through its methods; everything else reads [`NavigationSnapshot`]s.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<Inner>,
}

struct Inner {
    planner: RoutePlanner,
    map: Arc<dyn MapSink>,
    config: NavigationConfig,
    live_feed: watch::Sender<Coordinate>,
    state: Mutex<NavState>,
}

struct NavState {
    mode: NavigationMode,
    plan: Option<RoutePlan>,
    nav_path: Vec<Coordinate>,
    start_point: Option<Location>,
    stops: Vec<Location>,
    destination: Option<Location>,
    vehicle: Vehicle,
    live_location: Coordinate,
    gps_locked: bool,
    has_centered: bool,
    /// Origin used by the most recent route request.
    planned_origin: Option<Coordinate>,
    plan_seq: u64,
    plan_timer: TimerSlot,
    session: u64,
    driver: Option<JoinHandle<()>>,
    feed: Option<JoinHandle<()>>,
    position: Option<Coordinate>,
    bearing: f64,
    zoom: f64,
    instruction: Option<Maneuver>,
}

impl NavState {
    fn inputs(&self) -> PlannerInputs {
        PlannerInputs {
            start_point: self.start_point.clone(),
            stops: self.stops.clone(),
            destination: self.destination.clone(),
            live_location: self.live_location,
            vehicle: self.vehicle.clone(),
        }
    }

    fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        // frames already in flight carry the old session and are ignored
        self.session += 1;
    }
}

impl Navigator {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        map: Arc<dyn MapSink>,
        config: NavigationConfig,
    ) -> Self {
        let planner = RoutePlanner::new(routes, config.planner.clone());
        let (live_feed, _) = watch::channel(config.default_location);
        let state = NavState {
            mode: NavigationMode::Idle,
            plan: None,
            nav_path: Vec::new(),
            start_point: None,
            stops: Vec::new(),
            destination: None,
            vehicle: default_vehicle(),
            live_location: config.default_location,
            gps_locked: false,
            has_centered: false,
            planned_origin: None,
            plan_seq: 0,
            plan_timer: TimerSlot::default(),
            session: 0,
            driver: None,
            feed: None,
            position: None,
            bearing: 0.0,
            zoom: config.simulator.cruise_zoom,
            instruction: None,
        };
        Self {
            inner: Arc::new(Inner {
                planner,
                map,
                config,
                live_feed,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, NavState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, command: MapCommand) {
        self.inner.map.send(command);
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        let state = self.state();
        NavigationSnapshot {
            mode: state.mode,
            plan: state.plan.clone(),
            position: state.position,
            bearing: state.bearing,
            zoom: state.zoom,
            instruction: state.instruction.clone(),
            live_location: state.live_location,
            gps_locked: state.gps_locked,
            start_point: state.start_point.clone(),
            stops: state.stops.clone(),
            destination: state.destination.clone(),
            vehicle: state.vehicle.clone(),
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.state().mode
    }

    pub fn plan(&self) -> Option<RoutePlan> {
        self.state().plan.clone()
    }

    pub fn set_destination(&self, destination: Option<Location>) {
        let mut state = self.state();
        if state.destination == destination {
            return;
        }
        state.destination = destination;
        self.schedule_plan(&mut state);
    }

    pub fn set_start_point(&self, start_point: Option<Location>) {
        let mut state = self.state();
        if state.start_point == start_point {
            return;
        }
        state.start_point = start_point;
        self.schedule_plan(&mut state);
    }

    pub fn add_stop(&self, stop: Location) {
        let mut state = self.state();
        state.stops.push(stop);
        self.schedule_plan(&mut state);
    }

    pub fn remove_stop(&self, index: usize) -> Option<Location> {
        let mut state = self.state();
        if index >= state.stops.len() {
            return None;
        }
        let removed = state.stops.remove(index);
        self.schedule_plan(&mut state);
        Some(removed)
    }

    pub fn clear_stops(&self) {
        let mut state = self.state();
        if state.stops.is_empty() {
            return;
        }
        state.stops.clear();
        self.schedule_plan(&mut state);
    }

    /// Replaces the vehicle profile. Only capacity and consumption feed the
    /// route cost, so other edits do not trigger a new route.
    pub fn set_vehicle(&self, vehicle: Vehicle) {
        let mut state = self.state();
        let cost_changed = state.vehicle.capacity_units != vehicle.capacity_units
            || state.vehicle.consumption_per_hundred_km != vehicle.consumption_per_hundred_km;
        state.vehicle = vehicle;
        if cost_changed {
            self.schedule_plan(&mut state);
        }
    }

    pub fn vehicle(&self) -> Vehicle {
        self.state().vehicle.clone()
    }

    fn schedule_plan(&self, state: &mut NavState) {
        state.plan_seq += 1;

        if state.destination.is_none() {
            state.plan_timer.cancel();
            state.planned_origin = None;
            self.clear_route(state);
            return;
        }

        let seq = state.plan_seq;
        let inputs = state.inputs();
        state.planned_origin = Some(inputs.effective_origin());
        let delay = self.inner.planner.config().debounce;
        let this = self.clone();
        state.plan_timer.restart(async move {
            tokio::time::sleep(delay).await;
            let outcome = this.inner.planner.plan(&inputs).await;
            this.apply_plan(seq, outcome);
        });
        tracing::debug!("route request #{seq} scheduled in {:?}", delay);
    }

    fn clear_route(&self, state: &mut NavState) {
        if state.mode == NavigationMode::Navigating {
            state.stop_driver();
            state.bearing = 0.0;
            state.position = None;
            state.instruction = None;
            self.send(MapCommand::SetRotation { degrees: 0.0 });
        }
        if state.plan.take().is_some() {
            self.send(MapCommand::ClearRoute);
        }
        state.nav_path.clear();
        if state.mode != NavigationMode::Idle {
            tracing::info!("destination cleared, back to idle");
        }
        state.mode = NavigationMode::Idle;
    }

    fn apply_plan(&self, seq: u64, outcome: PlanOutcome) {
        let mut state = self.state();
        if seq != state.plan_seq {
            tracing::debug!("discarding stale route response #{seq}");
            return;
        }
        state.plan_timer.clear();

        match outcome {
            PlanOutcome::Planned(plan) => {
                tracing::info!(
                    "route planned: {:.2} km, {:.0} min, {}% of capacity",
                    plan.distance_km,
                    plan.duration_min,
                    plan.usage_cost_percent
                );
                self.send(MapCommand::DrawRoute {
                    path: plan.coordinates.clone(),
                });
                if let Some(bounds) = bounds_of(&plan.coordinates) {
                    self.send(MapCommand::FitBounds {
                        bounds,
                        padding_px: self.inner.config.fit_padding_px,
                    });
                }
                state.nav_path = plan.coordinates.clone();
                state.plan = Some(plan);
                // a running navigation keeps its path and mode
                if state.mode != NavigationMode::Navigating {
                    state.mode = NavigationMode::Planning;
                }
            }
            PlanOutcome::NoRoute => {
                tracing::warn!("no route found, keeping previous plan");
            }
            PlanOutcome::Rejected(err) => {
                tracing::warn!("route inputs rejected: {err}");
            }
            PlanOutcome::Cleared => self.clear_route(&mut state),
        }
    }

    /// Feeds one live position update. `None` means the position is
    /// currently unavailable.
    pub fn update_live_position(&self, fix: Option<Coordinate>) {
        let mut state = self.state();
        let Some(fix) = fix else {
            if state.gps_locked {
                tracing::warn!("live position lost");
            }
            state.gps_locked = false;
            return;
        };
        if !is_valid_coordinate(fix) {
            tracing::debug!("ignoring invalid position fix {fix:?}");
            return;
        }

        state.live_location = fix;
        state.gps_locked = true;
        self.inner.live_feed.send_replace(fix);

        if state.mode != NavigationMode::Navigating {
            self.send(MapCommand::MoveUserMarker { position: fix });
        }
        if !state.has_centered {
            state.has_centered = true;
            self.send(MapCommand::SetView {
                center: fix,
                zoom: self.inner.config.first_lock_zoom,
                animate_secs: None,
            });
        }

        let threshold = self.inner.planner.config().replan_threshold_m;
        let origin_moved = state
            .planned_origin
            .is_none_or(|origin| moved_beyond(origin, fix, threshold));
        if state.mode != NavigationMode::Navigating
            && state.start_point.is_none()
            && state.destination.is_some()
            && origin_moved
        {
            self.schedule_plan(&mut state);
        }
    }

    /// Subscribes to the live position feed. Only one feed may be attached
    /// over the navigator's lifetime.
    pub fn attach_position_feed(
        &self,
        mut fixes: mpsc::Receiver<Option<Coordinate>>,
    ) -> Result<(), NavError> {
        let mut state = self.state();
        if state.feed.is_some() {
            return Err(NavError::PositionFeedAttached);
        }
        let this = self.clone();
        state.feed = Some(tokio::spawn(async move {
            while let Some(fix) = fixes.recv().await {
                this.update_live_position(fix);
            }
            tracing::info!("live position feed closed");
        }));
        Ok(())
    }

    pub fn locate_user(&self) {
        let location = self.state().live_location;
        if is_valid_coordinate(location) {
            self.send(MapCommand::FlyTo {
                center: location,
                zoom: self.inner.config.locate_zoom,
                duration_secs: Some(self.inner.config.locate_duration_secs),
            });
        }
    }

    /// `planning -> navigating`. Refused from `idle` and while no path is
    /// known; a running navigation is stopped before the new one starts.
    pub fn start_navigation(&self) -> Result<(), NavError> {
        let mut state = self.state();
        if state.mode == NavigationMode::Idle {
            tracing::warn!("cannot start navigation: no route is being planned");
            return Err(NavError::NotPlanning);
        }
        let path = if state.nav_path.is_empty() {
            state
                .plan
                .as_ref()
                .map(|p| p.coordinates.clone())
                .unwrap_or_default()
        } else {
            state.nav_path.clone()
        };
        if path.is_empty() {
            tracing::error!("cannot start navigation: no navigation path available");
            return Err(NavError::NoNavigationPath);
        }
        let maneuvers = state
            .plan
            .as_ref()
            .map(|p| p.maneuvers.clone())
            .unwrap_or_default();

        let origin = path[0];
        let source: Box<dyn PositionSource> = match self.inner.config.position_mode {
            PositionMode::Simulated => Box::new(SimulatedSource::new(NavigationSimulator::new(
                path.clone(),
                maneuvers,
                self.inner.config.simulator.clone(),
            )?)),
            PositionMode::Live => Box::new(LiveSource::new(
                self.inner.live_feed.subscribe(),
                path.clone(),
                maneuvers,
                self.inner.config.simulator.clone(),
            )),
        };

        state.stop_driver();
        state.nav_path = path;
        state.mode = NavigationMode::Navigating;
        state.position = Some(origin);
        state.bearing = 0.0;
        state.zoom = self.inner.config.simulator.cruise_zoom;
        state.instruction = None;
        let session = state.session;
        tracing::info!(
            "navigation started over {} points ({:?} positions)",
            state.nav_path.len(),
            self.inner.config.position_mode
        );

        let this = self.clone();
        state.driver = Some(tokio::spawn(drive(this, session, source)));
        Ok(())
    }

    fn apply_frame(&self, session: u64, frame: TickFrame) -> bool {
        let mut state = self.state();
        if state.mode != NavigationMode::Navigating || state.session != session {
            return false;
        }
        tracing::trace!("tick {} at {:?}", frame.index, frame.position);

        state.position = Some(frame.position);
        state.bearing = frame.bearing;
        state.zoom = frame.zoom;
        self.send(MapCommand::MoveUserMarker {
            position: frame.position,
        });
        self.send(MapCommand::SetRotation {
            degrees: frame.bearing,
        });
        self.send(MapCommand::SetView {
            center: frame.position,
            zoom: frame.zoom,
            animate_secs: Some(self.inner.config.simulator.camera_step_secs),
        });
        if let Some(maneuver) = frame.instruction {
            if state.instruction.as_ref() != Some(&maneuver) {
                self.send(MapCommand::ShowInstruction {
                    maneuver: maneuver.clone(),
                });
                state.instruction = Some(maneuver);
            }
        }
        true
    }

    /// `navigating -> idle`: stops the position source, resets the rotation
    /// and returns the camera to the live location.
    pub fn cancel_navigation(&self) {
        let mut state = self.state();
        if state.mode != NavigationMode::Navigating {
            return;
        }
        state.stop_driver();
        state.mode = NavigationMode::Idle;
        state.bearing = 0.0;
        state.position = None;
        state.instruction = None;
        self.send(MapCommand::SetRotation { degrees: 0.0 });
        self.send(MapCommand::FlyTo {
            center: state.live_location,
            zoom: self.inner.config.cancel_zoom,
            duration_secs: None,
        });
        tracing::info!("navigation cancelled");
    }

    pub fn is_driving(&self) -> bool {
        self.state()
            .driver
            .as_ref()
            .is_some_and(|driver| !driver.is_finished())
    }

    /// Releases every timer and task owned by the navigator.
    pub fn shutdown(&self) {
        let mut state = self.state();
        state.plan_timer.cancel();
        state.stop_driver();
        if let Some(feed) = state.feed.take() {
            feed.abort();
        }
    }
}

async fn drive(navigator: Navigator, session: u64, mut source: Box<dyn PositionSource>) {
    while let Some(frame) = source.next_frame().await {
        if !navigator.apply_frame(session, frame) {
            return;
        }
    }
    tracing::info!("navigation path completed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        geo::bearing, map::testing::RecordingMap, routing_client::RouteSummary,
    };

    #[derive(Default)]
    struct FakeRoutes {
        summary: Mutex<Option<RouteSummary>>,
        calls: Mutex<Vec<Vec<Coordinate>>>,
    }

    impl FakeRoutes {
        fn returning(summary: Option<RouteSummary>) -> Arc<Self> {
            Arc::new(Self {
                summary: Mutex::new(summary),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Vec<Coordinate>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RouteProvider for FakeRoutes {
        async fn fetch_route(&self, waypoints: &[Coordinate]) -> Option<RouteSummary> {
            self.calls.lock().unwrap().push(waypoints.to_vec());
            self.summary.lock().unwrap().clone()
        }
    }

    fn path() -> Vec<Coordinate> {
        vec![
            Coordinate::new(52.52, 13.40),
            Coordinate::new(52.521, 13.402),
            Coordinate::new(52.522, 13.404),
        ]
    }

    fn summary() -> RouteSummary {
        RouteSummary {
            coordinates: path(),
            distance_km: 20.0,
            duration_min: 30.0,
            maneuvers: vec![Maneuver {
                instruction: "Karl-Marx-Allee".into(),
                kind: "left".into(),
                location: Coordinate::new(52.521, 13.402),
                distance_meters: 120.0,
            }],
        }
    }

    fn destination() -> Location {
        Location {
            name: "Alexanderplatz".into(),
            coords: Coordinate::new(52.522, 13.404),
            category: Some("square".into()),
        }
    }

    fn navigator(routes: Arc<FakeRoutes>) -> (Navigator, Arc<RecordingMap>) {
        let map = Arc::new(RecordingMap::default());
        let nav = Navigator::new(routes, map.clone(), NavigationConfig::default());
        (nav, map)
    }

    async fn planned() -> (Navigator, Arc<RecordingMap>, Arc<FakeRoutes>) {
        let routes = FakeRoutes::returning(Some(summary()));
        let (nav, map) = navigator(routes.clone());
        nav.set_destination(Some(destination()));
        tokio::time::sleep(Duration::from_millis(350)).await;
        (nav, map, routes)
    }

    #[tokio::test(start_paused = true)]
    async fn destination_leads_to_planning() {
        let (nav, map, routes) = planned().await;

        assert_eq!(nav.mode(), NavigationMode::Planning);
        let plan = nav.plan().unwrap();
        assert_eq!(plan.usage_cost_percent, 24);
        assert_eq!(
            routes.calls(),
            vec![vec![DEFAULT_LOCATION, Coordinate::new(52.522, 13.404)]]
        );
        let commands = map.take();
        assert_eq!(commands[0], MapCommand::DrawRoute { path: path() });
        assert!(matches!(commands[1], MapCommand::FitBounds { padding_px: 50, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dependency_changes_restart_the_debounce() {
        let routes = FakeRoutes::returning(Some(summary()));
        let (nav, _map) = navigator(routes.clone());

        nav.set_destination(Some(destination()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        nav.add_stop(Location {
            name: "Stop".into(),
            coords: Coordinate::new(52.51, 13.41),
            category: None,
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(routes.calls().is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let calls = routes.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_routing_keeps_previous_state() {
        let (nav, _map, routes) = planned().await;
        let before = nav.plan();

        *routes.summary.lock().unwrap() = None;
        nav.set_start_point(Some(Location {
            name: "Home".into(),
            coords: Coordinate::new(52.50, 13.30),
            category: None,
        }));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(routes.calls().len(), 2);
        assert_eq!(nav.mode(), NavigationMode::Planning);
        assert_eq!(nav.plan(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn no_route_from_idle_stays_idle() {
        let routes = FakeRoutes::returning(None);
        let (nav, _map) = navigator(routes.clone());
        nav.set_destination(Some(destination()));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(routes.calls().len(), 1);
        assert_eq!(nav.mode(), NavigationMode::Idle);
        assert!(nav.plan().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_destination_returns_to_idle_without_request() {
        let (nav, map, routes) = planned().await;
        map.take();

        nav.set_destination(None);
        assert_eq!(nav.mode(), NavigationMode::Idle);
        assert!(nav.plan().is_none());
        assert_eq!(map.take(), vec![MapCommand::ClearRoute]);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(routes.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_responses_are_discarded() {
        let (nav, _map, _routes) = planned().await;
        nav.set_destination(None);

        let mut late = summary();
        late.distance_km = 99.0;
        nav.apply_plan(1, PlanOutcome::Planned(crate::planner::plan_from_summary(
            late,
            &default_vehicle(),
        )));
        assert_eq!(nav.mode(), NavigationMode::Idle);
        assert!(nav.plan().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn vehicle_cost_change_replans_but_level_change_does_not() {
        let (nav, _map, routes) = planned().await;

        let mut vehicle = nav.vehicle();
        vehicle.level = 40;
        nav.set_vehicle(vehicle.clone());
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(routes.calls().len(), 1);

        vehicle.capacity_units = 5.76;
        nav.set_vehicle(vehicle);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(routes.calls().len(), 2);
        assert_eq!(nav.plan().unwrap().usage_cost_percent, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_walks_the_route_and_cancels_cleanly() {
        let (nav, map, _routes) = planned().await;
        map.take();

        nav.start_navigation().unwrap();
        assert_eq!(nav.mode(), NavigationMode::Navigating);

        tokio::time::sleep(Duration::from_millis(110)).await;
        let snapshot = nav.snapshot();
        assert_eq!(snapshot.position, Some(Coordinate::new(52.521, 13.402)));
        assert_eq!(snapshot.bearing, bearing(52.52, 13.40, 52.521, 13.402));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot = nav.snapshot();
        assert_eq!(snapshot.position, Some(Coordinate::new(52.522, 13.404)));
        assert_eq!(snapshot.instruction.unwrap().instruction, "Karl-Marx-Allee");

        map.take();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(map.take().is_empty(), "no updates after the last point");
        assert!(!nav.is_driving());
        assert_eq!(nav.mode(), NavigationMode::Navigating);

        nav.cancel_navigation();
        let snapshot = nav.snapshot();
        assert_eq!(snapshot.mode, NavigationMode::Idle);
        assert_eq!(snapshot.bearing, 0.0);
        assert_eq!(
            map.take(),
            vec![
                MapCommand::SetRotation { degrees: 0.0 },
                MapCommand::FlyTo {
                    center: DEFAULT_LOCATION,
                    zoom: 15.0,
                    duration_secs: None
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_route_stops_all_updates() {
        let (nav, map, _routes) = planned().await;
        nav.start_navigation().unwrap();
        tokio::time::sleep(Duration::from_millis(110)).await;
        nav.cancel_navigation();
        map.take();

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(map.take().is_empty());
        assert!(nav.snapshot().position.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_navigation_replaces_the_running_simulator() {
        let (nav, _map, _routes) = planned().await;
        nav.start_navigation().unwrap();
        tokio::time::sleep(Duration::from_millis(110)).await;

        nav.start_navigation().unwrap();
        assert_eq!(nav.snapshot().position, Some(Coordinate::new(52.52, 13.40)));
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(nav.snapshot().position, Some(Coordinate::new(52.521, 13.402)));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_without_a_path_is_refused() {
        let (nav, _map) = navigator(FakeRoutes::returning(None));
        assert!(matches!(nav.start_navigation(), Err(NavError::NotPlanning)));
        assert_eq!(nav.mode(), NavigationMode::Idle);

        let mut empty = summary();
        empty.coordinates.clear();
        let (nav, _map) = navigator(FakeRoutes::returning(Some(empty)));
        nav.set_destination(Some(destination()));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(nav.mode(), NavigationMode::Planning);
        assert!(matches!(nav.start_navigation(), Err(NavError::NoNavigationPath)));
        assert_eq!(nav.mode(), NavigationMode::Planning);
        assert!(!nav.is_driving());
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_cancel_requires_a_new_plan() {
        let (nav, map, _routes) = planned().await;
        nav.start_navigation().unwrap();
        tokio::time::sleep(Duration::from_millis(110)).await;
        nav.cancel_navigation();
        map.take();

        assert!(matches!(nav.start_navigation(), Err(NavError::NotPlanning)));
        assert_eq!(nav.mode(), NavigationMode::Idle);
        assert!(!nav.is_driving());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(map.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_destination_while_navigating_stops_everything() {
        let (nav, map, _routes) = planned().await;
        nav.start_navigation().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        nav.set_destination(None);
        assert_eq!(nav.mode(), NavigationMode::Idle);
        map.take();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(map.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_fix_centers_once_and_loss_clears_lock() {
        let (nav, map) = navigator(FakeRoutes::returning(None));
        let fix = Coordinate::new(48.137, 11.575);

        nav.update_live_position(Some(fix));
        nav.update_live_position(Some(Coordinate::new(48.138, 11.575)));
        let commands = map.take();
        let centered = commands
            .iter()
            .filter(|c| matches!(c, MapCommand::SetView { zoom, .. } if *zoom == 16.0))
            .count();
        assert_eq!(centered, 1);
        assert!(nav.snapshot().gps_locked);

        nav.update_live_position(None);
        let snapshot = nav.snapshot();
        assert!(!snapshot.gps_locked);
        assert_eq!(snapshot.live_location, Coordinate::new(48.138, 11.575));

        nav.update_live_position(Some(Coordinate::new(f64::NAN, 1.0)));
        assert_eq!(nav.snapshot().live_location, Coordinate::new(48.138, 11.575));
    }

    #[tokio::test(start_paused = true)]
    async fn live_drift_replans_only_past_threshold() {
        let (nav, _map, routes) = planned().await;

        nav.update_live_position(Some(Coordinate::new(52.52005, 13.405)));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(routes.calls().len(), 1);

        nav.update_live_position(Some(Coordinate::new(52.53, 13.405)));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(routes.calls().len(), 2);
        assert_eq!(routes.calls()[1][0], Coordinate::new(52.53, 13.405));
    }

    #[tokio::test(start_paused = true)]
    async fn position_feed_attaches_once() {
        let (nav, _map) = navigator(FakeRoutes::returning(None));
        let (tx, rx) = mpsc::channel(4);
        nav.attach_position_feed(rx).unwrap();

        let (_tx2, rx2) = mpsc::channel(4);
        assert!(matches!(
            nav.attach_position_feed(rx2),
            Err(NavError::PositionFeedAttached)
        ));

        tx.send(Some(Coordinate::new(50.0, 8.0))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(nav.snapshot().live_location, Coordinate::new(50.0, 8.0));
        nav.shutdown();
    }
}
