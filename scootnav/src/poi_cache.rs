use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    geo::bounds_signature,
    map::{MapCommand, MapSink},
    models::{BoundingBox, PointOfInterest},
    poi_client::PoiProvider,
    timer::TimerSlot,
};

#[derive(Debug, Clone)]
pub struct PoiCacheConfig {
    /// Quiet period between the first viewport notification and the query.
    pub debounce: Duration,
}

impl Default for PoiCacheConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Markers to add and remove to bring the rendered set in line with the cache.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MarkerDiff {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl MarkerDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub fn diff_markers(rendered: &HashSet<String>, desired: &HashSet<String>) -> MarkerDiff {
    let mut add: Vec<String> = desired.difference(rendered).cloned().collect();
    let mut remove: Vec<String> = rendered.difference(desired).cloned().collect();
    add.sort();
    remove.sort();
    MarkerDiff { add, remove }
}

/// Viewport-driven cache of points of interest.
///
/// Viewport notifications are coalesced through a single debounce slot: the
/// first notification arms it, later ones only record the newest bounds, and
/// the query runs once for whatever bounds are current when the slot fires.
/// Results are merged by id and never evicted.
#[derive(Clone)]
pub struct PoiViewportCache {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn PoiProvider>,
    map: Arc<dyn MapSink>,
    config: PoiCacheConfig,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    pois: HashMap<String, PointOfInterest>,
    last_signature: Option<String>,
    latest_bounds: Option<BoundingBox>,
    timer: TimerSlot,
    visible: bool,
    rendered: HashSet<String>,
    in_flight: usize,
}

impl PoiViewportCache {
    pub fn new(
        provider: Arc<dyn PoiProvider>,
        map: Arc<dyn MapSink>,
        config: PoiCacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                map,
                config,
                state: Mutex::new(CacheState {
                    visible: true,
                    ..Default::default()
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the viewport and arms the debounce if it is idle. The query
    /// runs one debounce period after the first notification of a burst, with
    /// the latest bounds; continuous panning yields one query per period.
    pub fn viewport_changed(&self, bounds: BoundingBox) {
        let mut state = self.state();
        if !state.visible {
            return;
        }
        state.latest_bounds = Some(bounds);
        self.arm_debounce(&mut state);
    }

    fn arm_debounce(&self, state: &mut CacheState) {
        let this = self.clone();
        let delay = self.inner.config.debounce;
        let armed = state.timer.arm(async move {
            tokio::time::sleep(delay).await;
            this.settle();
        });
        if armed {
            tracing::debug!("POI debounce armed for {:?}", delay);
        }
    }

    fn settle(&self) {
        let mut state = self.state();
        state.timer.clear();
        if !state.visible {
            return;
        }
        let Some(bounds) = state.latest_bounds else {
            return;
        };
        let signature = bounds_signature(&bounds);
        if state.last_signature.as_deref() == Some(signature.as_str()) {
            tracing::debug!("viewport unchanged ({signature}), skipping POI query");
            return;
        }
        state.last_signature = Some(signature);
        state.in_flight += 1;
        drop(state);

        let this = self.clone();
        tokio::spawn(async move {
            let batch = this.inner.provider.fetch_pois(bounds).await;
            this.finish_fetch(batch);
        });
    }

    fn finish_fetch(&self, batch: Vec<PointOfInterest>) {
        {
            let mut state = self.state();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.merge(batch);
    }

    /// Merges a batch by id: new ids are inserted, known ids overwritten,
    /// and ids missing from the batch stay. Returns the number of new ids.
    pub fn merge(&self, batch: Vec<PointOfInterest>) -> usize {
        let mut state = self.state();
        let mut inserted = 0;
        let mut changed = Vec::new();
        for poi in batch {
            match state.pois.get(&poi.id) {
                Some(existing) if *existing == poi => {}
                Some(_) => {
                    changed.push(poi.id.clone());
                    state.pois.insert(poi.id.clone(), poi);
                }
                None => {
                    inserted += 1;
                    state.pois.insert(poi.id.clone(), poi);
                }
            }
        }
        tracing::debug!(
            "merged POI batch: {inserted} new, {} updated, {} cached",
            changed.len(),
            state.pois.len()
        );
        if state.visible {
            self.refresh_markers(&mut state, changed);
        }
        inserted
    }

    fn refresh_markers(&self, state: &mut CacheState, changed: Vec<String>) {
        let desired: HashSet<String> = state.pois.keys().cloned().collect();
        let mut diff = diff_markers(&state.rendered, &desired);
        // Markers whose record changed are re-created with the new data.
        for id in changed {
            if state.rendered.contains(&id) {
                diff.remove.push(id.clone());
                diff.add.push(id);
            }
        }
        if diff.is_empty() {
            return;
        }

        for id in &diff.remove {
            state.rendered.remove(id);
        }
        if !diff.remove.is_empty() {
            self.inner
                .map
                .send(MapCommand::RemovePoiMarkers { ids: diff.remove });
        }

        let pois: Vec<PointOfInterest> = diff
            .add
            .iter()
            .filter_map(|id| state.pois.get(id).cloned())
            .collect();
        state.rendered.extend(diff.add);
        if !pois.is_empty() {
            self.inner.map.send(MapCommand::AddPoiMarkers { pois });
        }
    }

    /// Shows or hides POIs. Hiding cancels the pending debounce and clears
    /// every marker but keeps the cache; a query already in flight still merges.
    pub fn set_visible(&self, visible: bool) {
        let mut state = self.state();
        if state.visible == visible {
            return;
        }
        state.visible = visible;
        tracing::info!("POI display {}", if visible { "enabled" } else { "disabled" });

        if !visible {
            state.timer.cancel();
            let mut ids: Vec<String> = state.rendered.drain().collect();
            if !ids.is_empty() {
                ids.sort();
                self.inner.map.send(MapCommand::RemovePoiMarkers { ids });
            }
            return;
        }

        state.last_signature = None;
        self.refresh_markers(&mut state, Vec::new());
        if state.latest_bounds.is_some() {
            self.arm_debounce(&mut state);
        }
    }

    pub fn toggle_visibility(&self) -> bool {
        let visible = !self.is_visible();
        self.set_visible(visible);
        visible
    }

    pub fn is_visible(&self) -> bool {
        self.state().visible
    }

    pub fn is_loading(&self) -> bool {
        self.state().in_flight > 0
    }

    pub fn len(&self) -> usize {
        self.state().pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().pois.is_empty()
    }

    /// Every cached POI, ordered by id.
    pub fn snapshot(&self) -> Vec<PointOfInterest> {
        let state = self.state();
        let mut pois: Vec<PointOfInterest> = state.pois.values().cloned().collect();
        pois.sort_by(|a, b| a.id.cmp(&b.id));
        pois
    }

    pub fn shutdown(&self) {
        self.state().timer.cancel();
    }
}
