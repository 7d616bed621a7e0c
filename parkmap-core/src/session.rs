//! Viewport-driven fetch session.
//!
//! A [`MapSession`] owns the state behind a map screen: it collapses
//! duplicate viewport events, keeps at most one places fetch in flight, and
//! publishes only the newest viewport's outcome. A fetch superseded by a
//! newer viewport is aborted, and its result is discarded even if it
//! completes first (last viewport wins, not first to finish).
//!
//! All state lives in a single driver task; callers interact through
//! fire-and-forget events and read back through a watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ErrorNotice;
use crate::location::{Coordinate, LocationProvider};
use crate::model::{ParkingSpot, ViewportBox};
use crate::provider::{FetchOutcome, PlacesProvider};

/// Aggregate screen state published to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub is_loading: bool,
    pub spots: Vec<ParkingSpot>,
    pub selected: Option<ParkingSpot>,
}

enum Event {
    ViewportChanged(ViewportBox),
    SelectSpot(ParkingSpot),
    ClearSelectedSpot,
    RequestInitialZoom,
    FetchDone { generation: u64, outcome: FetchOutcome },
}

/// Out-of-band streams published alongside the state: user-facing error
/// notices and one-shot camera-move requests.
pub struct MapSignals {
    pub errors: mpsc::UnboundedReceiver<ErrorNotice>,
    pub zooms: mpsc::UnboundedReceiver<Coordinate>,
}

/// Handle to a running session. Dropping it tears the session down.
pub struct MapSession {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<MapState>,
    driver: JoinHandle<()>,
}

impl MapSession {
    /// Spawns the driver task. Must be called inside a tokio runtime.
    pub fn spawn(
        places: Arc<dyn PlacesProvider>,
        location: Arc<dyn LocationProvider>,
    ) -> (Self, MapSignals) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(MapState::default());
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (zooms_tx, zooms_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            places,
            location,
            events_tx: events_tx.clone(),
            state_tx,
            errors_tx,
            zooms_tx,
            latest_viewport: None,
            generation: 0,
            in_flight: None,
        };
        let driver = tokio::spawn(driver.run(events_rx));

        let session = MapSession { events: events_tx, state: state_rx, driver };
        let signals = MapSignals { errors: errors_rx, zooms: zooms_rx };
        (session, signals)
    }

    /// Signal that the camera settled on a new viewport.
    pub fn viewport_changed(&self, viewport: ViewportBox) {
        let _ = self.events.send(Event::ViewportChanged(viewport));
    }

    pub fn select_spot(&self, spot: ParkingSpot) {
        let _ = self.events.send(Event::SelectSpot(spot));
    }

    pub fn clear_selected_spot(&self) {
        let _ = self.events.send(Event::ClearSelectedSpot);
    }

    /// Ask for a one-shot camera move to the last known location.
    pub fn request_initial_zoom(&self) {
        let _ = self.events.send(Event::RequestInitialZoom);
    }

    /// Live view of the published state.
    pub fn state(&self) -> watch::Receiver<MapState> {
        self.state.clone()
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct Driver {
    places: Arc<dyn PlacesProvider>,
    location: Arc<dyn LocationProvider>,
    events_tx: mpsc::UnboundedSender<Event>,
    state_tx: watch::Sender<MapState>,
    errors_tx: mpsc::UnboundedSender<ErrorNotice>,
    zooms_tx: mpsc::UnboundedSender<Coordinate>,
    latest_viewport: Option<ViewportBox>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        if let Some(fetch) = self.in_flight.take() {
            fetch.abort();
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::ViewportChanged(viewport) => self.on_viewport_changed(viewport),
            Event::SelectSpot(spot) => {
                self.state_tx.send_modify(|state| state.selected = Some(spot));
            }
            Event::ClearSelectedSpot => {
                self.state_tx.send_modify(|state| state.selected = None);
            }
            Event::RequestInitialZoom => self.on_initial_zoom(),
            Event::FetchDone { generation, outcome } => self.on_fetch_done(generation, outcome),
        }
    }

    fn on_viewport_changed(&mut self, viewport: ViewportBox) {
        if self.latest_viewport == Some(viewport) {
            // Repeat camera settle on the same rectangle, nothing new to fetch.
            return;
        }
        self.latest_viewport = Some(viewport);
        self.generation += 1;
        let generation = self.generation;

        if let Some(stale) = self.in_flight.take() {
            debug!(generation, "superseding in-flight fetch");
            stale.abort();
        }

        self.state_tx.send_modify(|state| state.is_loading = true);

        let places = Arc::clone(&self.places);
        let events = self.events_tx.clone();
        let bounding_box = viewport.to_bounding_box();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = places.fetch_spots(&bounding_box).await;
            // Receiver gone means the session was dropped mid-fetch.
            let _ = events.send(Event::FetchDone { generation, outcome });
        }));
    }

    fn on_fetch_done(&mut self, generation: u64, outcome: FetchOutcome) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping superseded fetch result");
            return;
        }
        self.in_flight = None;

        match outcome {
            Ok(spots) => {
                debug!(count = spots.len(), "publishing parking spots");
                self.state_tx.send_modify(|state| {
                    state.is_loading = false;
                    state.spots = spots;
                });
            }
            Err(err) => {
                warn!(error = %err, "places fetch failed");
                self.state_tx.send_modify(|state| state.is_loading = false);
                let _ = self.errors_tx.send(err.into());
            }
        }
    }

    fn on_initial_zoom(&self) {
        let location = Arc::clone(&self.location);
        let zooms = self.zooms_tx.clone();
        let errors = self.errors_tx.clone();
        // Resolved off the event loop so a slow location service cannot
        // stall viewport handling.
        tokio::spawn(async move {
            match location.last_known_location().await {
                Ok(Some(coordinate)) => {
                    debug!(?coordinate, "initial zoom target");
                    let _ = zooms.send(coordinate);
                }
                Ok(None) => {
                    warn!("no location available for initial zoom");
                    let _ = errors.send(ErrorNotice::LocationFailed);
                }
                Err(err) => {
                    warn!(error = %err, "failed to obtain location for initial zoom");
                    let _ = errors.send(ErrorNotice::LocationFailed);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::location::StaticLocation;
    use crate::model::SpotLocation;

    /// Test double that answers each bounding box with one spot named after
    /// it, optionally after a per-box delay.
    #[derive(Debug, Default)]
    struct ScriptedPlaces {
        calls: AtomicUsize,
        delays: HashMap<String, Duration>,
        failure: Option<FetchError>,
    }

    impl ScriptedPlaces {
        fn delayed(bounding_box: &str, delay: Duration) -> Self {
            Self {
                delays: HashMap::from([(bounding_box.to_string(), delay)]),
                ..Self::default()
            }
        }

        fn failing(failure: FetchError) -> Self {
            Self { failure: Some(failure), ..Self::default() }
        }
    }

    #[async_trait]
    impl PlacesProvider for ScriptedPlaces {
        async fn fetch_spots(&self, bounding_box: &str) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(bounding_box) {
                tokio::time::sleep(*delay).await;
            }
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(vec![spot_named(bounding_box)]),
            }
        }
    }

    fn spot_named(name: &str) -> ParkingSpot {
        ParkingSpot {
            name: name.to_string(),
            location: SpotLocation { latitude: 0.0, longitude: 0.0 },
            address: "Unknown Address".into(),
            city: "Unknown City".into(),
            country: "Unknown Country".into(),
            opening_hours: "Not specified".into(),
        }
    }

    fn no_location() -> Arc<StaticLocation> {
        Arc::new(StaticLocation(None))
    }

    async fn wait_for_spots(state: &mut watch::Receiver<MapState>) -> Vec<ParkingSpot> {
        loop {
            state.changed().await.expect("driver alive");
            let snapshot = state.borrow().clone();
            if !snapshot.is_loading && !snapshot.spots.is_empty() {
                return snapshot.spots;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_viewport_triggers_single_fetch() {
        let places = Arc::new(ScriptedPlaces::default());
        let (session, _signals) = MapSession::spawn(places.clone(), no_location());
        let mut state = session.state();

        let viewport = ViewportBox::new(45.84, 16.02, 45.77, 15.93);
        session.viewport_changed(viewport);
        session.viewport_changed(viewport);

        let spots = wait_for_spots(&mut state).await;
        assert_eq!(spots[0].name, viewport.to_bounding_box());

        // A later settle on the same rectangle is also suppressed.
        session.viewport_changed(viewport);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(places.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_viewport_supersedes_in_flight_fetch() {
        let slow = ViewportBox::new(1.0, 1.0, 0.0, 0.0);
        let fast = ViewportBox::new(2.0, 2.0, 1.0, 1.0);
        let places = Arc::new(ScriptedPlaces::delayed(
            &slow.to_bounding_box(),
            Duration::from_secs(5),
        ));
        let (session, _signals) = MapSession::spawn(places.clone(), no_location());
        let mut state = session.state();

        session.viewport_changed(slow);
        session.viewport_changed(slow); // duplicate while in flight: suppressed

        // Let the slow fetch actually start before the camera moves on.
        while places.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        session.viewport_changed(fast); // distinct: supersedes

        let spots = wait_for_spots(&mut state).await;
        assert_eq!(spots[0].name, fast.to_bounding_box());

        // Even after the slow fetch's deadline passes, its result must not
        // replace the newer one.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(state.borrow().spots[0].name, fast.to_bounding_box());
        assert_eq!(places.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_stale_fetch_cannot_overwrite_newer_result() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(MapState::default());
        let (errors_tx, _errors_rx) = mpsc::unbounded_channel();
        let (zooms_tx, _zooms_rx) = mpsc::unbounded_channel();

        let mut driver = Driver {
            places: Arc::new(ScriptedPlaces::default()),
            location: no_location(),
            events_tx,
            state_tx,
            errors_tx,
            zooms_tx,
            latest_viewport: None,
            generation: 0,
            in_flight: None,
        };

        driver.on_viewport_changed(ViewportBox::new(1.0, 1.0, 0.0, 0.0));
        driver.on_viewport_changed(ViewportBox::new(2.0, 2.0, 1.0, 1.0));

        // The first fetch resolves only after it was superseded.
        driver.on_fetch_done(1, Ok(vec![spot_named("stale")]));
        assert!(state_rx.borrow().spots.is_empty());
        assert!(state_rx.borrow().is_loading);

        driver.on_fetch_done(2, Ok(vec![spot_named("fresh")]));
        assert_eq!(state_rx.borrow().spots[0].name, "fresh");
        assert!(!state_rx.borrow().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_wraps_the_fetch() {
        let viewport = ViewportBox::new(1.0, 1.0, 0.0, 0.0);
        let places = Arc::new(ScriptedPlaces::delayed(
            &viewport.to_bounding_box(),
            Duration::from_secs(1),
        ));
        let (session, _signals) = MapSession::spawn(places, no_location());
        let mut state = session.state();

        session.viewport_changed(viewport);

        state.changed().await.unwrap();
        assert!(state.borrow().is_loading);

        let spots = wait_for_spots(&mut state).await;
        assert_eq!(spots.len(), 1);
        assert!(!state.borrow().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_surfaces_as_notice_and_clears_loading() {
        let places = Arc::new(ScriptedPlaces::failing(FetchError::Remote {
            code: 500,
            message: "Internal Server Error".into(),
        }));
        let (session, mut signals) = MapSession::spawn(places, no_location());
        let mut state = session.state();

        session.viewport_changed(ViewportBox::new(1.0, 1.0, 0.0, 0.0));

        let notice = signals.errors.recv().await.expect("driver alive");
        assert_eq!(
            notice,
            ErrorNotice::Remote { code: 500, message: "Internal Server Error".into() }
        );

        // Loading must have been cleared; no spots were published.
        loop {
            let snapshot = state.borrow_and_update().clone();
            if !snapshot.is_loading {
                assert!(snapshot.spots.is_empty());
                break;
            }
            state.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_block_the_next_viewport() {
        let places = Arc::new(ScriptedPlaces::failing(FetchError::Transport("boom".into())));
        let (session, mut signals) = MapSession::spawn(places.clone(), no_location());

        session.viewport_changed(ViewportBox::new(1.0, 1.0, 0.0, 0.0));
        assert!(signals.errors.recv().await.is_some());

        session.viewport_changed(ViewportBox::new(2.0, 2.0, 1.0, 1.0));
        assert!(signals.errors.recv().await.is_some());
        assert_eq!(places.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_is_set_and_cleared() {
        let places = Arc::new(ScriptedPlaces::default());
        let (session, _signals) = MapSession::spawn(places, no_location());
        let mut state = session.state();

        let spot = spot_named("Kvaternik Plaza");
        session.select_spot(spot.clone());
        state.changed().await.unwrap();
        assert_eq!(state.borrow().selected.as_ref(), Some(&spot));

        session.clear_selected_spot();
        state.changed().await.unwrap();
        assert_eq!(state.borrow().selected, None);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_zoom_emits_last_known_location() {
        let here = Coordinate { latitude: 45.8, longitude: 16.0 };
        let places = Arc::new(ScriptedPlaces::default());
        let (session, mut signals) =
            MapSession::spawn(places, Arc::new(StaticLocation(Some(here))));

        session.request_initial_zoom();
        assert_eq!(signals.zooms.recv().await, Some(here));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_location_reports_location_failure() {
        let places = Arc::new(ScriptedPlaces::default());
        let (session, mut signals) = MapSession::spawn(places, no_location());

        session.request_initial_zoom();
        assert_eq!(signals.errors.recv().await, Some(ErrorNotice::LocationFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_location_reports_location_failure() {
        #[derive(Debug)]
        struct BrokenLocation;

        #[async_trait]
        impl LocationProvider for BrokenLocation {
            async fn last_known_location(&self) -> anyhow::Result<Option<Coordinate>> {
                anyhow::bail!("location service unavailable")
            }
        }

        let places = Arc::new(ScriptedPlaces::default());
        let (session, mut signals) = MapSession::spawn(places, Arc::new(BrokenLocation));

        session.request_initial_zoom();
        assert_eq!(signals.errors.recv().await, Some(ErrorNotice::LocationFailed));
    }
}
