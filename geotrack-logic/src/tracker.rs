use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    geocoding::{Geocoder, LookupCompletion, LookupSender, spawn_lookup},
    location::{LocationSender, LocationService, LocationUpdate},
    permission::{PermissionGate, PermissionService, PermissionStatus},
    prelude::*,
    presentation::TrackerUiState,
    settings::LocationRequest,
    state::{SavedState, TrackerState},
};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Short lived message for the user that isn't part of the screen state
pub enum Notice {
    /// The user said no to location access, tracking stays off
    PermissionDenied,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location permission denied",
        }
    }
}

pub trait UiUpdateSender {
    /// The screen state changed, the UI should fetch it again
    fn send_update(&self);
    /// Show a transient notice to the user
    fn show_notice(&self, notice: Notice);
}

const CHANNEL_CAPACITY: usize = 16;

type UpdateChannel = (LocationSender, Mutex<mpsc::Receiver<LocationUpdate>>);
type LookupChannel = (LookupSender, Mutex<mpsc::Receiver<LookupCompletion>>);

/// Controller for the tracking screen. Subscribes to [LocationService] when tracking, hands each
/// fix off to a [Geocoder] and reports screen changes with [UiUpdateSender].
pub struct Tracker<L: LocationService, G: Geocoder, P: PermissionService, U: UiUpdateSender> {
    state: RwLock<TrackerState>,
    request: LocationRequest,
    location: L,
    geocoder: Arc<G>,
    permissions: PermissionGate<P>,
    ui: U,
    updates: UpdateChannel,
    lookups: LookupChannel,
    cancel: CancellationToken,
}

impl<L: LocationService, G: Geocoder, P: PermissionService, U: UiUpdateSender> Tracker<L, G, P, U> {
    pub fn new(
        request: LocationRequest,
        saved: SavedState,
        location: L,
        geocoder: Arc<G>,
        permissions: P,
        ui: U,
    ) -> Self {
        let (update_tx, update_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (lookup_tx, lookup_rx) = mpsc::channel(CHANNEL_CAPACITY);

        Self {
            state: RwLock::new(TrackerState::new(saved)),
            request,
            location,
            geocoder,
            permissions: PermissionGate::new(permissions),
            ui,
            updates: (update_tx, Mutex::new(update_rx)),
            lookups: (lookup_tx, Mutex::new(lookup_rx)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn permissions(&self) -> &P {
        self.permissions.inner()
    }

    pub fn ui_sender(&self) -> &U {
        &self.ui
    }

    pub async fn ui_state(&self) -> TrackerUiState {
        self.state.read().await.as_ui_state()
    }

    pub async fn saved_state(&self) -> SavedState {
        self.state.read().await.saved_state()
    }

    pub async fn is_tracking(&self) -> bool {
        self.state.read().await.is_tracking()
    }

    /// The toggle control was pressed. Without fine location permission this asks for it, and
    /// tracking starts once (and if) it's granted.
    pub async fn toggle(&self) {
        if !self.permissions.can_toggle() {
            info!("Location permission missing, requesting it before tracking");
            if let Some(status) = self.permissions.request().await {
                self.on_permission_result(status).await;
            }
            return;
        }

        let mut state = self.state.write().await;
        if state.is_tracking() {
            self.stop_tracking(&mut state);
        } else {
            self.start_tracking(&mut state);
        }
    }

    /// Begin tracking, does nothing if already tracking or if location permission is missing
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        self.start_tracking(&mut state);
    }

    /// Stop tracking, does nothing if not tracking
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        self.stop_tracking(&mut state);
    }

    /// The user answered a permission request
    pub async fn on_permission_result(&self, status: PermissionStatus) {
        match status {
            PermissionStatus::Granted => {
                debug!("Location permission granted, starting deferred tracking");
                self.start().await;
            }
            PermissionStatus::Denied => {
                warn!("Location permission denied");
                self.ui.show_notice(Notice::PermissionDenied);
            }
        }
    }

    /// The screen went away, drop the subscription but remember we were tracking
    pub async fn on_background(&self) {
        let mut state = self.state.write().await;
        if state.is_subscribed() {
            self.location.unsubscribe();
            state.mark_paused();
            self.ui.send_update();
        }
    }

    /// The screen came back, resubscribe if we were tracking before
    pub async fn on_foreground(&self) {
        let mut state = self.state.write().await;
        if !state.is_tracking() || state.is_subscribed() {
            return;
        }

        if !self.permissions.can_track() {
            warn!("Location permission was revoked while paused, tracking turned off");
            state.mark_stopped();
        } else if let Err(why) = self.subscribe() {
            error!("Couldn't resume tracking: {why:?}");
            state.mark_stopped();
        } else {
            state.mark_resumed();
        }

        self.ui.send_update();
    }

    fn subscribe(&self) -> Result {
        self.location
            .subscribe(&self.request, self.updates.0.clone())
            .context("Failed to subscribe to location updates")
    }

    fn start_tracking(&self, state: &mut TrackerState) {
        if state.is_tracking() {
            debug!("Already tracking");
            return;
        }

        if !self.permissions.can_track() {
            debug!("Location permission not granted, not tracking");
            return;
        }

        if let Err(why) = self.subscribe() {
            error!("Couldn't start tracking: {why:?}");
            return;
        }

        info!("Tracking started");
        state.mark_started();
        self.ui.send_update();
    }

    fn stop_tracking(&self, state: &mut TrackerState) {
        if !state.is_tracking() {
            return;
        }

        if state.is_subscribed() {
            self.location.unsubscribe();
        }

        info!("Tracking stopped");
        state.mark_stopped();
        self.ui.send_update();
    }

    async fn consume_update(&self, update: LocationUpdate) {
        match update {
            LocationUpdate::Unavailable => {
                debug!("Location unavailable, skipping update");
            }
            LocationUpdate::Fix(fix) => {
                let mut state = self.state.write().await;
                if !state.is_subscribed() {
                    debug!("Dropping fix that arrived after unsubscribing");
                    return;
                }
                if !state.accept_fix(fix.timestamp, self.request.fastest_interval()) {
                    debug!(
                        "Dropping fix taken at {}, too soon after the last one",
                        fix.timestamp
                    );
                    return;
                }
                let id = state.next_lookup_id();
                debug!(
                    "Dispatching lookup {id} for {}, {}",
                    fix.coordinate.lat, fix.coordinate.long
                );
                spawn_lookup(
                    self.geocoder.clone(),
                    id,
                    fix.coordinate,
                    self.lookups.0.clone(),
                );
            }
        }
    }

    async fn consume_lookup(&self, done: LookupCompletion) {
        let mut state = self.state.write().await;
        if state.apply_address(done.id, done.result.to_string(), Utc::now()) {
            self.ui.send_update();
        } else {
            debug!("Discarding stale lookup {}", done.id);
        }
    }

    pub fn quit(&self) {
        self.cancel.cancel();
    }

    /// Main loop of the tracker, handles location updates and finished lookups until
    /// [Self::quit] is called.
    pub async fn main_loop(&self) {
        let mut updates = self.updates.1.lock().await;
        let mut lookups = self.lookups.1.lock().await;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                Some(update) = updates.recv() => {
                    self.consume_update(update).await;
                }

                Some(done) = lookups.recv() => {
                    self.consume_lookup(done).await;
                }
            }
        }

        let mut state = self.state.write().await;
        if state.is_subscribed() {
            self.location.unsubscribe();
            state.mark_paused();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use tokio::{task::JoinHandle, test};

    use super::*;
    use crate::{
        location::{Coordinate, LocationFix},
        presentation::{HINT_TEXT, START_TRACKING_LABEL, STOP_TRACKING_LABEL},
        tests::{MockGeocoder, MockLocation, MockPermissions, RecordingSender, settle},
    };
    use std::time::Duration;

    type TestTracker = Tracker<MockLocation, MockGeocoder, MockPermissions, RecordingSender>;

    fn mk_tracker(perms: MockPermissions, geocoder: MockGeocoder) -> Arc<TestTracker> {
        mk_tracker_saved(perms, geocoder, SavedState::default())
    }

    fn mk_tracker_saved(
        perms: MockPermissions,
        geocoder: MockGeocoder,
        saved: SavedState,
    ) -> Arc<TestTracker> {
        tokio::time::pause();
        Arc::new(TestTracker::new(
            LocationRequest::default(),
            saved,
            MockLocation::default(),
            Arc::new(geocoder),
            perms,
            RecordingSender::default(),
        ))
    }

    fn run(tracker: &Arc<TestTracker>) -> JoinHandle<()> {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.main_loop().await })
    }

    fn fix(lat: f64, long: f64) -> LocationFix {
        LocationFix::new(lat, long, Utc::now())
    }

    fn fix_at(lat: f64, long: f64, taken_at: UtcDT) -> LocationFix {
        LocationFix::new(lat, long, taken_at)
    }

    async fn assert_label_matches(tracker: &TestTracker) {
        let ui = tracker.ui_state().await;
        let expected = if ui.tracking {
            STOP_TRACKING_LABEL
        } else {
            START_TRACKING_LABEL
        };
        assert_eq!(ui.button_label, expected);
        assert_eq!(ui.tracking, tracker.is_tracking().await);
    }

    #[test]
    async fn test_toggle_on_and_geocode() {
        let tracker = mk_tracker(
            MockPermissions::granted(),
            MockGeocoder::fixed("123 Main St"),
        );
        let handle = run(&tracker);

        tracker.toggle().await;

        let ui = tracker.ui_state().await;
        assert!(ui.tracking);
        assert!(tracker.location.is_subscribed());
        assert_eq!(tracker.location.last_request(), Some(LocationRequest::default()));
        assert_eq!(ui.button_label, STOP_TRACKING_LABEL);

        tracker.location.push(fix(37.0, -122.0)).await;
        settle().await;

        assert_eq!(
            tracker.geocoder.calls(),
            vec![Coordinate::new(37.0, -122.0)],
            "Expected exactly one lookup for the fix"
        );

        let ui = tracker.ui_state().await;
        assert!(ui.location_text.starts_with("Address: 123 Main St\nTimestamp: "));

        tracker.quit();
        handle.await.expect("Main loop panicked");
        assert!(!tracker.location.is_subscribed());
    }

    #[test]
    async fn test_stop_resets_text() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));
        let handle = run(&tracker);

        tracker.toggle().await;
        tracker.location.push(fix(1.0, 1.0)).await;
        settle().await;
        assert_ne!(tracker.ui_state().await.location_text, HINT_TEXT);

        tracker.toggle().await;

        let ui = tracker.ui_state().await;
        assert!(!ui.tracking);
        assert_eq!(ui.location_text, HINT_TEXT);
        assert_eq!(ui.button_label, START_TRACKING_LABEL);
        assert!(!tracker.location.is_subscribed());

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_stop_while_idle_is_noop() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        let before = tracker.ui_state().await;
        tracker.stop().await;

        assert_eq!(tracker.ui_state().await, before);
        assert_eq!(tracker.ui.updates(), 0);
        assert_eq!(tracker.location.unsubscriptions(), 0);
    }

    #[test]
    async fn test_start_twice_subscribes_once() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        tracker.start().await;
        tracker.start().await;

        assert_eq!(tracker.location.subscriptions(), 1);
        assert!(tracker.is_tracking().await);
    }

    #[test]
    async fn test_label_follows_toggles() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        // Mixed sequence of toggles and explicit start / stop calls
        for step in [0, 0, 1, 1, 2, 0, 2, 2, 1, 0, 0, 0, 1, 2] {
            match step {
                0 => tracker.toggle().await,
                1 => tracker.start().await,
                _ => tracker.stop().await,
            }
            assert_label_matches(&tracker).await;
        }
    }

    #[test]
    async fn test_permission_denied() {
        let tracker = mk_tracker(MockPermissions::new(false, false), MockGeocoder::fixed("Home"));

        let tracker2 = tracker.clone();
        let toggle = tokio::spawn(async move { tracker2.toggle().await });
        settle().await;

        assert_eq!(tracker.permissions.inner().requests(), 1);
        assert!(!tracker.is_tracking().await);
        assert_eq!(tracker.location.subscriptions(), 0);

        tracker
            .permissions
            .inner()
            .answer(PermissionStatus::Denied)
            .await;
        toggle.await.expect("Toggle panicked");

        assert!(!tracker.is_tracking().await);
        assert_eq!(tracker.location.subscriptions(), 0);
        assert_eq!(tracker.ui.notices(), vec![Notice::PermissionDenied]);
        assert_label_matches(&tracker).await;
    }

    #[test]
    async fn test_start_without_permission() {
        let tracker = mk_tracker(MockPermissions::new(false, false), MockGeocoder::fixed("Home"));

        tracker.start().await;

        assert!(!tracker.is_tracking().await);
        assert_eq!(tracker.location.subscriptions(), 0);
        assert_eq!(tracker.permissions.inner().requests(), 0);
    }

    #[test]
    async fn test_permission_granted_resumes_start() {
        let tracker = mk_tracker(MockPermissions::new(false, false), MockGeocoder::fixed("Home"));
        tracker
            .permissions
            .inner()
            .answer(PermissionStatus::Granted)
            .await;

        tracker.toggle().await;

        assert_eq!(tracker.permissions.inner().requests(), 1);
        assert!(tracker.is_tracking().await);
        assert!(tracker.location.is_subscribed());
        assert!(tracker.ui.notices().is_empty());
    }

    #[test]
    async fn test_repeated_toggle_while_pending() {
        let tracker = mk_tracker(MockPermissions::new(false, false), MockGeocoder::fixed("Home"));

        let tracker2 = tracker.clone();
        let first = tokio::spawn(async move { tracker2.toggle().await });
        settle().await;

        tracker.toggle().await;
        assert_eq!(tracker.permissions.inner().requests(), 1);

        tracker
            .permissions
            .inner()
            .answer(PermissionStatus::Granted)
            .await;
        first.await.expect("Toggle panicked");

        assert!(tracker.is_tracking().await);
        assert_eq!(tracker.location.subscriptions(), 1);
    }

    #[test]
    async fn test_pause_and_resume() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        tracker.toggle().await;
        tracker.on_background().await;

        assert!(!tracker.location.is_subscribed());
        assert!(tracker.is_tracking().await);
        assert!(tracker.saved_state().await.tracking_location);
        assert!(!tracker.ui_state().await.animating);

        tracker.on_foreground().await;

        assert!(tracker.location.is_subscribed());
        assert_eq!(tracker.location.subscriptions(), 2);
        assert!(tracker.ui_state().await.animating);
    }

    #[test]
    async fn test_pause_while_idle() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        tracker.on_background().await;
        tracker.on_foreground().await;

        assert_eq!(tracker.location.subscriptions(), 0);
        assert_eq!(tracker.location.unsubscriptions(), 0);
        assert!(!tracker.is_tracking().await);
    }

    #[test]
    async fn test_restored_state_resubscribes() {
        let tracker = mk_tracker_saved(
            MockPermissions::granted(),
            MockGeocoder::fixed("Home"),
            SavedState {
                tracking_location: true,
            },
        );

        assert!(!tracker.location.is_subscribed());
        tracker.on_foreground().await;
        assert!(tracker.location.is_subscribed());
        assert_label_matches(&tracker).await;
    }

    #[test]
    async fn test_resume_after_permission_revoked() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        tracker.toggle().await;
        tracker.on_background().await;
        tracker.permissions.inner().revoke();
        tracker.on_foreground().await;

        let ui = tracker.ui_state().await;
        assert!(!ui.tracking);
        assert_eq!(ui.location_text, HINT_TEXT);
        assert!(!tracker.location.is_subscribed());
    }

    #[test]
    async fn test_geocoder_unavailable_keeps_tracking() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::unavailable());
        let handle = run(&tracker);

        tracker.toggle().await;
        tracker.location.push(fix(37.0, -122.0)).await;
        settle().await;

        let ui = tracker.ui_state().await;
        assert!(ui.tracking);
        assert!(ui.location_text.starts_with("Address: Service not available"));

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_unavailable_location_is_skipped() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));
        let handle = run(&tracker);

        tracker.toggle().await;
        tracker.location.push(LocationUpdate::Unavailable).await;
        settle().await;

        assert!(tracker.geocoder.calls().is_empty());
        assert_eq!(tracker.ui_state().await.location_text, HINT_TEXT);

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_slow_lookup_does_not_overwrite_newer() {
        let geocoder = MockGeocoder::with(|coord| {
            // The first fix takes much longer to resolve than the second
            let delay = if coord.lat == 1.0 {
                Duration::from_secs(30)
            } else {
                Duration::from_secs(1)
            };
            let address = crate::geocoding::Address::new([format!("At {}", coord.lat)]);
            (delay, Ok(vec![address]))
        });
        let tracker = mk_tracker(MockPermissions::granted(), geocoder);
        let handle = run(&tracker);

        tracker.toggle().await;
        let start = Utc::now();
        tracker.location.push(fix_at(1.0, 0.0, start)).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        tracker
            .location
            .push(fix_at(2.0, 0.0, start + TimeDelta::seconds(6)))
            .await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(tracker.ui_state().await.location_text.contains("At 2"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        let text = tracker.ui_state().await.location_text;
        assert!(text.contains("At 2"), "Stale lookup overwrote newer one: {text}");

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_lookup_after_stop_is_discarded() {
        let geocoder = MockGeocoder::with(|_| {
            (
                Duration::from_secs(10),
                Ok(vec![crate::geocoding::Address::new(["Late"])]),
            )
        });
        let tracker = mk_tracker(MockPermissions::granted(), geocoder);
        let handle = run(&tracker);

        tracker.toggle().await;
        tracker.location.push(fix(1.0, 1.0)).await;
        settle().await;
        tracker.toggle().await;

        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(tracker.ui_state().await.location_text, HINT_TEXT);

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_fixes_are_rate_limited() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));
        let handle = run(&tracker);

        tracker.toggle().await;
        let start = Utc::now();
        for i in 0..5 {
            let taken_at = start + TimeDelta::milliseconds(200 * i);
            tracker.location.push(fix_at(1.0, 1.0, taken_at)).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        settle().await;

        assert_eq!(
            tracker.geocoder.calls().len(),
            1,
            "Fixes inside the fastest interval were looked up"
        );

        tracker
            .location
            .push(fix_at(2.0, 2.0, start + TimeDelta::seconds(5)))
            .await;
        settle().await;

        assert_eq!(tracker.geocoder.calls().len(), 2);

        tracker.quit();
        handle.await.expect("Main loop panicked");
    }

    #[test]
    async fn test_fresh_launch_stays_idle() {
        let tracker = mk_tracker(MockPermissions::granted(), MockGeocoder::fixed("Home"));

        tracker.on_foreground().await;

        assert!(!tracker.is_tracking().await);
        assert_eq!(tracker.location.subscriptions(), 0);
        assert_eq!(tracker.ui_state().await.location_text, HINT_TEXT);
    }
}
