use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{geocoding::LookupId, presentation::TrackerUiState, tracker::UtcDT};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// The only thing kept when the screen is torn down, false on a fresh install
pub struct SavedState {
    pub tracking_location: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the text region is showing
pub enum LocationText {
    /// Nothing tracked yet, tell the user what to do
    Hint,
    /// Result of the newest lookup, and when it was shown
    Address { text: String, at: UtcDT },
}

#[derive(Debug, Clone)]
pub struct TrackerState {
    /// Whether the user wants tracking on, survives pausing
    tracking: bool,
    /// Whether a location subscription is currently active
    subscribed: bool,
    location_text: LocationText,
    next_lookup: LookupId,
    /// Lookups with ids below this were dispatched before the last stop
    first_live_lookup: LookupId,
    latest_applied: Option<LookupId>,
    /// Platform time of the last fix that was sent off for a lookup
    last_dispatched_fix: Option<UtcDT>,
}

impl TrackerState {
    pub fn new(saved: SavedState) -> Self {
        Self {
            tracking: saved.tracking_location,
            subscribed: false,
            location_text: LocationText::Hint,
            next_lookup: 0,
            first_live_lookup: 0,
            latest_applied: None,
            last_dispatched_fix: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn location_text(&self) -> &LocationText {
        &self.location_text
    }

    pub fn mark_started(&mut self) {
        self.tracking = true;
        self.subscribed = true;
    }

    /// Tracking turned off by the user, anything still in flight is now stale
    pub fn mark_stopped(&mut self) {
        self.tracking = false;
        self.subscribed = false;
        self.location_text = LocationText::Hint;
        self.first_live_lookup = self.next_lookup;
        self.last_dispatched_fix = None;
    }

    /// Subscription dropped for the screen going away, tracking stays on
    pub fn mark_paused(&mut self) {
        self.subscribed = false;
        self.last_dispatched_fix = None;
    }

    /// Resubscribed after a pause
    pub fn mark_resumed(&mut self) {
        self.subscribed = true;
    }

    /// Whether a fix taken at `taken_at` is far enough after the last dispatched one to be
    /// looked up. Fixes older than the last dispatched one are never looked up.
    pub fn accept_fix(&mut self, taken_at: UtcDT, fastest_interval: Duration) -> bool {
        if let Some(last) = self.last_dispatched_fix {
            match (taken_at - last).to_std() {
                Ok(gap) if gap >= fastest_interval => {}
                _ => return false,
            }
        }
        self.last_dispatched_fix = Some(taken_at);
        true
    }

    pub fn next_lookup_id(&mut self) -> LookupId {
        let id = self.next_lookup;
        self.next_lookup += 1;
        id
    }

    /// A result is only shown while tracking, if it was dispatched after the last stop, and if
    /// nothing newer has been shown already
    pub fn should_apply(&self, id: LookupId) -> bool {
        self.tracking
            && id >= self.first_live_lookup
            && self.latest_applied.is_none_or(|latest| id > latest)
    }

    /// Show the result of lookup `id`, returns false if the result was discarded
    pub fn apply_address(&mut self, id: LookupId, text: String, at: UtcDT) -> bool {
        if !self.should_apply(id) {
            return false;
        }
        self.latest_applied = Some(id);
        self.location_text = LocationText::Address { text, at };
        true
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            tracking_location: self.tracking,
        }
    }

    pub fn as_ui_state(&self) -> TrackerUiState {
        TrackerUiState::present(self)
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new(SavedState::default())
    }
}
