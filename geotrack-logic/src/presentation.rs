use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::{
    state::{LocationText, TrackerState},
    tracker::UtcDT,
};

pub const START_TRACKING_LABEL: &str = "Start Tracking";
pub const STOP_TRACKING_LABEL: &str = "Stop Tracking";
pub const HINT_TEXT: &str = "Press the button to start tracking your location";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Everything the screen needs to render itself
pub struct TrackerUiState {
    pub tracking: bool,
    /// Label of the toggle control, always agrees with `tracking`
    pub button_label: String,
    /// Contents of the text region
    pub location_text: String,
    /// Whether the "searching" animation should be playing
    pub animating: bool,
}

/// Address plus the wall clock time it was received at
pub fn format_address_text(address: &str, at: UtcDT) -> String {
    let local = at.with_timezone(&Local);
    format!("Address: {address}\nTimestamp: {}", local.format("%r"))
}

impl TrackerUiState {
    pub fn present(state: &TrackerState) -> Self {
        let tracking = state.is_tracking();
        let button_label = if tracking {
            STOP_TRACKING_LABEL
        } else {
            START_TRACKING_LABEL
        };
        let location_text = match state.location_text() {
            LocationText::Hint => HINT_TEXT.to_string(),
            LocationText::Address { text, at } => format_address_text(text, *at),
        };

        Self {
            tracking,
            button_label: button_label.to_string(),
            location_text,
            animating: tracking && state.is_subscribed(),
        }
    }
}
