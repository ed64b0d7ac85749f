use std::sync::Arc;

use geotrack_geocoder::NominatimGeocoder;
use geotrack_logic::{LocationRequest, Notice, SavedState, Tracker, UiUpdateSender, prelude::*};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_specta::Event;

use crate::location::{TauriLocation, TauriPermissions};

/// What the tracking screen shows has changed
#[derive(Serialize, Deserialize, Clone, Default, Debug, specta::Type, tauri_specta::Event)]
pub struct TrackerStateUpdate;

/// Something the user should be told about briefly, shown as a toast over the screen
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, specta::Type, tauri_specta::Event)]
pub struct TrackerNotice {
    pub notice: Notice,
    pub message: String,
}

impl From<Notice> for TrackerNotice {
    fn from(notice: Notice) -> Self {
        Self {
            notice,
            message: notice.message().to_string(),
        }
    }
}

pub struct TauriUiUpdateSender(AppHandle);

impl TauriUiUpdateSender {
    fn new(app: &AppHandle) -> Self {
        Self(app.clone())
    }
}

impl UiUpdateSender for TauriUiUpdateSender {
    fn send_update(&self) {
        if let Err(why) = TrackerStateUpdate.emit(&self.0) {
            error!("Error sending tracker state update to UI: {why:?}");
        }
    }

    fn show_notice(&self, notice: Notice) {
        if let Err(why) = TrackerNotice::from(notice).emit(&self.0) {
            error!("Couldn't show notice \"{}\": {why:?}", notice.message());
        }
    }
}

pub type AppTracker =
    Tracker<TauriLocation, NominatimGeocoder, TauriPermissions, TauriUiUpdateSender>;

pub type AppTrackerHandle = Arc<AppTracker>;

pub fn error_dialog(app: &AppHandle, msg: &str) {
    app.dialog()
        .message(msg)
        .kind(MessageDialogKind::Error)
        .show(|_| {});
}

/// Build the tracker for a fresh launch. The tracking flag only lives as long as the process,
/// so a cold start is always idle.
pub fn create_tracker(app: &AppHandle) -> Result<AppTrackerHandle> {
    let geocoder = NominatimGeocoder::new().context("Failed to set up geocoder")?;

    let tracker = Tracker::new(
        LocationRequest::default(),
        SavedState::default(),
        TauriLocation::new(app.clone()),
        Arc::new(geocoder),
        TauriPermissions::new(app.clone()),
        TauriUiUpdateSender::new(app),
    );

    Ok(Arc::new(tracker))
}

/// Run the tracker until the app exits
pub fn tracker_loop(tracker: AppTrackerHandle) {
    tauri::async_runtime::spawn(async move {
        tracker.main_loop().await;
        info!("Tracker stopped");
    });
}
