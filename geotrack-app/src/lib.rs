mod location;
mod state;

use geotrack_logic::TrackerUiState;
use log::LevelFilter;
use tauri::{Manager, RunEvent, State};
use tauri_specta::{ErrorHandlingMode, collect_commands, collect_events};

use std::result::Result as StdResult;

use crate::state::{
    AppTrackerHandle, TrackerNotice, TrackerStateUpdate, create_tracker, error_dialog,
    tracker_loop,
};

type Result<T = (), E = String> = StdResult<T, E>;

#[tauri::command]
#[specta::specta]
/// Get what the tracking screen should currently show, call after receiving a
/// [TrackerStateUpdate]
async fn get_ui_state(tracker: State<'_, AppTrackerHandle>) -> Result<TrackerUiState> {
    Ok(tracker.ui_state().await)
}

#[tauri::command]
#[specta::specta]
/// The tracking button was pressed. If location permission is missing this prompts for it and
/// only resolves once the user has answered.
async fn toggle_tracking(tracker: State<'_, AppTrackerHandle>) -> Result {
    tracker.toggle().await;
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// The screen is no longer visible, stops location updates until [app_foreground]
async fn app_background(tracker: State<'_, AppTrackerHandle>) -> Result {
    tracker.on_background().await;
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// The screen is visible again, resumes location updates if tracking was on
async fn app_foreground(tracker: State<'_, AppTrackerHandle>) -> Result {
    tracker.on_foreground().await;
    Ok(())
}

pub fn mk_specta() -> tauri_specta::Builder {
    tauri_specta::Builder::<tauri::Wry>::new()
        .error_handling(ErrorHandlingMode::Throw)
        .commands(collect_commands![
            get_ui_state,
            toggle_tracking,
            app_background,
            app_foreground,
        ])
        .events(collect_events![TrackerStateUpdate, TrackerNotice])
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let builder = mk_specta();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(LevelFilter::Debug)
                .build(),
        )
        .plugin(tauri_plugin_geolocation::init())
        .invoke_handler(builder.invoke_handler())
        .setup(move |app| {
            builder.mount_events(app);

            let handle = app.handle().clone();
            let tracker = create_tracker(&handle).inspect_err(|why| {
                error_dialog(&handle, &format!("Couldn't start location tracking\n\n{why:?}"));
            })?;
            app.manage::<AppTrackerHandle>(tracker.clone());
            tracker_loop(tracker);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::ExitRequested { .. } = event {
                if let Some(tracker) = app.try_state::<AppTrackerHandle>() {
                    tracker.quit();
                }
            }
        });
}
