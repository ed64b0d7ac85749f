use std::sync::Mutex;

use chrono::DateTime;
use geotrack_logic::{
    LocationFix, LocationRequest, LocationSender, LocationService, LocationUpdate, PermissionKind,
    PermissionService, PermissionStatus, prelude::*,
};
use log::{error, warn};
use tauri::{AppHandle, plugin::PermissionState};
use tauri_plugin_geolocation::{GeolocationExt, PermissionType, PositionOptions, WatchEvent};

/// Location updates from the platform's geolocation service
pub struct TauriLocation {
    app: AppHandle,
    watch: Mutex<Option<u32>>,
}

impl TauriLocation {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            watch: Mutex::new(None),
        }
    }
}

fn position_options(request: &LocationRequest) -> PositionOptions {
    PositionOptions {
        enable_high_accuracy: request.priority.is_high_accuracy(),
        timeout: request.interval_ms,
        maximum_age: request.fastest_interval_ms,
    }
}

impl LocationService for TauriLocation {
    fn subscribe(&self, request: &LocationRequest, updates: LocationSender) -> Result {
        self.unsubscribe();

        let id = self
            .app
            .geolocation()
            .watch_position(position_options(request), move |event| {
                let update = match event {
                    WatchEvent::Position(pos) => {
                        let timestamp = DateTime::from_timestamp_millis(pos.timestamp as i64)
                            .unwrap_or_else(chrono::Utc::now);
                        LocationUpdate::Fix(LocationFix::new(
                            pos.coords.latitude,
                            pos.coords.longitude,
                            timestamp,
                        ))
                    }
                    WatchEvent::Error(why) => {
                        warn!("Failed to get loc: {why}");
                        LocationUpdate::Unavailable
                    }
                };
                if let Err(why) = updates.try_send(update) {
                    warn!("Dropping location update: {why}");
                }
            })
            .context("Failed to watch position")?;

        *self.watch.lock().unwrap() = Some(id);
        Ok(())
    }

    fn unsubscribe(&self) {
        if let Some(id) = self.watch.lock().unwrap().take() {
            if let Err(why) = self.app.geolocation().clear_watch(id) {
                error!("Failed to clear position watch {id}: {why:?}");
            }
        }
    }
}

/// Location permissions through the geolocation plugin
pub struct TauriPermissions(AppHandle);

impl TauriPermissions {
    pub fn new(app: AppHandle) -> Self {
        Self(app)
    }
}

fn to_status(state: PermissionState) -> PermissionStatus {
    match state {
        PermissionState::Granted => PermissionStatus::Granted,
        _ => PermissionStatus::Denied,
    }
}

fn to_permission_type(kind: PermissionKind) -> PermissionType {
    match kind {
        PermissionKind::FineLocation => PermissionType::Location,
        PermissionKind::CoarseLocation => PermissionType::CoarseLocation,
    }
}

impl PermissionService for TauriPermissions {
    fn check(&self, kind: PermissionKind) -> PermissionStatus {
        match self.0.geolocation().check_permissions() {
            Ok(status) => match kind {
                PermissionKind::FineLocation => to_status(status.location),
                PermissionKind::CoarseLocation => to_status(status.coarse_location),
            },
            Err(why) => {
                error!("Failed to check location permission: {why:?}");
                PermissionStatus::Denied
            }
        }
    }

    async fn request(&self, kind: PermissionKind) -> PermissionStatus {
        let app = self.0.clone();
        // The plugin blocks until the user answers the prompt
        let res = tauri::async_runtime::spawn_blocking(move || {
            app.geolocation()
                .request_permissions(Some(vec![to_permission_type(kind)]))
        })
        .await;

        match res {
            Ok(Ok(status)) => match kind {
                PermissionKind::FineLocation => to_status(status.location),
                PermissionKind::CoarseLocation => to_status(status.coarse_location),
            },
            Ok(Err(why)) => {
                error!("Permission request failed: {why:?}");
                PermissionStatus::Denied
            }
            Err(why) => {
                error!("Permission request task failed: {why:?}");
                PermissionStatus::Denied
            }
        }
    }
}
