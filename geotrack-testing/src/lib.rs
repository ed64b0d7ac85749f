mod sim;

use geotrack_logic::{Notice, PermissionKind, PermissionStatus, TrackerUiState};
use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use serde::{Deserialize, Serialize};

pub use sim::{OfflineGeocoder, SimGeocoder, SimLocation, SimPermissions};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingRequest {
    /// Press the toggle control
    Toggle,
    Start,
    Stop,
    /// Send the screen to the background
    Background,
    /// Bring the screen back
    Foreground,
    /// Grant or revoke a permission without prompting
    SetPermission(PermissionKind, bool),
    /// Answer the pending permission prompt
    AnswerPermission(PermissionStatus),
    /// Deliver a fix as the platform would
    PushFix { lat: f64, long: f64 },
    /// Deliver a "no location this time" update
    PushUnavailable,
    GetState,
    Quit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingResponse {
    Complete,
    UiState(TrackerUiState),
    Notice(Notice),
    Error(String),
}

impl From<anyhow::Error> for TestingResponse {
    fn from(value: anyhow::Error) -> Self {
        TestingResponse::Error(value.to_string())
    }
}

impl From<TrackerUiState> for TestingResponse {
    fn from(val: TrackerUiState) -> Self {
        TestingResponse::UiState(val)
    }
}

impl From<Notice> for TestingResponse {
    fn from(val: Notice) -> Self {
        TestingResponse::Notice(val)
    }
}
