mod geocoding;
mod location;
mod permission;
mod presentation;
mod settings;
mod state;
mod tracker;

pub use geocoding::{
    Address, AddressFailure, AddressResult, Geocoder, LookupCompletion, LookupId, LookupSender,
    lookup_address, spawn_lookup,
};
pub use location::{
    Coordinate, LocationComponent, LocationFix, LocationSender, LocationService, LocationUpdate,
};
pub use permission::{PermissionGate, PermissionKind, PermissionService, PermissionStatus};
pub use presentation::{
    HINT_TEXT, START_TRACKING_LABEL, STOP_TRACKING_LABEL, TrackerUiState, format_address_text,
};
pub use settings::{LocationRequest, Priority};
pub use state::{LocationText, SavedState, TrackerState};
pub use tracker::{Notice, Tracker, UiUpdateSender, UtcDT};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
