use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{prelude::*, settings::LocationRequest, tracker::UtcDT};

/// A "part" of a location
pub type LocationComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A point on the globe
pub struct Coordinate {
    /// Latitude
    pub lat: LocationComponent,
    /// Longitude
    pub long: LocationComponent,
}

impl Coordinate {
    pub fn new(lat: LocationComponent, long: LocationComponent) -> Self {
        Self { lat, long }
    }

    /// Whether this coordinate is something a geocoder could make sense of
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.long.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.long)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// One location sample as reported by the platform
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// When the platform took the sample, lookups are spaced out by this
    pub timestamp: UtcDT,
}

impl LocationFix {
    pub fn new(lat: LocationComponent, long: LocationComponent, timestamp: UtcDT) -> Self {
        Self {
            coordinate: Coordinate::new(lat, long),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// What the platform delivers on each tick of a subscription
pub enum LocationUpdate {
    /// A new fix is available
    Fix(LocationFix),
    /// The platform couldn't determine a location this time
    Unavailable,
}

impl From<LocationFix> for LocationUpdate {
    fn from(v: LocationFix) -> Self {
        Self::Fix(v)
    }
}

pub type LocationSender = mpsc::Sender<LocationUpdate>;

pub trait LocationService: Send + Sync {
    /// Begin periodic delivery of updates into `updates` following `request`. Only one
    /// subscription is active at a time.
    fn subscribe(&self, request: &LocationRequest, updates: LocationSender) -> Result;
    /// Cancel the active subscription, does nothing if there isn't one
    fn unsubscribe(&self);
}
