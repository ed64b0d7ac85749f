use std::{
    ops::RangeInclusive,
    sync::{
        Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
};

use geotrack_geocoder::NominatimGeocoder;
use geotrack_logic::{
    Address, Coordinate, Geocoder, LocationRequest, LocationSender, LocationService,
    LocationUpdate, PermissionKind, PermissionService, PermissionStatus,
};
use log::{debug, info};
use tokio::sync::{Mutex, mpsc};

use crate::prelude::*;

/// Location service fed by hand instead of by a GPS
#[derive(Default)]
pub struct SimLocation {
    sender: StdMutex<Option<LocationSender>>,
}

impl SimLocation {
    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    pub async fn push(&self, update: LocationUpdate) -> Result {
        let tx = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("Not subscribed to location updates"))?;
        tx.send(update).await.context("Tracker has stopped")
    }
}

impl LocationService for SimLocation {
    fn subscribe(&self, request: &LocationRequest, updates: LocationSender) -> Result {
        info!(
            "Subscribed every {:?} (fastest {:?}, {:?})",
            request.interval(),
            request.fastest_interval(),
            request.priority
        );
        *self.sender.lock().unwrap() = Some(updates);
        Ok(())
    }

    fn unsubscribe(&self) {
        info!("Unsubscribed");
        *self.sender.lock().unwrap() = None;
    }
}

type AnswerChannel = (
    mpsc::Sender<PermissionStatus>,
    Mutex<mpsc::Receiver<PermissionStatus>>,
);

/// Permission system where prompts are answered by the test driver
pub struct SimPermissions {
    fine: AtomicBool,
    coarse: AtomicBool,
    answers: AnswerChannel,
}

impl SimPermissions {
    pub fn new(fine: bool, coarse: bool) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            fine: AtomicBool::new(fine),
            coarse: AtomicBool::new(coarse),
            answers: (tx, Mutex::new(rx)),
        }
    }

    fn flag(&self, kind: PermissionKind) -> &AtomicBool {
        match kind {
            PermissionKind::FineLocation => &self.fine,
            PermissionKind::CoarseLocation => &self.coarse,
        }
    }

    pub fn set(&self, kind: PermissionKind, granted: bool) {
        self.flag(kind).store(granted, Ordering::SeqCst);
    }

    pub fn answer(&self, status: PermissionStatus) -> Result {
        self.answers
            .0
            .try_send(status)
            .context("A permission answer is already waiting")
    }
}

impl PermissionService for SimPermissions {
    fn check(&self, kind: PermissionKind) -> PermissionStatus {
        if self.flag(kind).load(Ordering::SeqCst) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn request(&self, kind: PermissionKind) -> PermissionStatus {
        info!("Prompting for {kind:?}, waiting for an answer");
        let status = self
            .answers
            .1
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(PermissionStatus::Denied);
        if status.is_granted() {
            self.set(kind, true);
        }
        status
    }
}

struct Region {
    lat: RangeInclusive<f64>,
    long: RangeInclusive<f64>,
    lines: &'static [&'static str],
}

const REGIONS: &[Region] = &[
    Region {
        lat: 37.0..=38.0,
        long: -123.0..=-122.0,
        lines: &["1 Dr Carlton B Goodlett Pl", "San Francisco, CA 94102"],
    },
    Region {
        lat: 40.5..=41.0,
        long: -74.5..=-73.5,
        lines: &["City Hall Park", "New York, NY 10007"],
    },
    Region {
        lat: 51.0..=52.0,
        long: -0.5..=0.5,
        lines: &["Westminster", "London SW1A 0AA"],
    },
];

/// Geocoder that knows a handful of places and nothing else, for running without a network
#[derive(Default)]
pub struct OfflineGeocoder;

impl Geocoder for OfflineGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Address>> {
        let found = REGIONS
            .iter()
            .filter(|r| r.lat.contains(&coordinate.lat) && r.long.contains(&coordinate.long))
            .map(|r| Address::new(r.lines.iter().copied()))
            .collect::<Vec<_>>();
        debug!("Offline lookup found {} candidates", found.len());
        Ok(found)
    }
}

pub enum SimGeocoder {
    Offline(OfflineGeocoder),
    Network(NominatimGeocoder),
}

impl SimGeocoder {
    /// `offline` or `nominatim`
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "offline" => Ok(Self::Offline(OfflineGeocoder)),
            "nominatim" => Ok(Self::Network(NominatimGeocoder::new()?)),
            other => bail!("Unknown geocoder {other}, expected offline or nominatim"),
        }
    }
}

impl Geocoder for SimGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Address>> {
        match self {
            Self::Offline(geocoder) => geocoder.reverse_geocode(coordinate).await,
            Self::Network(geocoder) => geocoder.reverse_geocode(coordinate).await,
        }
    }
}
