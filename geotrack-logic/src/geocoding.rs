use std::{fmt, sync::Arc};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{location::Coordinate, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A human readable address as returned by a geocoding provider
pub struct Address {
    pub lines: Vec<String>,
}

impl Address {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Some external service that can turn a coordinate into an address
pub trait Geocoder: Send + Sync + 'static {
    /// Get candidate addresses for `coordinate`, best match first. An empty list means the
    /// provider had nothing for this spot.
    fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Vec<Address>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a lookup couldn't produce an address
pub enum AddressFailure {
    /// The provider couldn't be reached or errored
    ServiceNotAvailable,
    /// The coordinate was out of range, the provider was never asked
    InvalidCoordinate,
    /// The provider answered but had no address
    NoAddressFound,
}

impl fmt::Display for AddressFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ServiceNotAvailable => "Service not available",
            Self::InvalidCoordinate => "Invalid latitude or longitude used",
            Self::NoAddressFound => "No address found",
        };
        write!(f, "{msg}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The outcome of one lookup, failures are shown inline in place of the address
pub enum AddressResult {
    Found(String),
    Failed(AddressFailure),
}

impl AddressResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl fmt::Display for AddressResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(address) => write!(f, "{address}"),
            Self::Failed(failure) => write!(f, "{failure}"),
        }
    }
}

/// Monotonic id handed out per dispatched lookup
pub type LookupId = u64;

#[derive(Debug, Clone, PartialEq)]
/// Sent exactly once by each spawned lookup
pub struct LookupCompletion {
    pub id: LookupId,
    pub coordinate: Coordinate,
    pub result: AddressResult,
}

pub type LookupSender = mpsc::Sender<LookupCompletion>;

/// Reverse geocode a single coordinate. Never fails, provider problems are turned into an
/// [AddressFailure].
pub async fn lookup_address<G: Geocoder>(geocoder: &G, coordinate: Coordinate) -> AddressResult {
    if !coordinate.is_valid() {
        warn!(
            "Invalid coordinate used for lookup: {}, {}",
            coordinate.lat, coordinate.long
        );
        return AddressResult::Failed(AddressFailure::InvalidCoordinate);
    }

    match geocoder.reverse_geocode(coordinate).await {
        Ok(addresses) => match addresses.into_iter().next() {
            Some(address) => AddressResult::Found(address.to_string()),
            None => {
                debug!(
                    "No address found for {}, {}",
                    coordinate.lat, coordinate.long
                );
                AddressResult::Failed(AddressFailure::NoAddressFound)
            }
        },
        Err(why) => {
            warn!("Geocoder unavailable: {why:?}");
            AddressResult::Failed(AddressFailure::ServiceNotAvailable)
        }
    }
}

/// Run a lookup off the calling task, the result is reported once on `done`
pub fn spawn_lookup<G: Geocoder>(
    geocoder: Arc<G>,
    id: LookupId,
    coordinate: Coordinate,
    done: LookupSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = lookup_address(geocoder.as_ref(), coordinate).await;
        let completion = LookupCompletion {
            id,
            coordinate,
            result,
        };
        if done.send(completion).await.is_err() {
            debug!("Tracker went away before lookup {id} finished");
        }
    })
}
