use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, specta::Type)]
pub enum PermissionKind {
    /// Precise (GPS) location
    FineLocation,
    /// Approximate (network) location
    CoarseLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// The platform's permission system
pub trait PermissionService: Send + Sync {
    /// Check if `kind` is currently granted, this should never prompt the user
    fn check(&self, kind: PermissionKind) -> PermissionStatus;
    /// Prompt the user for `kind`, resolves once they answer
    fn request(&self, kind: PermissionKind) -> impl Future<Output = PermissionStatus> + Send;
}

/// Guards subscribing to location updates behind the location permissions, and makes sure
/// only one request is ever out at a time.
pub struct PermissionGate<P: PermissionService> {
    permissions: P,
    pending: AtomicBool,
}

impl<P: PermissionService> PermissionGate<P> {
    pub fn new(permissions: P) -> Self {
        Self {
            permissions,
            pending: AtomicBool::new(false),
        }
    }

    /// Either fine or coarse location is enough to subscribe
    pub fn can_track(&self) -> bool {
        self.permissions
            .check(PermissionKind::FineLocation)
            .is_granted()
            || self
                .permissions
                .check(PermissionKind::CoarseLocation)
                .is_granted()
    }

    /// The toggle asks for fine location specifically
    pub fn can_toggle(&self) -> bool {
        self.permissions
            .check(PermissionKind::FineLocation)
            .is_granted()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Ask the user for fine location. Returns `None` if a request is already waiting on the
    /// user, the caller of that one will receive the answer.
    pub async fn request(&self) -> Option<PermissionStatus> {
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("Permission request already pending");
            return None;
        }

        let status = self.permissions.request(PermissionKind::FineLocation).await;
        self.pending.store(false, Ordering::Release);
        Some(status)
    }

    pub fn inner(&self) -> &P {
        &self.permissions
    }
}
