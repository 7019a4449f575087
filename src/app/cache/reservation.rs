//! Per-path reservations preventing duplicate fetches
//!
//! A reservation is an owned lock on one destination path. Holding it means
//! the holder is the only task producing that file; dropping it lets the
//! next waiter in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

/// Outcome of [`LocalCache::check_and_reserve`](super::LocalCache::check_and_reserve)
#[derive(Debug)]
pub enum ReservationStatus {
    /// Destination already present, nothing to do
    AlreadyExists,
    /// Caller now owns the destination and must produce it
    Reserved(ReservationGuard),
}

impl ReservationStatus {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationStatus::Reserved(_))
    }
}

/// Exclusive hold on one destination path, released on drop
#[derive(Debug)]
pub struct ReservationGuard {
    path: PathBuf,
    waited: Duration,
    _lock: OwnedMutexGuard<()>,
}

impl ReservationGuard {
    pub(super) fn new(path: PathBuf, waited: Duration, lock: OwnedMutexGuard<()>) -> Self {
        Self {
            path,
            waited,
            _lock: lock,
        }
    }

    /// Reserved destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time spent waiting for another holder to finish
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Registry entry; the mutex is shared by every task reserving the path
pub(super) type PathLock = Arc<tokio::sync::Mutex<()>>;
