// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-slot connection setup guard.
//!
//! At most one QR/pairing setup flow may run at a time. A second caller
//! gets an immediate "in progress" answer instead of queueing behind the
//! first. The guard also caches the last known connection snapshot so
//! health checks never have to touch the network.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, TryLockError};

use voxrelay_core::ConnectionStatus;

/// Last observed connection state, updated by status polls and webhook
/// `connection.update` events.
#[derive(Debug, Clone)]
pub struct CachedConnection {
    /// Last known gateway connection status.
    pub status: ConnectionStatus,
    /// Most recent QR code (base64 PNG), if one is outstanding.
    pub qr: Option<String>,
    /// When the snapshot was last refreshed.
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for CachedConnection {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Unknown,
            qr: None,
            last_checked: None,
        }
    }
}

/// Serializes connection setup and caches the latest snapshot.
pub struct ConnectionGuard {
    setup: Mutex<()>,
    cached: RwLock<CachedConnection>,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        Self {
            setup: Mutex::new(()),
            cached: RwLock::new(CachedConnection::default()),
        }
    }

    /// Try to acquire the setup slot without waiting.
    ///
    /// Returns an error when another setup flow is already running.
    pub fn try_begin_setup(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, TryLockError> {
        self.setup.try_lock()
    }

    /// Snapshot of the cached connection state.
    pub fn cached(&self) -> CachedConnection {
        match self.cached.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Record a fresh status observation. Clears any cached QR once the
    /// connection is open.
    pub fn record_status(&self, status: ConnectionStatus) {
        let mut guard = match self.cached.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if status.is_open() {
            guard.qr = None;
        }
        guard.status = status;
        guard.last_checked = Some(Utc::now());
    }

    /// Record a freshly issued QR code.
    pub fn record_qr(&self, qr: Option<String>) {
        let mut guard = match self.cached.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.qr = qr;
        guard.last_checked = Some(Utc::now());
    }
}

impl Default for ConnectionGuard {
    fn default() -> Self {
        Self::new()
    }
}
