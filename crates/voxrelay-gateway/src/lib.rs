// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for VoxRelay.
//!
//! Exposes the webhook intake, the QR/session lifecycle endpoints, and the
//! status/health probes, all sharing one [`server::AppState`].

pub mod guard;
pub mod handlers;
pub mod server;

pub use guard::{CachedConnection, ConnectionGuard};
pub use server::{build_router, start_server, AppState};
