// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bookswap Server
//!
//! Backend for a secondhand-book marketplace, fronted by a per-identity
//! connection guard:
//!
//! - Anonymous endpoints are keyed on the client network address
//! - Member endpoints are keyed on the authenticated username
//! - More than 5 requests inside a sliding 1s window bans the identity for 1h
//! - Storage failures reject the request (fail closed)

pub mod auth;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod store;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use connection::{ConnectionRecord, TargetType};
pub use error::AppError;
pub use guard::{ConnectionGuard, Decision};
pub use store::{AccountStore, ConnectionStore, MemoryStore, SledStore, StoreError};
