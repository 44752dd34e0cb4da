// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-identity connection ledger.
//!
//! A `ConnectionRecord` exists for every address or username the guard has
//! ever seen. Records cycle between active and banned; they are never removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted identity key (textual IPv6 address).
pub const MAX_TARGET_LEN: usize = 39;

/// Kind of identity a record is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Client network address
    Address,
    /// Authenticated username
    Username,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Username => write!(f, "username"),
        }
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "address" | "ip" => Ok(Self::Address),
            "username" => Ok(Self::Username),
            other => Err(format!("unknown target type: {other}")),
        }
    }
}

/// Stored state for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub target: String,
    pub target_type: TargetType,
    /// Number of bans ever applied; never decreases
    pub banned_turn: u32,
    /// Set while a ban is in force
    pub ban_expiry: Option<DateTime<Utc>>,
    /// Request instants inside the trailing window, oldest first
    pub recent_requests: Vec<DateTime<Utc>>,
}

impl ConnectionRecord {
    /// A fresh record whose window already holds the first request.
    pub fn new(target: impl Into<String>, target_type: TargetType, now: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            target_type,
            banned_turn: 0,
            ban_expiry: None,
            recent_requests: vec![now],
        }
    }

    /// End of the ban in force at `now`, if any.
    ///
    /// An expired `ban_expiry` is still stored until the next check lifts it.
    pub fn active_ban(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.ban_expiry.filter(|expiry| *expiry > now)
    }

    /// Drop timestamps older than `window` and append `now`.
    ///
    /// Returns the number of requests in the window including this one.
    pub fn access(&mut self, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        let cutoff = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.recent_requests.retain(|t| *t >= cutoff);
        self.recent_requests.push(now);
        self.recent_requests.len()
    }

    /// Start a ban lasting `duration` from `now`.
    ///
    /// A ban reaching past the representable range ends at `MAX_UTC`.
    pub fn ban(&mut self, now: DateTime<Utc>, duration: chrono::Duration) -> DateTime<Utc> {
        let until = now
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.recent_requests.clear();
        self.banned_turn = self.banned_turn.saturating_add(1);
        self.ban_expiry = Some(until);
        until
    }

    /// Lift the ban and count `now` as a fresh access.
    pub fn unban(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        self.ban_expiry = None;
        self.access(now, window);
    }
}
