// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistence for connection records and accounts.
//!
//! Both backends replace a record with a single write, so a reader never
//! observes a half-applied transition.

mod memory;
mod disk;

pub use self::memory::MemoryStore;
pub use self::disk::SledStore;

use crate::auth::Account;
use crate::connection::ConnectionRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Storage failure. Callers treat every variant as fatal to the request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Corrupt stored value: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Keyed access to `ConnectionRecord`s.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Fetch the record for `target`, if one exists.
    async fn load(&self, target: &str) -> Result<Option<ConnectionRecord>, StoreError>;

    /// Insert or fully replace the record stored under `record.target`.
    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError>;
}

/// Keyed access to registered accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Store a new account. Returns `false` when the username is already taken.
    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError>;

    /// Replace an existing account. Returns `false` when no such username exists.
    async fn update_account(&self, account: &Account) -> Result<bool, StoreError>;
}
