// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

use super::{AccountStore, ConnectionStore, StoreError};
use crate::auth::Account;
use crate::connection::ConnectionRecord;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const CONNECTIONS_TREE: &str = "connections";
const ACCOUNTS_TREE: &str = "accounts";

/// Durable store on an embedded sled database.
///
/// Values are JSON documents keyed by target / username.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    connections: sled::Tree,
    accounts: sled::Tree,
}

impl SledStore {
    /// Open (or create) the database directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), "Opened sled store");
        Self::from_db(db)
    }

    /// A throwaway database removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let connections = db.open_tree(CONNECTIONS_TREE)?;
        let accounts = db.open_tree(ACCOUNTS_TREE)?;
        Ok(Self {
            db,
            connections,
            accounts,
        })
    }

    /// Flush every tree to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for SledStore {
    async fn load(&self, target: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        match self.connections.get(target.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.connections.insert(record.target.as_bytes(), bytes)?;
        self.connections.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SledStore {
    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        match self.accounts.get(username.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        let bytes = serde_json::to_vec(account)?;
        let swapped = self.accounts.compare_and_swap(
            account.username.as_bytes(),
            None::<&[u8]>,
            Some(bytes),
        )?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.accounts.flush_async().await?;
        Ok(true)
    }

    async fn update_account(&self, account: &Account) -> Result<bool, StoreError> {
        let bytes = serde_json::to_vec(account)?;
        let replaced = self
            .accounts
            .update_and_fetch(account.username.as_bytes(), |old| {
                old.map(|_| bytes.clone())
            })?;
        if replaced.is_none() {
            return Ok(false);
        }
        self.accounts.flush_async().await?;
        Ok(true)
    }
}
