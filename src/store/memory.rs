// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

use super::{AccountStore, ConnectionStore, StoreError};
use crate::auth::Account;
use crate::connection::ConnectionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    connections: RwLock<HashMap<String, ConnectionRecord>>,
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn load(&self, target: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        Ok(self.connections.read().await.get(target).cloned())
    }

    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        self.connections
            .write()
            .await
            .insert(record.target.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(username).cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Ok(false);
        }
        accounts.insert(account.username.clone(), account.clone());
        Ok(true)
    }

    async fn update_account(&self, account: &Account) -> Result<bool, StoreError> {
        match self.accounts.write().await.get_mut(&account.username) {
            Some(stored) => {
                *stored = account.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
