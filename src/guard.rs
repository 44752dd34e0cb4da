// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window connection guard.
//!
//! Every request is attributed to an identity (client address or username).
//! An identity may make `max_requests` requests inside the trailing window;
//! the request that goes over starts a ban, and every request during the ban
//! is rejected without being counted.
//!
//! The load-evaluate-save sequence for one identity runs under that
//! identity's lock, so concurrent bursts cannot both slip under the
//! threshold or stack two bans.

use crate::clock::Clock;
use crate::config::GuardConfig;
use crate::connection::{ConnectionRecord, TargetType};
use crate::metrics::Metrics;
use crate::store::{ConnectionStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    /// This request went over the threshold and started a ban
    Throttled {
        /// When the new ban ends
        until: DateTime<Utc>,
    },
    /// Identity is already serving a ban
    Banned {
        /// When the ban ends
        until: DateTime<Utc>,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Ban end for rejected decisions.
    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Allowed { .. } => None,
            Self::Throttled { until } | Self::Banned { until } => Some(*until),
        }
    }

    /// Time left until the identity may retry, rounded up to whole seconds.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.until().map(|until| {
            let left = (until - now).num_milliseconds().max(0) as u64;
            Duration::from_secs(left.div_ceil(1000))
        })
    }

    /// Stable lowercase name, used as a metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed { .. } => "allowed",
            Self::Throttled { .. } => "throttled",
            Self::Banned { .. } => "banned",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed { .. } => write!(f, "Request allowed"),
            Self::Throttled { .. } => write!(f, "Request rate exceeded, ban started"),
            Self::Banned { .. } => write!(f, "Identity is banned"),
        }
    }
}

/// Per-identity request guard.
pub struct ConnectionGuard {
    config: GuardConfig,
    store: Arc<dyn ConnectionStore>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
    /// One mutex per identity with an in-flight or recent check
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConnectionGuard {
    pub fn new(config: GuardConfig, store: Arc<dyn ConnectionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            metrics: None,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Count decisions and storage failures in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Current time as seen by the guard.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Decide whether `target` may proceed, recording the attempt.
    ///
    /// A storage failure is returned as an error; callers must reject the
    /// request in that case.
    pub async fn check(&self, target: &str, target_type: TargetType) -> Result<Decision, StoreError> {
        let lock = self.lock_for(target).await;
        let _held = lock.lock().await;

        let now = self.clock.now();
        let result = self.evaluate(target, target_type, now).await;

        match &result {
            Ok(decision) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decision(decision);
                }
            }
            Err(err) => {
                error!(
                    identity = %target,
                    %target_type,
                    error = %err,
                    "Guard storage failure, rejecting request"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_storage_error();
                }
            }
        }
        result
    }

    async fn evaluate(
        &self,
        target: &str,
        target_type: TargetType,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let (mut record, count) = match self.store.load(target).await? {
            None => {
                debug!(identity = %target, %target_type, "First request from identity");
                (ConnectionRecord::new(target, target_type, now), 1)
            }
            Some(mut record) => {
                if let Some(until) = record.active_ban(now) {
                    debug!(identity = %target, %until, "Identity still banned");
                    return Ok(Decision::Banned { until });
                }
                if record.ban_expiry.is_some() {
                    record.unban(now, self.config.window());
                    self.store.save(&record).await?;
                    info!(
                        identity = %target,
                        banned_turn = record.banned_turn,
                        "Ban expired, identity unbanned"
                    );
                    return Ok(Decision::Allowed {
                        remaining: self.remaining(record.recent_requests.len()),
                    });
                }
                let count = record.access(now, self.config.window());
                (record, count)
            }
        };

        if count > self.config.max_requests as usize {
            let until = record.ban(now, self.config.ban_duration());
            self.store.save(&record).await?;
            warn!(
                identity = %target,
                target_type = %record.target_type,
                requests = count,
                banned_turn = record.banned_turn,
                %until,
                "Request rate exceeded, identity banned"
            );
            return Ok(Decision::Throttled { until });
        }

        self.store.save(&record).await?;
        let remaining = self.remaining(count);
        debug!(identity = %target, remaining, "Request allowed");
        Ok(Decision::Allowed { remaining })
    }

    /// Ban `target` immediately, creating its record if needed.
    pub async fn ban_target(
        &self,
        target: &str,
        target_type: TargetType,
    ) -> Result<ConnectionRecord, StoreError> {
        let lock = self.lock_for(target).await;
        let _held = lock.lock().await;

        let now = self.clock.now();
        let mut record = self
            .store
            .load(target)
            .await?
            .unwrap_or_else(|| ConnectionRecord::new(target, target_type, now));
        let until = record.ban(now, self.config.ban_duration());
        self.store.save(&record).await?;

        warn!(
            identity = %target,
            banned_turn = record.banned_turn,
            %until,
            "Identity banned by operator"
        );
        Ok(record)
    }

    /// Lift the ban on `target`. Returns `false` if it was not banned.
    pub async fn unban_target(&self, target: &str) -> Result<bool, StoreError> {
        let lock = self.lock_for(target).await;
        let _held = lock.lock().await;

        let Some(mut record) = self.store.load(target).await? else {
            return Ok(false);
        };
        if record.ban_expiry.is_none() {
            return Ok(false);
        }

        record.unban(self.clock.now(), self.config.window());
        self.store.save(&record).await?;
        info!(identity = %target, banned_turn = record.banned_turn, "Identity unbanned by operator");
        Ok(true)
    }

    /// Stored state for `target`.
    pub async fn record(&self, target: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        self.store.load(target).await
    }

    /// Drop locks no check is holding. Returns how many remain.
    pub async fn prune_locks(&self) -> usize {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        debug!(pruned = before - locks.len(), "Pruned identity locks");
        locks.len()
    }

    async fn lock_for(&self, target: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(target) {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write().await;
        Arc::clone(locks.entry(target.to_string()).or_default())
    }

    fn remaining(&self, count: usize) -> u32 {
        (self.config.max_requests as usize).saturating_sub(count) as u32
    }
}
