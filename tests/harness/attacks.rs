// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

use bookswap_server::TargetType;
use std::time::Duration;

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Requests per second rate, across all identities
    pub requests_per_second: f64,
    /// Number of unique identities to rotate through
    pub unique_identities: usize,
    /// Kind of identity being attacked
    pub target_type: TargetType,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_identities: 1,
            target_type: TargetType::Address,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single address flood - basic DoS from one client.
    pub fn single_address_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            ..Default::default()
        }
    }

    /// Stolen session hammering member endpoints.
    pub fn session_flood() -> Self {
        Self {
            total_requests: 120,
            requests_per_second: 40.0,
            target_type: TargetType::Username,
            ..Default::default()
        }
    }

    /// Distributed attack - many addresses, low rate each.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 50.0,
            unique_identities: 100,
            ..Default::default()
        }
    }

    /// Botnet where each member sits just over the threshold.
    pub fn botnet_burst() -> Self {
        Self {
            total_requests: 600,
            requests_per_second: 600.0,
            unique_identities: 50,
            ..Default::default()
        }
    }

    /// Slow drip - stay just under the threshold.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 4.5,
            ..Default::default()
        }
    }

    /// Calculate expected duration for the attack.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_requests as f64 / self.requests_per_second)
    }

    /// Offset of request `index` from the start of the attack.
    pub fn offset(&self, index: usize) -> chrono::Duration {
        chrono::Duration::microseconds((index as f64 * 1_000_000.0 / self.requests_per_second) as i64)
    }
}
