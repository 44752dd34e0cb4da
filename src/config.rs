// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the bookswap server.
//!
//! Every field has a default; `Config::from_env` overlays the process
//! environment (after `.env` has been loaded by the binary).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Longest accepted counting window (one day).
pub const MAX_WINDOW_MS: u64 = 86_400_000;

/// Longest accepted ban (one year).
pub const MAX_BAN_SECS: u64 = 31_536_000;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Connection guard configuration
    #[serde(default)]
    pub guard: GuardConfig,

    /// Session token configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Allowed CORS origins; empty disables cross-origin access
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Shared secret for `POST /check`; the route is not mounted without it
    #[serde(default)]
    pub check_token: Option<String>,
}

/// Sliding-window and ban settings for the connection guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Requests allowed inside one window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in milliseconds (default: 1000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Ban length in seconds (default: 3600)
    #[serde(default = "default_ban_secs")]
    pub ban_secs: u64,

    /// Take the client address from the right-most X-Forwarded-For hop
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// JWT session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(default)]
    pub jwt_secret: String,

    /// Issuer claim (default: bookswap)
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Token lifetime in days (default: 7)
    #[serde(default = "default_jwt_expire_days")]
    pub jwt_expire_days: i64,
}

/// Where connection and account records live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled directory; `None` keeps everything in memory
    #[serde(default)]
    pub path: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    1000
}

fn default_ban_secs() -> u64 {
    3600
}

fn default_jwt_issuer() -> String {
    "bookswap".to_string()
}

fn default_jwt_expire_days() -> i64 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            guard: GuardConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            cors_origins: Vec::new(),
            check_token: None,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            ban_secs: default_ban_secs(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: default_jwt_issuer(),
            jwt_expire_days: default_jwt_expire_days(),
        }
    }
}

impl GuardConfig {
    /// Get the counting window, capped at `MAX_WINDOW_MS`
    pub fn window(&self) -> chrono::Duration {
        let ms = i64::try_from(self.window_ms.min(MAX_WINDOW_MS)).unwrap_or(i64::MAX);
        chrono::Duration::try_milliseconds(ms).unwrap_or_else(chrono::Duration::zero)
    }

    /// Get the ban length, kept within one second and `MAX_BAN_SECS`
    pub fn ban_duration(&self) -> chrono::Duration {
        let secs = i64::try_from(self.ban_secs.clamp(1, MAX_BAN_SECS)).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).unwrap_or_else(|| chrono::Duration::seconds(1))
    }

    /// Pull out-of-range durations back into bounds, logging each change.
    pub fn sanitized(mut self) -> Self {
        if self.window_ms > MAX_WINDOW_MS {
            warn!(
                window_ms = self.window_ms,
                max = MAX_WINDOW_MS,
                "GUARD_WINDOW_MS too large, capped"
            );
            self.window_ms = MAX_WINDOW_MS;
        }
        let ban_secs = self.ban_secs.clamp(1, MAX_BAN_SECS);
        if ban_secs != self.ban_secs {
            warn!(
                ban_secs = self.ban_secs,
                clamped = ban_secs,
                "GUARD_BAN_SECS out of range, clamped"
            );
            self.ban_secs = ban_secs;
        }
        self
    }

    /// How often the maintenance task prunes idle identity locks
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(60)
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            guard: GuardConfig {
                max_requests: env_parse("GUARD_MAX_REQUESTS")
                    .unwrap_or(defaults.guard.max_requests),
                window_ms: env_parse("GUARD_WINDOW_MS").unwrap_or(defaults.guard.window_ms),
                ban_secs: env_parse("GUARD_BAN_SECS").unwrap_or(defaults.guard.ban_secs),
                trust_forwarded_for: env_parse("TRUST_FORWARDED_FOR")
                    .unwrap_or(defaults.guard.trust_forwarded_for),
            }
            .sanitized(),
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").unwrap_or(defaults.auth.jwt_secret),
                jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.auth.jwt_issuer),
                jwt_expire_days: env_parse("JWT_EXPIRE_DAYS")
                    .unwrap_or(defaults.auth.jwt_expire_days),
            },
            storage: StorageConfig {
                path: std::env::var("STORAGE_PATH").ok().filter(|p| !p.is_empty()),
            },
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            check_token: std::env::var("CHECK_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
