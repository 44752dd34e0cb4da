// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for guard decisions.

use crate::guard::Decision;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Guard counters and the registry that exposes them.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    decisions: IntCounterVec,
    bans: IntCounter,
    storage_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new("guard_decisions_total", "Connection guard decisions by outcome"),
            &["decision"],
        )?;
        let bans = IntCounter::new("guard_bans_total", "Bans started by the connection guard")?;
        let storage_errors = IntCounter::new(
            "guard_storage_errors_total",
            "Guard checks rejected because storage failed",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(bans.clone()))?;
        registry.register(Box::new(storage_errors.clone()))?;

        Ok(Self {
            registry,
            decisions,
            bans,
            storage_errors,
        })
    }

    pub fn record_decision(&self, decision: &Decision) {
        self.decisions.with_label_values(&[decision.label()]).inc();
        if matches!(decision, Decision::Throttled { .. }) {
            self.bans.inc();
        }
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.inc();
    }

    /// Count of decisions recorded under `label`.
    pub fn decision_count(&self, label: &str) -> u64 {
        self.decisions.with_label_values(&[label]).get()
    }

    pub fn ban_count(&self) -> u64 {
        self.bans.get()
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<(String, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((
            encoder.format_type().to_string(),
            String::from_utf8_lossy(&buffer).into_owned(),
        ))
    }
}
