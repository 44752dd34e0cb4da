// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for connection guard attack simulation.
//!
//! Attacks are replayed against a manual clock, so request rates are exact
//! and a simulated hour costs nothing.

pub mod attacks;
pub mod generators;
pub mod metrics;
