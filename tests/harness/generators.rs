// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use bookswap_server::TargetType;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate a pool of usernames for testing.
pub fn generate_usernames(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("reader{i:04}")).collect()
}

/// Identities of the given kind.
pub fn generate_identities(count: usize, target_type: TargetType) -> Vec<String> {
    match target_type {
        TargetType::Address => generate_ips(count).iter().map(|ip| ip.to_string()).collect(),
        TargetType::Username => generate_usernames(count),
    }
}

/// Identities an upstream proxy should never be able to hand the guard.
pub fn generate_malformed_targets() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        " 10.0.0.1".to_string(),
        "10.0.0.1\n".to_string(),
        "a".repeat(40),
        "f".repeat(1024),
    ]
}
