// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic port names for the host load-balancer service.
//!
//! The release chart renders the same names when it pre-declares ports, so the
//! input string and checksum must stay exactly as they are:
//!
//! ```text
//! np-0x<8 lowercase hex digits of Adler-32("{namespace}/{name}/{port}")>
//! ```
//!
//! where `{port}` is the guest port's name, or its decimal port number when the
//! port is unnamed.

use crate::constants::PORT_NAME_PREFIX;
use adler2::Adler32;
use k8s_openapi::api::core::v1::ServicePort;

/// Compute the host port name for a guest service port.
///
/// # Example
///
/// ```rust
/// use k8s_openapi::api::core::v1::ServicePort;
/// use nestlb::naming::port_name;
///
/// let port = ServicePort {
///     name: Some("http".to_string()),
///     port: 80,
///     ..Default::default()
/// };
/// assert_eq!(port_name("ns1", "svc1", &port), "np-0x1fcd04ae");
/// ```
#[must_use]
pub fn port_name(namespace: &str, name: &str, port: &ServicePort) -> String {
    match port.name.as_deref() {
        Some(port_name) if !port_name.is_empty() => {
            checksum_name(&format!("{namespace}/{name}/{port_name}"))
        }
        _ => checksum_name(&format!("{namespace}/{name}/{}", port.port)),
    }
}

/// Adler-32 of `input`, formatted as a port name.
#[must_use]
pub fn checksum_name(input: &str) -> String {
    let mut hasher = Adler32::new();
    hasher.write_slice(input.as_bytes());
    format!("{PORT_NAME_PREFIX}{:08x}", hasher.checksum())
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
