// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the projection engine.
//!
//! This module provides specialized error types for:
//! - Host object store operations (optimistic-concurrency conflicts, API failures)
//! - Configuration inconsistencies in the ingress class mapping table
//! - Waits on host objects that exceeded their deadline
//!
//! Reconcilers return `anyhow::Result` and wrap these types, so the controller's
//! error policy can inspect the cause with `downcast_ref` when it needs to.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object was modified since it was read (HTTP 409 on update)
    ///
    /// Writes carry the `resourceVersion` they were based on. A conflict means
    /// another writer got there first; the reconcile must be retried from a fresh read.
    #[error("{kind} {namespace}/{name} was modified concurrently (resourceVersion conflict)")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Create was issued for an object that already exists (HTTP 409 on create)
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The object to replace no longer exists (HTTP 404 on update)
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The object could not be encoded for a write
    #[error("Failed to encode object: {0}")]
    Encode(#[from] serde_json::Error),

    /// Any other Kubernetes API failure (network, rate limiting, server errors)
    #[error(transparent)]
    Api(#[from] kube::Error),
}

/// Errors raised while projecting guest objects onto host objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// A class mapping names neither a NodePort nor a HostPort locator (or both)
    ///
    /// There is no terminal-failure channel, so this is retried like a transient
    /// error until the configuration is fixed.
    #[error("Ingress class mapping '{class}' is invalid: {reason}")]
    InvalidClassMapping {
        /// Guest ingress class
        class: String,
        /// What is wrong with the mapping
        reason: String,
    },

    /// A guest object arrived without a name or namespace
    #[error("{kind} is missing metadata.{field}")]
    MissingIdentity {
        /// Kind of the object
        kind: String,
        /// The missing metadata field
        field: String,
    },

    /// A wait on a host object did not finish before its deadline
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    WaitTimeout {
        /// Description of the awaited condition
        what: String,
        /// How long the wait ran
        elapsed: Duration,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
