// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of guest objects onto host objects.
//!
//! Two aggregators project many guest objects onto few host objects:
//!
//! 1. **Watch** - the dispatcher delivers the key of every changed guest object
//! 2. **Index** - the aggregator updates its in-memory indexes for that key
//! 3. **Regenerate** - the aggregate host object is rebuilt from the whole index
//! 4. **Write back** - LoadBalancer guest Services get the host address in their status
//!
//! # Available Aggregators
//!
//! - [`ServiceAggregator`] - guest `Service` node ports onto the host load-balancer `Service`
//! - [`IngressAggregator`] - guest `Ingress` paths onto one host `Ingress` per ingress class
//!
//! # Example: Reconciling a guest Service
//!
//! ```rust,no_run
//! use nestlb::context::Context;
//! use nestlb::reconcilers::{ObjectKey, ServiceAggregator};
//!
//! async fn reconcile_one(ctx: Context) -> anyhow::Result<()> {
//!     let aggregator = ServiceAggregator::new(ctx);
//!     aggregator.reconcile(&ObjectKey::new("default", "web")).await?;
//!     Ok(())
//! }
//! ```

pub mod finalizers;
pub mod ingress;
pub mod loadbalancer;
pub mod resources;
pub mod retry;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use ingress::IngressAggregator;
pub use loadbalancer::ServiceAggregator;

use crate::errors::ProjectionError;
use kube::Resource;
use std::fmt;

/// Identity of a guest object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::MissingIdentity`] if the object has no name or namespace.
    pub fn from_resource<K: Resource<DynamicType = ()>>(
        resource: &K,
    ) -> Result<Self, ProjectionError> {
        let missing = |field: &str| ProjectionError::MissingIdentity {
            kind: K::kind(&()).to_string(),
            field: field.to_string(),
        };
        let meta = resource.meta();
        let namespace = meta.namespace.clone().ok_or_else(|| missing("namespace"))?;
        let name = meta.name.clone().ok_or_else(|| missing("name"))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What a reconcile did with its object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The guest object no longer exists
    NotFound,
    /// The guest object is not managed by this aggregator
    Unmanaged,
    /// Indexes and host objects were brought up to date
    Reconciled,
    /// The guest object's contribution was withdrawn and it was released for deletion
    Deleted,
}
