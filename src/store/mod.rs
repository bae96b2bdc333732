// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store seam between the aggregators and the Kubernetes API.
//!
//! Both the guest cluster (where `Service`s and `Ingress`es are watched) and the
//! host cluster (where aggregated objects are written) are reached through
//! [`ObjectStore`]. Writes are optimistic: `replace` and `replace_status` carry
//! the `resourceVersion` of the object they were based on and fail with
//! [`StoreError::Conflict`] when it is stale.
//!
//! - [`KubeStore`] - backed by a `kube::Client`
//! - `memory::MemoryStore` - in-process store used by unit tests

mod kube_store;

#[cfg(test)]
pub mod memory;

pub use kube_store::KubeStore;

use crate::errors::StoreError;
use async_trait::async_trait;
use kube::Resource;

/// Namespaced object access with optimistic-concurrency writes.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Create an object.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an object's metadata and spec.
    ///
    /// Fails with [`StoreError::Conflict`] if `object`'s `resourceVersion` is stale.
    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an object's status subresource.
    ///
    /// Fails with [`StoreError::Conflict`] if `object`'s `resourceVersion` is stale.
    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Delete an object; `Ok(false)` if it was already gone.
    ///
    /// Objects carrying finalizers are only marked for deletion.
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError>;
}
