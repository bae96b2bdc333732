// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Two-phase deletion for guest objects.
//!
//! Guest objects that contribute to a host aggregate carry one of this
//! controller's finalizers, so their contribution can be withdrawn before the API
//! server forgets them. Where an object stands is derived entirely from its
//! metadata at reconcile time:
//!
//! ```text
//! Live ──(deletionTimestamp set)──▶ PendingDelete ──(cleanup, finalizer removed)──▶ Removed
//! ```
//!
//! Both aggregators drive the same machine with their own finalizer and cleanup.
//!
//! # Example
//!
//! ```rust,ignore
//! use nestlb::reconcilers::finalizers::{ensure_finalizer, remove_finalizer, Lifecycle};
//!
//! match Lifecycle::of(&svc, SERVICE_FINALIZER) {
//!     Lifecycle::Live => {
//!         let svc = ensure_finalizer(store, &svc, SERVICE_FINALIZER).await?;
//!         // normal reconciliation...
//!     }
//!     Lifecycle::PendingDelete => {
//!         // withdraw contribution, then release the object
//!         remove_finalizer(store, &svc, SERVICE_FINALIZER).await?;
//!     }
//!     Lifecycle::Removed => {}
//! }
//! ```

use crate::store::ObjectStore;
use anyhow::Result;
use kube::{Resource, ResourceExt};
use tracing::info;

/// Deletion state of a guest object with respect to one finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not being deleted
    Live,
    /// Being deleted and still held by our finalizer; cleanup must run
    PendingDelete,
    /// Being deleted and no longer held by us
    Removed,
}

impl Lifecycle {
    /// Derive the state from the object's deletion marker and finalizer list.
    #[must_use]
    pub fn of<K: Resource>(resource: &K, finalizer: &str) -> Self {
        if resource.meta().deletion_timestamp.is_none() {
            Lifecycle::Live
        } else if has_finalizer(resource, finalizer) {
            Lifecycle::PendingDelete
        } else {
            Lifecycle::Removed
        }
    }
}

/// Whether `finalizer` is present on `resource`.
#[must_use]
pub fn has_finalizer<K: Resource>(resource: &K, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Make the presence of `finalizer` on `resource` match `wanted`.
///
/// Writes only when the finalizer list changes. The write carries the object's
/// `resourceVersion`, so a concurrent modification surfaces as a conflict
/// instead of being overwritten.
///
/// # Returns
///
/// The object as stored after the call (the input if nothing was written).
///
/// # Errors
///
/// Returns an error if the replace fails, including optimistic-concurrency conflicts.
pub async fn set_finalizer<K>(
    store: &dyn ObjectStore<K>,
    resource: &K,
    finalizer: &str,
    wanted: bool,
) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    if has_finalizer(resource, finalizer) == wanted {
        return Ok(resource.clone());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    let mut updated = resource.clone();
    let mut finalizers = updated.meta().finalizers.clone().unwrap_or_default();
    if wanted {
        finalizers.push(finalizer.to_string());
    } else {
        finalizers.retain(|f| f != finalizer);
    }
    updated.meta_mut().finalizers = Some(finalizers);

    let stored = store.replace(&namespace, &updated).await?;
    info!(
        "{} finalizer {} {} {}/{}",
        if wanted { "Added" } else { "Removed" },
        finalizer,
        if wanted { "to" } else { "from" },
        namespace,
        name
    );
    Ok(stored)
}

/// Add `finalizer` to `resource` if not already present.
///
/// # Errors
///
/// Returns an error if the replace fails.
pub async fn ensure_finalizer<K>(
    store: &dyn ObjectStore<K>,
    resource: &K,
    finalizer: &str,
) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    set_finalizer(store, resource, finalizer, true).await
}

/// Remove `finalizer` from `resource` if present.
///
/// On an object that is being deleted this releases it to the API server.
///
/// # Errors
///
/// Returns an error if the replace fails.
pub async fn remove_finalizer<K>(
    store: &dyn ObjectStore<K>,
    resource: &K,
    finalizer: &str,
) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    set_finalizer(store, resource, finalizer, false).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
