// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create-or-update and delete helpers for host objects.
//!
//! Host objects are written with a fetch-mutate-write cycle:
//!
//! 1. **Fetch** the live object, or start from an initial object if it is missing
//! 2. **Mutate** a copy with a pure function producing the desired state
//! 3. **Diff** the result against the live object and write only if it changed
//!
//! Updates carry the `resourceVersion` of the fetched object, so a concurrent
//! writer causes a conflict error instead of a lost update.
//!
//! # Example
//!
//! ```rust,ignore
//! use nestlb::reconcilers::resources::create_or_update;
//!
//! let (svc, result) = create_or_update(store, "guests", initial, |svc| {
//!     svc.spec.get_or_insert_with(Default::default).ports = Some(ports.clone());
//! })
//! .await?;
//! ```

use crate::metrics;
use crate::reconcilers::wait::wait_for;
use crate::store::ObjectStore;
use anyhow::Result;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// What a create-or-update call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    /// The live object already matched; nothing was written
    Unchanged,
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationResult::Created => "created",
            OperationResult::Updated => "updated",
            OperationResult::Unchanged => "unchanged",
        })
    }
}

/// Create `initial` (after applying `mutate`) or update the live object with `mutate`.
///
/// # Arguments
///
/// * `store` - Store holding the object
/// * `namespace` - Namespace of the object
/// * `initial` - Object to create when none exists; its name identifies the object
/// * `mutate` - Pure function bringing an object to its desired state
///
/// # Returns
///
/// The stored object and what was done to it.
///
/// # Errors
///
/// Returns an error if the fetch or write fails, including conflicts.
pub async fn create_or_update<K, F>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    initial: K,
    mutate: F,
) -> Result<(K, OperationResult)>
where
    K: Resource<DynamicType = ()> + Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&mut K),
{
    let name = initial.name_any();
    let kind = K::kind(&()).to_string();

    let (stored, result) = match store.get(namespace, &name).await? {
        None => {
            let mut desired = initial;
            mutate(&mut desired);
            let created = store.create(namespace, &desired).await?;
            info!("Created {} {}/{}", kind, namespace, name);
            (created, OperationResult::Created)
        }
        Some(live) => {
            let mut desired = live.clone();
            mutate(&mut desired);
            if desired == live {
                debug!("{} {}/{} is up to date", kind, namespace, name);
                (live, OperationResult::Unchanged)
            } else {
                let updated = store.replace(namespace, &desired).await?;
                info!("Updated {} {}/{}", kind, namespace, name);
                (updated, OperationResult::Updated)
            }
        }
    };

    metrics::record_host_operation(&kind, &result.to_string());
    Ok((stored, result))
}

/// Delete an object and wait until the store no longer returns it.
///
/// A missing object is not an error.
///
/// # Returns
///
/// `true` if a delete was issued, `false` if the object was already gone.
///
/// # Errors
///
/// Returns an error if the delete or a poll fails, or the object is still
/// present after `deadline`.
pub async fn delete_and_wait<K>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
    interval: Duration,
    deadline: Duration,
) -> Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    let kind = K::kind(&()).to_string();
    let deleted = store.delete(namespace, name).await?;
    if !deleted {
        debug!("{} {}/{} already absent", kind, namespace, name);
        return Ok(false);
    }

    info!("Deleting {} {}/{}", kind, namespace, name);
    let what = format!("deletion of {kind} {namespace}/{name}");
    wait_for(&what, interval, deadline, || async move {
        Ok(store.get(namespace, name).await?.is_none().then_some(()))
    })
    .await?;

    metrics::record_host_operation(&kind, "deleted");
    info!("Deleted {} {}/{}", kind, namespace, name);
    Ok(true)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
