// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ObjectStore`] for unit tests.
//!
//! Models the API server behaviour the aggregators depend on:
//! - `resourceVersion` bumps on every write and stale writes fail with a conflict
//! - `replace` leaves status untouched, `replace_status` touches only status
//! - deleting an object with finalizers only sets `deletionTimestamp`; the object
//!   disappears once a write clears its last finalizer

use super::ObjectStore;
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

type Hook<K> = Box<dyn Fn(&mut K) + Send + Sync>;

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    version: AtomicU64,
    writes: AtomicUsize,
    failing_writes: AtomicUsize,
    on_create: Option<Hook<K>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(1),
            writes: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
            on_create: None,
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` on every created object, e.g. to allocate a cluster IP.
    pub fn with_on_create(hook: impl Fn(&mut K) + Send + Sync + 'static) -> Self {
        Self {
            on_create: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    /// Insert an object without counting it as a write.
    pub fn seed(&self, mut object: K) -> K {
        let namespace = object.namespace().unwrap_or_default();
        object.meta_mut().resource_version = Some(self.next_version());
        self.objects
            .lock()
            .unwrap()
            .insert((namespace, object.name_any()), object.clone());
        object
    }

    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Number of successful create/replace/replace_status/delete calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the next `count` writes with a conflict.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn next_version(&self) -> String {
        self.version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn conflict(namespace: &str, name: &str) -> StoreError {
        StoreError::Conflict {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn not_found(namespace: &str, name: &str) -> StoreError {
        StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn injected_failure(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let remaining = self.failing_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(Self::conflict(namespace, name));
        }
        Ok(())
    }

    fn check_version(stored: &K, incoming: &K, namespace: &str) -> Result<(), StoreError> {
        if incoming.resource_version().is_some()
            && incoming.resource_version() != stored.resource_version()
        {
            return Err(Self::conflict(namespace, &incoming.name_any()));
        }
        Ok(())
    }

    /// `target` with the `status` of `source`.
    fn with_status_of(target: &K, source: &K) -> Result<K, StoreError> {
        let mut body = serde_json::to_value(target)?;
        let status = serde_json::to_value(source)?.get("status").cloned();
        if let Some(map) = body.as_object_mut() {
            match status {
                Some(status) => {
                    map.insert("status".to_string(), status);
                }
                None => {
                    map.remove("status");
                }
            }
        }
        Ok(serde_json::from_value(body)?)
    }

    fn mark_deleting(object: &K) -> Result<K, StoreError> {
        let mut body = serde_json::to_value(object)?;
        body["metadata"]["deletionTimestamp"] = json!("2025-01-01T00:00:00Z");
        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.object(namespace, name))
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        self.injected_failure(namespace, &name)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: K::kind(&()).to_string(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut created = object.clone();
        created.meta_mut().namespace = Some(namespace.to_string());
        created.meta_mut().resource_version = Some(self.next_version());
        if let Some(hook) = &self.on_create {
            hook(&mut created);
        }
        objects.insert(key, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        self.injected_failure(namespace, &name)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        let stored = objects
            .get(&key)
            .ok_or_else(|| Self::not_found(namespace, &name))?;
        Self::check_version(stored, object, namespace)?;

        let mut replaced = Self::with_status_of(object, stored)?;
        replaced.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        replaced.meta_mut().resource_version = Some(self.next_version());
        self.writes.fetch_add(1, Ordering::SeqCst);

        if replaced.meta().deletion_timestamp.is_some() && replaced.finalizers().is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, replaced.clone());
        }
        Ok(replaced)
    }

    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        self.injected_failure(namespace, &name)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        let stored = objects
            .get(&key)
            .ok_or_else(|| Self::not_found(namespace, &name))?;
        Self::check_version(stored, object, namespace)?;

        let mut updated = Self::with_status_of(stored, object)?;
        updated.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, updated.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError> {
        self.injected_failure(namespace, name)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let Some(stored) = objects.get(&key) else {
            return Ok(false);
        };

        if stored.finalizers().is_empty() {
            objects.remove(&key);
        } else {
            let mut deleting = Self::mark_deleting(stored)?;
            deleting.meta_mut().resource_version = Some(self.next_version());
            objects.insert(key, deleting);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
