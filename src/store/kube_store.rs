// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API.

use super::ObjectStore;
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Store reaching one cluster through a `kube::Client`.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map API errors onto the store's optimistic-concurrency vocabulary.
fn classify<K>(err: kube::Error, namespace: &str, name: &str) -> StoreError
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&()).to_string();
    let (code, reason) = match &err {
        kube::Error::Api(ae) => (Some(ae.code), ae.reason.clone()),
        _ => (None, String::new()),
    };
    match code {
        Some(409) if reason == "AlreadyExists" => StoreError::AlreadyExists {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        Some(409) => StoreError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        Some(404) => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        _ => StoreError::Api(err),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "Creating");
        self.api(namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        debug!(
            kind = %K::kind(&()),
            namespace = %namespace,
            name = %name,
            resource_version = ?object.resource_version(),
            "Replacing"
        );
        self.api(namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        let body = serde_json::to_value(object)?;

        // resourceVersion in a merge patch makes the write conditional
        let patch = json!({
            "metadata": { "resourceVersion": object.resource_version() },
            "status": body.get("status").cloned().unwrap_or_default(),
        });
        self.api(namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(classify::<K>(e, namespace, name)),
        }
    }
}
