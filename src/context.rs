// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for both aggregators.
//!
//! The context bundles the release configuration with the four object stores
//! the projection engine reads and writes:
//! - guest `Service`s and `Ingress`es (watched objects, finalizers and status)
//! - host `Service`s and `Ingress`es (aggregated objects)

use crate::config::{ControllerSettings, ReleaseConfig};
use crate::store::{KubeStore, ObjectStore};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use std::sync::Arc;

/// Shared, read-only context passed to both aggregators.
#[derive(Clone)]
pub struct Context {
    /// Release configuration loaded at startup
    pub config: Arc<ReleaseConfig>,

    pub guest_services: Arc<dyn ObjectStore<Service>>,
    pub guest_ingresses: Arc<dyn ObjectStore<Ingress>>,
    pub host_services: Arc<dyn ObjectStore<Service>>,
    pub host_ingresses: Arc<dyn ObjectStore<Ingress>>,
}

impl Context {
    /// Build a context talking to real clusters.
    #[must_use]
    pub fn new(config: ReleaseConfig, guest: Client, host: Client) -> Self {
        Self {
            config: Arc::new(config),
            guest_services: Arc::new(KubeStore::<Service>::new(guest.clone())),
            guest_ingresses: Arc::new(KubeStore::<Ingress>::new(guest)),
            host_services: Arc::new(KubeStore::<Service>::new(host.clone())),
            host_ingresses: Arc::new(KubeStore::<Ingress>::new(host)),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.config.controller
    }

    /// Host namespace every aggregated object is written to.
    #[must_use]
    pub fn host_namespace(&self) -> &str {
        &self.config.namespace
    }
}
