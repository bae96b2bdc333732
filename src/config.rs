// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Release configuration.
//!
//! The release that deploys the guest cluster renders a YAML file describing the
//! host load-balancer service and the ingress class mapping table. This module
//! loads it once at startup; it is read-only afterwards.
//!
//! # Example
//!
//! ```yaml
//! releaseName: dev
//! namespace: guests
//! loadBalancer:
//!   serviceName: dev-lb
//!   selector:
//!     app.kubernetes.io/instance: dev
//! ingress:
//!   classMappings:
//!     nginx:
//!       className: host-nginx
//!       https: false
//!       nodePort:
//!         namespace: ingress-nginx
//!         name: ingress-nginx-controller
//!         httpPort: http
//!         httpsPort: https
//! ```

use crate::constants::{
    ADDRESS_POLL_INTERVAL_MILLIS, ERROR_REQUEUE_DURATION_SECS, MAX_REQUEUE_DURATION_SECS,
    RECONCILE_TIMEOUT_SECS, SERVICE_TYPE_CLUSTER_IP, TERMINAL_FAILURE_THRESHOLD,
};
use crate::errors::ProjectionError;
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::ServicePort;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration of one guest-cluster release.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfig {
    /// Helm release name of the guest cluster
    pub release_name: String,

    /// Host namespace the guest cluster (and every host object) lives in
    pub namespace: String,

    /// The aggregated host load-balancer service
    pub load_balancer: LoadBalancerConfig,

    /// Ingress class mapping table
    #[serde(default)]
    pub ingress: IngressConfig,

    /// Controller timing and retry behaviour
    #[serde(default)]
    pub controller: ControllerSettings,
}

/// Host load-balancer service settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerConfig {
    /// Name of the host `Service`; also the prefix of every host `Ingress`
    pub service_name: String,

    /// Host service type
    #[serde(default = "default_service_type")]
    pub service_type: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Pod selector targeting the guest cluster's worker pods
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

fn default_service_type() -> String {
    SERVICE_TYPE_CLUSTER_IP.to_string()
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    /// Guest ingress class name to host mapping
    #[serde(default)]
    pub class_mappings: BTreeMap<String, ClassMapping>,
}

/// How one guest ingress class is exposed on the host.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassMapping {
    /// Host ingress class name
    pub class_name: String,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Route to the HTTPS port of the backend and emit a TLS section
    #[serde(default)]
    pub https: bool,

    /// Secret referenced by the TLS section; the host controller's default certificate is used if unset
    #[serde(default)]
    pub tls_secret_name: Option<String>,

    /// Backend is a guest service exposed through the host load-balancer service
    #[serde(default)]
    pub node_port: Option<NodePortLocator>,

    /// Backend is a host service reached directly
    #[serde(default)]
    pub host_port: Option<HostPortLocator>,
}

/// Locates a guest ingress controller service whose node port backs the class.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodePortLocator {
    pub namespace: String,
    pub name: String,
    pub http_port: PortRef,
    pub https_port: PortRef,
}

/// Locates a host service that backs the class directly.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostPortLocator {
    pub target_service: String,
    pub http_port: PortRef,
    pub https_port: PortRef,
}

/// A port identified either by number or by name.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum PortRef {
    Number(i32),
    Name(String),
}

impl Default for PortRef {
    fn default() -> Self {
        PortRef::Number(0)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::Number(n) => write!(f, "{n}"),
            PortRef::Name(name) => f.write_str(name),
        }
    }
}

impl PortRef {
    /// Whether `port` is the port this reference names.
    #[must_use]
    pub fn matches(&self, port: &ServicePort) -> bool {
        match self {
            PortRef::Number(n) => port.port == *n,
            PortRef::Name(name) => port.name.as_deref() == Some(name.as_str()),
        }
    }
}

/// Which backend a class mapping resolves to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Locator<'a> {
    NodePort(&'a NodePortLocator),
    HostPort(&'a HostPortLocator),
}

impl ClassMapping {
    /// The backend locator for this class.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidClassMapping`] when neither or both locators are set.
    pub fn locator(&self, class: &str) -> Result<Locator<'_>, ProjectionError> {
        match (&self.node_port, &self.host_port) {
            (Some(node_port), None) => Ok(Locator::NodePort(node_port)),
            (None, Some(host_port)) => Ok(Locator::HostPort(host_port)),
            (None, None) => Err(ProjectionError::InvalidClassMapping {
                class: class.to_string(),
                reason: "neither nodePort nor hostPort is set".to_string(),
            }),
            (Some(_), Some(_)) => Err(ProjectionError::InvalidClassMapping {
                class: class.to_string(),
                reason: "both nodePort and hostPort are set".to_string(),
            }),
        }
    }

    /// The port identifier selected by the `https` flag.
    #[must_use]
    pub fn port_for<'a>(&self, http_port: &'a PortRef, https_port: &'a PortRef) -> &'a PortRef {
        if self.https {
            https_port
        } else {
            http_port
        }
    }
}

/// How failed reconciliations are requeued.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BackoffMode {
    /// Always requeue after `requeueAfterSecs`
    #[default]
    Fixed,
    /// Double the delay per consecutive failure up to `maxRequeueSecs`
    Exponential,
}

/// Controller timing and retry behaviour.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerSettings {
    pub requeue_after_secs: u64,
    pub address_poll_interval_millis: u64,
    pub reconcile_timeout_secs: u64,
    pub backoff: BackoffMode,
    pub max_requeue_secs: u64,
    pub terminal_failure_threshold: u32,

    /// Propagate errors from the deletion branch instead of logging them
    pub strict_cleanup: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            requeue_after_secs: ERROR_REQUEUE_DURATION_SECS,
            address_poll_interval_millis: ADDRESS_POLL_INTERVAL_MILLIS,
            reconcile_timeout_secs: RECONCILE_TIMEOUT_SECS,
            backoff: BackoffMode::Fixed,
            max_requeue_secs: MAX_REQUEUE_DURATION_SECS,
            terminal_failure_threshold: TERMINAL_FAILURE_THRESHOLD,
            strict_cleanup: true,
        }
    }
}

impl ControllerSettings {
    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.address_poll_interval_millis)
    }

    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    #[must_use]
    pub fn max_requeue(&self) -> Duration {
        Duration::from_secs(self.max_requeue_secs)
    }
}

impl ReleaseConfig {
    /// Load and parse a release configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for this schema.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading release config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing release config {}", path.display()))
    }

    /// Parse a release configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the schema.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Report inconsistencies that will make reconciles fail at runtime.
    ///
    /// An invalid class mapping is not fatal: reconciles of that class fail and
    /// requeue until the configuration is fixed.
    #[must_use]
    pub fn validate(&self) -> Vec<ProjectionError> {
        self.ingress
            .class_mappings
            .iter()
            .filter_map(|(class, mapping)| mapping.locator(class).err())
            .collect()
    }

    /// Look up the mapping for a guest ingress class.
    #[must_use]
    pub fn class_mapping(&self, class: &str) -> Option<&ClassMapping> {
        self.ingress.class_mappings.get(class)
    }

    /// Name of the host `Ingress` aggregating a guest class.
    #[must_use]
    pub fn host_ingress_name(&self, class: &str) -> String {
        format!("{}-{class}", self.load_balancer.service_name)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
