// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node-port indexes of the Service aggregator.
//!
//! `node_ports` maps every node port contributed by a tracked guest Service to
//! the host port exposing it. `service_ports` records which node ports each
//! guest Service contributed, so a reconcile can withdraw exactly those before
//! re-adding the current ones.

use crate::constants::{FILLER_PORT, FILLER_PORT_NAME, PROTOCOL_TCP};
use crate::naming::port_name;
use crate::reconcilers::ObjectKey;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ServiceIndex {
    node_ports: BTreeMap<i32, ServicePort>,
    service_ports: HashMap<ObjectKey, Vec<i32>>,
}

impl ServiceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node ports contributed by `key` with those of `service`.
    ///
    /// Ports without an assigned node port are skipped.
    ///
    /// # Returns
    ///
    /// The node ports now contributed by `key`.
    pub fn upsert(&mut self, key: &ObjectKey, service: &Service) -> Vec<i32> {
        self.remove(key);

        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut contributed = Vec::new();
        for port in ports {
            let Some(node_port) = port.node_port.filter(|n| *n != 0) else {
                continue;
            };
            self.node_ports.insert(
                node_port,
                ServicePort {
                    name: Some(port_name(&key.namespace, &key.name, port)),
                    protocol: port.protocol.clone(),
                    app_protocol: port.app_protocol.clone(),
                    port: node_port,
                    target_port: Some(IntOrString::Int(node_port)),
                    ..Default::default()
                },
            );
            contributed.push(node_port);
        }

        if !contributed.is_empty() {
            debug!("{} contributes node ports {:?}", key, contributed);
            self.service_ports.insert(key.clone(), contributed.clone());
        }
        contributed
    }

    /// Withdraw every node port contributed by `key`.
    ///
    /// # Returns
    ///
    /// The node ports that were removed.
    pub fn remove(&mut self, key: &ObjectKey) -> Vec<i32> {
        let removed = self.service_ports.remove(key).unwrap_or_default();
        for node_port in &removed {
            self.node_ports.remove(node_port);
        }
        if !removed.is_empty() {
            debug!("{} withdrew node ports {:?}", key, removed);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.node_ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_ports.is_empty()
    }

    /// Ports of the host load-balancer Service, ordered by node port.
    ///
    /// A Service needs at least one port, so an empty index yields the filler port.
    #[must_use]
    pub fn desired_ports(&self) -> Vec<ServicePort> {
        if self.node_ports.is_empty() {
            return vec![filler_port()];
        }
        self.node_ports.values().cloned().collect()
    }
}

/// Placeholder port of an otherwise empty host load-balancer Service.
#[must_use]
pub fn filler_port() -> ServicePort {
    ServicePort {
        name: Some(FILLER_PORT_NAME.to_string()),
        protocol: Some(PROTOCOL_TCP.to_string()),
        port: FILLER_PORT,
        target_port: Some(IntOrString::Int(FILLER_PORT)),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod index_tests;
