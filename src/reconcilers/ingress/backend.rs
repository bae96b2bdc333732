// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend resolution for a guest ingress class.

use crate::config::{ClassMapping, Locator, PortRef};
use crate::context::Context;
use anyhow::Result;
use k8s_openapi::api::networking::v1::{IngressBackend, IngressServiceBackend, ServiceBackendPort};
use tracing::warn;

/// Resolve the host backend every path of `class` is routed to.
///
/// A NodePort locator resolves to the host load-balancer Service on the node
/// port of the referenced guest Service. A HostPort locator resolves to the
/// configured host Service directly.
///
/// # Returns
///
/// `None` while the guest Service or its node port does not exist yet; the
/// class is regenerated on a later reconcile.
///
/// # Errors
///
/// Returns an error if the mapping is invalid or the guest Service cannot be read.
pub async fn resolve(
    ctx: &Context,
    class: &str,
    mapping: &ClassMapping,
) -> Result<Option<IngressBackend>> {
    match mapping.locator(class)? {
        Locator::NodePort(locator) => {
            let port_ref = mapping.port_for(&locator.http_port, &locator.https_port);
            let Some(service) = ctx
                .guest_services
                .get(&locator.namespace, &locator.name)
                .await?
            else {
                warn!(
                    "Ingress class {} waits for Service {}/{}",
                    class, locator.namespace, locator.name
                );
                return Ok(None);
            };

            let node_port = service
                .spec
                .as_ref()
                .and_then(|spec| spec.ports.as_ref())
                .and_then(|ports| ports.iter().find(|p| port_ref.matches(p)))
                .and_then(|p| p.node_port)
                .filter(|n| *n != 0);
            let Some(node_port) = node_port else {
                warn!(
                    "Ingress class {} waits for a node port on {} of Service {}/{}",
                    class, port_ref, locator.namespace, locator.name
                );
                return Ok(None);
            };

            Ok(Some(service_backend(
                &ctx.config.load_balancer.service_name,
                &PortRef::Number(node_port),
            )))
        }
        Locator::HostPort(locator) => {
            let port_ref = mapping.port_for(&locator.http_port, &locator.https_port);
            Ok(Some(service_backend(&locator.target_service, port_ref)))
        }
    }
}

fn service_backend(name: &str, port: &PortRef) -> IngressBackend {
    let port = match port {
        PortRef::Number(number) => ServiceBackendPort {
            number: Some(*number),
            ..Default::default()
        },
        PortRef::Name(name) => ServiceBackendPort {
            name: Some(name.clone()),
            ..Default::default()
        },
    };
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: name.to_string(),
            port: Some(port),
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod backend_tests;
