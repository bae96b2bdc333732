// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fixtures shared by the aggregator tests.

use crate::config::{
    ClassMapping, ControllerSettings, HostPortLocator, IngressConfig, LoadBalancerConfig,
    NodePortLocator, PortRef, ReleaseConfig,
};
use crate::context::Context;
use crate::store::memory::MemoryStore;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const HOST_NAMESPACE: &str = "guests";
pub const LB_NAME: &str = "dev-lb";
pub const HOST_CLUSTER_IP: &str = "10.96.0.42";
pub const CONTROLLER_NAMESPACE: &str = "ingress-nginx";
pub const CONTROLLER_SERVICE: &str = "ingress-nginx-controller";

/// Four in-memory stores wired into a [`Context`].
pub struct Harness {
    pub ctx: Context,
    pub guest_services: Arc<MemoryStore<Service>>,
    pub guest_ingresses: Arc<MemoryStore<Ingress>>,
    pub host_services: Arc<MemoryStore<Service>>,
    pub host_ingresses: Arc<MemoryStore<Ingress>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(release_config())
    }

    pub fn with_config(config: ReleaseConfig) -> Self {
        let guest_services = Arc::new(MemoryStore::<Service>::new());
        let guest_ingresses = Arc::new(MemoryStore::<Ingress>::new());
        let host_services = Arc::new(MemoryStore::<Service>::with_on_create(|svc| {
            svc.spec.get_or_insert_with(Default::default).cluster_ip =
                Some(HOST_CLUSTER_IP.to_string());
        }));
        let host_ingresses = Arc::new(MemoryStore::<Ingress>::new());

        let ctx = Context {
            config: Arc::new(config),
            guest_services: guest_services.clone(),
            guest_ingresses: guest_ingresses.clone(),
            host_services: host_services.clone(),
            host_ingresses: host_ingresses.clone(),
        };

        Self {
            ctx,
            guest_services,
            guest_ingresses,
            host_services,
            host_ingresses,
        }
    }

    pub fn host_lb(&self) -> Option<Service> {
        self.host_services.object(HOST_NAMESPACE, LB_NAME)
    }

    pub fn host_ingress(&self, class: &str) -> Option<Ingress> {
        self.host_ingresses
            .object(HOST_NAMESPACE, &format!("{LB_NAME}-{class}"))
    }
}

fn node_port_locator() -> NodePortLocator {
    NodePortLocator {
        namespace: CONTROLLER_NAMESPACE.to_string(),
        name: CONTROLLER_SERVICE.to_string(),
        http_port: PortRef::Name("http".to_string()),
        https_port: PortRef::Name("https".to_string()),
    }
}

/// Release with four classes:
/// - `nginx`: plain HTTP through the guest ingress controller's node port
/// - `secure`: HTTPS through the same controller, with a TLS secret
/// - `direct`: a host service reached directly
/// - `broken`: no locator at all
pub fn release_config() -> ReleaseConfig {
    let mut class_mappings = BTreeMap::new();
    class_mappings.insert(
        "nginx".to_string(),
        ClassMapping {
            class_name: "host-nginx".to_string(),
            annotations: BTreeMap::from([(
                "nginx.ingress.kubernetes.io/proxy-body-size".to_string(),
                "0".to_string(),
            )]),
            node_port: Some(node_port_locator()),
            ..Default::default()
        },
    );
    class_mappings.insert(
        "secure".to_string(),
        ClassMapping {
            class_name: "host-nginx".to_string(),
            https: true,
            tls_secret_name: Some("wildcard-tls".to_string()),
            node_port: Some(node_port_locator()),
            ..Default::default()
        },
    );
    class_mappings.insert(
        "direct".to_string(),
        ClassMapping {
            class_name: "host-traefik".to_string(),
            host_port: Some(HostPortLocator {
                target_service: "host-router".to_string(),
                http_port: PortRef::Number(8080),
                https_port: PortRef::Number(8443),
            }),
            ..Default::default()
        },
    );
    class_mappings.insert(
        "broken".to_string(),
        ClassMapping {
            class_name: "host-nginx".to_string(),
            ..Default::default()
        },
    );

    ReleaseConfig {
        release_name: "dev".to_string(),
        namespace: HOST_NAMESPACE.to_string(),
        load_balancer: LoadBalancerConfig {
            service_name: LB_NAME.to_string(),
            service_type: "ClusterIP".to_string(),
            selector: BTreeMap::from([(
                "app.kubernetes.io/instance".to_string(),
                "dev".to_string(),
            )]),
            ..Default::default()
        },
        ingress: IngressConfig { class_mappings },
        controller: ControllerSettings {
            address_poll_interval_millis: 1,
            reconcile_timeout_secs: 1,
            ..Default::default()
        },
    }
}

/// A guest Service with `(name, port, nodePort)` ports.
pub fn guest_service(
    namespace: &str,
    name: &str,
    type_: &str,
    ports: &[(Option<&str>, i32, Option<i32>)],
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(type_.to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|(port_name, port, node_port)| ServicePort {
                        name: port_name.map(str::to_string),
                        port: *port,
                        node_port: *node_port,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The guest ingress controller Service, with its node ports assigned or not.
pub fn ingress_controller_service(assigned: bool) -> Service {
    let (http, https) = if assigned {
        (Some(30080), Some(30443))
    } else {
        (None, None)
    };
    guest_service(
        CONTROLLER_NAMESPACE,
        CONTROLLER_SERVICE,
        "NodePort",
        &[(Some("http"), 80, http), (Some("https"), 443, https)],
    )
}

/// A guest Ingress in `class` with `(host, paths)` rules.
pub fn guest_ingress(
    namespace: &str,
    name: &str,
    class: Option<&str>,
    rules: &[(&str, &[&str])],
) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: class.map(str::to_string),
            rules: Some(
                rules
                    .iter()
                    .map(|(host, paths)| IngressRule {
                        host: (!host.is_empty()).then(|| (*host).to_string()),
                        http: Some(HTTPIngressRuleValue {
                            paths: paths.iter().map(|path| guest_path(path)).collect(),
                        }),
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn guest_path(path: &str) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: "Prefix".to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: "guest-app".to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(80),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
    }
}
