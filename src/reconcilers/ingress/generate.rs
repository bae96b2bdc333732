// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host `Ingress` generation for one guest ingress class.
//!
//! These functions are pure: they turn the merged paths of a class, its
//! mapping and the resolved backend into the desired host object.

use crate::config::{ClassMapping, ReleaseConfig};
use crate::labels::{
    COMPONENT_LB_INGRESS, GUEST_INGRESS_CLASS_LABEL, K8S_COMPONENT, K8S_MANAGED_BY,
    MANAGED_BY_NESTLB,
};
use crate::reconcilers::ingress::index::HostPaths;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressSpec,
    IngressTLS,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeSet;

/// A fresh host Ingress for `class`, identified by name and namespace only.
#[must_use]
pub fn host_ingress(config: &ReleaseConfig, class: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(config.host_ingress_name(class)),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// One rule per host, every path pointing at `backend`.
#[must_use]
pub fn rules(paths: &HostPaths, backend: &IngressBackend) -> Vec<IngressRule> {
    paths
        .iter()
        .filter(|(_, host_paths)| !host_paths.is_empty())
        .map(|(host, host_paths)| IngressRule {
            host: (!host.is_empty()).then(|| host.clone()),
            http: Some(HTTPIngressRuleValue {
                paths: host_paths
                    .iter()
                    .map(|path| HTTPIngressPath {
                        backend: backend.clone(),
                        ..path.clone()
                    })
                    .collect(),
            }),
        })
        .collect()
}

/// The TLS section of an HTTPS class: every distinct host of `rules`, sorted.
#[must_use]
pub fn tls(mapping: &ClassMapping, rules: &[IngressRule]) -> Option<Vec<IngressTLS>> {
    if !mapping.https {
        return None;
    }
    let hosts: BTreeSet<&str> = rules
        .iter()
        .filter_map(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty())
        .collect();
    Some(vec![IngressTLS {
        hosts: Some(hosts.into_iter().map(str::to_string).collect()),
        secret_name: mapping.tls_secret_name.clone(),
    }])
}

/// Bring `ingress` to the desired state for `class`.
///
/// Labels and annotations are merged into the existing maps so fields added by
/// other controllers survive.
pub fn apply(
    ingress: &mut Ingress,
    class: &str,
    mapping: &ClassMapping,
    rules: &[IngressRule],
) {
    let labels = ingress.metadata.labels.get_or_insert_with(Default::default);
    labels.extend(mapping.labels.clone());
    labels.insert(GUEST_INGRESS_CLASS_LABEL.to_string(), class.to_string());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_NESTLB.to_string());
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_LB_INGRESS.to_string());
    if !mapping.annotations.is_empty() {
        ingress
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(mapping.annotations.clone());
    }

    let spec = ingress.spec.get_or_insert_with(IngressSpec::default);
    spec.ingress_class_name = Some(mapping.class_name.clone());
    spec.rules = Some(rules.to_vec());
    spec.tls = tls(mapping, rules);
}

#[cfg(test)]
#[path = "generate_tests.rs"]
mod generate_tests;
