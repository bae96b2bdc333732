// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Class and path indexes of the Ingress aggregator.
//!
//! - `class_of`: guest Ingress -> the class it was last indexed under
//! - `members`: class -> guest Ingresses in it
//! - `paths`: guest Ingress -> rule host -> HTTP paths
//! - `host_ingresses`: class -> last host Ingress written for it; a snapshot
//!   for inspection only, every write starts from the live object
//! - `dirty`: classes whose host Ingress must be regenerated
//!
//! `members[c]` always holds exactly the keys whose `class_of` is `c`.

use crate::reconcilers::ObjectKey;
use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// HTTP paths of one or more guest Ingresses, grouped by rule host.
///
/// Rules without a host are grouped under the empty string.
pub type HostPaths = BTreeMap<String, Vec<HTTPIngressPath>>;

#[derive(Debug, Default)]
pub struct IngressIndex {
    class_of: HashMap<ObjectKey, String>,
    members: HashMap<String, BTreeSet<ObjectKey>>,
    paths: HashMap<ObjectKey, HostPaths>,
    host_ingresses: HashMap<String, Ingress>,
    dirty: BTreeSet<String>,
}

impl IngressIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `ingress` under `class`, or drop it from the index if `class` is `None`.
    ///
    /// Both the new class and any previous class are marked dirty.
    ///
    /// # Returns
    ///
    /// The class `key` was previously indexed under, if it differs from `class`.
    pub fn upsert_paths(
        &mut self,
        key: &ObjectKey,
        class: Option<&str>,
        ingress: &Ingress,
    ) -> Option<String> {
        let previous = self
            .class_of
            .get(key)
            .filter(|prev| Some(prev.as_str()) != class)
            .cloned();

        if let Some(prev) = &previous {
            self.leave(key, prev);
        }

        let Some(class) = class else {
            self.class_of.remove(key);
            self.paths.remove(key);
            return previous;
        };

        self.class_of.insert(key.clone(), class.to_string());
        self.members
            .entry(class.to_string())
            .or_default()
            .insert(key.clone());
        self.paths.insert(key.clone(), collect_paths(ingress));
        self.dirty.insert(class.to_string());

        if let Some(prev) = &previous {
            debug!("Ingress {} moved from class {} to {}", key, prev, class);
        }
        previous
    }

    /// Drop `key` from every index.
    ///
    /// # Returns
    ///
    /// The class `key` was indexed under, now marked dirty.
    pub fn remove_paths(&mut self, key: &ObjectKey) -> Option<String> {
        let class = self.class_of.remove(key)?;
        self.leave(key, &class);
        self.paths.remove(key);
        Some(class)
    }

    fn leave(&mut self, key: &ObjectKey, class: &str) {
        if let Some(members) = self.members.get_mut(class) {
            members.remove(key);
            if members.is_empty() {
                self.members.remove(class);
            }
        }
        self.dirty.insert(class.to_string());
    }

    #[must_use]
    pub fn class_of(&self, key: &ObjectKey) -> Option<&str> {
        self.class_of.get(key).map(String::as_str)
    }

    /// Members of `class`, ordered by key.
    #[must_use]
    pub fn members(&self, class: &str) -> Vec<ObjectKey> {
        self.members
            .get(class)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The union of every member's paths, grouped by host.
    ///
    /// Paths of one host keep member order, then each member's rule order.
    #[must_use]
    pub fn class_paths(&self, class: &str) -> HostPaths {
        let mut merged = HostPaths::new();
        for key in self.members(class) {
            let Some(paths) = self.paths.get(&key) else {
                continue;
            };
            for (host, host_paths) in paths {
                merged
                    .entry(host.clone())
                    .or_default()
                    .extend(host_paths.iter().cloned());
            }
        }
        merged.retain(|_, paths| !paths.is_empty());
        merged
    }

    /// Classes awaiting regeneration, in name order.
    #[must_use]
    pub fn dirty_classes(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    pub fn mark_dirty(&mut self, class: &str) {
        self.dirty.insert(class.to_string());
    }

    pub fn mark_clean(&mut self, class: &str) {
        self.dirty.remove(class);
    }

    #[must_use]
    pub fn host_ingress(&self, class: &str) -> Option<&Ingress> {
        self.host_ingresses.get(class)
    }

    pub fn remember_host_ingress(&mut self, class: &str, ingress: Ingress) {
        self.host_ingresses.insert(class.to_string(), ingress);
    }

    pub fn forget_host_ingress(&mut self, class: &str) {
        self.host_ingresses.remove(class);
    }
}

/// Copy every HTTP path of `ingress`, grouped by rule host.
///
/// Rules without an HTTP block are skipped.
fn collect_paths(ingress: &Ingress) -> HostPaths {
    let mut paths = HostPaths::new();
    let rules = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();

    for rule in rules {
        let Some(http) = &rule.http else {
            continue;
        };
        paths
            .entry(rule.host.clone().unwrap_or_default())
            .or_default()
            .extend(http.paths.iter().cloned());
    }
    paths
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod index_tests;
