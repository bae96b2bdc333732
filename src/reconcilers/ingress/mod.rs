// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress aggregator.
//!
//! Guest `Ingress`es are grouped by ingress class. Every class with a mapping
//! in the release configuration gets one host `Ingress` whose rules are the
//! union of its members' paths, all routed to the class's resolved backend.
//! A class whose last member leaves has its host Ingress deleted.
//!
//! Index mutations mark classes dirty; every reconcile regenerates all dirty
//! classes while holding the index lock. A class whose backend cannot be
//! resolved yet stays dirty and is retried on the next reconcile.

pub mod backend;
pub mod generate;
pub mod index;

use crate::config::{Locator, ReleaseConfig};
use crate::constants::{INGRESS_FINALIZER, LEGACY_INGRESS_CLASS_ANNOTATION};
use crate::context::Context;
use crate::metrics;
use crate::reconcilers::finalizers::{
    ensure_finalizer, has_finalizer, remove_finalizer, Lifecycle,
};
use crate::reconcilers::resources::{create_or_update, delete_and_wait};
use crate::reconcilers::{ObjectKey, ReconcileOutcome};
use anyhow::Result;
use index::IngressIndex;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Projects guest Ingresses onto one host Ingress per class.
pub struct IngressAggregator {
    ctx: Context,
    index: Mutex<IngressIndex>,
}

impl IngressAggregator {
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            index: Mutex::new(IngressIndex::new()),
        }
    }

    /// Reconcile the guest Ingress identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or write fails, or if the host Ingress of the
    /// object's current or previous class cannot be generated (for example an
    /// invalid class mapping). The caller requeues.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(ingress) = self
            .ctx
            .guest_ingresses
            .get(&key.namespace, &key.name)
            .await?
        else {
            debug!("Ingress {} no longer exists", key);
            return Ok(ReconcileOutcome::NotFound);
        };

        match Lifecycle::of(&ingress, INGRESS_FINALIZER) {
            Lifecycle::PendingDelete => return self.finalize(key, &ingress).await,
            Lifecycle::Removed => {
                self.purge(key, ingress_class(&ingress)).await?;
                return Ok(ReconcileOutcome::Unmanaged);
            }
            Lifecycle::Live => {}
        }

        let class = ingress_class(&ingress)
            .filter(|class| self.ctx.config.class_mapping(class).is_some());
        let Some(class) = class else {
            return self.release_unmapped(key, &ingress).await;
        };

        let ingress = ensure_finalizer(
            self.ctx.guest_ingresses.as_ref(),
            &ingress,
            INGRESS_FINALIZER,
        )
        .await?;

        let mut index = self.index.lock().await;
        let previous = index.upsert_paths(key, Some(&class), &ingress);
        let mut relevant = vec![class];
        relevant.extend(previous);
        self.sync_dirty(&mut index, &relevant).await?;

        Ok(ReconcileOutcome::Reconciled)
    }

    /// Host Ingress last written for `class`.
    ///
    /// A snapshot of the last write; regeneration always reads the live object.
    pub async fn host_ingress(&self, class: &str) -> Option<Ingress> {
        self.index.lock().await.host_ingress(class).cloned()
    }

    /// Class `key` is currently indexed under.
    pub async fn class_of(&self, key: &ObjectKey) -> Option<String> {
        self.index.lock().await.class_of(key).map(str::to_string)
    }

    /// Withdraw the Ingress's paths and release it for deletion.
    async fn finalize(&self, key: &ObjectKey, ingress: &Ingress) -> Result<ReconcileOutcome> {
        let cleanup = async {
            let class = self.purge(key, ingress_class(ingress)).await?;
            remove_finalizer(
                self.ctx.guest_ingresses.as_ref(),
                ingress,
                INGRESS_FINALIZER,
            )
            .await?;
            if let Some(class) = class {
                self.index.lock().await.forget_host_ingress(&class);
            }
            anyhow::Ok(())
        };

        match cleanup.await {
            Ok(()) => info!("Released Ingress {} for deletion", key),
            Err(e) if self.ctx.settings().strict_cleanup => return Err(e),
            Err(e) => error!(
                "Cleanup of deleted Ingress {} failed, continuing: {:#}",
                key, e
            ),
        }
        Ok(ReconcileOutcome::Deleted)
    }

    /// A live Ingress whose class has no mapping.
    ///
    /// If it was indexed under a mapped class before, its paths are withdrawn
    /// from that class. Our finalizer, if present, is removed.
    async fn release_unmapped(
        &self,
        key: &ObjectKey,
        ingress: &Ingress,
    ) -> Result<ReconcileOutcome> {
        let withdrawn = self.purge(key, None).await?;
        if has_finalizer(ingress, INGRESS_FINALIZER) {
            remove_finalizer(
                self.ctx.guest_ingresses.as_ref(),
                ingress,
                INGRESS_FINALIZER,
            )
            .await?;
        }
        if let Some(class) = withdrawn {
            info!("Ingress {} left class {} for an unmapped class", key, class);
        }
        Ok(ReconcileOutcome::Unmanaged)
    }

    /// Drop `key` from the index and regenerate the class it was in.
    ///
    /// `class_hint` stands in for the indexed class when `key` is not indexed,
    /// as after a restart or a retried cleanup. That class is regenerated too,
    /// so a host Ingress left without members is still deleted.
    ///
    /// # Returns
    ///
    /// The class `key` was indexed under, or the hint.
    async fn purge(&self, key: &ObjectKey, class_hint: Option<String>) -> Result<Option<String>> {
        let mut index = self.index.lock().await;
        let class = index.remove_paths(key).or(class_hint);
        if let Some(class) = &class {
            index.mark_dirty(class);
        }
        let relevant: Vec<String> = class.iter().cloned().collect();
        self.sync_dirty(&mut index, &relevant).await?;
        Ok(class)
    }

    /// Regenerate every dirty class.
    ///
    /// Failures of classes in `relevant` are returned; failures of other dirty
    /// classes are logged and left dirty for a later reconcile.
    async fn sync_dirty(&self, index: &mut IngressIndex, relevant: &[String]) -> Result<()> {
        let mut first_error = None;
        for class in index.dirty_classes() {
            match self.sync_class(index, &class).await {
                Ok(true) => index.mark_clean(&class),
                Ok(false) => {}
                Err(e) if relevant.contains(&class) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => warn!("Ingress class {} is still failing: {:#}", class, e),
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Bring the host Ingress of `class` in line with the index.
    ///
    /// # Returns
    ///
    /// `false` if the class backend is not resolvable yet and nothing was written.
    async fn sync_class(&self, index: &mut IngressIndex, class: &str) -> Result<bool> {
        let config = &self.ctx.config;
        let settings = self.ctx.settings();
        let namespace = self.ctx.host_namespace();
        let name = config.host_ingress_name(class);
        let store = self.ctx.host_ingresses.as_ref();

        let paths = index.class_paths(class);
        metrics::set_class_members(class, index.members(class).len());

        if paths.is_empty() {
            delete_and_wait(
                store,
                namespace,
                &name,
                settings.poll_interval(),
                settings.reconcile_timeout(),
            )
            .await?;
            index.forget_host_ingress(class);
            return Ok(true);
        }

        let Some(mapping) = config.class_mapping(class) else {
            warn!("Ingress class {} lost its mapping", class);
            return Ok(true);
        };
        let Some(backend) = backend::resolve(&self.ctx, class, mapping).await? else {
            return Ok(false);
        };

        let rules = generate::rules(&paths, &backend);
        let (stored, result) = create_or_update(
            store,
            namespace,
            generate::host_ingress(config, class),
            |ing| generate::apply(ing, class, mapping, &rules),
        )
        .await?;
        debug!(
            "Host Ingress {}/{} {} with {} rule(s)",
            namespace,
            name,
            result,
            rules.len()
        );
        index.remember_host_ingress(class, stored);
        Ok(true)
    }
}

/// The ingress class of a guest Ingress.
///
/// `spec.ingressClassName` wins over the legacy `kubernetes.io/ingress.class` annotation.
#[must_use]
pub fn ingress_class(ingress: &Ingress) -> Option<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.clone())
        .or_else(|| {
            ingress
                .annotations()
                .get(LEGACY_INGRESS_CLASS_ANNOTATION)
                .cloned()
        })
        .filter(|class| !class.is_empty())
}

/// Guest classes whose backend is the node port of Service `namespace/name`.
#[must_use]
pub fn classes_backed_by<'a>(
    config: &'a ReleaseConfig,
    namespace: &str,
    name: &str,
) -> Vec<&'a str> {
    config
        .ingress
        .class_mappings
        .iter()
        .filter(|(class, mapping)| {
            matches!(
                mapping.locator(class),
                Ok(Locator::NodePort(locator))
                    if locator.namespace == namespace && locator.name == name
            )
        })
        .map(|(class, _)| class.as_str())
        .collect()
}
