// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service aggregator.
//!
//! Every guest `Service` with assigned node ports contributes them to a single
//! host load-balancer `Service` named by the release configuration. The host
//! Service's port list is the union of all contributions and is never empty.
//! Once the host Service has a cluster IP, LoadBalancer-type guest Services get
//! it written into `status.loadBalancer.ingress`.
//!
//! The index lock is held from the index mutation through the host Service
//! write, so two reconciles never interleave their read-modify-write of the
//! aggregate. The address poll and the guest status write run unlocked.

pub mod index;

use crate::constants::{
    CLUSTER_IP_NONE, SERVICE_FINALIZER, SERVICE_TYPE_CLUSTER_IP,
    SERVICE_TYPE_LOAD_BALANCER, SERVICE_TYPE_NODE_PORT,
};
use crate::context::Context;
use crate::labels::{COMPONENT_LB_SERVICE, K8S_COMPONENT, K8S_MANAGED_BY, MANAGED_BY_NESTLB};
use crate::metrics;
use crate::reconcilers::finalizers::{remove_finalizer, set_finalizer, Lifecycle};
use crate::reconcilers::resources::create_or_update;
use crate::reconcilers::wait::wait_for;
use crate::reconcilers::{ObjectKey, ReconcileOutcome};
use anyhow::Result;
use index::ServiceIndex;
use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Projects guest Services onto the host load-balancer Service.
pub struct ServiceAggregator {
    ctx: Context,
    index: Mutex<ServiceIndex>,
}

impl ServiceAggregator {
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            index: Mutex::new(ServiceIndex::new()),
        }
    }

    /// Reconcile the guest Service identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a guest or host read or write fails, or the host
    /// Service gets no address before the reconcile deadline. The caller requeues.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(service) = self
            .ctx
            .guest_services
            .get(&key.namespace, &key.name)
            .await?
        else {
            debug!("Service {} no longer exists", key);
            return Ok(ReconcileOutcome::NotFound);
        };

        let service = match Lifecycle::of(&service, SERVICE_FINALIZER) {
            Lifecycle::PendingDelete => return self.finalize(key, &service).await,
            Lifecycle::Removed => {
                self.withdraw(key).await?;
                return Ok(ReconcileOutcome::Unmanaged);
            }
            Lifecycle::Live => {
                let wanted = matches!(
                    service_type(&service),
                    SERVICE_TYPE_NODE_PORT | SERVICE_TYPE_LOAD_BALANCER
                );
                set_finalizer(
                    self.ctx.guest_services.as_ref(),
                    &service,
                    SERVICE_FINALIZER,
                    wanted,
                )
                .await?
            }
        };

        {
            let mut index = self.index.lock().await;
            index.upsert(key, &service);
            self.create_or_update_host_lb(&index).await?;
        }

        let address = self.wait_for_address().await?;
        if service_type(&service) == SERVICE_TYPE_LOAD_BALANCER {
            self.set_lb_ingress(&service, &address).await?;
        }

        Ok(ReconcileOutcome::Reconciled)
    }

    /// Ports currently exposed on the host load-balancer Service.
    pub async fn desired_ports(&self) -> Vec<ServicePort> {
        self.index.lock().await.desired_ports()
    }

    /// Withdraw the Service's ports and release it for deletion.
    async fn finalize(&self, key: &ObjectKey, service: &Service) -> Result<ReconcileOutcome> {
        let cleanup = async {
            self.withdraw(key).await?;
            remove_finalizer(self.ctx.guest_services.as_ref(), service, SERVICE_FINALIZER)
                .await?;
            anyhow::Ok(())
        };

        match cleanup.await {
            Ok(()) => info!("Released Service {} for deletion", key),
            Err(e) if self.ctx.settings().strict_cleanup => return Err(e),
            Err(e) => error!(
                "Cleanup of deleted Service {} failed, continuing: {:#}",
                key, e
            ),
        }
        Ok(ReconcileOutcome::Deleted)
    }

    /// Remove `key`'s ports and regenerate the host Service.
    ///
    /// The host Service is regenerated even if `key` had nothing left to
    /// withdraw, so a cleanup that failed after the index update converges on retry.
    async fn withdraw(&self, key: &ObjectKey) -> Result<()> {
        let mut index = self.index.lock().await;
        index.remove(key);
        self.create_or_update_host_lb(&index).await?;
        Ok(())
    }

    async fn create_or_update_host_lb(&self, index: &ServiceIndex) -> Result<Service> {
        let lb = &self.ctx.config.load_balancer;
        let namespace = self.ctx.host_namespace();
        let ports = index.desired_ports();

        let initial = Service {
            metadata: ObjectMeta {
                name: Some(lb.service_name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let (stored, result) = create_or_update(
            self.ctx.host_services.as_ref(),
            namespace,
            initial,
            |svc| {
                let labels = svc.metadata.labels.get_or_insert_with(Default::default);
                labels.extend(lb.labels.clone());
                labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_NESTLB.to_string());
                labels.insert(K8S_COMPONENT.to_string(), COMPONENT_LB_SERVICE.to_string());
                if !lb.annotations.is_empty() {
                    svc.metadata
                        .annotations
                        .get_or_insert_with(Default::default)
                        .extend(lb.annotations.clone());
                }

                let spec = svc.spec.get_or_insert_with(ServiceSpec::default);
                spec.type_ = Some(lb.service_type.clone());
                spec.selector = (!lb.selector.is_empty()).then(|| lb.selector.clone());
                spec.ports = Some(with_allocated_node_ports(&ports, spec.ports.as_deref()));
            },
        )
        .await?;

        debug!(
            "Host Service {}/{} {} with {} port(s)",
            namespace,
            lb.service_name,
            result,
            ports.len()
        );
        metrics::set_tracked_node_ports(index.len());
        Ok(stored)
    }

    /// Poll the host Service until it has a cluster IP.
    async fn wait_for_address(&self) -> Result<String> {
        let settings = self.ctx.settings();
        let store = self.ctx.host_services.as_ref();
        let namespace = self.ctx.host_namespace();
        let name = self.ctx.config.load_balancer.service_name.as_str();

        wait_for(
            &format!("address of Service {namespace}/{name}"),
            settings.poll_interval(),
            settings.reconcile_timeout(),
            || async move {
                let svc = store.get(namespace, name).await?;
                Ok(svc.as_ref().and_then(cluster_ip).map(str::to_string))
            },
        )
        .await
    }

    /// Write `address` into the guest Service's load-balancer status if it differs.
    async fn set_lb_ingress(&self, service: &Service, address: &str) -> Result<()> {
        let desired = vec![LoadBalancerIngress {
            ip: Some(address.to_string()),
            ..Default::default()
        }];

        let current = service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref());
        if current == Some(&desired) {
            return Ok(());
        }

        let mut updated = service.clone();
        updated.status.get_or_insert_with(Default::default).load_balancer =
            Some(LoadBalancerStatus {
                ingress: Some(desired),
            });
        let namespace = updated.metadata.namespace.clone().unwrap_or_default();
        self.ctx
            .guest_services
            .replace_status(&namespace, &updated)
            .await?;

        info!(
            "Set load-balancer ingress of Service {}/{} to {}",
            namespace,
            updated.metadata.name.as_deref().unwrap_or_default(),
            address
        );
        Ok(())
    }
}

fn service_type(service: &Service) -> &str {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .unwrap_or(SERVICE_TYPE_CLUSTER_IP)
}

/// The cluster IP of `service`, unless it is unset or headless.
fn cluster_ip(service: &Service) -> Option<&str> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != CLUSTER_IP_NONE)
}

/// Carry over node ports the API server allocated on the live host Service,
/// so a NodePort-type host Service is not rewritten on every reconcile.
fn with_allocated_node_ports(
    desired: &[ServicePort],
    live: Option<&[ServicePort]>,
) -> Vec<ServicePort> {
    let live = live.unwrap_or_default();
    desired
        .iter()
        .map(|port| {
            let mut port = port.clone();
            port.node_port = live
                .iter()
                .find(|l| l.name == port.name && l.port == port.port)
                .and_then(|l| l.node_port);
            port
        })
        .collect()
}
