// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! kube-runtime controllers driving the aggregators.
//!
//! The runtime serialises reconciles of the same object and runs different
//! objects concurrently. A successful reconcile waits for the next change; a
//! failed one is requeued by the [`RequeuePolicy`].
//!
//! The Ingress controller also watches guest Services: a change to the Service
//! behind a NodePort-located class re-triggers every Ingress of that class, so a
//! backend that was deferred for lack of a node port converges.

use crate::context::Context;
use crate::errors::ProjectionError;
use crate::metrics;
use crate::reconcilers::ingress::{classes_backed_by, ingress_class};
use crate::reconcilers::retry::{error_category, RequeuePolicy};
use crate::reconcilers::{IngressAggregator, ObjectKey, ReconcileOutcome, ServiceAggregator};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{controller::Action, reflector::ObjectRef, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// An aggregator the controllers can drive.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome>;
}

#[async_trait]
impl Reconciler for ServiceAggregator {
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        ServiceAggregator::reconcile(self, key).await
    }
}

#[async_trait]
impl Reconciler for IngressAggregator {
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        IngressAggregator::reconcile(self, key).await
    }
}

/// State shared by one controller's reconcile and error-policy callbacks.
pub struct ControllerState<A> {
    aggregator: A,
    policy: RequeuePolicy,
    timeout: Duration,
}

impl<A: Reconciler> ControllerState<A> {
    #[must_use]
    pub fn new(aggregator: A, ctx: &Context) -> Self {
        Self {
            aggregator,
            policy: RequeuePolicy::from_settings(ctx.settings()),
            timeout: ctx.settings().reconcile_timeout(),
        }
    }
}

/// Run the guest `Service` controller
///
/// # Errors
///
/// Never returns an error itself; it returns when the watch stream ends.
pub async fn run_service_controller(ctx: Context, guest: Client) -> Result<()> {
    info!("Starting Service controller");

    let api = Api::<Service>::all(guest);
    let state = Arc::new(ControllerState::new(ServiceAggregator::new(ctx.clone()), &ctx));

    Controller::new(api, Config::default())
        .run(reconcile::<Service, _>, error_policy::<Service, _>, state)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the guest `Ingress` controller
///
/// # Errors
///
/// Never returns an error itself; it returns when the watch stream ends.
pub async fn run_ingress_controller(ctx: Context, guest: Client) -> Result<()> {
    info!("Starting Ingress controller");

    let api = Api::<Ingress>::all(guest.clone());
    let state = Arc::new(ControllerState::new(IngressAggregator::new(ctx.clone()), &ctx));

    let controller = Controller::new(api, Config::default());
    let ingresses = controller.store();
    let config = ctx.config.clone();

    controller
        .watches(
            Api::<Service>::all(guest),
            Config::default(),
            move |svc: Service| {
                let namespace = svc.namespace().unwrap_or_default();
                let classes = classes_backed_by(&config, &namespace, &svc.name_any());
                if classes.is_empty() {
                    return Vec::new();
                }
                ingresses
                    .state()
                    .into_iter()
                    .filter(|ing| {
                        ingress_class(ing).is_some_and(|class| classes.contains(&class.as_str()))
                    })
                    .map(|ing| ObjectRef::<Ingress>::from_obj(&ing))
                    .collect::<Vec<_>>()
            },
        )
        .run(reconcile::<Ingress, _>, error_policy::<Ingress, _>, state)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper: deadline, metrics and failure bookkeeping
async fn reconcile<K, A>(
    object: Arc<K>,
    state: Arc<ControllerState<A>>,
) -> Result<Action, ReconcileError>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    A: Reconciler,
{
    let kind = K::kind(&()).to_string();
    let key = ObjectKey::from_resource(object.as_ref()).map_err(anyhow::Error::from)?;
    debug!(kind = %kind, key = %key, "Reconcile wrapper called");

    let start = Instant::now();
    let result = match tokio::time::timeout(state.timeout, state.aggregator.reconcile(&key)).await
    {
        Ok(result) => result,
        Err(_) => Err(ProjectionError::WaitTimeout {
            what: format!("reconcile of {kind} {key}"),
            elapsed: state.timeout,
        }
        .into()),
    };

    match result {
        Ok(outcome) => {
            metrics::record_reconciliation_success(&kind, start.elapsed());
            state.policy.on_success(&key);
            debug!(kind = %kind, key = %key, outcome = ?outcome, "Reconciled");
            Ok(Action::await_change())
        }
        Err(e) => {
            metrics::record_reconciliation_error(&kind, start.elapsed());
            metrics::record_error(&kind, error_category(&e));
            error!("Failed to reconcile {} {}: {:#}", kind, key, e);
            Err(e.into())
        }
    }
}

/// Error policy: delay from the requeue policy
fn error_policy<K, A>(
    object: Arc<K>,
    err: &ReconcileError,
    state: Arc<ControllerState<A>>,
) -> Action
where
    K: Resource<DynamicType = ()>,
    A: Reconciler,
{
    let key = ObjectKey::new(
        object.meta().namespace.clone().unwrap_or_default(),
        object.meta().name.clone().unwrap_or_default(),
    );
    Action::requeue(state.policy.on_error(&K::kind(&()), &key, &err.0))
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
