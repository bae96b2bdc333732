// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Requeue policy for failed reconciliations.
//!
//! The dispatcher has no terminal-failure channel: every failed reconcile is
//! requeued. By default the delay is fixed. The exponential mode grows the delay
//! per consecutive failure of the same key, and reports a key as terminally
//! failing once it crosses a threshold (it keeps being retried at the cap).

use crate::config::{BackoffMode, ControllerSettings};
use crate::errors::{ProjectionError, StoreError};
use crate::metrics;
use crate::reconcilers::ObjectKey;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, warn};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: u32 = 2;

/// Exponential backoff without jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Maximum delay
    pub max_interval: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
        }
    }

    /// Delay after `failures` consecutive failures (`failures >= 1`).
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial_interval
            .checked_mul(BACKOFF_MULTIPLIER.saturating_pow(exponent))
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Per-key requeue policy shared by a controller's error handler.
#[derive(Debug)]
pub struct RequeuePolicy {
    mode: BackoffMode,
    backoff: ExponentialBackoff,
    terminal_threshold: u32,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl RequeuePolicy {
    #[must_use]
    pub fn from_settings(settings: &ControllerSettings) -> Self {
        Self {
            mode: settings.backoff,
            backoff: ExponentialBackoff::new(settings.requeue_after(), settings.max_requeue()),
            terminal_threshold: settings.terminal_failure_threshold,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure of `key` and return how long to wait before retrying.
    pub fn on_error(&self, kind: &str, key: &ObjectKey, err: &anyhow::Error) -> Duration {
        let failures = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        let delay = match self.mode {
            BackoffMode::Fixed => self.backoff.initial_interval,
            BackoffMode::Exponential => self.backoff.delay_for(failures),
        };

        if self.mode == BackoffMode::Exponential && failures == self.terminal_threshold {
            error!(
                kind = kind,
                key = %key,
                failures = failures,
                error = %err,
                "Reconciliation is failing persistently, retrying every {:?} from now on",
                self.backoff.max_interval
            );
            metrics::record_terminal_failure(kind);
        } else {
            warn!(
                kind = kind,
                key = %key,
                failures = failures,
                retry_after = ?delay,
                error = %err,
                "Reconciliation failed, will retry"
            );
        }

        metrics::record_reconciliation_requeue(kind, error_category(err));
        delay
    }

    /// Forget the failure history of `key`.
    pub fn on_success(&self, key: &ObjectKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Consecutive failures recorded for `key`.
    #[must_use]
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

/// Metric category of a reconcile error.
#[must_use]
pub fn error_category(err: &anyhow::Error) -> &'static str {
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        return match store_err {
            StoreError::Conflict { .. } | StoreError::AlreadyExists { .. } => "conflict",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Encode(_) => "encode_error",
            StoreError::Api(e) if is_retryable_error(e) => "transient_api_error",
            StoreError::Api(_) => "api_error",
        };
    }
    match err.downcast_ref::<ProjectionError>() {
        Some(ProjectionError::InvalidClassMapping { .. }) => "configuration_error",
        Some(ProjectionError::WaitTimeout { .. }) => "timeout",
        Some(ProjectionError::MissingIdentity { .. }) => "validation_error",
        None => "error",
    }
}

/// Determine if a Kubernetes error is transient.
///
/// - **HTTP 429** (Too Many Requests) - Rate limiting
/// - **HTTP 5xx** (Server Errors) - Temporary API server issues
/// - **Service Errors** - Network/connection issues
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
