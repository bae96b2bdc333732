// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the nestlb controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer placed on guest `Service`s of type `NodePort` or `LoadBalancer`
pub const SERVICE_FINALIZER: &str = "nestlb.io/lb-service";

/// Finalizer placed on guest `Ingress`es whose class is mapped to a host class
pub const INGRESS_FINALIZER: &str = "nestlb.io/lb-ingress";

// ============================================================================
// Guest Object Conventions
// ============================================================================

/// Legacy annotation selecting an ingress class when `spec.ingressClassName` is unset
pub const LEGACY_INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Guest service type that receives a node port and a host projection
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";

/// Guest service type that additionally receives a load-balancer address
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Default service type of the host load-balancer service
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Default protocol for service ports
pub const PROTOCOL_TCP: &str = "TCP";

/// Value the API server uses for headless services
pub const CLUSTER_IP_NONE: &str = "None";

// ============================================================================
// Host Load-Balancer Service
// ============================================================================

/// Name of the port substituted when no guest service contributes a node port.
///
/// A `Service` must carry at least one port.
pub const FILLER_PORT_NAME: &str = "filler";

/// Port number of the filler port
pub const FILLER_PORT: i32 = 1;

/// Prefix of every synthesized node-port name
pub const PORT_NAME_PREFIX: &str = "np-0x";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Requeue delay after a failed reconciliation (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Upper bound for the exponential requeue policy (5 minutes)
pub const MAX_REQUEUE_DURATION_SECS: u64 = 300;

/// Consecutive failures after which a key is reported as terminally failing
pub const TERMINAL_FAILURE_THRESHOLD: u32 = 10;

/// Interval between polls while waiting on host objects (1 second)
pub const ADDRESS_POLL_INTERVAL_MILLIS: u64 = 1000;

/// Upper bound for a single reconciliation, including waits (2 minutes)
pub const RECONCILE_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Process Defaults
// ============================================================================

/// Default bind address for the metrics and health endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Controller name, also used for runtime worker thread names
pub const CONTROLLER_NAME: &str = "nestlb";
