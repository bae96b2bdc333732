// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants written on host objects.
//!
//! Host objects are aggregates of many guest objects, so they carry labels that
//! identify the controller and, for ingresses, the guest class they project.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/managed-by` on every host object this controller writes
pub const MANAGED_BY_NESTLB: &str = "nestlb";

/// Component value for the aggregated host load-balancer service
pub const COMPONENT_LB_SERVICE: &str = "lb-service";

/// Component value for aggregated host ingresses
pub const COMPONENT_LB_INGRESS: &str = "lb-ingress";

// ============================================================================
// nestlb-Specific Labels
// ============================================================================

/// Label recording which guest ingress class a host `Ingress` aggregates
pub const GUEST_INGRESS_CLASS_LABEL: &str = "nestlb.io/guest-ingress-class";
