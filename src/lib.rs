// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # nestlb - Load-balancer and ingress projection for nested clusters
//!
//! nestlb watches a guest Kubernetes cluster that runs inside a host cluster and
//! projects the guest's externally reachable objects onto the host:
//!
//! - Every guest `NodePort`/`LoadBalancer` `Service` contributes its node ports to
//!   one aggregated host `Service` whose address is reported back to the guest.
//! - Every guest `Ingress` whose class is mapped contributes its host/path rules
//!   to one aggregated host `Ingress` per class.
//!
//! ## Modules
//!
//! - [`config`] - Release configuration and class mapping table
//! - [`context`] - Shared context handed to both aggregators
//! - [`controller`] - kube-runtime controllers driving the aggregators
//! - [`reconcilers`] - The Service and Ingress aggregators
//! - [`store`] - Object store seam over the Kubernetes API
//! - [`naming`] - Deterministic host port names
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use nestlb::naming::checksum_name;
//!
//! assert_eq!(checksum_name("default/web/80"), "np-0x285904ea");
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod naming;
pub mod reconcilers;
pub mod store;
