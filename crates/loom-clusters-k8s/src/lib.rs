// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-cluster K8s abstractions for the Loom clusters manager.
//!
//! This crate provides:
//! - Trait-based collaborators (cluster factory, discovery, access checks)
//!   so the manager can be tested without a real API server
//! - Production implementations using the kube crate
//! - In-memory mocks for tests

mod checker;
mod client;
mod error;
mod fetcher;
mod kube_client;
pub mod mock;
mod types;

pub use checker::SubjectAccessChecker;
pub use client::{
	AccessReviewer, Clientset, Cluster, ClusterClient, ClusterFetcher, DiscoveryClient,
	NamespaceChecker,
};
pub use error::{K8sError, K8sResult};
pub use fetcher::{KubeconfigFetcher, SingleClusterFetcher, DEFAULT_CLUSTER_NAME};
pub use kube_client::{KubeCluster, KubeClientset, KubeClusterClient};
pub use types::{
	default_access_rules, namespace_name, AccessRule, ApiResource, DynamicObject, Info,
	ListParams, Namespace, UserPrincipal,
};
