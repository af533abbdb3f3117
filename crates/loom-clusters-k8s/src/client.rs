// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{
	AccessRule, ApiResource, DynamicObject, Info, ListParams, Namespace, UserPrincipal,
};

/// A client bound to one cluster and one identity.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the read operations the clusters manager fans out.
#[async_trait]
pub trait ClusterClient: Send + Sync {
	/// List objects of a resource, cluster-wide when `namespace` is `None`.
	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, K8sError>;

	/// Get a single object by name.
	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, K8sError>;
}

/// Answers "may the bound identity do X" questions.
#[async_trait]
pub trait AccessReviewer: Send + Sync {
	/// Run a SelfSubjectAccessReview for `rule` in `namespace`.
	async fn can_i(&self, rule: &AccessRule, namespace: &str) -> Result<bool, K8sError>;
}

/// Read-only view on what an API server serves.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
	async fn server_version(&self) -> Result<Info, K8sError>;

	/// Group/version strings served by the cluster, core `v1` included.
	async fn api_groups(&self) -> Result<Vec<String>, K8sError>;
}

/// Typed sub-clients for an identity on one cluster.
pub trait Clientset: Send + Sync {
	fn authorization(&self) -> Arc<dyn AccessReviewer>;
	fn discovery(&self) -> Arc<dyn DiscoveryClient>;
}

/// A cluster known to the manager and the factory for its clients.
///
/// Implementations are immutable: discovery replaces them wholesale.
pub trait Cluster: Send + Sync + std::fmt::Debug {
	/// Unique name of the cluster.
	fn name(&self) -> &str;

	/// True for the cluster that hosts the control plane.
	fn is_management(&self) -> bool {
		false
	}

	/// Client acting with the server's own credentials.
	fn server_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError>;

	/// Client impersonating `user`.
	fn user_client(&self, user: &UserPrincipal) -> Result<Arc<dyn ClusterClient>, K8sError>;

	/// Authorization and discovery clients impersonating `user`.
	fn user_clientset(&self, user: &UserPrincipal) -> Result<Arc<dyn Clientset>, K8sError>;
}

/// Source of the authoritative cluster list.
#[async_trait]
pub trait ClusterFetcher: Send + Sync {
	async fn fetch(&self) -> Result<Vec<Arc<dyn Cluster>>, K8sError>;
}

/// Narrows a namespace list down to the ones a user may use.
#[async_trait]
pub trait NamespaceChecker: Send + Sync {
	async fn filter_accessible_namespaces(
		&self,
		auth: &dyn AccessReviewer,
		namespaces: &[Namespace],
	) -> Result<Vec<Namespace>, K8sError>;
}
