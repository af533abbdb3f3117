// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
	ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, instrument};

use crate::client::{AccessReviewer, Clientset, Cluster, ClusterClient, DiscoveryClient};
use crate::error::{is_not_found, K8sError};
use crate::types::{AccessRule, ApiResource, DynamicObject, Info, ListParams, UserPrincipal};

/// Production cluster client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClusterClient {
	client: Client,
}

impl KubeClusterClient {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
		match namespace {
			Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
			None => Api::all_with(self.client.clone(), resource),
		}
	}
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, K8sError> {
		let list = self.api(resource, namespace).list(params).await?;
		Ok(list.items)
	}

	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, K8sError> {
		match self.api(resource, namespace).get(name).await {
			Ok(obj) => Ok(obj),
			Err(e) if is_not_found(&e) => Err(K8sError::ObjectNotFound { name: name.into() }),
			Err(e) => Err(e.into()),
		}
	}
}

/// Authorization and discovery over one impersonated kube client.
#[derive(Clone)]
pub struct KubeClientset {
	client: Client,
}

impl KubeClientset {
	pub fn new(client: Client) -> Self {
		Self { client }
	}
}

impl Clientset for KubeClientset {
	fn authorization(&self) -> Arc<dyn AccessReviewer> {
		Arc::new(self.clone())
	}

	fn discovery(&self) -> Arc<dyn DiscoveryClient> {
		Arc::new(self.clone())
	}
}

#[async_trait]
impl AccessReviewer for KubeClientset {
	#[instrument(skip(self), fields(rule = %rule))]
	async fn can_i(&self, rule: &AccessRule, namespace: &str) -> Result<bool, K8sError> {
		let review = SelfSubjectAccessReview {
			metadata: Default::default(),
			spec: SelfSubjectAccessReviewSpec {
				resource_attributes: Some(ResourceAttributes {
					group: Some(rule.group.clone()),
					resource: Some(rule.resource.clone()),
					verb: Some(rule.verb.clone()),
					namespace: Some(namespace.to_string()),
					..Default::default()
				}),
				non_resource_attributes: None,
			},
			status: None,
		};

		let reviews: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
		let response = reviews
			.create(&PostParams::default(), &review)
			.await
			.map_err(|e| K8sError::AccessReview {
				message: e.to_string(),
			})?;

		let allowed = response.status.map(|s| s.allowed).unwrap_or(false);
		debug!(allowed, "SelfSubjectAccessReview answered");
		Ok(allowed)
	}
}

#[async_trait]
impl DiscoveryClient for KubeClientset {
	async fn server_version(&self) -> Result<Info, K8sError> {
		self
			.client
			.apiserver_version()
			.await
			.map_err(|e| K8sError::Discovery {
				message: e.to_string(),
			})
	}

	async fn api_groups(&self) -> Result<Vec<String>, K8sError> {
		let discovery_err = |e: kube::Error| K8sError::Discovery {
			message: e.to_string(),
		};

		let core = self
			.client
			.list_core_api_versions()
			.await
			.map_err(discovery_err)?;
		let groups = self.client.list_api_groups().await.map_err(discovery_err)?;

		let mut versions = core.versions;
		for group in groups.groups {
			versions.extend(group.versions.into_iter().map(|v| v.group_version));
		}
		Ok(versions)
	}
}

/// A cluster reachable through a kube `Config`.
///
/// User clients are built by impersonating the user on top of the server
/// credentials.
#[derive(Clone)]
pub struct KubeCluster {
	name: String,
	config: Config,
	management: bool,
}

impl std::fmt::Debug for KubeCluster {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KubeCluster")
			.field("name", &self.name)
			.field("server", &self.config.cluster_url.to_string())
			.field("management", &self.management)
			.finish()
	}
}

impl KubeCluster {
	pub fn new(name: impl Into<String>, config: Config, management: bool) -> Self {
		Self {
			name: name.into(),
			config,
			management,
		}
	}

	/// Build from the in-cluster service account or the local kubeconfig.
	pub async fn infer(name: impl Into<String>, management: bool) -> Result<Self, K8sError> {
		let config = Config::infer().await?;
		Ok(Self::new(name, config, management))
	}

	/// Build strictly from the pod's service account.
	pub fn in_cluster(name: impl Into<String>, management: bool) -> Result<Self, K8sError> {
		let config = Config::incluster()?;
		Ok(Self::new(name, config, management))
	}

	/// Build from one context of a parsed kubeconfig.
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: &str,
		management: bool,
	) -> Result<Self, K8sError> {
		let options = KubeConfigOptions {
			context: Some(context.to_string()),
			..Default::default()
		};
		let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
		Ok(Self::new(context, config, management))
	}

	fn impersonated_config(&self, user: &UserPrincipal) -> Config {
		let mut config = self.config.clone();
		config.auth_info.impersonate = Some(user.id.clone());
		config.auth_info.impersonate_groups = if user.groups.is_empty() {
			None
		} else {
			Some(user.groups.clone())
		};
		config
	}

	fn build_client(&self, config: Config) -> Result<Client, K8sError> {
		Client::try_from(config).map_err(|e| K8sError::Config {
			message: format!("cluster {}: {e}", self.name),
		})
	}
}

impl Cluster for KubeCluster {
	fn name(&self) -> &str {
		&self.name
	}

	fn is_management(&self) -> bool {
		self.management
	}

	fn server_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError> {
		let client = self.build_client(self.config.clone())?;
		Ok(Arc::new(KubeClusterClient::new(client)))
	}

	fn user_client(&self, user: &UserPrincipal) -> Result<Arc<dyn ClusterClient>, K8sError> {
		let client = self.build_client(self.impersonated_config(user))?;
		Ok(Arc::new(KubeClusterClient::new(client)))
	}

	fn user_clientset(&self, user: &UserPrincipal) -> Result<Arc<dyn Clientset>, K8sError> {
		let client = self.build_client(self.impersonated_config(user))?;
		Ok(Arc::new(KubeClientset::new(client)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config() -> Config {
		Config::new("https://cluster.example.com:6443".parse().unwrap())
	}

	#[test]
	fn impersonated_config_sets_user_and_groups() {
		let cluster = KubeCluster::new("prod", test_config(), false);
		let user = UserPrincipal::new("alice", vec!["devs".to_string(), "ops".to_string()]);

		let config = cluster.impersonated_config(&user);

		assert_eq!(config.auth_info.impersonate, Some("alice".to_string()));
		assert_eq!(
			config.auth_info.impersonate_groups,
			Some(vec!["devs".to_string(), "ops".to_string()])
		);
		assert!(cluster.config.auth_info.impersonate.is_none());
	}

	#[test]
	fn impersonated_config_omits_empty_groups() {
		let cluster = KubeCluster::new("prod", test_config(), false);
		let config = cluster.impersonated_config(&UserPrincipal::new("bob", vec![]));

		assert_eq!(config.auth_info.impersonate, Some("bob".to_string()));
		assert!(config.auth_info.impersonate_groups.is_none());
	}

	#[test]
	fn cluster_reports_name_and_marker() {
		let cluster = KubeCluster::new("mgmt", test_config(), true);
		assert_eq!(cluster.name(), "mgmt");
		assert!(cluster.is_management());
		assert!(format!("{cluster:?}").contains("cluster.example.com"));
	}
}
