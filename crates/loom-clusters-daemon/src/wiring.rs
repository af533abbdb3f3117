// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds the manager's collaborators from resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use loom_clusters::{ClustersManager, ManagerConfig};
use loom_clusters_config::{ClustersConfig, DiscoveryConfig, DiscoveryMode, RefreshConfig};
use loom_clusters_k8s::{
	ClusterFetcher, KubeconfigFetcher, NamespaceChecker, SingleClusterFetcher,
	SubjectAccessChecker,
};
use tracing::info;

pub fn manager_config(refresh: &RefreshConfig) -> ManagerConfig {
	ManagerConfig {
		clusters_refresh_interval: refresh.clusters_interval(),
		namespaces_refresh_interval: refresh.namespaces_interval(),
		user_namespaces_ttl: refresh.user_namespaces_ttl(),
		user_clients_ttl: refresh.user_clients_ttl(),
	}
}

pub async fn build_fetcher(discovery: &DiscoveryConfig) -> Result<Arc<dyn ClusterFetcher>> {
	let name = discovery.default_cluster_name.as_str();
	let fetcher: Arc<dyn ClusterFetcher> = match discovery.mode {
		DiscoveryMode::InCluster => Arc::new(
			SingleClusterFetcher::in_cluster(name)
				.context("failed to load in-cluster service account config")?,
		),
		DiscoveryMode::Single => Arc::new(
			SingleClusterFetcher::infer(name)
				.await
				.context("failed to infer kube config")?,
		),
		DiscoveryMode::Kubeconfig => {
			let path = discovery
				.kubeconfig_path
				.clone()
				.context("kubeconfig discovery needs discovery.kubeconfig_path")?;
			Arc::new(KubeconfigFetcher::new(
				path,
				discovery.management_context.clone(),
			))
		}
	};

	info!(mode = %discovery.mode, "Cluster discovery configured");
	Ok(fetcher)
}

pub fn build_checker(config: &ClustersConfig) -> Result<Arc<dyn NamespaceChecker>> {
	let rules = config.access.access_rules()?;
	Ok(Arc::new(SubjectAccessChecker::new(
		rules,
		config.access.concurrency,
	)))
}

pub async fn build_manager(config: &ClustersConfig) -> Result<Arc<ClustersManager>> {
	let fetcher = build_fetcher(&config.discovery).await?;
	let checker = build_checker(config)?;
	let manager = ClustersManager::new(fetcher, checker, manager_config(&config.refresh))?;
	Ok(Arc::new(manager))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn test_manager_config_from_refresh() {
		let refresh = RefreshConfig {
			clusters_interval_secs: 10,
			namespaces_interval_secs: 20,
			user_namespaces_ttl_secs: 5,
			user_clients_ttl_secs: 600,
		};
		let config = manager_config(&refresh);
		assert_eq!(config.clusters_refresh_interval, Duration::from_secs(10));
		assert_eq!(config.namespaces_refresh_interval, Duration::from_secs(20));
		assert_eq!(config.user_namespaces_ttl, Duration::from_secs(5));
		assert_eq!(config.user_clients_ttl, Duration::from_secs(600));
	}

	#[test]
	fn test_default_refresh_matches_manager_defaults() {
		assert_eq!(
			manager_config(&RefreshConfig::default()),
			ManagerConfig::default()
		);
	}

	#[test]
	fn test_checker_uses_configured_rules() {
		let mut config = ClustersConfig::default();
		config.access.rules = vec!["apps/deployments:list".to_string()];
		assert!(build_checker(&config).is_ok());

		config.access.rules = vec!["deployments".to_string()];
		assert!(build_checker(&config).is_err());
	}

	#[tokio::test]
	async fn test_kubeconfig_fetcher_is_lazy() {
		let mut config = ClustersConfig::default();
		config.discovery.mode = DiscoveryMode::Kubeconfig;
		config.discovery.kubeconfig_path = Some("/nonexistent/fleet.yaml".into());

		let fetcher = build_fetcher(&config.discovery).await.unwrap();
		assert!(fetcher.fetch().await.is_err());
	}

	#[tokio::test]
	async fn test_kubeconfig_mode_without_path_fails() {
		let discovery = DiscoveryConfig {
			mode: DiscoveryMode::Kubeconfig,
			..DiscoveryConfig::default()
		};
		assert!(build_fetcher(&discovery).await.is_err());
	}
}
