// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_clusters::{ClusterErrors, ClustersManager};
use loom_clusters_k8s::namespace_name;
use serde::Serialize;

/// Point-in-time view of what the manager knows about its clusters.
#[derive(Debug, Serialize)]
pub struct Snapshot {
	pub clusters: Vec<ClusterSnapshot>,
	/// Clusters whose namespaces could not be listed, with the reason.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<ClusterFailure>,
}

#[derive(Debug, Serialize)]
pub struct ClusterSnapshot {
	pub name: String,
	pub management: bool,
	pub namespaces: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterFailure {
	pub cluster: String,
	pub error: String,
}

impl Snapshot {
	pub fn collect(manager: &ClustersManager, errors: &ClusterErrors) -> Self {
		let namespaces = manager.get_clusters_namespaces();
		let mut clusters: Vec<ClusterSnapshot> = manager
			.get_clusters()
			.iter()
			.map(|cluster| {
				let mut names: Vec<String> = namespaces
					.get(cluster.name())
					.map(|list| list.iter().map(|ns| namespace_name(ns).to_string()).collect())
					.unwrap_or_default();
				names.sort();
				ClusterSnapshot {
					name: cluster.name().to_string(),
					management: cluster.is_management(),
					namespaces: names,
				}
			})
			.collect();
		clusters.sort_by(|a, b| a.name.cmp(&b.name));

		let errors = errors
			.iter()
			.map(|e| ClusterFailure {
				cluster: e.cluster.clone(),
				error: e.source.to_string(),
			})
			.collect();

		Self { clusters, errors }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_clusters::{ClustersError, ManagerConfig};
	use loom_clusters_k8s::mock::{MockCluster, MockClusterFetcher};
	use loom_clusters_k8s::{Cluster, SubjectAccessChecker};
	use std::sync::Arc;

	#[tokio::test]
	async fn test_snapshot_lists_clusters_and_namespaces() {
		let mgmt = MockCluster::with_namespaces("mgmt", &["flux-system", "default"]).management();
		let leaf = MockCluster::with_namespaces("leaf", &["apps"]);
		let clusters: Vec<Arc<dyn Cluster>> = vec![Arc::new(mgmt), Arc::new(leaf)];
		let manager = ClustersManager::new(
			Arc::new(MockClusterFetcher::new(clusters)),
			Arc::new(SubjectAccessChecker::default()),
			ManagerConfig::default(),
		)
		.unwrap();

		manager.update_clusters().await.unwrap();
		manager.update_namespaces().await.unwrap();

		let snapshot = Snapshot::collect(&manager, &ClusterErrors::default());
		let json = serde_json::to_value(&snapshot).unwrap();
		assert_eq!(
			json,
			serde_json::json!({
				"clusters": [
					{ "name": "leaf", "management": false, "namespaces": ["apps"] },
					{ "name": "mgmt", "management": true, "namespaces": ["default", "flux-system"] },
				]
			})
		);
	}

	#[tokio::test]
	async fn test_snapshot_reports_failed_clusters() {
		let broken = MockCluster::new("broken");
		broken.store().fail_with("connection refused");
		let clusters: Vec<Arc<dyn Cluster>> = vec![Arc::new(broken)];
		let manager = ClustersManager::new(
			Arc::new(MockClusterFetcher::new(clusters)),
			Arc::new(SubjectAccessChecker::default()),
			ManagerConfig::default(),
		)
		.unwrap();

		manager.update_clusters().await.unwrap();
		let errors = match manager.update_namespaces().await {
			Err(ClustersError::Partial(errors)) => errors,
			other => panic!("expected partial failure, got {other:?}"),
		};

		let snapshot = Snapshot::collect(&manager, &errors);
		assert_eq!(snapshot.clusters.len(), 1);
		assert!(snapshot.clusters[0].namespaces.is_empty());
		assert_eq!(snapshot.errors.len(), 1);
		assert_eq!(snapshot.errors[0].cluster, "broken");
		assert!(snapshot.errors[0].error.contains("connection refused"));
	}
}
