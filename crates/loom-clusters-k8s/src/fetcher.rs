// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster discovery sources.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kube::config::Kubeconfig;
use tracing::{debug, instrument};

use crate::client::{Cluster, ClusterFetcher};
use crate::error::K8sError;
use crate::kube_client::KubeCluster;

/// Name given to the only cluster of a single-cluster deployment.
pub const DEFAULT_CLUSTER_NAME: &str = "Default";

/// Always reports the same, single cluster.
pub struct SingleClusterFetcher {
	cluster: Arc<dyn Cluster>,
}

impl SingleClusterFetcher {
	pub fn new(cluster: Arc<dyn Cluster>) -> Self {
		Self { cluster }
	}

	/// Management cluster from the in-cluster service account or local
	/// kubeconfig.
	pub async fn infer(name: &str) -> Result<Self, K8sError> {
		let cluster = KubeCluster::infer(name, true).await?;
		Ok(Self::new(Arc::new(cluster)))
	}

	/// Management cluster from the pod's service account only.
	pub fn in_cluster(name: &str) -> Result<Self, K8sError> {
		let cluster = KubeCluster::in_cluster(name, true)?;
		Ok(Self::new(Arc::new(cluster)))
	}
}

#[async_trait]
impl ClusterFetcher for SingleClusterFetcher {
	async fn fetch(&self) -> Result<Vec<Arc<dyn Cluster>>, K8sError> {
		Ok(vec![Arc::clone(&self.cluster)])
	}
}

/// Reads a kubeconfig file on every fetch and yields one cluster per context.
///
/// Editing the file (or having an external controller rewrite it) is how
/// clusters come and go.
pub struct KubeconfigFetcher {
	path: PathBuf,
	management_context: Option<String>,
}

impl KubeconfigFetcher {
	pub fn new(path: impl Into<PathBuf>, management_context: Option<String>) -> Self {
		Self {
			path: path.into(),
			management_context,
		}
	}

	fn is_management(&self, kubeconfig: &Kubeconfig, context: &str) -> bool {
		match &self.management_context {
			Some(mgmt) => mgmt == context,
			None => kubeconfig.current_context.as_deref() == Some(context),
		}
	}
}

#[async_trait]
impl ClusterFetcher for KubeconfigFetcher {
	#[instrument(skip(self), fields(path = %self.path.display()))]
	async fn fetch(&self) -> Result<Vec<Arc<dyn Cluster>>, K8sError> {
		let content =
			tokio::fs::read_to_string(&self.path)
				.await
				.map_err(|e| K8sError::Kubeconfig {
					message: format!("failed to read {}: {e}", self.path.display()),
				})?;
		let kubeconfig = Kubeconfig::from_yaml(&content)?;

		let mut clusters: Vec<Arc<dyn Cluster>> = Vec::with_capacity(kubeconfig.contexts.len());
		for context in &kubeconfig.contexts {
			let management = self.is_management(&kubeconfig, &context.name);
			let cluster = KubeCluster::from_kubeconfig(kubeconfig.clone(), &context.name, management)
				.await
				.map_err(|e| K8sError::Kubeconfig {
					message: format!("context {}: {e}", context.name),
				})?;
			clusters.push(Arc::new(cluster));
		}

		debug!(count = clusters.len(), "Fetched clusters from kubeconfig");
		Ok(clusters)
	}
}
