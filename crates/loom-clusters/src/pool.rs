// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::sync::Arc;

use loom_clusters_k8s::ClusterClient;

use crate::error::{ClustersError, Result};

/// Single-cluster clients keyed by cluster name, all acting as one identity.
#[derive(Clone, Default)]
pub struct ClientsPool {
	clients: BTreeMap<String, Arc<dyn ClusterClient>>,
}

impl ClientsPool {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, client: Arc<dyn ClusterClient>, cluster: &str) -> Result<()> {
		if self.clients.contains_key(cluster) {
			return Err(ClustersError::DuplicateCluster {
				name: cluster.to_string(),
			});
		}
		self.clients.insert(cluster.to_string(), client);
		Ok(())
	}

	pub fn client(&self, cluster: &str) -> Result<Arc<dyn ClusterClient>> {
		self
			.clients
			.get(cluster)
			.cloned()
			.ok_or_else(|| ClustersError::ClusterNotFound {
				name: cluster.to_string(),
			})
	}

	pub fn clients(&self) -> &BTreeMap<String, Arc<dyn ClusterClient>> {
		&self.clients
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}
}
