// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The aggregated, multi-cluster client.
//!
//! A [`ClustersClient`] wraps a [`ClientsPool`] of single-cluster clients that
//! all act as one identity, together with the namespaces that identity may
//! see on each cluster. Fan-out reads query every cluster concurrently and
//! report per-cluster failures next to whatever succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use kube::core::TypeMeta;
use kube::Resource;
use loom_clusters_k8s::{
	namespace_name, ApiResource, ClusterClient, DynamicObject, K8sError, ListParams, Namespace,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ClusterError, ClusterErrors, Partial, Result};
use crate::pool::ClientsPool;

/// Typed objects grouped by the cluster they came from.
#[derive(Debug, Clone)]
pub struct ClusteredList<K> {
	lists: BTreeMap<String, Vec<K>>,
}

impl<K> Default for ClusteredList<K> {
	fn default() -> Self {
		Self {
			lists: BTreeMap::new(),
		}
	}
}

impl<K> ClusteredList<K> {
	/// Objects from `cluster`, `None` if that cluster failed or is unknown.
	pub fn get(&self, cluster: &str) -> Option<&[K]> {
		self.lists.get(cluster).map(Vec::as_slice)
	}

	pub fn clusters(&self) -> impl Iterator<Item = &str> {
		self.lists.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &[K])> {
		self.lists.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
	}

	/// Every object, cluster by cluster in name order.
	pub fn items(&self) -> impl Iterator<Item = &K> {
		self.lists.values().flatten()
	}

	/// Total object count over all clusters.
	pub fn total(&self) -> usize {
		self.lists.values().map(Vec::len).sum()
	}

	pub fn into_inner(self) -> BTreeMap<String, Vec<K>> {
		self.lists
	}
}

/// Fan-out client over every cluster in a pool.
#[derive(Clone)]
pub struct ClustersClient {
	pool: ClientsPool,
	namespaces: BTreeMap<String, Vec<Namespace>>,
}

impl ClustersClient {
	pub fn new(pool: ClientsPool, namespaces: BTreeMap<String, Vec<Namespace>>) -> Self {
		Self { pool, namespaces }
	}

	pub fn pool(&self) -> &ClientsPool {
		&self.pool
	}

	/// Namespaces the identity may use, per cluster.
	pub fn namespaces(&self) -> &BTreeMap<String, Vec<Namespace>> {
		&self.namespaces
	}

	pub fn cluster_names(&self) -> Vec<String> {
		self.pool.clients().keys().cloned().collect()
	}

	/// The client for a single cluster.
	pub fn scoped(&self, cluster: &str) -> Result<Arc<dyn ClusterClient>> {
		self.pool.client(cluster)
	}

	/// Fetch one object from one cluster.
	pub async fn get<K>(&self, cluster: &str, namespace: Option<&str>, name: &str) -> Result<K>
	where
		K: Resource<DynamicType = ()> + DeserializeOwned,
	{
		let client = self.scoped(cluster)?;
		let resource = ApiResource::erase::<K>(&());
		let object = client
			.get(&resource, namespace, name)
			.await
			.and_then(parse_object::<K>)
			.map_err(|e| ClusterError::new(cluster, e))?;
		Ok(object)
	}

	/// List objects on one cluster, cluster-wide when `namespace` is `None`.
	pub async fn list<K>(
		&self,
		cluster: &str,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<K>>
	where
		K: Resource<DynamicType = ()> + DeserializeOwned,
	{
		let client = self.scoped(cluster)?;
		let resource = ApiResource::erase::<K>(&());
		let objects = client
			.list(&resource, namespace, params)
			.await
			.and_then(parse_items::<K>)
			.map_err(|e| ClusterError::new(cluster, e))?;
		Ok(objects)
	}

	/// List objects on every cluster concurrently.
	///
	/// With `restrict_to_accessible`, each cluster is queried once per
	/// namespace the identity may access instead of cluster-wide. A cluster
	/// with no accessible namespaces then yields an empty list, not an error.
	pub async fn clustered_list<K>(
		&self,
		params: &ListParams,
		restrict_to_accessible: bool,
	) -> Partial<ClusteredList<K>>
	where
		K: Resource<DynamicType = ()> + DeserializeOwned,
	{
		let resource = ApiResource::erase::<K>(&());

		let fetches = self.pool.clients().iter().map(|(cluster, client)| {
			let resource = &resource;
			async move {
				let objects = if restrict_to_accessible {
					self
						.list_accessible(cluster, client.as_ref(), resource, params)
						.await
				} else {
					client.list(resource, None, params).await
				};
				(cluster, objects.and_then(parse_items::<K>))
			}
		});

		let mut list = ClusteredList::default();
		let mut errors = ClusterErrors::new();
		for (cluster, result) in join_all(fetches).await {
			match result {
				Ok(items) => {
					list.lists.insert(cluster.clone(), items);
				}
				Err(e) => {
					warn!(cluster = %cluster, kind = %resource.kind, error = %e, "Clustered list failed");
					errors.push(ClusterError::new(cluster.as_str(), e));
				}
			}
		}

		Partial::new(list, errors)
	}

	async fn list_accessible(
		&self,
		cluster: &str,
		client: &dyn ClusterClient,
		resource: &ApiResource,
		params: &ListParams,
	) -> std::result::Result<Vec<DynamicObject>, K8sError> {
		let namespaces: &[Namespace] = self
			.namespaces
			.get(cluster)
			.map(Vec::as_slice)
			.unwrap_or_default();
		if namespaces.is_empty() {
			debug!(cluster = %cluster, "No accessible namespaces, skipping list");
			return Ok(Vec::new());
		}

		let lists = try_join_all(
			namespaces
				.iter()
				.map(|ns| client.list(resource, Some(namespace_name(ns)), params)),
		)
		.await?;
		Ok(lists.into_iter().flatten().collect())
	}
}

fn parse_items<K>(objects: Vec<DynamicObject>) -> std::result::Result<Vec<K>, K8sError>
where
	K: Resource<DynamicType = ()> + DeserializeOwned,
{
	objects.into_iter().map(parse_object::<K>).collect()
}

/// List responses usually omit `apiVersion` and `kind` on items; typed
/// deserialization needs them.
fn parse_object<K>(mut object: DynamicObject) -> std::result::Result<K, K8sError>
where
	K: Resource<DynamicType = ()> + DeserializeOwned,
{
	if object.types.is_none() {
		object.types = Some(TypeMeta {
			api_version: K::api_version(&()).into_owned(),
			kind: K::kind(&()).into_owned(),
		});
	}
	object.try_parse::<K>().map_err(|e| K8sError::Parse {
		kind: K::kind(&()).into_owned(),
		message: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ClustersError;
	use k8s_openapi::api::core::v1::Pod;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
	use loom_clusters_k8s::mock::{namespace, MockClusterClient};

	fn pod(name: &str, ns: &str) -> Pod {
		Pod {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some(ns.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn pod_names(pods: &[Pod]) -> Vec<&str> {
		let mut names: Vec<&str> = pods
			.iter()
			.filter_map(|p| p.metadata.name.as_deref())
			.collect();
		names.sort();
		names
	}

	/// east: pods in team-a and team-b. west: one pod in team-a.
	fn fixture() -> (ClientsPool, MockClusterClient, MockClusterClient) {
		let east = MockClusterClient::new();
		east.add(&pod("a1", "team-a"));
		east.add(&pod("a2", "team-a"));
		east.add(&pod("b1", "team-b"));
		let west = MockClusterClient::new();
		west.add(&pod("w1", "team-a"));

		let mut pool = ClientsPool::new();
		pool.add(Arc::new(east.clone()), "east").unwrap();
		pool.add(Arc::new(west.clone()), "west").unwrap();
		(pool, east, west)
	}

	#[tokio::test]
	async fn unrestricted_list_is_cluster_wide() {
		let (pool, _, _) = fixture();
		let client = ClustersClient::new(pool, BTreeMap::new());

		let result = client
			.clustered_list::<Pod>(&ListParams::default(), false)
			.await;
		assert!(!result.is_degraded());
		assert_eq!(pod_names(result.value.get("east").unwrap()), vec!["a1", "a2", "b1"]);
		assert_eq!(pod_names(result.value.get("west").unwrap()), vec!["w1"]);
		assert_eq!(result.value.total(), 4);
	}

	#[tokio::test]
	async fn restricted_list_covers_only_accessible_namespaces() {
		let (pool, east, _) = fixture();
		let namespaces = BTreeMap::from([
			("east".to_string(), vec![namespace("team-b")]),
			("west".to_string(), vec![namespace("team-a")]),
		]);
		let client = ClustersClient::new(pool, namespaces);

		let result = client.clustered_list::<Pod>(&ListParams::default(), true).await;
		assert!(!result.is_degraded());
		assert_eq!(pod_names(result.value.get("east").unwrap()), vec!["b1"]);
		assert_eq!(pod_names(result.value.get("west").unwrap()), vec!["w1"]);
		assert_eq!(east.list_calls(), 1);
	}

	#[tokio::test]
	async fn restricted_list_with_no_namespaces_is_empty_not_an_error() {
		let (pool, east, _) = fixture();
		let namespaces = BTreeMap::from([("west".to_string(), vec![namespace("team-a")])]);
		let client = ClustersClient::new(pool, namespaces);

		let result = client.clustered_list::<Pod>(&ListParams::default(), true).await;
		assert!(!result.is_degraded());
		assert!(result.value.get("east").unwrap().is_empty());
		assert_eq!(east.list_calls(), 0);
	}

	#[tokio::test]
	async fn failing_cluster_is_reported_alongside_successes() {
		let (pool, east, _) = fixture();
		east.fail_with("connection refused");
		let client = ClustersClient::new(pool, BTreeMap::new());

		let result = client
			.clustered_list::<Pod>(&ListParams::default(), false)
			.await;
		assert!(result.is_degraded());
		assert!(result.errors.contains("east"));
		assert!(result.value.get("east").is_none());
		assert_eq!(result.value.clusters().collect::<Vec<_>>(), vec!["west"]);
	}

	#[tokio::test]
	async fn typed_get_and_list_on_one_cluster() {
		let (pool, _, _) = fixture();
		let client = ClustersClient::new(pool, BTreeMap::new());

		let found: Pod = client.get("east", Some("team-b"), "b1").await.unwrap();
		assert_eq!(found.metadata.name.as_deref(), Some("b1"));

		let listed: Vec<Pod> = client
			.list("east", Some("team-a"), &ListParams::default())
			.await
			.unwrap();
		assert_eq!(pod_names(&listed), vec!["a1", "a2"]);
	}

	#[tokio::test]
	async fn errors_name_the_cluster() {
		let (pool, _, _) = fixture();
		let client = ClustersClient::new(pool, BTreeMap::new());

		let missing = client.get::<Pod>("east", Some("team-a"), "nope").await.unwrap_err();
		assert!(matches!(missing, ClustersError::Cluster(ref e) if e.cluster == "east"));

		let unknown = client.get::<Pod>("north", None, "a1").await.unwrap_err();
		assert!(matches!(unknown, ClustersError::ClusterNotFound { ref name } if name == "north"));
	}

	#[test]
	fn accessors() {
		let (pool, _, _) = fixture();
		let client = ClustersClient::new(
			pool,
			BTreeMap::from([("east".to_string(), vec![namespace("team-a")])]),
		);
		assert_eq!(client.cluster_names(), vec!["east", "west"]);
		assert_eq!(client.namespaces().len(), 1);
		assert!(client.scoped("west").is_ok());
		assert!(client.scoped("north").is_err());
	}
}
