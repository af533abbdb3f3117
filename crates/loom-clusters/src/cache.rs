// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespace and client caches.
//!
//! The namespace cache only changes on explicit writes and clears. The two
//! user-scoped caches expire entries after a fixed TTL; an expired entry
//! reads exactly like a missing one.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use loom_clusters_k8s::{Cluster, ClusterClient, Namespace};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::identity::Identity;

/// All namespaces of every cluster, as of the last successful list.
#[derive(Default)]
pub struct NamespaceCache {
	namespaces: RwLock<HashMap<String, Vec<Namespace>>>,
}

impl NamespaceCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, cluster: &str, namespaces: Vec<Namespace>) {
		self.namespaces.write().insert(cluster.to_string(), namespaces);
	}

	/// Empty when the cluster was never listed successfully.
	pub fn get(&self, cluster: &str) -> Vec<Namespace> {
		self.namespaces.read().get(cluster).cloned().unwrap_or_default()
	}

	pub fn get_all(&self) -> BTreeMap<String, Vec<Namespace>> {
		self
			.namespaces
			.read()
			.iter()
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect()
	}

	pub fn clear(&self) {
		self.namespaces.write().clear();
	}

	pub fn is_empty(&self) -> bool {
		self.namespaces.read().is_empty()
	}
}

struct TtlEntry<V> {
	value: V,
	expires_at: Instant,
}

/// A map whose entries expire a fixed duration after insertion.
///
/// Expired entries are dropped when read, and in bulk by
/// [`TtlCache::purge_expired`].
pub struct TtlCache<K, V> {
	entries: Mutex<HashMap<K, TtlEntry<V>>>,
	ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	pub fn new(ttl: Duration) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			ttl,
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	pub fn insert(&self, key: K, value: V) {
		let expires_at = Instant::now() + self.ttl;
		self.entries.lock().insert(key, TtlEntry { value, expires_at });
	}

	pub fn get(&self, key: &K) -> Option<V> {
		let now = Instant::now();
		let mut entries = self.entries.lock();
		match entries.get(key) {
			Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
			Some(_) => {
				entries.remove(key);
				None
			}
			None => None,
		}
	}

	/// Drop every expired entry, returning how many went.
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut entries = self.entries.lock();
		let before = entries.len();
		entries.retain(|_, entry| entry.expires_at > now);
		before - entries.len()
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	/// Number of stored entries, expired ones included until purged.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

type UserClusterKey = (Identity, String);

/// Namespaces each identity may access, per cluster.
pub struct UserNamespaceCache {
	cache: TtlCache<UserClusterKey, Vec<Namespace>>,
}

impl UserNamespaceCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			cache: TtlCache::new(ttl),
		}
	}

	pub fn set(&self, identity: &Identity, cluster: &str, namespaces: Vec<Namespace>) {
		self
			.cache
			.insert((identity.clone(), cluster.to_string()), namespaces);
	}

	pub fn get(&self, identity: &Identity, cluster: &str) -> Option<Vec<Namespace>> {
		self.cache.get(&(identity.clone(), cluster.to_string()))
	}

	/// Live entries for `identity` on the given clusters. Clusters without an
	/// entry are left out rather than mapped to an empty list.
	pub fn get_all(
		&self,
		identity: &Identity,
		clusters: &[Arc<dyn Cluster>],
	) -> BTreeMap<String, Vec<Namespace>> {
		clusters
			.iter()
			.filter_map(|c| {
				self
					.get(identity, c.name())
					.map(|ns| (c.name().to_string(), ns))
			})
			.collect()
	}

	pub fn purge_expired(&self) -> usize {
		self.cache.purge_expired()
	}

	pub fn clear(&self) {
		self.cache.clear();
	}

	pub fn len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}
}

/// Already-built clients per identity and cluster.
pub struct UserClientCache {
	cache: TtlCache<UserClusterKey, Arc<dyn ClusterClient>>,
}

impl UserClientCache {
	pub fn new(ttl: Duration) -> Self {
		Self {
			cache: TtlCache::new(ttl),
		}
	}

	pub fn set(&self, identity: &Identity, cluster: &str, client: Arc<dyn ClusterClient>) {
		self
			.cache
			.insert((identity.clone(), cluster.to_string()), client);
	}

	pub fn get(&self, identity: &Identity, cluster: &str) -> Option<Arc<dyn ClusterClient>> {
		self.cache.get(&(identity.clone(), cluster.to_string()))
	}

	pub fn purge_expired(&self) -> usize {
		self.cache.purge_expired()
	}

	pub fn len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_clusters_k8s::mock::{namespace, MockCluster, MockClusterClient};
	use loom_clusters_k8s::{namespace_name, UserPrincipal};

	fn alice() -> Identity {
		Identity::user(&UserPrincipal::new("alice", vec![])).unwrap()
	}

	#[test]
	fn namespace_cache_set_get_clear() {
		let cache = NamespaceCache::new();
		assert!(cache.get("east").is_empty());

		cache.set("east", vec![namespace("default"), namespace("apps")]);
		let names: Vec<_> = cache.get("east").iter().map(|n| namespace_name(n).to_string()).collect();
		assert_eq!(names, vec!["default", "apps"]);
		assert_eq!(cache.get_all().len(), 1);

		cache.clear();
		assert!(cache.is_empty());
		assert!(cache.get("east").is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn ttl_cache_expires_entries() {
		let cache = TtlCache::new(Duration::from_secs(30));
		cache.insert("k", 1);

		tokio::time::advance(Duration::from_secs(29)).await;
		assert_eq!(cache.get(&"k"), Some(1));

		tokio::time::advance(Duration::from_secs(2)).await;
		assert_eq!(cache.get(&"k"), None);
		assert!(cache.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn ttl_cache_reinsert_refreshes_expiry() {
		let cache = TtlCache::new(Duration::from_secs(10));
		cache.insert("k", 1);
		tokio::time::advance(Duration::from_secs(8)).await;
		cache.insert("k", 2);
		tokio::time::advance(Duration::from_secs(8)).await;
		assert_eq!(cache.get(&"k"), Some(2));
	}

	#[tokio::test(start_paused = true)]
	async fn purge_removes_only_expired() {
		let cache = TtlCache::new(Duration::from_secs(10));
		cache.insert("old", 1);
		tokio::time::advance(Duration::from_secs(6)).await;
		cache.insert("new", 2);
		tokio::time::advance(Duration::from_secs(6)).await;

		assert_eq!(cache.purge_expired(), 1);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get(&"new"), Some(2));
	}

	#[test]
	fn user_namespace_cache_is_keyed_by_identity() {
		let cache = UserNamespaceCache::new(Duration::from_secs(30));
		cache.set(&alice(), "east", vec![namespace("team-a")]);

		assert!(cache.get(&alice(), "east").is_some());
		assert!(cache.get(&Identity::Server, "east").is_none());
		assert!(cache.get(&alice(), "west").is_none());
	}

	#[test]
	fn user_namespace_get_all_skips_missing_clusters() {
		let cache = UserNamespaceCache::new(Duration::from_secs(30));
		cache.set(&alice(), "east", vec![]);

		let clusters: Vec<Arc<dyn Cluster>> = vec![
			Arc::new(MockCluster::new("east")),
			Arc::new(MockCluster::new("west")),
		];
		let all = cache.get_all(&alice(), &clusters);
		assert_eq!(all.keys().collect::<Vec<_>>(), vec!["east"]);
		assert!(all["east"].is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn user_client_cache_returns_same_client_within_ttl() {
		let cache = UserClientCache::new(Duration::from_secs(60));
		let client: Arc<dyn ClusterClient> = Arc::new(MockClusterClient::new());
		cache.set(&alice(), "east", Arc::clone(&client));

		let first = cache.get(&alice(), "east").unwrap();
		tokio::time::advance(Duration::from_secs(59)).await;
		let second = cache.get(&alice(), "east").unwrap();
		assert!(Arc::ptr_eq(&first, &client));
		assert!(Arc::ptr_eq(&second, &client));

		tokio::time::advance(Duration::from_secs(1)).await;
		assert!(cache.get(&alice(), "east").is_none());
	}
}
