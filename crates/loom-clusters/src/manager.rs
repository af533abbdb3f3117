// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The clusters manager.
//!
//! Keeps the cluster set and the namespace caches fresh in the background and
//! hands out fan-out clients acting as the server or as an impersonated user.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use loom_clusters_k8s::{
	Cluster, ClusterClient, ClusterFetcher, DiscoveryClient, K8sError, ListParams, Namespace,
	NamespaceChecker, UserPrincipal,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{NamespaceCache, UserClientCache, UserNamespaceCache};
use crate::client::ClustersClient;
use crate::config::ManagerConfig;
use crate::error::{ClusterError, ClusterErrors, ClustersError, Partial, Result};
use crate::identity::Identity;
use crate::metrics::Metrics;
use crate::pool::ClientsPool;
use crate::registry::ClusterSet;
use crate::watcher::{ClustersWatcher, WatcherHub};

pub struct ClustersManager {
	fetcher: Arc<dyn ClusterFetcher>,
	checker: Arc<dyn NamespaceChecker>,
	config: ManagerConfig,

	clusters: ClusterSet,
	/// Registry hash the namespace caches were last filled against.
	clusters_hash: Mutex<String>,
	namespaces: NamespaceCache,
	user_namespaces: UserNamespaceCache,
	user_clients: UserClientCache,

	watchers: Arc<WatcherHub>,
	metrics: Arc<Metrics>,
	/// Flipped once the first cluster discovery attempt has finished.
	initial_load: watch::Sender<bool>,
}

impl ClustersManager {
	pub fn new(
		fetcher: Arc<dyn ClusterFetcher>,
		checker: Arc<dyn NamespaceChecker>,
		config: ManagerConfig,
	) -> Result<Self> {
		let metrics = Arc::new(Metrics::new()?);
		Ok(Self::with_metrics(fetcher, checker, config, metrics))
	}

	/// Build a manager that reports into an existing [`Metrics`].
	pub fn with_metrics(
		fetcher: Arc<dyn ClusterFetcher>,
		checker: Arc<dyn NamespaceChecker>,
		config: ManagerConfig,
		metrics: Arc<Metrics>,
	) -> Self {
		let (initial_load, _) = watch::channel(false);
		Self {
			fetcher,
			checker,
			clusters: ClusterSet::new(),
			clusters_hash: Mutex::new(String::new()),
			namespaces: NamespaceCache::new(),
			user_namespaces: UserNamespaceCache::new(config.user_namespaces_ttl),
			user_clients: UserClientCache::new(config.user_clients_ttl),
			watchers: WatcherHub::new(),
			metrics,
			initial_load,
			config,
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	pub fn metrics(&self) -> &Arc<Metrics> {
		&self.metrics
	}

	/// Spawn the cluster and namespace refresh loops. Both stop when
	/// `shutdown` is cancelled.
	pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
		let clusters_loop = tokio::spawn(Arc::clone(self).watch_clusters(shutdown.clone()));
		let namespaces_loop = tokio::spawn(Arc::clone(self).watch_namespaces(shutdown));
		info!(
			clusters_interval_secs = self.config.clusters_refresh_interval.as_secs(),
			namespaces_interval_secs = self.config.namespaces_refresh_interval.as_secs(),
			"Clusters manager started"
		);
		vec![clusters_loop, namespaces_loop]
	}

	async fn watch_clusters(self: Arc<Self>, shutdown: CancellationToken) {
		let interval = self.config.clusters_refresh_interval;
		loop {
			tokio::select! {
				result = self.update_clusters() => {
					if let Err(e) = result {
						error!(error = %e, "Failed to update clusters");
					}
				}
				_ = shutdown.cancelled() => {
					info!("Shutting down cluster refresh loop");
					return;
				}
			}
			self.initial_load.send_replace(true);

			tokio::select! {
				_ = tokio::time::sleep(interval) => {}
				_ = shutdown.cancelled() => {
					info!("Shutting down cluster refresh loop");
					return;
				}
			}
		}
	}

	async fn watch_namespaces(self: Arc<Self>, shutdown: CancellationToken) {
		let mut initial_load = self.initial_load.subscribe();
		tokio::select! {
			loaded = async { initial_load.wait_for(|done| *done).await.is_ok() } => {
				if !loaded {
					return;
				}
			}
			_ = shutdown.cancelled() => {
				info!("Shutting down namespace refresh loop");
				return;
			}
		}

		let interval = self.config.namespaces_refresh_interval;
		loop {
			tokio::select! {
				result = self.update_namespaces() => {
					match result {
						Ok(()) => {}
						Err(ClustersError::Partial(errors)) => {
							for err in errors {
								error!(cluster = %err.cluster, error = %err.source, "Failed to update namespaces");
							}
						}
						Err(e) => error!(error = %e, "Failed to update namespaces"),
					}
				}
				_ = shutdown.cancelled() => {
					info!("Shutting down namespace refresh loop");
					return;
				}
			}
			self.purge_expired();

			tokio::select! {
				_ = tokio::time::sleep(interval) => {}
				_ = shutdown.cancelled() => {
					info!("Shutting down namespace refresh loop");
					return;
				}
			}
		}
	}

	/// Drop expired entries from the user-scoped caches.
	pub fn purge_expired(&self) {
		let namespaces = self.user_namespaces.purge_expired();
		let clients = self.user_clients.purge_expired();
		if namespaces + clients > 0 {
			debug!(namespaces, clients, "Purged expired cache entries");
		}
	}

	/// Fetch the cluster list and notify watchers if membership changed.
	///
	/// On a fetch failure the previous cluster set stays in place.
	#[instrument(skip(self))]
	pub async fn update_clusters(&self) -> Result<()> {
		let clusters = self.fetcher.fetch().await.map_err(ClustersError::Fetch)?;
		let (added, removed) = self.clusters.set(clusters);

		self.metrics.update_clusters.inc();
		self.metrics.clusters.set(self.clusters.len() as f64);
		for cluster in &removed {
			self.metrics.forget_cluster(cluster.name());
		}

		if added.is_empty() && removed.is_empty() {
			return Ok(());
		}

		info!(
			added = ?added.iter().map(|c| c.name()).collect::<Vec<_>>(),
			removed = ?removed.iter().map(|c| c.name()).collect::<Vec<_>>(),
			"Cluster set changed"
		);
		self.watchers.notify(added, removed).await;
		Ok(())
	}

	/// List namespaces on every cluster with the server's credentials and
	/// refresh the namespace cache. Clusters that fail keep their previous
	/// entry and are reported in the returned error.
	#[instrument(skip(self))]
	pub async fn update_namespaces(&self) -> Result<()> {
		let Partial {
			value: client,
			errors: mut failures,
		} = self.server_client_with(BTreeMap::new());

		self.sync_caches();

		let listed = client
			.clustered_list::<Namespace>(&ListParams::default(), false)
			.await;
		let Partial { value, errors } = listed;
		for (cluster, namespaces) in value.into_inner() {
			self
				.metrics
				.namespaces
				.with_label_values(&[cluster.as_str()])
				.set(namespaces.len() as f64);
			self.namespaces.set(&cluster, namespaces);
		}
		failures.extend(errors);

		self.metrics.update_namespaces.inc();
		failures.into_result().map_err(ClustersError::Partial)
	}

	/// Clear both namespace caches when the cluster set changed since they
	/// were last filled.
	fn sync_caches(&self) {
		let hash = self.clusters.hash();
		let mut current = self.clusters_hash.lock();
		if *current != hash {
			info!("Clearing namespace caches");
			self.namespaces.clear();
			self.user_namespaces.clear();
			*current = hash;
		}
	}

	/// A fan-out client impersonating `user` on every cluster.
	///
	/// Clusters whose client cannot be built are left out of the pool and
	/// reported in [`Partial::errors`].
	#[instrument(skip(self, user), fields(user = %user.id))]
	pub async fn get_impersonated_client(
		&self,
		user: &UserPrincipal,
	) -> Result<Partial<ClustersClient>> {
		let identity = Identity::user(user)?;
		let clusters = self.clusters.get();

		let mut pool = ClientsPool::new();
		let mut errors = ClusterErrors::new();
		for cluster in &clusters {
			if let Err(e) = self.add_to_pool(&mut pool, &identity, cluster.as_ref()) {
				warn!(cluster = %cluster.name(), error = %e.source, "Failed to build user client");
				errors.push(e);
			}
		}

		let namespaces = self.user_namespace_list(user, &identity).await;
		Ok(Partial::new(ClustersClient::new(pool, namespaces), errors))
	}

	/// Like [`Self::get_impersonated_client`] for a single cluster.
	#[instrument(skip(self, user), fields(user = %user.id))]
	pub async fn get_impersonated_client_for_cluster(
		&self,
		user: &UserPrincipal,
		cluster: &str,
	) -> Result<ClustersClient> {
		let identity = Identity::user(user)?;
		let cluster = self.find_cluster(cluster)?;

		let mut pool = ClientsPool::new();
		self.add_to_pool(&mut pool, &identity, cluster.as_ref())?;

		let namespaces = self.user_namespace_list(user, &identity).await;
		Ok(ClustersClient::new(pool, namespaces))
	}

	/// A discovery client impersonating `user`. Never cached.
	pub fn get_impersonated_discovery_client(
		&self,
		user: &UserPrincipal,
		cluster: &str,
	) -> Result<Arc<dyn DiscoveryClient>> {
		let _ = Identity::user(user)?;
		let cluster = self.find_cluster(cluster)?;
		let clientset = cluster
			.user_clientset(user)
			.map_err(|e| ClusterError::new(cluster.name(), e))?;
		Ok(clientset.discovery())
	}

	/// A fan-out client with the server's own credentials, scoped to every
	/// cached namespace.
	pub fn get_server_client(&self) -> Partial<ClustersClient> {
		self.server_client_with(self.namespaces.get_all())
	}

	fn server_client_with(
		&self,
		namespaces: BTreeMap<String, Vec<Namespace>>,
	) -> Partial<ClustersClient> {
		let mut pool = ClientsPool::new();
		let mut errors = ClusterErrors::new();
		for cluster in self.clusters.get() {
			if let Err(e) = self.add_to_pool(&mut pool, &Identity::Server, cluster.as_ref()) {
				warn!(cluster = %cluster.name(), error = %e.source, "Failed to build server client");
				errors.push(e);
			}
		}
		Partial::new(ClustersClient::new(pool, namespaces), errors)
	}

	fn add_to_pool(
		&self,
		pool: &mut ClientsPool,
		identity: &Identity,
		cluster: &dyn Cluster,
	) -> std::result::Result<(), ClusterError> {
		let client = self
			.get_or_create_client(identity, cluster)
			.map_err(|e| ClusterError::new(cluster.name(), e))?;
		pool
			.add(client, cluster.name())
			.map_err(|e| ClusterError::new(cluster.name(), e))
	}

	/// Cached client for `identity` on `cluster`, built on a miss.
	///
	/// Two concurrent misses on the same key may both build a client; the
	/// later write wins and both callers get a working client.
	fn get_or_create_client(
		&self,
		identity: &Identity,
		cluster: &dyn Cluster,
	) -> std::result::Result<Arc<dyn ClusterClient>, K8sError> {
		if let Some(client) = self.user_clients.get(identity, cluster.name()) {
			return Ok(client);
		}

		let client = match identity.principal() {
			None => {
				let client = cluster.server_client()?;
				self
					.metrics
					.create_server_client
					.with_label_values(&[cluster.name()])
					.inc();
				client
			}
			Some(user) => {
				let client = cluster.user_client(&user)?;
				self
					.metrics
					.create_user_client
					.with_label_values(&[cluster.name()])
					.inc();
				client
			}
		};
		debug!(cluster = %cluster.name(), identity = %identity, "Created cluster client");

		self
			.user_clients
			.set(identity, cluster.name(), Arc::clone(&client));
		Ok(client)
	}

	/// Recompute which cached namespaces `user` may access on every cluster.
	///
	/// Failures are logged per cluster and leave that cluster's entry unset.
	#[instrument(skip(self, user), fields(user = %user.id))]
	pub async fn update_user_namespaces(&self, user: &UserPrincipal) {
		let identity = match Identity::user(user) {
			Ok(identity) => identity,
			Err(e) => {
				warn!(error = %e, "Skipping user namespace update");
				return;
			}
		};
		self.refresh_user_namespaces(user, &identity).await;
	}

	async fn refresh_user_namespaces(&self, user: &UserPrincipal, identity: &Identity) {
		let clusters = self.clusters.get();
		let checks = clusters.iter().map(|cluster| async move {
			let name = cluster.name();
			let namespaces = self.namespaces.get(name);

			let clientset = match cluster.user_clientset(user) {
				Ok(clientset) => clientset,
				Err(e) => {
					error!(cluster = %name, user = %user.id, error = %e, "Failed to create clientset");
					return;
				}
			};

			let auth = clientset.authorization();
			match self
				.checker
				.filter_accessible_namespaces(auth.as_ref(), &namespaces)
				.await
			{
				Ok(accessible) => self.user_namespaces.set(identity, name, accessible),
				Err(e) => {
					error!(cluster = %name, user = %user.id, error = %e, "Failed to filter namespaces");
				}
			}
		});
		join_all(checks).await;
	}

	/// Cached namespaces for the user, computed first when nothing is cached.
	async fn user_namespace_list(
		&self,
		user: &UserPrincipal,
		identity: &Identity,
	) -> BTreeMap<String, Vec<Namespace>> {
		let cached = self.user_namespaces.get_all(identity, &self.clusters.get());
		if !cached.is_empty() {
			return cached;
		}
		self.refresh_user_namespaces(user, identity).await;
		self.user_namespaces.get_all(identity, &self.clusters.get())
	}

	/// Live cached namespaces for `user`. Never triggers a computation.
	pub fn get_user_namespaces(&self, user: &UserPrincipal) -> BTreeMap<String, Vec<Namespace>> {
		match Identity::user(user) {
			Ok(identity) => self.user_namespaces.get_all(&identity, &self.clusters.get()),
			Err(_) => BTreeMap::new(),
		}
	}

	pub fn get_clusters_namespaces(&self) -> BTreeMap<String, Vec<Namespace>> {
		self.namespaces.get_all()
	}

	pub fn get_clusters(&self) -> Vec<Arc<dyn Cluster>> {
		self.clusters.get()
	}

	/// The cluster hosting the control plane, if discovery marked one.
	pub fn management_cluster(&self) -> Option<Arc<dyn Cluster>> {
		self.clusters.get().into_iter().find(|c| c.is_management())
	}

	pub fn subscribe(&self) -> ClustersWatcher {
		self.watchers.subscribe()
	}

	pub fn remove_watcher(&self, watcher: &ClustersWatcher) {
		self.watchers.remove(watcher.id());
	}

	fn find_cluster(&self, name: &str) -> Result<Arc<dyn Cluster>> {
		self
			.clusters
			.find(name)
			.ok_or_else(|| ClustersError::ClusterNotFound {
				name: name.to_string(),
			})
	}
}
