// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory implementations of the cluster traits.
//!
//! These allow the clusters manager to be exercised without a real API
//! server: objects live in a shared vector, access decisions come from an
//! explicit allow-list, and every factory call is counted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use kube::Resource;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::client::{
	AccessReviewer, Clientset, Cluster, ClusterClient, ClusterFetcher, DiscoveryClient,
};
use crate::error::K8sError;
use crate::types::{
	AccessRule, ApiResource, DynamicObject, Info, ListParams, Namespace, UserPrincipal,
};

/// Build a bare namespace object.
pub fn namespace(name: &str) -> Namespace {
	Namespace {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			..Default::default()
		},
		..Default::default()
	}
}

/// Convert a typed resource into the dynamic form the API returns.
pub fn to_dynamic<K>(obj: &K) -> DynamicObject
where
	K: Resource<DynamicType = ()> + Serialize,
{
	let mut dynamic: DynamicObject =
		serde_json::from_value(serde_json::to_value(obj).expect("serializable resource"))
			.expect("valid dynamic object");
	if dynamic.types.is_none() {
		dynamic.types = Some(TypeMeta {
			api_version: K::api_version(&()).into_owned(),
			kind: K::kind(&()).into_owned(),
		});
	}
	dynamic
}

/// A cluster client over a shared in-memory object store.
///
/// Clones share the store, the failure switch and the call counter.
#[derive(Clone, Default)]
pub struct MockClusterClient {
	objects: Arc<RwLock<Vec<DynamicObject>>>,
	failure: Arc<Mutex<Option<String>>>,
	list_calls: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockClusterClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MockClusterClient")
			.field("objects", &self.objects.read().len())
			.finish()
	}
}

impl MockClusterClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_namespaces(names: &[&str]) -> Self {
		let client = Self::new();
		for name in names {
			client.add(&namespace(name));
		}
		client
	}

	pub fn add<K>(&self, obj: &K)
	where
		K: Resource<DynamicType = ()> + Serialize,
	{
		self.objects.write().push(to_dynamic(obj));
	}

	/// Make every subsequent call fail with an API error.
	pub fn fail_with(&self, message: &str) {
		*self.failure.lock() = Some(message.to_string());
	}

	pub fn list_calls(&self) -> usize {
		self.list_calls.load(Ordering::SeqCst)
	}

	fn check_failure(&self) -> Result<(), K8sError> {
		match self.failure.lock().as_ref() {
			Some(message) => Err(K8sError::ApiError {
				message: message.clone(),
			}),
			None => Ok(()),
		}
	}

	fn matches(obj: &DynamicObject, resource: &ApiResource, namespace: Option<&str>) -> bool {
		let kind_matches = obj
			.types
			.as_ref()
			.is_some_and(|t| t.kind == resource.kind && t.api_version == resource.api_version);
		let ns_matches = match namespace {
			Some(ns) => obj.metadata.namespace.as_deref() == Some(ns),
			None => true,
		};
		kind_matches && ns_matches
	}
}

#[async_trait]
impl ClusterClient for MockClusterClient {
	async fn list(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		_params: &ListParams,
	) -> Result<Vec<DynamicObject>, K8sError> {
		self.list_calls.fetch_add(1, Ordering::SeqCst);
		self.check_failure()?;
		Ok(self
			.objects
			.read()
			.iter()
			.filter(|obj| Self::matches(obj, resource, namespace))
			.cloned()
			.collect())
	}

	async fn get(
		&self,
		resource: &ApiResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<DynamicObject, K8sError> {
		self.check_failure()?;
		self
			.objects
			.read()
			.iter()
			.find(|obj| {
				Self::matches(obj, resource, namespace) && obj.metadata.name.as_deref() == Some(name)
			})
			.cloned()
			.ok_or_else(|| K8sError::ObjectNotFound { name: name.into() })
	}
}

/// Access reviewer backed by an explicit allow-list.
#[derive(Debug, Default)]
pub struct MockAccessReviewer {
	allowed: Mutex<HashSet<(AccessRule, String)>>,
	allow_all: bool,
	failure: Mutex<Option<String>>,
	calls: AtomicUsize,
}

impl MockAccessReviewer {
	/// A reviewer that denies everything until told otherwise.
	pub fn new() -> Self {
		Self::default()
	}

	/// A reviewer that allows everything.
	pub fn allow_all() -> Self {
		Self {
			allow_all: true,
			..Default::default()
		}
	}

	pub fn allow(&self, group: &str, resource: &str, verb: &str, namespace: &str) {
		self
			.allowed
			.lock()
			.insert((AccessRule::new(group, resource, verb), namespace.to_string()));
	}

	/// Allow every rule in `rules` for `namespace`.
	pub fn allow_namespace(&self, rules: &[AccessRule], namespace: &str) {
		let mut allowed = self.allowed.lock();
		for rule in rules {
			allowed.insert((rule.clone(), namespace.to_string()));
		}
	}

	pub fn fail_with(&self, message: &str) {
		*self.failure.lock() = Some(message.to_string());
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl AccessReviewer for MockAccessReviewer {
	async fn can_i(&self, rule: &AccessRule, namespace: &str) -> Result<bool, K8sError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if let Some(message) = self.failure.lock().as_ref() {
			return Err(K8sError::AccessReview {
				message: message.clone(),
			});
		}
		if self.allow_all {
			return Ok(true);
		}
		Ok(self
			.allowed
			.lock()
			.contains(&(rule.clone(), namespace.to_string())))
	}
}

/// Discovery client returning fixed answers.
#[derive(Debug, Clone)]
pub struct MockDiscovery {
	pub git_version: String,
	pub groups: Vec<String>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			git_version: "v1.32.0".to_string(),
			groups: vec!["v1".to_string(), "apps/v1".to_string()],
		}
	}
}

#[async_trait]
impl DiscoveryClient for MockDiscovery {
	async fn server_version(&self) -> Result<Info, K8sError> {
		Ok(Info {
			git_version: self.git_version.clone(),
			..Default::default()
		})
	}

	async fn api_groups(&self) -> Result<Vec<String>, K8sError> {
		Ok(self.groups.clone())
	}
}

struct MockClientset {
	reviewer: Arc<MockAccessReviewer>,
	discovery: Arc<MockDiscovery>,
}

impl Clientset for MockClientset {
	fn authorization(&self) -> Arc<dyn AccessReviewer> {
		self.reviewer.clone()
	}

	fn discovery(&self) -> Arc<dyn DiscoveryClient> {
		self.discovery.clone()
	}
}

/// A cluster whose clients all read from one [`MockClusterClient`] store.
///
/// Every factory call hands out a fresh `Arc`, so callers can tell a cached
/// client from a newly built one with `Arc::ptr_eq`.
#[derive(Debug)]
pub struct MockCluster {
	name: String,
	management: bool,
	store: MockClusterClient,
	reviewers: Mutex<HashMap<String, Arc<MockAccessReviewer>>>,
	default_reviewer: Arc<MockAccessReviewer>,
	discovery: Arc<MockDiscovery>,
	failure: Mutex<Option<String>>,
	server_clients_created: AtomicUsize,
	user_clients_created: AtomicUsize,
	clientsets_created: AtomicUsize,
}

impl MockCluster {
	pub fn new(name: &str) -> Self {
		Self::with_store(name, MockClusterClient::new())
	}

	pub fn with_store(name: &str, store: MockClusterClient) -> Self {
		Self {
			name: name.to_string(),
			management: false,
			store,
			reviewers: Mutex::new(HashMap::new()),
			default_reviewer: Arc::new(MockAccessReviewer::allow_all()),
			discovery: Arc::new(MockDiscovery::default()),
			failure: Mutex::new(None),
			server_clients_created: AtomicUsize::new(0),
			user_clients_created: AtomicUsize::new(0),
			clientsets_created: AtomicUsize::new(0),
		}
	}

	pub fn management(mut self) -> Self {
		self.management = true;
		self
	}

	/// Shortcut for a cluster holding the given namespaces.
	pub fn with_namespaces(name: &str, namespaces: &[&str]) -> Self {
		Self::with_store(name, MockClusterClient::with_namespaces(namespaces))
	}

	pub fn store(&self) -> &MockClusterClient {
		&self.store
	}

	/// Access decisions for `user_id`; users without one get allow-all.
	pub fn set_reviewer(&self, user_id: &str, reviewer: Arc<MockAccessReviewer>) {
		self.reviewers.lock().insert(user_id.to_string(), reviewer);
	}

	/// Make client construction fail.
	pub fn fail_clients(&self, message: &str) {
		*self.failure.lock() = Some(message.to_string());
	}

	pub fn server_clients_created(&self) -> usize {
		self.server_clients_created.load(Ordering::SeqCst)
	}

	pub fn user_clients_created(&self) -> usize {
		self.user_clients_created.load(Ordering::SeqCst)
	}

	pub fn clientsets_created(&self) -> usize {
		self.clientsets_created.load(Ordering::SeqCst)
	}

	fn check_failure(&self) -> Result<(), K8sError> {
		match self.failure.lock().as_ref() {
			Some(message) => Err(K8sError::Config {
				message: message.clone(),
			}),
			None => Ok(()),
		}
	}
}

impl Cluster for MockCluster {
	fn name(&self) -> &str {
		&self.name
	}

	fn is_management(&self) -> bool {
		self.management
	}

	fn server_client(&self) -> Result<Arc<dyn ClusterClient>, K8sError> {
		self.check_failure()?;
		self.server_clients_created.fetch_add(1, Ordering::SeqCst);
		Ok(Arc::new(self.store.clone()))
	}

	fn user_client(&self, _user: &UserPrincipal) -> Result<Arc<dyn ClusterClient>, K8sError> {
		self.check_failure()?;
		self.user_clients_created.fetch_add(1, Ordering::SeqCst);
		Ok(Arc::new(self.store.clone()))
	}

	fn user_clientset(&self, user: &UserPrincipal) -> Result<Arc<dyn Clientset>, K8sError> {
		self.check_failure()?;
		self.clientsets_created.fetch_add(1, Ordering::SeqCst);
		let reviewer = self
			.reviewers
			.lock()
			.get(&user.id)
			.cloned()
			.unwrap_or_else(|| Arc::clone(&self.default_reviewer));
		Ok(Arc::new(MockClientset {
			reviewer,
			discovery: Arc::clone(&self.discovery),
		}))
	}
}

/// Fetcher returning whatever cluster list it was last given.
#[derive(Default)]
pub struct MockClusterFetcher {
	clusters: Mutex<Vec<Arc<dyn Cluster>>>,
	failure: Mutex<Option<String>>,
	fetches: AtomicUsize,
}

impl MockClusterFetcher {
	pub fn new(clusters: Vec<Arc<dyn Cluster>>) -> Self {
		Self {
			clusters: Mutex::new(clusters),
			..Default::default()
		}
	}

	pub fn set_clusters(&self, clusters: Vec<Arc<dyn Cluster>>) {
		*self.clusters.lock() = clusters;
	}

	/// Fail fetches with `message`, or succeed again with `None`.
	pub fn set_failure(&self, message: Option<&str>) {
		*self.failure.lock() = message.map(str::to_string);
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ClusterFetcher for MockClusterFetcher {
	async fn fetch(&self) -> Result<Vec<Arc<dyn Cluster>>, K8sError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if let Some(message) = self.failure.lock().as_ref() {
			return Err(K8sError::ApiError {
				message: message.clone(),
			});
		}
		Ok(self.clusters.lock().clone())
	}
}
