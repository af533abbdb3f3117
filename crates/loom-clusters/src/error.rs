// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the clusters manager.

use std::fmt;

use loom_clusters_k8s::K8sError;

pub type Result<T> = std::result::Result<T, ClustersError>;

/// Errors returned by the clusters manager and the clients it hands out.
#[derive(Debug, thiserror::Error)]
pub enum ClustersError {
	/// The request carried no usable principal.
	#[error("no user supplied")]
	NoUser,

	#[error("cluster not found: {name}")]
	ClusterNotFound { name: String },

	/// A pool already holds a client for this cluster.
	#[error("cluster client already exists in pool: {name}")]
	DuplicateCluster { name: String },

	/// Cluster discovery failed; the previous cluster set is kept.
	#[error("failed to fetch clusters: {0}")]
	Fetch(#[source] K8sError),

	#[error(transparent)]
	Cluster(#[from] ClusterError),

	/// Some clusters failed while others succeeded.
	#[error(transparent)]
	Partial(#[from] ClusterErrors),

	#[error("metrics registration failed: {0}")]
	Metrics(#[from] prometheus::Error),
}

/// A failure attributed to a single cluster.
#[derive(Debug, thiserror::Error)]
#[error("cluster={cluster}: {source}")]
pub struct ClusterError {
	pub cluster: String,
	#[source]
	pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ClusterError {
	pub fn new(
		cluster: impl Into<String>,
		source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		Self {
			cluster: cluster.into(),
			source: source.into(),
		}
	}
}

/// Per-cluster failures collected during a fan-out.
#[derive(Debug, Default)]
pub struct ClusterErrors(Vec<ClusterError>);

impl ClusterErrors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, err: ClusterError) {
		self.0.push(err);
	}

	pub fn extend(&mut self, other: ClusterErrors) {
		self.0.extend(other.0);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ClusterError> {
		self.0.iter()
	}

	/// Names of the clusters that failed, in the order they were recorded.
	pub fn clusters(&self) -> Vec<&str> {
		self.0.iter().map(|e| e.cluster.as_str()).collect()
	}

	pub fn contains(&self, cluster: &str) -> bool {
		self.0.iter().any(|e| e.cluster == cluster)
	}

	/// `Ok(())` when nothing failed.
	pub fn into_result(self) -> std::result::Result<(), ClusterErrors> {
		if self.is_empty() {
			Ok(())
		} else {
			Err(self)
		}
	}
}

impl fmt::Display for ClusterErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let n = self.0.len();
		write!(f, "{n} cluster{} failed", if n == 1 { "" } else { "s" })?;
		for (i, err) in self.0.iter().enumerate() {
			f.write_str(if i == 0 { ": " } else { "; " })?;
			write!(f, "{err}")?;
		}
		Ok(())
	}
}

impl std::error::Error for ClusterErrors {}

impl IntoIterator for ClusterErrors {
	type Item = ClusterError;
	type IntoIter = std::vec::IntoIter<ClusterError>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl FromIterator<ClusterError> for ClusterErrors {
	fn from_iter<I: IntoIterator<Item = ClusterError>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// A fan-out result: the usable value plus whatever failed on the way.
///
/// A non-empty `errors` means degraded, not failed; `value` still covers
/// every cluster that succeeded.
#[derive(Debug)]
pub struct Partial<T> {
	pub value: T,
	pub errors: ClusterErrors,
}

impl<T> Partial<T> {
	pub fn new(value: T, errors: ClusterErrors) -> Self {
		Self { value, errors }
	}

	pub fn complete(value: T) -> Self {
		Self::new(value, ClusterErrors::new())
	}

	pub fn is_degraded(&self) -> bool {
		!self.errors.is_empty()
	}

	pub fn error(&self) -> Option<&ClusterErrors> {
		(!self.errors.is_empty()).then_some(&self.errors)
	}

	/// Strict view: any per-cluster failure fails the whole result.
	pub fn into_result(self) -> Result<T> {
		match self.errors.into_result() {
			Ok(()) => Ok(self.value),
			Err(errors) => Err(ClustersError::Partial(errors)),
		}
	}

	pub fn into_parts(self) -> (T, Option<ClusterErrors>) {
		let errors = (!self.errors.is_empty()).then_some(self.errors);
		(self.value, errors)
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
		Partial {
			value: f(self.value),
			errors: self.errors,
		}
	}
}
