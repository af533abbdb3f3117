// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur while talking to a single cluster.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("Cluster not found: {name}")]
	ClusterNotFound { name: String },

	#[error("Namespace not found: {name}")]
	NamespaceNotFound { name: String },

	#[error("Object not found: {name}")]
	ObjectNotFound { name: String },

	#[error("Client configuration error: {message}")]
	Config { message: String },

	#[error("Kubeconfig error: {message}")]
	Kubeconfig { message: String },

	#[error("SelfSubjectAccessReview failed: {message}")]
	AccessReview { message: String },

	#[error("Discovery failed: {message}")]
	Discovery { message: String },

	#[error("Failed to parse {kind}: {message}")]
	Parse { kind: String, message: String },

	#[error("Operation timed out")]
	Timeout,
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}

impl From<kube::config::KubeconfigError> for K8sError {
	fn from(err: kube::config::KubeconfigError) -> Self {
		K8sError::Kubeconfig {
			message: err.to_string(),
		}
	}
}

impl From<kube::config::InferConfigError> for K8sError {
	fn from(err: kube::config::InferConfigError) -> Self {
		K8sError::Config {
			message: err.to_string(),
		}
	}
}

impl From<kube::config::InClusterError> for K8sError {
	fn from(err: kube::config::InClusterError) -> Self {
		K8sError::Config {
			message: err.to_string(),
		}
	}
}

/// Returns true when the API server answered with 404.
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
	matches!(err, kube::Error::Api(resp) if resp.code == 404)
}
