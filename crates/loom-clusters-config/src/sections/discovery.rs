// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster discovery configuration section.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use loom_clusters_k8s::DEFAULT_CLUSTER_NAME;
use serde::{Deserialize, Serialize};

/// Where the cluster list comes from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
	/// The pod's own service account, as the only cluster.
	#[default]
	InCluster,
	/// One cluster per context of a kubeconfig file, re-read every refresh.
	Kubeconfig,
	/// The only cluster, from whatever config kube can infer locally.
	Single,
}

impl fmt::Display for DiscoveryMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DiscoveryMode::InCluster => write!(f, "in_cluster"),
			DiscoveryMode::Kubeconfig => write!(f, "kubeconfig"),
			DiscoveryMode::Single => write!(f, "single"),
		}
	}
}

impl FromStr for DiscoveryMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().replace('-', "_").as_str() {
			"in_cluster" => Ok(DiscoveryMode::InCluster),
			"kubeconfig" => Ok(DiscoveryMode::Kubeconfig),
			"single" => Ok(DiscoveryMode::Single),
			other => Err(format!(
				"unknown discovery mode '{other}', expected in_cluster, kubeconfig or single"
			)),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfigLayer {
	pub mode: Option<DiscoveryMode>,
	pub kubeconfig_path: Option<PathBuf>,
	pub management_context: Option<String>,
	pub default_cluster_name: Option<String>,
}

impl DiscoveryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.mode.is_some() {
			self.mode = other.mode;
		}
		if other.kubeconfig_path.is_some() {
			self.kubeconfig_path = other.kubeconfig_path;
		}
		if other.management_context.is_some() {
			self.management_context = other.management_context;
		}
		if other.default_cluster_name.is_some() {
			self.default_cluster_name = other.default_cluster_name;
		}
	}

	pub fn finalize(self) -> DiscoveryConfig {
		DiscoveryConfig {
			mode: self.mode.unwrap_or_default(),
			kubeconfig_path: self.kubeconfig_path,
			management_context: self.management_context,
			default_cluster_name: self
				.default_cluster_name
				.unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
	pub mode: DiscoveryMode,
	pub kubeconfig_path: Option<PathBuf>,
	/// Context marked as the management cluster in kubeconfig mode. Falls
	/// back to the file's current context.
	pub management_context: Option<String>,
	/// Cluster name in the single-cluster modes.
	pub default_cluster_name: String,
}

impl Default for DiscoveryConfig {
	fn default() -> Self {
		DiscoveryConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = DiscoveryConfig::default();
		assert_eq!(config.mode, DiscoveryMode::InCluster);
		assert_eq!(config.default_cluster_name, "Default");
		assert!(config.kubeconfig_path.is_none());
	}

	#[test]
	fn test_mode_parsing() {
		assert_eq!("kubeconfig".parse::<DiscoveryMode>(), Ok(DiscoveryMode::Kubeconfig));
		assert_eq!("In-Cluster".parse::<DiscoveryMode>(), Ok(DiscoveryMode::InCluster));
		assert_eq!("single".parse::<DiscoveryMode>(), Ok(DiscoveryMode::Single));
		assert!("fleet".parse::<DiscoveryMode>().is_err());
	}

	#[test]
	fn test_mode_display_matches_serde() {
		for mode in [
			DiscoveryMode::InCluster,
			DiscoveryMode::Kubeconfig,
			DiscoveryMode::Single,
		] {
			assert_eq!(mode.to_string().parse::<DiscoveryMode>(), Ok(mode));
		}
	}

	#[test]
	fn test_deserialize_layer() {
		let toml_str = r#"
mode = "kubeconfig"
kubeconfig_path = "/etc/loom/fleet.yaml"
management_context = "mgmt"
"#;
		let layer: DiscoveryConfigLayer = toml::from_str(toml_str).unwrap();
		let config = layer.finalize();
		assert_eq!(config.mode, DiscoveryMode::Kubeconfig);
		assert_eq!(
			config.kubeconfig_path,
			Some(PathBuf::from("/etc/loom/fleet.yaml"))
		);
		assert_eq!(config.management_context.as_deref(), Some("mgmt"));
	}
}
