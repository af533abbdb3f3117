// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Loom clusters manager.
//!
//! Layered from built-in defaults, a TOML file and `LOOM_CLUSTERS_*`
//! environment variables, in that order of increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use loom_clusters_config::load_config;
//!
//! let config = load_config()?;
//! println!("refreshing clusters every {:?}", config.refresh.clusters_interval());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ClustersConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved clusters manager configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClustersConfig {
	pub refresh: RefreshConfig,
	pub discovery: DiscoveryConfig,
	pub access: AccessConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_CLUSTERS_*`)
/// 2. Config file (`/etc/loom/clusters.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ClustersConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ClustersConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources by precedence, then finalize and validate.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ClustersConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ClustersConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ClustersConfigLayer) -> Result<ClustersConfig, ConfigError> {
	let config = ClustersConfig {
		refresh: layer.refresh.unwrap_or_default().finalize(),
		discovery: layer.discovery.unwrap_or_default().finalize(),
		access: layer.access.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		discovery_mode = %config.discovery.mode,
		clusters_interval_secs = config.refresh.clusters_interval_secs,
		namespaces_interval_secs = config.refresh.namespaces_interval_secs,
		user_clients_ttl_secs = config.refresh.user_clients_ttl_secs,
		access_rules = config.access.rules.len(),
		"Clusters configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &ClustersConfig) -> Result<(), ConfigError> {
	let refresh = &config.refresh;
	for (key, value) in [
		("refresh.clusters_interval_secs", refresh.clusters_interval_secs),
		(
			"refresh.namespaces_interval_secs",
			refresh.namespaces_interval_secs,
		),
		(
			"refresh.user_namespaces_ttl_secs",
			refresh.user_namespaces_ttl_secs,
		),
		("refresh.user_clients_ttl_secs", refresh.user_clients_ttl_secs),
	] {
		if value == 0 {
			return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
		}
	}

	if config.discovery.mode == DiscoveryMode::Kubeconfig
		&& config.discovery.kubeconfig_path.is_none()
	{
		return Err(ConfigError::Validation(
			"discovery.mode = kubeconfig requires discovery.kubeconfig_path \
			 (LOOM_CLUSTERS_KUBECONFIG)"
				.to_string(),
		));
	}

	if config.discovery.default_cluster_name.trim().is_empty() {
		return Err(ConfigError::Validation(
			"discovery.default_cluster_name must not be empty".to_string(),
		));
	}

	if config.access.concurrency == 0 {
		return Err(ConfigError::Validation(
			"access.concurrency must be greater than zero".to_string(),
		));
	}

	config.access.access_rules()?;

	Ok(())
}
