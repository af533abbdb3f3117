// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ClustersConfigLayer;
use crate::sections::{
	AccessConfigLayer, DiscoveryConfigLayer, DiscoveryMode, LogFormat, LoggingConfigLayer,
	RefreshConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ClustersConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ClustersConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ClustersConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/clusters.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ClustersConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ClustersConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ClustersConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_CLUSTERS_<SECTION>_<FIELD>
#[derive(Default)]
pub struct EnvSource {
	/// Fixed variables used instead of the process environment.
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Read from `vars` instead of the process environment.
	pub fn from_map(vars: HashMap<String, String>) -> Self {
		Self { vars: Some(vars) }
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn usize(&self, name: &str) -> Result<Option<usize>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid usize value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}

	fn load_refresh(&self) -> Result<RefreshConfigLayer, ConfigError> {
		Ok(RefreshConfigLayer {
			clusters_interval_secs: self.u64("LOOM_CLUSTERS_REFRESH_CLUSTERS_INTERVAL_SECS")?,
			namespaces_interval_secs: self.u64("LOOM_CLUSTERS_REFRESH_NAMESPACES_INTERVAL_SECS")?,
			user_namespaces_ttl_secs: self.u64("LOOM_CLUSTERS_USER_NAMESPACES_TTL_SECS")?,
			user_clients_ttl_secs: self.u64("LOOM_CLUSTERS_USER_CLIENTS_TTL_SECS")?,
		})
	}

	fn load_discovery(&self) -> Result<DiscoveryConfigLayer, ConfigError> {
		let mode = match self.var("LOOM_CLUSTERS_DISCOVERY_MODE") {
			Some(v) => Some(v.parse::<DiscoveryMode>().map_err(|message| {
				ConfigError::InvalidValue {
					key: "LOOM_CLUSTERS_DISCOVERY_MODE".to_string(),
					message,
				}
			})?),
			None => None,
		};

		Ok(DiscoveryConfigLayer {
			mode,
			kubeconfig_path: self.var("LOOM_CLUSTERS_KUBECONFIG").map(PathBuf::from),
			management_context: self.var("LOOM_CLUSTERS_MANAGEMENT_CONTEXT"),
			default_cluster_name: self.var("LOOM_CLUSTERS_DEFAULT_CLUSTER_NAME"),
		})
	}

	fn load_access(&self) -> Result<AccessConfigLayer, ConfigError> {
		Ok(AccessConfigLayer {
			rules: self.list("LOOM_CLUSTERS_ACCESS_RULES"),
			concurrency: self.usize("LOOM_CLUSTERS_ACCESS_CONCURRENCY")?,
		})
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		let format = match self.var("LOOM_CLUSTERS_LOG_FORMAT") {
			Some(v) => Some(match v.to_lowercase().as_str() {
				"json" => LogFormat::Json,
				"pretty" | "text" => LogFormat::Pretty,
				_ => {
					return Err(ConfigError::InvalidValue {
						key: "LOOM_CLUSTERS_LOG_FORMAT".to_string(),
						message: format!("expected 'json' or 'pretty', got '{v}'"),
					})
				}
			}),
			None => None,
		};

		Ok(LoggingConfigLayer {
			level: self.var("LOOM_CLUSTERS_LOG_LEVEL"),
			format,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ClustersConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ClustersConfigLayer {
			refresh: Some(self.load_refresh()?),
			discovery: Some(self.load_discovery()?),
			access: Some(self.load_access()?),
			logging: Some(self.load_logging()?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> EnvSource {
		EnvSource::from_map(
			pairs
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
		)
	}

	#[test]
	fn test_precedence_order() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/clusters.toml").load().unwrap();
		assert!(layer.refresh.is_none());
	}

	#[test]
	fn test_toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[refresh]
user_clients_ttl_secs = 900

[discovery]
mode = "kubeconfig"
kubeconfig_path = "/etc/loom/fleet.yaml"
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.refresh.unwrap().user_clients_ttl_secs, Some(900));
		assert_eq!(layer.discovery.unwrap().mode, Some(DiscoveryMode::Kubeconfig));
	}

	#[test]
	fn test_invalid_toml_is_reported_with_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[refresh\nbroken").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { ref path, .. } if path == file.path()));
	}

	#[test]
	fn test_env_values_are_read() {
		let layer = env(&[
			("LOOM_CLUSTERS_REFRESH_CLUSTERS_INTERVAL_SECS", "15"),
			("LOOM_CLUSTERS_USER_CLIENTS_TTL_SECS", "60"),
			("LOOM_CLUSTERS_DISCOVERY_MODE", "single"),
			("LOOM_CLUSTERS_ACCESS_RULES", "pods:list, apps/deployments:get"),
			("LOOM_CLUSTERS_LOG_FORMAT", "json"),
		])
		.load()
		.unwrap();

		let refresh = layer.refresh.unwrap();
		assert_eq!(refresh.clusters_interval_secs, Some(15));
		assert_eq!(refresh.user_clients_ttl_secs, Some(60));
		assert!(refresh.namespaces_interval_secs.is_none());
		assert_eq!(layer.discovery.unwrap().mode, Some(DiscoveryMode::Single));
		assert_eq!(
			layer.access.unwrap().rules,
			Some(vec![
				"pods:list".to_string(),
				"apps/deployments:get".to_string()
			])
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_empty_env_value_is_unset() {
		let layer = env(&[("LOOM_CLUSTERS_LOG_LEVEL", "")]).load().unwrap();
		assert!(layer.logging.unwrap().level.is_none());
	}

	#[test]
	fn test_invalid_env_number() {
		let err = env(&[("LOOM_CLUSTERS_USER_NAMESPACES_TTL_SECS", "soon")])
			.load()
			.unwrap_err();
		assert!(
			matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LOOM_CLUSTERS_USER_NAMESPACES_TTL_SECS")
		);
	}

	#[test]
	fn test_invalid_env_mode() {
		let err = env(&[("LOOM_CLUSTERS_DISCOVERY_MODE", "fleet")])
			.load()
			.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}
}
