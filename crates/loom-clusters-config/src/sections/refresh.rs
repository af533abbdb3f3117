// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Refresh and cache lifetime configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CLUSTERS_INTERVAL_SECS: u64 = 30;
const DEFAULT_NAMESPACES_INTERVAL_SECS: u64 = 30;
const DEFAULT_USER_NAMESPACES_TTL_SECS: u64 = 30;
const DEFAULT_USER_CLIENTS_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfigLayer {
	pub clusters_interval_secs: Option<u64>,
	pub namespaces_interval_secs: Option<u64>,
	pub user_namespaces_ttl_secs: Option<u64>,
	pub user_clients_ttl_secs: Option<u64>,
}

impl RefreshConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.clusters_interval_secs.is_some() {
			self.clusters_interval_secs = other.clusters_interval_secs;
		}
		if other.namespaces_interval_secs.is_some() {
			self.namespaces_interval_secs = other.namespaces_interval_secs;
		}
		if other.user_namespaces_ttl_secs.is_some() {
			self.user_namespaces_ttl_secs = other.user_namespaces_ttl_secs;
		}
		if other.user_clients_ttl_secs.is_some() {
			self.user_clients_ttl_secs = other.user_clients_ttl_secs;
		}
	}

	pub fn finalize(self) -> RefreshConfig {
		RefreshConfig {
			clusters_interval_secs: self
				.clusters_interval_secs
				.unwrap_or(DEFAULT_CLUSTERS_INTERVAL_SECS),
			namespaces_interval_secs: self
				.namespaces_interval_secs
				.unwrap_or(DEFAULT_NAMESPACES_INTERVAL_SECS),
			user_namespaces_ttl_secs: self
				.user_namespaces_ttl_secs
				.unwrap_or(DEFAULT_USER_NAMESPACES_TTL_SECS),
			user_clients_ttl_secs: self
				.user_clients_ttl_secs
				.unwrap_or(DEFAULT_USER_CLIENTS_TTL_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfig {
	pub clusters_interval_secs: u64,
	pub namespaces_interval_secs: u64,
	pub user_namespaces_ttl_secs: u64,
	pub user_clients_ttl_secs: u64,
}

impl RefreshConfig {
	pub fn clusters_interval(&self) -> Duration {
		Duration::from_secs(self.clusters_interval_secs)
	}

	pub fn namespaces_interval(&self) -> Duration {
		Duration::from_secs(self.namespaces_interval_secs)
	}

	pub fn user_namespaces_ttl(&self) -> Duration {
		Duration::from_secs(self.user_namespaces_ttl_secs)
	}

	pub fn user_clients_ttl(&self) -> Duration {
		Duration::from_secs(self.user_clients_ttl_secs)
	}
}

impl Default for RefreshConfig {
	fn default() -> Self {
		RefreshConfigLayer::default().finalize()
	}
}
