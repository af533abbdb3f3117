// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

pub const DEFAULT_CLUSTERS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_NAMESPACES_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_NAMESPACES_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_CLIENTS_TTL: Duration = Duration::from_secs(30 * 60);

/// Timing knobs for the manager's loops and caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
	pub clusters_refresh_interval: Duration,
	pub namespaces_refresh_interval: Duration,
	pub user_namespaces_ttl: Duration,
	pub user_clients_ttl: Duration,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			clusters_refresh_interval: DEFAULT_CLUSTERS_REFRESH_INTERVAL,
			namespaces_refresh_interval: DEFAULT_NAMESPACES_REFRESH_INTERVAL,
			user_namespaces_ttl: DEFAULT_USER_NAMESPACES_TTL,
			user_clients_ttl: DEFAULT_USER_CLIENTS_TTL,
		}
	}
}
