// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use prometheus::{
	Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder,
};

/// Prometheus metrics for cluster discovery and client creation.
///
/// Each instance owns its registry, so several managers in one process do
/// not clash on metric names.
pub struct Metrics {
	registry: Registry,

	pub update_clusters: Counter,
	pub clusters: Gauge,
	pub update_namespaces: Counter,
	pub namespaces: GaugeVec,
	pub create_server_client: CounterVec,
	pub create_user_client: CounterVec,
}

impl Metrics {
	pub fn new() -> prometheus::Result<Self> {
		let registry = Registry::new();

		let update_clusters = Counter::with_opts(Opts::new(
			"loom_clusters_update_clusters_total",
			"Total cluster discovery runs",
		))?;
		registry.register(Box::new(update_clusters.clone()))?;

		let clusters = Gauge::with_opts(Opts::new(
			"loom_clusters_clusters",
			"Number of clusters currently tracked",
		))?;
		registry.register(Box::new(clusters.clone()))?;

		let update_namespaces = Counter::with_opts(Opts::new(
			"loom_clusters_update_namespaces_total",
			"Total namespace refresh runs",
		))?;
		registry.register(Box::new(update_namespaces.clone()))?;

		let namespaces = GaugeVec::new(
			Opts::new(
				"loom_clusters_namespaces",
				"Number of namespaces cached per cluster",
			),
			&["cluster"],
		)?;
		registry.register(Box::new(namespaces.clone()))?;

		let create_server_client = CounterVec::new(
			Opts::new(
				"loom_clusters_create_server_client_total",
				"Total server clients built",
			),
			&["cluster"],
		)?;
		registry.register(Box::new(create_server_client.clone()))?;

		let create_user_client = CounterVec::new(
			Opts::new(
				"loom_clusters_create_user_client_total",
				"Total impersonated user clients built",
			),
			&["cluster"],
		)?;
		registry.register(Box::new(create_user_client.clone()))?;

		Ok(Self {
			registry,
			update_clusters,
			clusters,
			update_namespaces,
			namespaces,
			create_server_client,
			create_user_client,
		})
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Drop the per-cluster namespace gauge of a cluster that went away.
	pub fn forget_cluster(&self, cluster: &str) {
		let _ = self.namespaces.remove_label_values(&[cluster]);
	}

	/// Render every metric in the text exposition format.
	pub fn encode(&self) -> prometheus::Result<String> {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer)?;
		String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
	}
}
