// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom clusters manager daemon.

mod snapshot;
mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loom_clusters::{ClustersError, ClustersManager, ClustersWatcher};
use loom_clusters_config::{ClustersConfig, LogFormat};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::snapshot::Snapshot;

#[derive(Parser, Debug)]
#[command(
	name = "loom-clusters",
	about = "Tracks a fleet of Kubernetes clusters and their namespaces",
	version
)]
struct Args {
	/// Config file (defaults to /etc/loom/clusters.toml).
	#[arg(long, short, env = "LOOM_CLUSTERS_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the refresh loops until interrupted.
	Run,
	/// Discover clusters and namespaces once and print them as JSON.
	Snapshot {
		/// Also print the Prometheus metrics to stderr.
		#[arg(long)]
		metrics: bool,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => loom_clusters_config::load_config_with_file(path),
		None => loom_clusters_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config);

	let manager = wiring::build_manager(&config).await?;

	match args.command.unwrap_or(Command::Run) {
		Command::Run => run(manager).await,
		Command::Snapshot { metrics } => snapshot(manager, metrics).await,
	}
}

fn init_tracing(config: &ClustersConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	match config.logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn run(manager: Arc<ClustersManager>) -> Result<()> {
	let shutdown = CancellationToken::new();

	let watcher = manager.subscribe();
	let watcher_task = tokio::spawn(log_cluster_changes(watcher, shutdown.clone()));
	let loops = manager.start(shutdown.clone());

	info!("Clusters daemon running, press Ctrl-C to stop");
	tokio::signal::ctrl_c()
		.await
		.context("failed to listen for shutdown signal")?;

	info!("Shutdown signal received");
	shutdown.cancel();
	for handle in futures::future::join_all(loops).await {
		if let Err(e) = handle {
			warn!(error = %e, "Refresh loop ended abnormally");
		}
	}
	if let Ok(watcher) = watcher_task.await {
		manager.remove_watcher(&watcher);
	}

	info!("Clusters daemon stopped");
	Ok(())
}

async fn log_cluster_changes(
	mut watcher: ClustersWatcher,
	shutdown: CancellationToken,
) -> ClustersWatcher {
	loop {
		let update = tokio::select! {
			update = watcher.recv() => update,
			_ = shutdown.cancelled() => break,
		};
		let Some(update) = update else { break };
		for name in update.added_names() {
			info!(cluster = name, "Cluster added");
		}
		for name in update.removed_names() {
			info!(cluster = name, "Cluster removed");
		}
	}
	watcher
}

async fn snapshot(manager: Arc<ClustersManager>, print_metrics: bool) -> Result<()> {
	manager
		.update_clusters()
		.await
		.context("failed to discover clusters")?;

	let errors = match manager.update_namespaces().await {
		Ok(()) => Default::default(),
		Err(ClustersError::Partial(errors)) => {
			for failure in errors.iter() {
				warn!(cluster = %failure.cluster, error = %failure.source, "Failed to list namespaces");
			}
			errors
		}
		Err(e) => return Err(e.into()),
	};

	let snapshot = Snapshot::collect(&manager, &errors);
	println!("{}", serde_json::to_string_pretty(&snapshot)?);

	if print_metrics {
		eprint!("{}", manager.metrics().encode()?);
	}
	Ok(())
}
