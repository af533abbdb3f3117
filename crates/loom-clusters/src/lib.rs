// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-cluster client manager for Loom.
//!
//! Tracks a dynamic set of Kubernetes clusters, caches the namespaces each
//! user may access on each of them, and hands out clients that fan a read out
//! over every cluster while reporting per-cluster failures.
//!
//! # Example
//!
//! ```ignore
//! let manager = Arc::new(ClustersManager::new(fetcher, checker, ManagerConfig::default())?);
//! let handles = manager.start(shutdown.clone());
//!
//! let client = manager.get_impersonated_client(&user).await?;
//! let pods = client.value.clustered_list::<Pod>(&ListParams::default(), true).await;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod manager;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod watcher;

pub use cache::{NamespaceCache, TtlCache, UserClientCache, UserNamespaceCache};
pub use client::{ClusteredList, ClustersClient};
pub use config::ManagerConfig;
pub use error::{ClusterError, ClusterErrors, ClustersError, Partial, Result};
pub use identity::{Identity, SERVER_IDENTITY};
pub use manager::ClustersManager;
pub use metrics::Metrics;
pub use pool::ClientsPool;
pub use registry::ClusterSet;
pub use watcher::{ClusterListUpdate, ClustersWatcher, WatcherHub};
