// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Change notifications for the cluster set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use loom_clusters_k8s::Cluster;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Each watcher buffers at most one undelivered update.
const WATCHER_BUFFER: usize = 1;

/// Clusters that joined or left the set in one discovery cycle.
#[derive(Debug, Clone)]
pub struct ClusterListUpdate {
	pub added: Vec<Arc<dyn Cluster>>,
	pub removed: Vec<Arc<dyn Cluster>>,
}

impl ClusterListUpdate {
	pub fn added_names(&self) -> Vec<&str> {
		self.added.iter().map(|c| c.name()).collect()
	}

	pub fn removed_names(&self) -> Vec<&str> {
		self.removed.iter().map(|c| c.name()).collect()
	}

	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty()
	}
}

/// Registered subscribers and their channels.
#[derive(Default)]
pub struct WatcherHub {
	next_id: AtomicU64,
	watchers: Mutex<Vec<(u64, mpsc::Sender<ClusterListUpdate>)>>,
}

impl WatcherHub {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn subscribe(self: &Arc<Self>) -> ClustersWatcher {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::channel(WATCHER_BUFFER);
		self.watchers.lock().push((id, tx));
		debug!(watcher = id, "Watcher subscribed");
		ClustersWatcher {
			id,
			updates: rx,
			hub: Arc::downgrade(self),
		}
	}

	/// Unregister a watcher. Once its buffered update is drained, its
	/// receiver yields `None`.
	pub fn remove(&self, id: u64) {
		let mut watchers = self.watchers.lock();
		let before = watchers.len();
		watchers.retain(|(watcher, _)| *watcher != id);
		if watchers.len() != before {
			debug!(watcher = id, "Watcher removed");
		}
	}

	pub fn len(&self) -> usize {
		self.watchers.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.watchers.lock().is_empty()
	}

	/// Deliver an update to every watcher, one after the other.
	///
	/// A watcher whose slot is still full holds up the ones after it until it
	/// reads. Watchers whose receiver is gone are skipped.
	pub async fn notify(&self, added: Vec<Arc<dyn Cluster>>, removed: Vec<Arc<dyn Cluster>>) {
		let senders: Vec<_> = self
			.watchers
			.lock()
			.iter()
			.map(|(id, tx)| (*id, tx.clone()))
			.collect();

		let update = ClusterListUpdate { added, removed };
		for (id, tx) in senders {
			if tx.send(update.clone()).await.is_err() {
				debug!(watcher = id, "Watcher receiver dropped, skipping");
			}
		}
	}
}

/// A subscription to cluster set changes.
pub struct ClustersWatcher {
	id: u64,
	updates: mpsc::Receiver<ClusterListUpdate>,
	hub: Weak<WatcherHub>,
}

impl ClustersWatcher {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Next update, or `None` once unsubscribed and drained.
	pub async fn recv(&mut self) -> Option<ClusterListUpdate> {
		self.updates.recv().await
	}

	pub fn try_recv(&mut self) -> Option<ClusterListUpdate> {
		self.updates.try_recv().ok()
	}

	pub fn unsubscribe(self) {
		if let Some(hub) = self.hub.upgrade() {
			hub.remove(self.id);
		}
	}
}

impl std::fmt::Debug for ClustersWatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClustersWatcher").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_clusters_k8s::mock::MockCluster;
	use std::time::Duration;

	fn cluster(name: &str) -> Arc<dyn Cluster> {
		Arc::new(MockCluster::new(name))
	}

	#[tokio::test]
	async fn every_watcher_receives_the_update() {
		let hub = WatcherHub::new();
		let mut one = hub.subscribe();
		let mut two = hub.subscribe();
		assert_ne!(one.id(), two.id());

		hub.notify(vec![cluster("a")], vec![cluster("b")]).await;

		for watcher in [&mut one, &mut two] {
			let update = watcher.recv().await.unwrap();
			assert_eq!(update.added_names(), vec!["a"]);
			assert_eq!(update.removed_names(), vec!["b"]);
		}
	}

	#[tokio::test]
	async fn removed_watcher_drains_then_ends() {
		let hub = WatcherHub::new();
		let mut watcher = hub.subscribe();

		hub.notify(vec![cluster("a")], vec![]).await;
		hub.remove(watcher.id());
		assert!(hub.is_empty());

		assert!(watcher.recv().await.is_some());
		assert!(watcher.recv().await.is_none());
	}

	#[tokio::test]
	async fn dropped_receiver_does_not_block_others() {
		let hub = WatcherHub::new();
		let gone = hub.subscribe();
		let mut alive = hub.subscribe();
		drop(gone);

		tokio::time::timeout(Duration::from_secs(1), hub.notify(vec![cluster("a")], vec![]))
			.await
			.unwrap();
		assert_eq!(alive.recv().await.unwrap().added_names(), vec!["a"]);
	}

	#[tokio::test]
	async fn full_slot_blocks_until_read() {
		let hub = WatcherHub::new();
		let mut watcher = hub.subscribe();
		hub.notify(vec![cluster("a")], vec![]).await;

		let blocked = tokio::time::timeout(
			Duration::from_millis(50),
			hub.notify(vec![cluster("b")], vec![]),
		)
		.await;
		assert!(blocked.is_err());

		assert_eq!(watcher.recv().await.unwrap().added_names(), vec!["a"]);
	}

	#[tokio::test]
	async fn unsubscribe_removes_from_hub() {
		let hub = WatcherHub::new();
		let watcher = hub.subscribe();
		assert_eq!(hub.len(), 1);
		watcher.unsubscribe();
		assert!(hub.is_empty());
	}
}
