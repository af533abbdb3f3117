// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authoritative set of known clusters.

use std::collections::BTreeMap;
use std::sync::Arc;

use loom_clusters_k8s::Cluster;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Clusters keyed by name. Replaced wholesale on every discovery cycle.
#[derive(Default)]
pub struct ClusterSet {
	clusters: RwLock<BTreeMap<String, Arc<dyn Cluster>>>,
}

impl ClusterSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the tracked clusters and return `(added, removed)`, both in
	/// name order.
	///
	/// A cluster whose name survives the swap is neither added nor removed,
	/// even though the new value replaces the old one.
	pub fn set(
		&self,
		clusters: Vec<Arc<dyn Cluster>>,
	) -> (Vec<Arc<dyn Cluster>>, Vec<Arc<dyn Cluster>>) {
		let mut next = BTreeMap::new();
		for cluster in clusters {
			let name = cluster.name().to_string();
			if next.insert(name.clone(), cluster).is_some() {
				warn!(cluster = %name, "Duplicate cluster name from discovery, keeping the last one");
			}
		}

		let mut current = self.clusters.write();

		let added = next
			.iter()
			.filter(|(name, _)| !current.contains_key(*name))
			.map(|(_, c)| Arc::clone(c))
			.collect();
		let removed = current
			.iter()
			.filter(|(name, _)| !next.contains_key(*name))
			.map(|(_, c)| Arc::clone(c))
			.collect();

		*current = next;
		(added, removed)
	}

	/// Snapshot of the current clusters in name order.
	pub fn get(&self) -> Vec<Arc<dyn Cluster>> {
		self.clusters.read().values().cloned().collect()
	}

	pub fn find(&self, name: &str) -> Option<Arc<dyn Cluster>> {
		self.clusters.read().get(name).cloned()
	}

	pub fn names(&self) -> Vec<String> {
		self.clusters.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.clusters.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.clusters.read().is_empty()
	}

	/// Digest of the sorted name set. Equal for equal membership regardless
	/// of discovery order, and stable across restarts.
	pub fn hash(&self) -> String {
		hash_names(self.clusters.read().keys().map(String::as_str))
	}
}

/// Names must already be sorted. Each one is newline-terminated so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
fn hash_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
	let mut hasher = Sha256::new();
	for name in names {
		hasher.update(name.as_bytes());
		hasher.update(b"\n");
	}
	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_clusters_k8s::mock::MockCluster;
	use proptest::prelude::*;
	use std::collections::BTreeSet;

	fn clusters(names: &[&str]) -> Vec<Arc<dyn Cluster>> {
		names
			.iter()
			.map(|n| Arc::new(MockCluster::new(n)) as Arc<dyn Cluster>)
			.collect()
	}

	fn names(list: &[Arc<dyn Cluster>]) -> Vec<String> {
		list.iter().map(|c| c.name().to_string()).collect()
	}

	#[test]
	fn first_set_adds_everything() {
		let set = ClusterSet::new();
		let (added, removed) = set.set(clusters(&["b", "a"]));
		assert_eq!(names(&added), vec!["a", "b"]);
		assert!(removed.is_empty());
		assert_eq!(set.names(), vec!["a", "b"]);
	}

	#[test]
	fn set_reports_symmetric_difference() {
		let set = ClusterSet::new();
		set.set(clusters(&["a", "b", "c"]));

		let (added, removed) = set.set(clusters(&["c", "d", "b"]));
		assert_eq!(names(&added), vec!["d"]);
		assert_eq!(names(&removed), vec!["a"]);
	}

	#[test]
	fn empty_discovery_removes_all() {
		let set = ClusterSet::new();
		set.set(clusters(&["a", "b"]));

		let (added, removed) = set.set(Vec::new());
		assert!(added.is_empty());
		assert_eq!(names(&removed), vec!["a", "b"]);
		assert!(set.is_empty());
	}

	#[test]
	fn duplicate_names_collapse() {
		let set = ClusterSet::new();
		let (added, _) = set.set(clusters(&["a", "a"]));
		assert_eq!(added.len(), 1);
		assert_eq!(set.len(), 1);
	}

	#[test]
	fn find_returns_current_value() {
		let set = ClusterSet::new();
		set.set(clusters(&["a"]));
		assert_eq!(set.find("a").unwrap().name(), "a");
		assert!(set.find("b").is_none());
	}

	#[test]
	fn hash_is_order_independent() {
		let one = ClusterSet::new();
		one.set(clusters(&["x", "y", "z"]));
		let two = ClusterSet::new();
		two.set(clusters(&["z", "x", "y"]));
		assert_eq!(one.hash(), two.hash());
	}

	#[test]
	fn hash_changes_with_membership() {
		let set = ClusterSet::new();
		set.set(clusters(&["x", "y"]));
		let before = set.hash();
		set.set(clusters(&["x"]));
		assert_ne!(before, set.hash());
	}

	#[test]
	fn hash_separates_names() {
		let one = ClusterSet::new();
		one.set(clusters(&["ab", "c"]));
		let two = ClusterSet::new();
		two.set(clusters(&["a", "bc"]));
		assert_ne!(one.hash(), two.hash());
	}

	proptest! {
		#[test]
		fn set_diff_matches_set_algebra(
			before in proptest::collection::btree_set("[a-e]{1,2}", 0..8),
			after in proptest::collection::btree_set("[a-e]{1,2}", 0..8),
		) {
			let set = ClusterSet::new();
			let to_clusters = |s: &BTreeSet<String>| -> Vec<Arc<dyn Cluster>> {
				s.iter()
					.map(|n| Arc::new(MockCluster::new(n)) as Arc<dyn Cluster>)
					.collect()
			};
			set.set(to_clusters(&before));
			let (added, removed) = set.set(to_clusters(&after));

			let expected_added: Vec<String> = after.difference(&before).cloned().collect();
			let expected_removed: Vec<String> = before.difference(&after).cloned().collect();
			prop_assert_eq!(names(&added), expected_added);
			prop_assert_eq!(names(&removed), expected_removed);
		}

		#[test]
		fn hash_equal_iff_same_names(
			a in proptest::collection::btree_set("[a-e]{1,2}", 0..6),
			b in proptest::collection::btree_set("[a-e]{1,2}", 0..6),
		) {
			let left = ClusterSet::new();
			left.set(a.iter().rev().map(|n| Arc::new(MockCluster::new(n)) as Arc<dyn Cluster>).collect());
			let right = ClusterSet::new();
			right.set(b.iter().map(|n| Arc::new(MockCluster::new(n)) as Arc<dyn Cluster>).collect());
			prop_assert_eq!(left.hash() == right.hash(), a == b);
		}
	}
}
