// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	AccessConfigLayer, DiscoveryConfigLayer, LoggingConfigLayer, RefreshConfigLayer,
};

/// Clusters configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClustersConfigLayer {
	#[serde(default)]
	pub refresh: Option<RefreshConfigLayer>,
	#[serde(default)]
	pub discovery: Option<DiscoveryConfigLayer>,
	#[serde(default)]
	pub access: Option<AccessConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ClustersConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ClustersConfigLayer) {
		merge_option(&mut self.refresh, other.refresh, RefreshConfigLayer::merge);
		merge_option(
			&mut self.discovery,
			other.discovery,
			DiscoveryConfigLayer::merge,
		);
		merge_option(&mut self.access, other.access, AccessConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
