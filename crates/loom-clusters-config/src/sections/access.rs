// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespace access check configuration section.

use loom_clusters_k8s::{default_access_rules, AccessRule};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONCURRENCY: usize = 8;

fn default_rules() -> Vec<String> {
	default_access_rules()
		.iter()
		.map(ToString::to_string)
		.collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccessConfigLayer {
	pub rules: Option<Vec<String>>,
	pub concurrency: Option<usize>,
}

impl AccessConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.rules.is_some() {
			self.rules = other.rules;
		}
		if other.concurrency.is_some() {
			self.concurrency = other.concurrency;
		}
	}

	pub fn finalize(self) -> AccessConfig {
		AccessConfig {
			rules: self.rules.unwrap_or_else(default_rules),
			concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessConfig {
	/// Permissions required in a namespace, as `group/resource:verb`.
	pub rules: Vec<String>,
	/// Access reviews in flight per cluster.
	pub concurrency: usize,
}

impl AccessConfig {
	pub fn access_rules(&self) -> Result<Vec<AccessRule>, ConfigError> {
		self
			.rules
			.iter()
			.map(|rule| {
				AccessRule::parse(rule).ok_or_else(|| ConfigError::InvalidValue {
					key: "access.rules".to_string(),
					message: format!("'{rule}' is not of the form group/resource:verb"),
				})
			})
			.collect()
	}
}

impl Default for AccessConfig {
	fn default() -> Self {
		AccessConfigLayer::default().finalize()
	}
}
