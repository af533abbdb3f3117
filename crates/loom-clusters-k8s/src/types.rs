// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

pub use k8s_openapi::api::core::v1::Namespace;
pub use k8s_openapi::apimachinery::pkg::version::Info;
pub use kube::api::{ApiResource, DynamicObject, ListParams};

/// An authenticated principal, as handed over by the auth layer.
///
/// The clusters manager never creates or persists these; it only uses them
/// to impersonate the user and as part of cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserPrincipal {
	pub id: String,
	#[serde(default)]
	pub groups: Vec<String>,
}

impl UserPrincipal {
	pub fn new(id: impl Into<String>, groups: Vec<String>) -> Self {
		Self {
			id: id.into(),
			groups,
		}
	}

	/// A principal without an id stands for "no user supplied".
	pub fn is_anonymous(&self) -> bool {
		self.id.trim().is_empty()
	}
}

impl fmt::Display for UserPrincipal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}

/// A single permission a user needs in a namespace for it to count as
/// accessible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRule {
	/// API group, empty for the core group.
	pub group: String,
	pub resource: String,
	pub verb: String,
}

impl AccessRule {
	pub fn new(group: &str, resource: &str, verb: &str) -> Self {
		Self {
			group: group.to_string(),
			resource: resource.to_string(),
			verb: verb.to_string(),
		}
	}

	/// Parse `"group/resource:verb"`. The group may be omitted for the core
	/// group, e.g. `"pods:list"`.
	pub fn parse(s: &str) -> Option<Self> {
		let (path, verb) = s.rsplit_once(':')?;
		let (group, resource) = match path.split_once('/') {
			Some((group, resource)) => (group, resource),
			None => ("", path),
		};
		if resource.is_empty() || verb.is_empty() {
			return None;
		}
		Some(Self::new(group, resource, verb))
	}
}

impl fmt::Display for AccessRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.group.is_empty() {
			write!(f, "{}:{}", self.resource, self.verb)
		} else {
			write!(f, "{}/{}:{}", self.group, self.resource, self.verb)
		}
	}
}

/// Default rules: a user must be able to list pods and events in a namespace.
pub fn default_access_rules() -> Vec<AccessRule> {
	vec![
		AccessRule::new("", "pods", "list"),
		AccessRule::new("", "events", "list"),
	]
}

/// Name of a namespace object, empty when unset.
pub fn namespace_name(ns: &Namespace) -> &str {
	ns.metadata.name.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn anonymous_principal() {
		assert!(UserPrincipal::default().is_anonymous());
		assert!(UserPrincipal::new("  ", vec![]).is_anonymous());
		assert!(!UserPrincipal::new("alice", vec![]).is_anonymous());
	}

	#[test]
	fn parse_access_rule_with_group() {
		let rule = AccessRule::parse("apps/deployments:get").unwrap();
		assert_eq!(rule, AccessRule::new("apps", "deployments", "get"));
		assert_eq!(rule.to_string(), "apps/deployments:get");
	}

	#[test]
	fn parse_access_rule_core_group() {
		let rule = AccessRule::parse("pods:list").unwrap();
		assert_eq!(rule, AccessRule::new("", "pods", "list"));
		assert_eq!(rule.to_string(), "pods:list");
	}

	#[test]
	fn parse_access_rule_rejects_garbage() {
		assert!(AccessRule::parse("pods").is_none());
		assert!(AccessRule::parse("pods:").is_none());
		assert!(AccessRule::parse("apps/:get").is_none());
	}
}
