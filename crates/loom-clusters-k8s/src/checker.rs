// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Namespace access filtering via SelfSubjectAccessReview.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};

use crate::client::{AccessReviewer, NamespaceChecker};
use crate::error::K8sError;
use crate::types::{default_access_rules, namespace_name, AccessRule, Namespace};

const DEFAULT_CONCURRENCY: usize = 8;

/// A namespace is accessible when every rule is allowed in it.
pub struct SubjectAccessChecker {
	rules: Vec<AccessRule>,
	concurrency: usize,
}

impl Default for SubjectAccessChecker {
	fn default() -> Self {
		Self::new(default_access_rules(), DEFAULT_CONCURRENCY)
	}
}

impl SubjectAccessChecker {
	pub fn new(rules: Vec<AccessRule>, concurrency: usize) -> Self {
		Self {
			rules,
			concurrency: concurrency.max(1),
		}
	}

	pub fn rules(&self) -> &[AccessRule] {
		&self.rules
	}

	async fn namespace_allowed(
		&self,
		auth: &dyn AccessReviewer,
		namespace: &str,
	) -> Result<bool, K8sError> {
		for rule in &self.rules {
			if !auth.can_i(rule, namespace).await? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

#[async_trait]
impl NamespaceChecker for SubjectAccessChecker {
	async fn filter_accessible_namespaces(
		&self,
		auth: &dyn AccessReviewer,
		namespaces: &[Namespace],
	) -> Result<Vec<Namespace>, K8sError> {
		let checks = stream::iter(0..namespaces.len())
			.map(|idx| async move {
				let ns = &namespaces[idx];
				let allowed = self.namespace_allowed(auth, namespace_name(ns)).await?;
				Ok::<_, K8sError>((idx, allowed))
			})
			.buffer_unordered(self.concurrency);

		let mut allowed: Vec<usize> = checks
			.try_filter_map(|(idx, ok)| async move { Ok(ok.then_some(idx)) })
			.try_collect()
			.await?;

		// buffer_unordered scrambles completion order
		allowed.sort_unstable();
		Ok(allowed.into_iter().map(|idx| namespaces[idx].clone()).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{namespace, MockAccessReviewer};

	fn names(list: &[Namespace]) -> Vec<&str> {
		list.iter().map(namespace_name).collect()
	}

	#[tokio::test]
	async fn keeps_only_namespaces_where_all_rules_pass() {
		let reviewer = MockAccessReviewer::new();
		reviewer.allow("", "pods", "list", "team-a");
		reviewer.allow("", "events", "list", "team-a");
		reviewer.allow("", "pods", "list", "team-b");
		reviewer.allow("", "pods", "list", "team-c");
		reviewer.allow("", "events", "list", "team-c");

		let checker = SubjectAccessChecker::default();
		let all = vec![
			namespace("team-a"),
			namespace("team-b"),
			namespace("team-c"),
			namespace("kube-system"),
		];

		let filtered = checker
			.filter_accessible_namespaces(&reviewer, &all)
			.await
			.unwrap();
		assert_eq!(names(&filtered), vec!["team-a", "team-c"]);
	}

	#[tokio::test]
	async fn empty_input_yields_empty_output() {
		let checker = SubjectAccessChecker::default();
		let filtered = checker
			.filter_accessible_namespaces(&MockAccessReviewer::new(), &[])
			.await
			.unwrap();
		assert!(filtered.is_empty());
	}

	#[tokio::test]
	async fn review_failure_propagates() {
		let reviewer = MockAccessReviewer::new();
		reviewer.fail_with("apiserver unavailable");

		let checker = SubjectAccessChecker::new(vec![AccessRule::new("", "pods", "get")], 2);
		let err = checker
			.filter_accessible_namespaces(&reviewer, &[namespace("team-a")])
			.await
			.unwrap_err();
		assert!(matches!(err, K8sError::AccessReview { .. }));
	}
}
