// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use loom_clusters_k8s::UserPrincipal;

use crate::error::{ClustersError, Result};

/// Id reported for the server's own principal in logs and metrics.
pub const SERVER_IDENTITY: &str = "loom-clusters-server";

/// Who a client acts as.
///
/// Used as the principal half of every user-scoped cache key, so server
/// clients can never collide with a user that happens to share its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
	/// The server's own, elevated credentials.
	Server,
	/// An impersonated user. Groups are sorted so the key does not depend on
	/// the order the auth layer reported them in.
	User { id: String, groups: Vec<String> },
}

impl Identity {
	pub fn user(user: &UserPrincipal) -> Result<Self> {
		if user.is_anonymous() {
			return Err(ClustersError::NoUser);
		}
		let mut groups = user.groups.clone();
		groups.sort();
		groups.dedup();
		Ok(Identity::User {
			id: user.id.clone(),
			groups,
		})
	}

	pub fn id(&self) -> &str {
		match self {
			Identity::Server => SERVER_IDENTITY,
			Identity::User { id, .. } => id,
		}
	}

	pub fn is_server(&self) -> bool {
		matches!(self, Identity::Server)
	}

	/// The principal to impersonate, `None` for the server identity.
	pub fn principal(&self) -> Option<UserPrincipal> {
		match self {
			Identity::Server => None,
			Identity::User { id, groups } => Some(UserPrincipal::new(id.clone(), groups.clone())),
		}
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.id())
	}
}
