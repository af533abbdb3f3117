// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for the clusters manager.

pub mod access;
pub mod discovery;
pub mod logging;
pub mod refresh;

pub use access::{AccessConfig, AccessConfigLayer};
pub use discovery::{DiscoveryConfig, DiscoveryConfigLayer, DiscoveryMode};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use refresh::{RefreshConfig, RefreshConfigLayer};
