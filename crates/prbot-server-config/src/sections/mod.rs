// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod github_app;
mod http;
mod logging;
mod policy;

pub use github_app::{GitHubAppConfig, GitHubAppConfigLayer, DEFAULT_GITHUB_API_URL};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use policy::{
	BoardColumn, BoardConfig, BoardConfigLayer, PolicyConfig, PolicyConfigLayer, RepoPolicy,
	RepoPolicyLayer, DEFAULT_APPROVED_LABEL, DEFAULT_ZENHUB_URL,
};
