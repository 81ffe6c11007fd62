// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! ZenHub board client used to move issues between pipelines.

use std::sync::Arc;

use async_trait::async_trait;
use prbot_common_secret::SecretString;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{map_github_error, GithubAppError};

#[async_trait]
pub trait BoardApi: Send + Sync {
	/// Move `issue` to the top of `pipeline_id` on the board of `repo_id`.
	async fn move_issue(
		&self,
		repo_id: u64,
		issue: u64,
		pipeline_id: &str,
	) -> Result<(), GithubAppError>;
}

/// Builds board clients from per-repository board settings.
pub trait BoardClientFactory: Send + Sync {
	fn for_board(&self, base_url: &str, token: &SecretString) -> Arc<dyn BoardApi>;
}

pub struct ZenhubClient {
	http: Client,
	base_url: String,
	token: SecretString,
}

impl ZenhubClient {
	pub fn new(http: Client, base_url: impl Into<String>, token: SecretString) -> Self {
		let base_url: String = base_url.into();
		Self {
			http,
			base_url: base_url.trim_end_matches('/').to_string(),
			token,
		}
	}
}

#[async_trait]
impl BoardApi for ZenhubClient {
	#[instrument(skip(self))]
	async fn move_issue(
		&self,
		repo_id: u64,
		issue: u64,
		pipeline_id: &str,
	) -> Result<(), GithubAppError> {
		let url = format!(
			"{}/p1/repositories/{repo_id}/issues/{issue}/moves",
			self.base_url
		);

		let response = self
			.http
			.post(&url)
			.header("X-Authentication-Token", self.token.expose().as_str())
			.json(&json!({ "pipeline_id": pipeline_id, "position": "top" }))
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}

		debug!(repo_id, issue, pipeline_id, "Moved issue on board");
		Ok(())
	}
}

/// Shares one transport across every repository's board.
pub struct ZenhubClientFactory {
	http: Client,
}

impl ZenhubClientFactory {
	pub fn new(http: Client) -> Self {
		Self { http }
	}
}

impl BoardClientFactory for ZenhubClientFactory {
	fn for_board(&self, base_url: &str, token: &SecretString) -> Arc<dyn BoardApi> {
		Arc::new(ZenhubClient::new(self.http.clone(), base_url, token.clone()))
	}
}
