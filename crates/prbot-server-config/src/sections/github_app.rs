// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App identity and webhook secret.

use std::path::PathBuf;

use crate::error::ConfigError;
use prbot_common_config::{load_secret_file, SecretString};
use serde::Deserialize;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Partial GitHub App settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubAppConfigLayer {
	pub app_id: Option<u64>,
	/// Inline PEM. Normally supplied through the environment.
	pub private_key_pem: Option<SecretString>,
	/// Path to the PEM file downloaded from the app settings page.
	pub private_key_file: Option<PathBuf>,
	/// Absent means deliveries are accepted unsigned.
	pub webhook_secret: Option<SecretString>,
	pub base_url: Option<String>,
	pub request_timeout_secs: Option<u64>,
}

impl GitHubAppConfigLayer {
	pub fn merge(&mut self, other: GitHubAppConfigLayer) {
		if other.app_id.is_some() {
			self.app_id = other.app_id;
		}
		if other.private_key_pem.is_some() {
			self.private_key_pem = other.private_key_pem;
		}
		if other.private_key_file.is_some() {
			self.private_key_file = other.private_key_file;
		}
		if other.webhook_secret.is_some() {
			self.webhook_secret = other.webhook_secret;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	/// Resolve into the runtime identity. The app id and a key are required;
	/// an inline PEM wins over a key file.
	pub fn build(self) -> Result<GitHubAppConfig, ConfigError> {
		let app_id = self
			.app_id
			.ok_or_else(|| ConfigError::Missing("github_app.app_id".to_string()))?;

		let private_key_pem = match (self.private_key_pem, self.private_key_file) {
			(Some(pem), _) => pem,
			(None, Some(path)) => load_secret_file(path)?,
			(None, None) => {
				return Err(ConfigError::Missing(
					"github_app.private_key_pem or github_app.private_key_file".to_string(),
				))
			}
		};

		if private_key_pem.expose().trim().is_empty() {
			return Err(ConfigError::Validation(
				"GitHub App private key cannot be empty".to_string(),
			));
		}

		let webhook_secret = self
			.webhook_secret
			.filter(|secret| !secret.expose().is_empty());

		let base_url = self
			.base_url
			.unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());
		validate_base_url(&base_url)?;

		let request_timeout_secs = self
			.request_timeout_secs
			.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
		if request_timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "github_app.request_timeout_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		Ok(GitHubAppConfig {
			app_id,
			private_key_pem,
			webhook_secret,
			base_url: base_url.trim_end_matches('/').to_string(),
			request_timeout_secs,
		})
	}
}

fn validate_base_url(url: &str) -> Result<(), ConfigError> {
	if !url.starts_with("https://") {
		return Err(ConfigError::Validation(format!(
			"GitHub base_url must use HTTPS, got: {url}"
		)));
	}

	if url.contains("localhost") || url.contains("127.0.0.1") || url.contains("[::1]") {
		return Err(ConfigError::Validation(
			"GitHub base_url must not be localhost".to_string(),
		));
	}

	Ok(())
}

/// Validated GitHub App settings.
#[derive(Debug, Clone)]
pub struct GitHubAppConfig {
	pub app_id: u64,
	pub private_key_pem: SecretString,
	pub webhook_secret: Option<SecretString>,
	/// Without trailing slash.
	pub base_url: String,
	pub request_timeout_secs: u64,
}
