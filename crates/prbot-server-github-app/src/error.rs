// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for GitHub App authentication and API calls.

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, warn};

/// Errors from calling the GitHub (or ZenHub) REST API.
#[derive(Debug, Error)]
pub enum GithubAppError {
	#[error("Network error: {0}")]
	Network(#[source] reqwest::Error),

	#[error("Request timed out")]
	Timeout,

	#[error("Unauthorized or invalid app configuration")]
	Unauthorized,

	#[error("Forbidden or insufficient permissions")]
	Forbidden,

	#[error("Rate limit exceeded")]
	RateLimited,

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("GitHub API error: {status} - {message}")]
	ApiError { status: u16, message: String },

	#[error("Invalid response from GitHub: {0}")]
	InvalidResponse(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Auth(#[from] AuthError),
}

impl GithubAppError {
	pub fn api_error(status: u16, message: impl Into<String>) -> Self {
		Self::ApiError {
			status,
			message: message.into(),
		}
	}

	/// A 404 means "absent" for some callers, e.g. a branch without protection.
	pub fn is_not_found(&self) -> bool {
		matches!(self, GithubAppError::NotFound(_))
	}
}

impl From<reqwest::Error> for GithubAppError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			GithubAppError::Timeout
		} else {
			GithubAppError::Network(e)
		}
	}
}

/// Credential failures. Always terminal for the current request.
#[derive(Debug, Error)]
pub enum AuthError {
	/// The app private key could not be parsed. Fatal at startup.
	#[error("invalid GitHub App private key: {0}")]
	InvalidKey(String),

	#[error("failed to sign app JWT: {0}")]
	Signing(String),

	#[error("failed to exchange app JWT for installation {installation_id} token: {source}")]
	Exchange {
		installation_id: u64,
		#[source]
		source: Box<GithubAppError>,
	},
}

/// Classify a non-success response.
pub fn map_github_error(status: StatusCode, body: &str) -> GithubAppError {
	let status_code = status.as_u16();

	match status_code {
		401 => {
			warn!(status = status_code, "Unauthorized request to GitHub");
			GithubAppError::Unauthorized
		}
		403 | 429 => {
			let lower = body.to_lowercase();
			if status_code == 429 || lower.contains("rate limit") || lower.contains("api rate") {
				warn!(status = status_code, "GitHub rate limit exceeded");
				GithubAppError::RateLimited
			} else {
				warn!(status = status_code, "Forbidden request to GitHub");
				GithubAppError::Forbidden
			}
		}
		404 => GithubAppError::NotFound(body.to_string()),
		_ => {
			error!(status = status_code, body = %body, "GitHub API error");
			GithubAppError::ApiError {
				status: status_code,
				message: body.to_string(),
			}
		}
	}
}
