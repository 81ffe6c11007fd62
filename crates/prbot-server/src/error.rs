// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prbot_server_config::ConfigError;
use prbot_server_github_app::AuthError;
use prbot_server_webhook::{AggregateOutcome, WebhookError};

/// Why a delivery was not accepted.
///
/// Responses carry a fixed short body; the detail only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum WebhookRejection {
	#[error(transparent)]
	Webhook(#[from] WebhookError),

	#[error("{0}")]
	Handlers(AggregateOutcome),
}

impl WebhookRejection {
	pub fn status(&self) -> StatusCode {
		match self {
			WebhookRejection::Webhook(WebhookError::Signature(_)) => StatusCode::UNAUTHORIZED,
			WebhookRejection::Webhook(_) | WebhookRejection::Handlers(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

impl IntoResponse for WebhookRejection {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = if status == StatusCode::UNAUTHORIZED {
			"unauthorized"
		} else {
			"webhook processing failed"
		};
		(status, body).into_response()
	}
}

/// Failures while assembling the service at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("GitHub App credentials: {0}")]
	Auth(#[from] AuthError),

	#[error("failed to build HTTP client: {0}")]
	Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
	use super::*;
	use prbot_server_webhook::{EventKind, ParseError, SignatureError};

	#[test]
	fn test_status_mapping() {
		let cases = [
			(
				WebhookRejection::from(WebhookError::Signature(SignatureError::Mismatch)),
				StatusCode::UNAUTHORIZED,
			),
			(
				WebhookRejection::from(WebhookError::Signature(SignatureError::Missing)),
				StatusCode::UNAUTHORIZED,
			),
			(
				WebhookRejection::from(WebhookError::Parse(ParseError::MissingEventType)),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
			(
				WebhookRejection::from(WebhookError::MissingInstallation {
					event_type: EventKind::Status,
				}),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
			(
				WebhookRejection::Handlers(AggregateOutcome::success()),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];
		for (rejection, status) in cases {
			assert_eq!(rejection.status(), status, "{rejection}");
		}
	}

	#[test]
	fn test_response_body_hides_detail() {
		let response =
			WebhookRejection::from(WebhookError::Parse(ParseError::MissingEventType)).into_response();
		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
