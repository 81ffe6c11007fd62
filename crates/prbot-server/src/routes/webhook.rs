// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App webhook receiver.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use prbot_server_webhook::{InboundDelivery, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use tracing::{error, instrument, warn};

use crate::error::WebhookRejection;
use crate::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /webhook
///
/// 200 when every handler succeeded, 401 on a bad signature, 500 otherwise.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn receive_webhook(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<StatusCode, WebhookRejection> {
	let delivery = InboundDelivery {
		event_type: header(&headers, EVENT_HEADER),
		signature: header(&headers, SIGNATURE_HEADER),
		delivery_id: header(&headers, DELIVERY_HEADER),
		body: &body,
	};

	let outcome = match state.webhook.process(&delivery).await {
		Ok(outcome) => outcome,
		Err(e) => {
			warn!(
				event_type = ?delivery.event_type,
				delivery_id = ?delivery.delivery_id,
				error = %e,
				"webhook rejected"
			);
			return Err(e.into());
		}
	};

	if outcome.is_success() {
		return Ok(StatusCode::OK);
	}
	for failure in outcome.failures() {
		error!(
			handler = failure.handler,
			delivery_id = ?delivery.delivery_id,
			error = %failure.error,
			"webhook handler failed"
		);
	}
	Err(WebhookRejection::Handlers(outcome))
}
