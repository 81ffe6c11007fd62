// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery authentication and decoding.

use prbot_common_secret::SecretString;
use prbot_common_webhook::verify_header;
use tracing::{debug, warn};

use crate::error::{ParseError, SignatureError, WebhookError};
use crate::events::{EventKind, WebhookEvent};

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// The parts of an inbound request the authenticator reads.
#[derive(Debug, Clone, Copy)]
pub struct InboundDelivery<'a> {
	pub event_type: Option<&'a str>,
	pub signature: Option<&'a str>,
	pub delivery_id: Option<&'a str>,
	pub body: &'a [u8],
}

/// An authenticated, decoded delivery.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
	pub kind: EventKind,
	/// GitHub's delivery GUID, or a generated one when absent.
	pub delivery_id: String,
	pub event: WebhookEvent,
}

/// Verify the signature when a secret is configured, then decode the body as
/// the variant the event-type header names.
///
/// Nothing in the body is read before the signature checks out. Without a
/// secret the body is accepted as-is. Tags prbot does not route still decode,
/// as [`WebhookEvent::Unrouted`], so that `ping` and friends are not errors.
pub fn authenticate_and_parse(
	delivery: &InboundDelivery<'_>,
	secret: Option<&SecretString>,
) -> Result<EventEnvelope, WebhookError> {
	if let Some(secret) = secret {
		let signature = delivery.signature.ok_or_else(|| {
			warn!("delivery without signature header");
			SignatureError::Missing
		})?;
		if !verify_header(secret.expose().as_bytes(), delivery.body, signature) {
			warn!("webhook signature verification failed");
			return Err(SignatureError::Mismatch.into());
		}
	}

	let event_type = delivery
		.event_type
		.filter(|t| !t.is_empty())
		.ok_or(ParseError::MissingEventType)?;
	let event = WebhookEvent::parse(event_type, delivery.body).map_err(|source| {
		ParseError::InvalidPayload {
			event_type: event_type.to_string(),
			source,
		}
	})?;
	let kind = event.kind();

	let delivery_id = delivery
		.delivery_id
		.map(str::to_string)
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

	debug!(event_type, delivery_id = %delivery_id, "delivery authenticated");
	Ok(EventEnvelope {
		kind,
		delivery_id,
		event,
	})
}
