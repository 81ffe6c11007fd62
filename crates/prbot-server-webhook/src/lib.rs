// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Webhook intake and the bot's event handlers.
//!
//! A delivery flows through [`authenticate_and_parse`], [`resolve`] and
//! [`HandlerRegistry::dispatch`]; [`WebhookService`] ties the steps together.

pub mod auth;
pub mod deferred;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod text;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use auth::{
	authenticate_and_parse, EventEnvelope, InboundDelivery, DELIVERY_HEADER, EVENT_HEADER,
	SIGNATURE_HEADER,
};
pub use deferred::DeferredActions;
pub use eligibility::is_eligible;
pub use error::{
	AggregateOutcome, ApiError, EntityKind, HandlerError, HandlerFailure, ParseError,
	SignatureError, WebhookError,
};
pub use events::{EventKind, UnroutedEvent, WebhookEvent};
pub use handlers::default_registry;
pub use registry::{EventHandler, HandlerRegistry, HandlerRegistryBuilder};
pub use resolver::resolve;
pub use service::WebhookService;
