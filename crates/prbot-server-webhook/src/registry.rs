// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Handler registration and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::GithubApi;
use tracing::{debug, instrument, warn};

use crate::error::{AggregateOutcome, HandlerError};
use crate::events::{EventKind, WebhookEvent};

/// A unit of bot behaviour reacting to one or more event kinds.
///
/// Implementations type-check the event first and return
/// [`HandlerError::UnexpectedEvent`] for a variant they do not handle. They
/// must tolerate redelivery: read current state before mutating.
#[async_trait]
pub trait EventHandler: Send + Sync {
	fn name(&self) -> &'static str;

	fn event_kinds(&self) -> &'static [EventKind];

	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError>;
}

/// Event kind to ordered handlers. Built once at startup, then shared
/// read-only.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
	routes: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
	pub fn builder() -> HandlerRegistryBuilder {
		HandlerRegistryBuilder::default()
	}

	pub fn handlers_for(&self, kind: EventKind) -> &[Arc<dyn EventHandler>] {
		self.routes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn has_handlers(&self, kind: EventKind) -> bool {
		!self.handlers_for(kind).is_empty()
	}

	/// Run every handler registered for `kind`, in registration order. A
	/// failing handler never stops the ones after it.
	#[instrument(skip_all, fields(event_type = %kind))]
	pub async fn dispatch(
		&self,
		kind: EventKind,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> AggregateOutcome {
		let mut outcome = AggregateOutcome::success();

		for handler in self.handlers_for(kind) {
			debug!(handler = handler.name(), "invoking handler");
			if let Err(error) = handler.handle(event, api, policy).await {
				warn!(handler = handler.name(), error = %error, "handler failed");
				outcome.record(handler.name(), error);
			}
		}

		outcome
	}
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
	routes: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistryBuilder {
	/// Append the handler to each of its declared kinds.
	pub fn register(mut self, handler: Arc<dyn EventHandler>) -> Self {
		for kind in handler.event_kinds() {
			self.routes.entry(*kind).or_default().push(handler.clone());
		}
		self
	}

	pub fn build(self) -> HandlerRegistry {
		HandlerRegistry {
			routes: self.routes,
		}
	}
}

/// Return the event as the expected variant or an
/// [`HandlerError::UnexpectedEvent`].
macro_rules! expect_event {
	($event:expr, $variant:ident, $kinds:expr) => {
		match $event {
			$crate::events::WebhookEvent::$variant(inner) => inner,
			other => {
				return Err($crate::error::HandlerError::UnexpectedEvent {
					expected: $kinds,
					actual: other.kind(),
				})
			}
		}
	};
}

pub(crate) use expect_event;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{ApiError, EntityKind};
	use crate::events::fixtures;
	use crate::testing::MockGithubApi;
	use prbot_server_github_app::GithubAppError;
	use std::sync::Mutex;

	struct Recording {
		name: &'static str,
		kinds: &'static [EventKind],
		fail: bool,
		log: Arc<Mutex<Vec<&'static str>>>,
	}

	#[async_trait]
	impl EventHandler for Recording {
		fn name(&self) -> &'static str {
			self.name
		}

		fn event_kinds(&self) -> &'static [EventKind] {
			self.kinds
		}

		async fn handle(
			&self,
			_event: &WebhookEvent,
			_api: &dyn GithubApi,
			_policy: &RepoPolicy,
		) -> Result<(), HandlerError> {
			self.log.lock().unwrap().push(self.name);
			if self.fail {
				return Err(HandlerError::Api(ApiError::new(
					EntityKind::Issue,
					"acme/widgets#1",
					"get",
					GithubAppError::Timeout,
				)));
			}
			Ok(())
		}
	}

	fn recording(
		name: &'static str,
		kinds: &'static [EventKind],
		fail: bool,
		log: &Arc<Mutex<Vec<&'static str>>>,
	) -> Arc<dyn EventHandler> {
		Arc::new(Recording {
			name,
			kinds,
			fail,
			log: log.clone(),
		})
	}

	fn pull_request_event() -> WebhookEvent {
		WebhookEvent::decode(
			EventKind::PullRequest,
			fixtures::pull_request_event("opened", 1)
				.to_string()
				.as_bytes(),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_unrouted_kind_is_success() {
		let registry = HandlerRegistry::builder().build();
		let api = MockGithubApi::new();
		let outcome = registry
			.dispatch(
				EventKind::CheckRun,
				&pull_request_event(),
				&api,
				&RepoPolicy::default(),
			)
			.await;
		assert!(outcome.is_success());
		assert!(api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_failure_does_not_stop_later_handlers() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let registry = HandlerRegistry::builder()
			.register(recording("a", &[EventKind::PullRequest], true, &log))
			.register(recording("b", &[EventKind::PullRequest], false, &log))
			.register(recording("c", &[EventKind::PullRequest], true, &log))
			.build();

		let outcome = registry
			.dispatch(
				EventKind::PullRequest,
				&pull_request_event(),
				&MockGithubApi::new(),
				&RepoPolicy::default(),
			)
			.await;

		assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
		let failed: Vec<_> = outcome.failures().iter().map(|f| f.handler).collect();
		assert_eq!(failed, vec!["a", "c"]);
	}

	#[tokio::test]
	async fn test_handlers_only_run_for_their_kinds() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let registry = HandlerRegistry::builder()
			.register(recording("issues", &[EventKind::Issues], false, &log))
			.register(recording(
				"both",
				&[EventKind::Issues, EventKind::PullRequest],
				false,
				&log,
			))
			.build();

		assert_eq!(registry.handlers_for(EventKind::Issues).len(), 2);
		assert_eq!(registry.handlers_for(EventKind::PullRequest).len(), 1);
		assert!(!registry.has_handlers(EventKind::Status));

		registry
			.dispatch(
				EventKind::PullRequest,
				&pull_request_event(),
				&MockGithubApi::new(),
				&RepoPolicy::default(),
			)
			.await;
		assert_eq!(*log.lock().unwrap(), vec!["both"]);
	}
}
