// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end processing of one webhook delivery.

use std::sync::Arc;

use prbot_common_secret::SecretString;
use prbot_server_config::PolicyConfig;
use prbot_server_github_app::ClientFactory;
use tracing::field::Empty;
use tracing::{debug, info, instrument, warn};

use crate::auth::{authenticate_and_parse, InboundDelivery};
use crate::error::{AggregateOutcome, WebhookError};
use crate::registry::HandlerRegistry;
use crate::resolver::resolve;

/// Authenticates, routes and dispatches deliveries.
pub struct WebhookService {
	registry: HandlerRegistry,
	policy: PolicyConfig,
	clients: Arc<dyn ClientFactory>,
	webhook_secret: Option<SecretString>,
}

impl WebhookService {
	pub fn new(
		registry: HandlerRegistry,
		policy: PolicyConfig,
		clients: Arc<dyn ClientFactory>,
		webhook_secret: Option<SecretString>,
	) -> Self {
		if webhook_secret.is_none() {
			warn!("no webhook secret configured, deliveries are accepted unauthenticated");
		}
		Self {
			registry,
			policy,
			clients,
			webhook_secret,
		}
	}

	pub fn registry(&self) -> &HandlerRegistry {
		&self.registry
	}

	/// Process one delivery.
	///
	/// Signature and parse failures abort before any handler runs. Handler
	/// failures are collected in the returned outcome.
	#[instrument(
		skip_all,
		fields(event_type = Empty, delivery_id = Empty, repository = Empty)
	)]
	pub async fn process(
		&self,
		delivery: &InboundDelivery<'_>,
	) -> Result<AggregateOutcome, WebhookError> {
		let envelope = authenticate_and_parse(delivery, self.webhook_secret.as_ref())?;
		let span = tracing::Span::current();
		span.record("event_type", envelope.event.event_type());
		span.record("delivery_id", envelope.delivery_id.as_str());
		if let Some(repository) = envelope.event.repository() {
			span.record("repository", repository.full_name.as_str());
		}

		let policy = resolve(&envelope.event, &self.policy);
		if policy.disabled {
			info!("prbot disabled for repository, skipping");
			return Ok(AggregateOutcome::success());
		}

		if !self.registry.has_handlers(envelope.kind) {
			debug!("no handlers registered for event type");
			return Ok(AggregateOutcome::success());
		}

		let installation_id =
			envelope
				.event
				.installation_id()
				.ok_or(WebhookError::MissingInstallation {
					event_type: envelope.kind,
				})?;
		let api = self.clients.for_installation(installation_id);

		let outcome = self
			.registry
			.dispatch(envelope.kind, &envelope.event, api.as_ref(), &policy)
			.await;
		if outcome.is_success() {
			info!(installation_id, action = ?envelope.event.action(), "delivery processed");
		} else {
			warn!(
				installation_id,
				failures = outcome.failures().len(),
				"delivery processed with handler failures"
			);
		}
		Ok(outcome)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use prbot_common_webhook::sign_header;
	use prbot_server_config::{RepoPolicy, RepoPolicyLayer};
	use prbot_server_github_app::{CombinedStatus, CommitStatus, GithubApi, Review, StatusState};
	use serde_json::json;

	use crate::deferred::DeferredActions;
	use crate::error::{HandlerError, SignatureError};
	use crate::events::{fixtures, EventKind, WebhookEvent};
	use crate::handlers::{default_registry, DISMISS_MESSAGE};
	use crate::handlers::test_support::{pr_hit, pull_request};
	use crate::registry::EventHandler;
	use crate::testing::{Call, MockBoardFactory, MockClientFactory, MockGithubApi};

	const SECRET: &str = "webhook-secret";

	#[derive(Default)]
	struct Spy {
		invocations: AtomicUsize,
	}

	#[async_trait]
	impl EventHandler for Spy {
		fn name(&self) -> &'static str {
			"spy"
		}

		fn event_kinds(&self) -> &'static [EventKind] {
			&[EventKind::PullRequest, EventKind::Status]
		}

		async fn handle(
			&self,
			_event: &WebhookEvent,
			_api: &dyn GithubApi,
			_policy: &RepoPolicy,
		) -> Result<(), HandlerError> {
			self.invocations.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct Harness {
		service: WebhookService,
		api: Arc<MockGithubApi>,
		clients: Arc<MockClientFactory>,
	}

	fn harness(registry: HandlerRegistry, policy: PolicyConfig, api: MockGithubApi) -> Harness {
		let api = Arc::new(api);
		let clients = Arc::new(MockClientFactory::new(api.clone()));
		let service = WebhookService::new(
			registry,
			policy,
			clients.clone(),
			Some(SECRET.into()),
		);
		Harness {
			service,
			api,
			clients,
		}
	}

	fn spy_harness() -> (Harness, Arc<Spy>) {
		let spy = Arc::new(Spy::default());
		let registry = HandlerRegistry::builder().register(spy.clone()).build();
		(
			harness(registry, PolicyConfig::default(), MockGithubApi::new()),
			spy,
		)
	}

	fn default_harness(api: MockGithubApi) -> Harness {
		let registry = default_registry(
			Arc::new(MockBoardFactory::new(Arc::default())),
			Arc::new(DeferredActions::new()),
		);
		harness(registry, PolicyConfig::default(), api)
	}

	async fn deliver(
		service: &WebhookService,
		event_type: &str,
		body: &[u8],
		signature: Option<&str>,
	) -> Result<AggregateOutcome, WebhookError> {
		service
			.process(&InboundDelivery {
				event_type: Some(event_type),
				signature,
				delivery_id: Some("delivery-1"),
				body,
			})
			.await
	}

	async fn deliver_signed(
		service: &WebhookService,
		event_type: &str,
		body: serde_json::Value,
	) -> Result<AggregateOutcome, WebhookError> {
		let body = body.to_string().into_bytes();
		let signature = sign_header(SECRET.as_bytes(), &body);
		deliver(service, event_type, &body, Some(&signature)).await
	}

	#[tokio::test]
	async fn test_bad_signature_dispatches_nothing() {
		let (h, spy) = spy_harness();
		let body = fixtures::pull_request_event("opened", 42).to_string().into_bytes();
		let forged = sign_header(b"attacker", &body);

		let err = deliver(&h.service, "pull_request", &body, Some(&forged))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			WebhookError::Signature(SignatureError::Mismatch)
		));
		assert_eq!(spy.invocations.load(Ordering::SeqCst), 0);
		assert!(h.clients.installations().is_empty());
	}

	#[tokio::test]
	async fn test_event_type_without_handlers_succeeds_without_client() {
		let (h, spy) = spy_harness();
		let outcome = deliver_signed(
			&h.service,
			"issues",
			json!({
				"action": "opened",
				"issue": { "number": 1 },
				"repository": fixtures::repository()
			}),
		)
		.await
		.unwrap();

		assert!(outcome.is_success());
		assert_eq!(spy.invocations.load(Ordering::SeqCst), 0);
		assert!(h.clients.installations().is_empty());
	}

	#[tokio::test]
	async fn test_unrouted_platform_events_succeed_without_client() {
		let h = default_harness(MockGithubApi::new());
		let deliveries = [
			("ping", json!({ "zen": "Speak like a human.", "hook_id": 1 })),
			(
				"push",
				json!({
					"ref": "refs/heads/main",
					"repository": fixtures::repository(),
					"installation": { "id": 42 }
				}),
			),
			(
				"installation",
				json!({ "action": "created", "installation": { "id": 42 } }),
			),
		];

		for (event_type, body) in deliveries {
			let outcome = deliver_signed(&h.service, event_type, body).await.unwrap();
			assert!(outcome.is_success(), "{event_type}: {outcome}");
		}
		assert!(h.clients.installations().is_empty());
		assert!(h.api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_routed_event_uses_installation_client() {
		let (h, spy) = spy_harness();
		let outcome = deliver_signed(
			&h.service,
			"pull_request",
			fixtures::pull_request_event("opened", 77),
		)
		.await
		.unwrap();

		assert!(outcome.is_success());
		assert_eq!(spy.invocations.load(Ordering::SeqCst), 1);
		assert_eq!(h.clients.installations(), vec![77]);
	}

	#[tokio::test]
	async fn test_missing_installation_is_an_error() {
		let (h, spy) = spy_harness();
		let mut body = fixtures::pull_request_event("opened", 1);
		body.as_object_mut().unwrap().remove("installation");

		let err = deliver_signed(&h.service, "pull_request", body).await.unwrap_err();

		assert!(matches!(
			err,
			WebhookError::MissingInstallation {
				event_type: EventKind::PullRequest
			}
		));
		assert_eq!(spy.invocations.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_disabled_repository_is_skipped() {
		let spy = Arc::new(Spy::default());
		let registry = HandlerRegistry::builder().register(spy.clone()).build();
		let policy = PolicyConfig {
			default: RepoPolicyLayer::default(),
			repositories: HashMap::from([(
				"acme/widgets".to_string(),
				RepoPolicyLayer {
					disabled: Some(true),
					..RepoPolicyLayer::default()
				},
			)]),
		};
		let h = harness(registry, policy, MockGithubApi::new());

		let outcome = deliver_signed(
			&h.service,
			"pull_request",
			fixtures::pull_request_event("opened", 42),
		)
		.await
		.unwrap();

		assert!(outcome.is_success());
		assert_eq!(spy.invocations.load(Ordering::SeqCst), 0);
		assert!(h.clients.installations().is_empty());
	}

	#[tokio::test]
	async fn test_synchronize_dismisses_every_review() {
		let api = MockGithubApi::new().with_reviews(
			42,
			vec![
				Review {
					id: 100,
					state: "APPROVED".to_string(),
					user: None,
				},
				Review {
					id: 101,
					state: "CHANGES_REQUESTED".to_string(),
					user: None,
				},
			],
		);
		let h = default_harness(api);

		let outcome = deliver_signed(
			&h.service,
			"pull_request",
			fixtures::pull_request_event("synchronize", 42),
		)
		.await
		.unwrap();

		assert!(outcome.is_success(), "{outcome}");
		assert_eq!(h.clients.installations(), vec![42]);
		assert_eq!(
			h.api.mutations(),
			vec![
				Call::DismissReview {
					number: 42,
					review_id: 100,
					message: DISMISS_MESSAGE.to_string(),
				},
				Call::DismissReview {
					number: 42,
					review_id: 101,
					message: DISMISS_MESSAGE.to_string(),
				},
			]
		);
	}

	#[tokio::test]
	async fn test_success_status_merges_the_approved_pull_request() {
		let api = MockGithubApi::new()
			.with_pull_request(pull_request(7, "abc123", &["approved"]))
			.with_search_results(vec![pr_hit(7, &["approved"])])
			.with_required_contexts(Some(vec![]))
			.with_combined_status(CombinedStatus {
				state: StatusState::Success,
				sha: "abc123".to_string(),
				statuses: vec![CommitStatus {
					context: "ci/build".to_string(),
					state: StatusState::Success,
					target_url: None,
					description: None,
				}],
			});
		let h = default_harness(api);

		let outcome = deliver_signed(
			&h.service,
			"status",
			fixtures::status_event("abc123", "success", 42),
		)
		.await
		.unwrap();

		assert!(outcome.is_success(), "{outcome}");
		let merges: Vec<_> = h
			.api
			.calls()
			.into_iter()
			.filter(|c| matches!(c, Call::MergePullRequest { .. }))
			.collect();
		assert_eq!(
			merges,
			vec![Call::MergePullRequest {
				number: 7,
				sha: "abc123".to_string(),
			}]
		);
	}

	#[tokio::test]
	async fn test_handler_failures_are_aggregated_not_fatal() {
		let api = MockGithubApi::new()
			.with_reviews(
				42,
				vec![Review {
					id: 1,
					state: "APPROVED".to_string(),
					user: None,
				}],
			)
			.fail_on("dismiss_review");
		let h = default_harness(api);

		let outcome = deliver_signed(
			&h.service,
			"pull_request",
			fixtures::pull_request_event("synchronize", 42),
		)
		.await
		.unwrap();

		let failed: Vec<_> = outcome.failures().iter().map(|f| f.handler).collect();
		assert_eq!(failed, vec!["dismiss_reviews_on_push"]);
	}
}
