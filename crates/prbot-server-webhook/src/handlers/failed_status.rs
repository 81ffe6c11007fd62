// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::{GithubApi, StatusState};
use tracing::{info, instrument};

use super::{comment_once, open_pull_requests_for_commit};
use crate::error::HandlerError;
use crate::events::{EventKind, StatusEvent, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

/// Leading text shared by every failure comment for `context`.
pub(crate) fn failure_prefix(context: &str) -> String {
	format!("Status check _{context}_ returned")
}

pub fn failure_message(event: &StatusEvent) -> String {
	let mut message = format!("{} **{}**.", failure_prefix(&event.context), event.state);
	if let Some(url) = event.target_url.as_deref().filter(|u| !u.is_empty()) {
		message.push_str(&format!(" See {url} for more details."));
	}
	message
}

/// Comments on open pull requests when one of their status checks fails.
pub struct FailedStatusComment;

#[async_trait]
impl EventHandler for FailedStatusComment {
	fn name(&self) -> &'static str {
		"failed_status_comment"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::Status]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		_policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, Status, self.event_kinds());
		if matches!(event.state, StatusState::Pending | StatusState::Success) {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let message = failure_message(event);
		let pulls = open_pull_requests_for_commit(api, &event.repository, &event.sha).await?;

		let mut failures: Vec<HandlerError> = Vec::new();
		for pr in pulls {
			match comment_once(api, &repo, pr.number, &message).await {
				Ok(true) => info!(pr = pr.number, context = %event.context, "failure comment posted"),
				Ok(false) => {}
				Err(e) => failures.push(e),
			}
		}
		HandlerError::from_failures(failures)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::test_support::{pr_hit, status_event};
	use crate::testing::{Call, MockGithubApi};

	const MESSAGE: &str = "Status check _ci/build_ returned **failure**. See https://ci.example.com/builds/1 for more details.";

	#[test]
	fn test_message_without_target_url() {
		let WebhookEvent::Status(mut event) = status_event("abc", "error") else {
			unreachable!()
		};
		event.target_url = None;
		assert_eq!(
			failure_message(&event),
			"Status check _ci/build_ returned **error**."
		);
	}

	#[tokio::test]
	async fn test_failure_comments_on_each_open_pull_request() {
		let mut not_a_pr = pr_hit(9, &[]);
		not_a_pr.pull_request = None;
		let api = MockGithubApi::new().with_search_results(vec![pr_hit(7, &[]), not_a_pr]);

		FailedStatusComment
			.handle(&status_event("abc123", "failure"), &api, &RepoPolicy::default())
			.await
			.unwrap();

		assert!(api.calls().contains(&Call::SearchIssues {
			query: "type:pr state:open repo:acme/widgets abc123".to_string()
		}));
		assert_eq!(
			api.mutations(),
			vec![Call::CreateComment {
				number: 7,
				body: MESSAGE.to_string(),
			}]
		);
	}

	#[tokio::test]
	async fn test_whitespace_variant_of_existing_comment_is_not_reposted() {
		let reformatted = "Status check _ci/build_ returned\n**failure**.  See https://ci.example.com/builds/1 for more details.\n";
		let api = MockGithubApi::new()
			.with_search_results(vec![pr_hit(7, &[])])
			.with_comments(7, &[reformatted]);

		FailedStatusComment
			.handle(&status_event("abc123", "failure"), &api, &RepoPolicy::default())
			.await
			.unwrap();

		assert!(api.mutations().is_empty());
	}

	#[tokio::test]
	async fn test_success_and_pending_are_ignored() {
		let api = MockGithubApi::new().with_search_results(vec![pr_hit(7, &[])]);
		for state in ["success", "pending"] {
			FailedStatusComment
				.handle(&status_event("abc123", state), &api, &RepoPolicy::default())
				.await
				.unwrap();
		}
		assert!(api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_search_failure_is_reported() {
		let api = MockGithubApi::new().fail_on("search_issues");
		let err = FailedStatusComment
			.handle(&status_event("abc123", "failure"), &api, &RepoPolicy::default())
			.await
			.unwrap_err();
		assert!(matches!(err, HandlerError::Api(ref e) if e.operation == "search"));
	}
}
