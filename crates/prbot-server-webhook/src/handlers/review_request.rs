// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::{GithubApi, PullRequest, RepoRef, StatusState};
use tracing::{debug, instrument};

use super::{issue_id, publish_status};
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, PullRequestEvent, WebhookEvent};
use crate::registry::EventHandler;

pub const REVIEW_CONTEXT: &str = "prbot/review";

const KINDS: &[EventKind] = &[EventKind::PullRequest, EventKind::PullRequestReview];

/// Tracks requested reviews with a label and mirrors it as a commit status.
pub struct ReviewRequestLabel;

#[async_trait]
impl EventHandler for ReviewRequestLabel {
	fn name(&self) -> &'static str {
		"review_request_label"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		KINDS
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let Some(label) = policy.review_requested_label.as_deref() else {
			return Ok(());
		};

		match event {
			WebhookEvent::PullRequest(event) => {
				let repo = event.repository.repo_ref();
				let labelled = sync_label(event, api, &repo, label).await?;
				publish_review_status(api, &repo, &event.pull_request, labelled).await
			}
			WebhookEvent::PullRequestReview(event) => {
				let repo = event.repository.repo_ref();
				let labelled = event.pull_request.has_label(label);
				publish_review_status(api, &repo, &event.pull_request, labelled).await
			}
			other => Err(HandlerError::UnexpectedEvent {
				expected: KINDS,
				actual: other.kind(),
			}),
		}
	}
}

/// Apply the review-request action to the label. Returns whether the pull
/// request carries the label afterwards.
async fn sync_label(
	event: &PullRequestEvent,
	api: &dyn GithubApi,
	repo: &RepoRef,
	label: &str,
) -> Result<bool, HandlerError> {
	let number = event.pull_request.number;
	let pr = api
		.get_pull_request(repo, number)
		.await
		.map_err(|e| ApiError::new(EntityKind::PullRequest, issue_id(repo, number), "get", e))?;
	let labelled = pr.has_label(label);

	let action = event.action.to_ascii_lowercase();
	match action.as_str() {
		"review_requested" if !labelled => {
			api.add_labels(repo, number, &[label.to_string()])
				.await
				.map_err(|e| ApiError::new(EntityKind::Label, issue_id(repo, number), "add", e))?;
			debug!(pr = number, label, "review request label added");
			Ok(true)
		}
		"review_request_removed" if labelled => {
			let reviewers = api
				.list_requested_reviewers(repo, number)
				.await
				.map_err(|e| {
					ApiError::new(EntityKind::Reviewers, issue_id(repo, number), "list", e)
				})?;
			let reviews = api
				.list_reviews(repo, number)
				.await
				.map_err(|e| ApiError::new(EntityKind::Review, issue_id(repo, number), "list", e))?;
			if !reviewers.is_empty() || !reviews.is_empty() {
				debug!(pr = number, "reviewers or reviews remain, keeping label");
				return Ok(true);
			}
			api.remove_label(repo, number, label)
				.await
				.map_err(|e| {
					ApiError::new(EntityKind::Label, issue_id(repo, number), "remove", e)
				})?;
			debug!(pr = number, label, "review request label removed");
			Ok(false)
		}
		_ => Ok(labelled),
	}
}

async fn publish_review_status(
	api: &dyn GithubApi,
	repo: &RepoRef,
	pr: &PullRequest,
	labelled: bool,
) -> Result<(), HandlerError> {
	let sha = &pr.head.sha;
	if !labelled {
		return publish_status(
			api,
			repo,
			sha,
			REVIEW_CONTEXT,
			StatusState::Success,
			"OK - No review requested",
		)
		.await;
	}

	let reviews = api
		.list_reviews(repo, pr.number)
		.await
		.map_err(|e| ApiError::new(EntityKind::Review, issue_id(repo, pr.number), "list", e))?;
	if reviews.is_empty() {
		publish_status(
			api,
			repo,
			sha,
			REVIEW_CONTEXT,
			StatusState::Pending,
			"Pending - Reviews requested but none provided",
		)
		.await
	} else {
		publish_status(
			api,
			repo,
			sha,
			REVIEW_CONTEXT,
			StatusState::Success,
			"OK - Review requested and at least one provided",
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::test_support::{pull_request, pull_request_event};
	use crate::testing::{Call, MockGithubApi};
	use prbot_server_github_app::{NewStatus, RequestedReviewers, Review, User};

	const LABEL: &str = "review requested";

	fn policy() -> RepoPolicy {
		RepoPolicy {
			review_requested_label: Some(LABEL.to_string()),
			..RepoPolicy::default()
		}
	}

	fn published(api: &MockGithubApi) -> Vec<NewStatus> {
		api.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::CreateStatus { status, .. } => Some(status),
				_ => None,
			})
			.collect()
	}

	#[tokio::test]
	async fn test_review_requested_adds_label_and_sets_pending() {
		let api = MockGithubApi::new().with_pull_request(pull_request(5, "feed", &[]));
		ReviewRequestLabel
			.handle(
				&pull_request_event("review_requested", 5, "feed", &[]),
				&api,
				&policy(),
			)
			.await
			.unwrap();

		assert!(api.issue(5).unwrap().has_label(LABEL));
		let statuses = published(&api);
		assert_eq!(statuses.len(), 1);
		assert_eq!(statuses[0].context, REVIEW_CONTEXT);
		assert_eq!(statuses[0].state, StatusState::Pending);
		assert_eq!(
			statuses[0].description,
			"Pending - Reviews requested but none provided"
		);
	}

	#[tokio::test]
	async fn test_review_requested_twice_adds_label_once() {
		let api = MockGithubApi::new().with_pull_request(pull_request(5, "feed", &[]));
		let event = pull_request_event("review_requested", 5, "feed", &[]);
		ReviewRequestLabel.handle(&event, &api, &policy()).await.unwrap();
		ReviewRequestLabel.handle(&event, &api, &policy()).await.unwrap();

		let adds = api
			.calls()
			.into_iter()
			.filter(|c| matches!(c, Call::AddLabels { .. }))
			.count();
		assert_eq!(adds, 1);
	}

	#[tokio::test]
	async fn test_action_matches_case_insensitively() {
		let api = MockGithubApi::new().with_pull_request(pull_request(5, "feed", &[]));
		ReviewRequestLabel
			.handle(
				&pull_request_event("Review_Requested", 5, "feed", &[]),
				&api,
				&policy(),
			)
			.await
			.unwrap();

		assert!(api.issue(5).unwrap().has_label(LABEL));
	}

	#[tokio::test]
	async fn test_removal_keeps_label_while_reviewers_remain() {
		let api = MockGithubApi::new()
			.with_pull_request(pull_request(5, "feed", &[LABEL]))
			.with_requested_reviewers(
				5,
				RequestedReviewers {
					users: vec![User {
						login: "hubot".to_string(),
					}],
					teams: vec![],
				},
			);
		ReviewRequestLabel
			.handle(
				&pull_request_event("review_request_removed", 5, "feed", &[LABEL]),
				&api,
				&policy(),
			)
			.await
			.unwrap();

		assert!(!api
			.calls()
			.iter()
			.any(|c| matches!(c, Call::RemoveLabel { .. })));
		assert!(api.issue(5).unwrap().has_label(LABEL));
	}

	#[tokio::test]
	async fn test_removal_of_last_reviewer_drops_label() {
		let api = MockGithubApi::new().with_pull_request(pull_request(5, "feed", &[LABEL]));
		ReviewRequestLabel
			.handle(
				&pull_request_event("review_request_removed", 5, "feed", &[LABEL]),
				&api,
				&policy(),
			)
			.await
			.unwrap();

		assert!(!api.issue(5).unwrap().has_label(LABEL));
		let statuses = published(&api);
		assert_eq!(statuses[0].state, StatusState::Success);
		assert_eq!(statuses[0].description, "OK - No review requested");
	}

	#[tokio::test]
	async fn test_labelled_with_review_reports_success() {
		let api = MockGithubApi::new()
			.with_pull_request(pull_request(5, "feed", &[LABEL]))
			.with_reviews(
				5,
				vec![Review {
					id: 1,
					state: "COMMENTED".to_string(),
					user: None,
				}],
			);
		ReviewRequestLabel
			.handle(
				&pull_request_event("synchronize", 5, "feed", &[LABEL]),
				&api,
				&policy(),
			)
			.await
			.unwrap();

		let statuses = published(&api);
		assert_eq!(statuses[0].state, StatusState::Success);
		assert_eq!(
			statuses[0].description,
			"OK - Review requested and at least one provided"
		);
		assert!(api
			.calls()
			.iter()
			.any(|c| matches!(c, Call::CreateStatus { sha, .. } if sha == "feed")));
	}

	#[tokio::test]
	async fn test_without_label_configured_does_nothing() {
		let api = MockGithubApi::new().with_pull_request(pull_request(5, "feed", &[]));
		ReviewRequestLabel
			.handle(
				&pull_request_event("review_requested", 5, "feed", &[]),
				&api,
				&RepoPolicy::default(),
			)
			.await
			.unwrap();
		assert!(api.calls().is_empty());
	}
}
