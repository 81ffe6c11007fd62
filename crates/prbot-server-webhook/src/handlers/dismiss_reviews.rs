// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::GithubApi;
use tracing::{debug, instrument};

use super::issue_id;
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

pub const DISMISS_MESSAGE: &str = "Code changed after review";

/// Review states GitHub lets an app dismiss. Comment-only and already
/// dismissed reviews are rejected with 422.
const DISMISSIBLE_STATES: [&str; 2] = ["APPROVED", "CHANGES_REQUESTED"];

fn is_dismissible(state: &str) -> bool {
	DISMISSIBLE_STATES
		.iter()
		.any(|dismissible| state.eq_ignore_ascii_case(dismissible))
}

/// Dismisses every approving or change-requesting review when new commits
/// are pushed to a pull request.
pub struct DismissReviewsOnPush;

#[async_trait]
impl EventHandler for DismissReviewsOnPush {
	fn name(&self) -> &'static str {
		"dismiss_reviews_on_push"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::PullRequest]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		_policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, PullRequest, self.event_kinds());
		if !event.action.eq_ignore_ascii_case("synchronize") {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let number = event.pull_request.number;
		let reviews = api
			.list_reviews(&repo, number)
			.await
			.map_err(|e| ApiError::new(EntityKind::Review, issue_id(&repo, number), "list", e))?;

		let mut failures: Vec<HandlerError> = Vec::new();
		for review in reviews {
			if !is_dismissible(&review.state) {
				debug!(review_id = review.id, state = %review.state, "review not dismissible, skipping");
				continue;
			}
			if let Err(e) = api
				.dismiss_review(&repo, number, review.id, DISMISS_MESSAGE)
				.await
			{
				failures.push(
					ApiError::new(
						EntityKind::Review,
						format!("{}/{}", issue_id(&repo, number), review.id),
						"dismiss",
						e,
					)
					.into(),
				);
			} else {
				debug!(review_id = review.id, pr = number, "review dismissed");
			}
		}

		HandlerError::from_failures(failures)
	}
}
