// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::GithubApi;
use tracing::{debug, info, instrument};

use super::{comment_once, issue_id};
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

/// Applies the approved label when a review approves the pull request.
pub struct ApprovedLabel;

#[async_trait]
impl EventHandler for ApprovedLabel {
	fn name(&self) -> &'static str {
		"approved_label"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::PullRequestReview]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, PullRequestReview, self.event_kinds());
		if !event.review.state.eq_ignore_ascii_case("approved") {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let number = event.pull_request.number;
		let label = &policy.approved_label;

		let issue = api
			.get_issue(&repo, number)
			.await
			.map_err(|e| ApiError::new(EntityKind::Issue, issue_id(&repo, number), "get", e))?;
		if issue.has_label(label) {
			debug!(pr = number, label = %label, "already labelled");
			return Ok(());
		}

		let message = format!(
			"Pull request [approved]({}) by @{} - applying _{}_ label",
			event.review.html_url, event.review.user.login, label
		);
		comment_once(api, &repo, number, &message).await?;

		api.add_labels(&repo, number, std::slice::from_ref(label))
			.await
			.map_err(|e| ApiError::new(EntityKind::Label, issue_id(&repo, number), "add", e))?;
		info!(pr = number, label = %label, "approved label applied");
		Ok(())
	}
}
