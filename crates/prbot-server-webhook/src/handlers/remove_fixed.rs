// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::{GithubApi, StatusState};
use tracing::{debug, instrument};

use super::failed_status::failure_prefix;
use super::{issue_id, open_pull_requests_for_commit};
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

/// Deletes earlier failure comments once the same check passes.
pub struct RemoveFixedStatusComments;

#[async_trait]
impl EventHandler for RemoveFixedStatusComments {
	fn name(&self) -> &'static str {
		"remove_fixed_status_comments"
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
		if event.state != StatusState::Success {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let prefix = failure_prefix(&event.context);
		let pulls = open_pull_requests_for_commit(api, &event.repository, &event.sha).await?;

		let mut failures: Vec<HandlerError> = Vec::new();
		for pr in pulls {
			let comments = match api.list_comments(&repo, pr.number).await {
				Ok(comments) => comments,
				Err(e) => {
					failures.push(
						ApiError::new(EntityKind::Comment, issue_id(&repo, pr.number), "list", e)
							.into(),
					);
					continue;
				}
			};

			for comment in comments.iter().filter(|c| c.body.contains(&prefix)) {
				match api.delete_comment(&repo, comment.id).await {
					Ok(()) => debug!(pr = pr.number, comment_id = comment.id, "fixed check comment deleted"),
					Err(e) => failures.push(
						ApiError::new(
							EntityKind::Comment,
							format!("{}/{}", issue_id(&repo, pr.number), comment.id),
							"delete",
							e,
						)
						.into(),
					),
				}
			}
		}
		HandlerError::from_failures(failures)
	}
}
