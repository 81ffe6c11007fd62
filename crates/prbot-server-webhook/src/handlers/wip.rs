// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::{GithubApi, StatusState};
use regex::Regex;
use tracing::instrument;

use super::{issue_id, publish_status};
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

pub const WIP_CONTEXT: &str = "prbot/wip";

const HANDLED_ACTIONS: &[&str] = &[
	"opened",
	"reopened",
	"labeled",
	"unlabeled",
	"edited",
	"synchronize",
];

/// Holds a pending `prbot/wip` status while a pull request is marked as work
/// in progress by title or label.
pub struct WipStatus;

#[async_trait]
impl EventHandler for WipStatus {
	fn name(&self) -> &'static str {
		"wip_status"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::PullRequest]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, PullRequest, self.event_kinds());
		if !policy.wip_enabled() {
			return Ok(());
		}
		let action = event.action.to_ascii_lowercase();
		if !HANDLED_ACTIONS.contains(&action.as_str()) {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let pr = &event.pull_request;
		let sha = &pr.head.sha;

		if let Some(found) = title_match(&policy.wip_patterns, &pr.title)? {
			return publish_status(
				api,
				&repo,
				sha,
				WIP_CONTEXT,
				StatusState::Pending,
				format!("Pending - title marked as work in progress with '{found}'"),
			)
			.await;
		}

		if !policy.wip_labels.is_empty() {
			let issue = api
				.get_issue(&repo, pr.number)
				.await
				.map_err(|e| ApiError::new(EntityKind::Issue, issue_id(&repo, pr.number), "get", e))?;
			if let Some(label) = policy.wip_labels.iter().find(|l| issue.has_label(l)) {
				return publish_status(
					api,
					&repo,
					sha,
					WIP_CONTEXT,
					StatusState::Pending,
					format!("Pending - labelled as work in progress with '{label}'"),
				)
				.await;
			}
		}

		publish_status(
			api,
			&repo,
			sha,
			WIP_CONTEXT,
			StatusState::Success,
			"OK - this is not a work in progress",
		)
		.await
	}
}

/// First title fragment matched by any pattern, as a whole word, ignoring
/// case.
fn title_match(patterns: &[String], title: &str) -> Result<Option<String>, HandlerError> {
	for pattern in patterns {
		let re = Regex::new(&format!(r"(?i)\b(?:{pattern})\b")).map_err(|e| {
			HandlerError::InvalidPolicy {
				field: "wip_patterns",
				message: e.to_string(),
			}
		})?;
		if let Some(found) = re.find(title) {
			return Ok(Some(found.as_str().to_string()));
		}
	}
	Ok(None)
}
