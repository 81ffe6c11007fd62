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

/// Labels newly opened issues with the configured triage labels.
pub struct NewIssueLabels;

#[async_trait]
impl EventHandler for NewIssueLabels {
	fn name(&self) -> &'static str {
		"new_issue_labels"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::Issues]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, Issues, self.event_kinds());
		if policy.new_issue_labels.is_empty() || !event.action.eq_ignore_ascii_case("opened") {
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let number = event.issue.number;
		let current = api
			.get_issue(&repo, number)
			.await
			.map_err(|e| ApiError::new(EntityKind::Issue, issue_id(&repo, number), "get", e))?;

		let missing: Vec<String> = policy
			.new_issue_labels
			.iter()
			.filter(|label| !current.has_label(label))
			.cloned()
			.collect();
		if missing.is_empty() {
			debug!(issue = number, "issue already carries triage labels");
			return Ok(());
		}

		api.add_labels(&repo, number, &missing)
			.await
			.map_err(|e| ApiError::new(EntityKind::Label, issue_id(&repo, number), "add", e))?;
		debug!(issue = number, labels = ?missing, "triage labels added");
		Ok(())
	}
}
