// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::{GithubApi, Issue, RepoRef, StatusState};
use tracing::{debug, info, instrument};

use super::{issue_id, open_pull_requests_for_commit};
use crate::eligibility::is_eligible;
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, Repository, WebhookEvent};
use crate::registry::EventHandler;

const KINDS: &[EventKind] = &[EventKind::PullRequest, EventKind::Status];

/// Merges approved pull requests once their checks pass.
pub struct AutoMerge;

#[async_trait]
impl EventHandler for AutoMerge {
	fn name(&self) -> &'static str {
		"auto_merge"
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
		match event {
			WebhookEvent::PullRequest(event) => {
				if !event.action.eq_ignore_ascii_case("labeled") {
					return Ok(());
				}
				let repo = event.repository.repo_ref();
				let number = event.pull_request.number;
				let issue = api.get_issue(&repo, number).await.map_err(|e| {
					ApiError::new(EntityKind::Issue, issue_id(&repo, number), "get", e)
				})?;
				merge_if_ready(api, &repo, &issue, None, &policy.approved_label).await
			}
			WebhookEvent::Status(event) => {
				if event.state != StatusState::Success {
					return Ok(());
				}
				merge_for_commit(api, &event.repository, &event.sha, &policy.approved_label).await
			}
			other => Err(HandlerError::UnexpectedEvent {
				expected: KINDS,
				actual: other.kind(),
			}),
		}
	}
}

async fn merge_for_commit(
	api: &dyn GithubApi,
	repository: &Repository,
	sha: &str,
	approved_label: &str,
) -> Result<(), HandlerError> {
	let repo = repository.repo_ref();
	let pulls = open_pull_requests_for_commit(api, repository, sha).await?;

	let mut failures: Vec<HandlerError> = Vec::new();
	for issue in pulls.iter().filter(|i| i.has_label(approved_label)) {
		if let Err(e) = merge_if_ready(api, &repo, issue, Some(sha), approved_label).await {
			failures.push(e);
		}
	}
	HandlerError::from_failures(failures)
}

/// Merge the pull request behind `issue` when it is approved and its head
/// passes every gating status.
///
/// With `status_sha` set, only a pull request whose head is that commit is
/// merged.
async fn merge_if_ready(
	api: &dyn GithubApi,
	repo: &RepoRef,
	issue: &Issue,
	status_sha: Option<&str>,
	approved_label: &str,
) -> Result<(), HandlerError> {
	let number = issue.number;
	let id = issue_id(repo, number);
	if !issue.has_label(approved_label) {
		debug!(pr = number, "not approved");
		return Ok(());
	}

	let pr = api
		.get_pull_request(repo, number)
		.await
		.map_err(|e| ApiError::new(EntityKind::PullRequest, id.clone(), "get", e))?;
	let head = pr.head.sha.as_str();
	if let Some(sha) = status_sha {
		if sha != head {
			debug!(pr = number, status_sha = sha, head, "status is for a stale commit");
			return Ok(());
		}
	}

	let combined = api
		.combined_status(repo, head)
		.await
		.map_err(|e| ApiError::new(EntityKind::Status, format!("{repo}@{head}"), "get", e))?;

	let required = match api.required_status_contexts(repo, &pr.base.ref_name).await {
		Ok(contexts) => contexts,
		Err(e) if e.is_not_found() => Vec::new(),
		Err(e) => {
			return Err(ApiError::new(
				EntityKind::BranchProtection,
				format!("{repo}:{}", pr.base.ref_name),
				"get",
				e,
			)
			.into())
		}
	};

	if !is_eligible(&combined.statuses, &required) {
		debug!(pr = number, "checks not yet passing");
		return Ok(());
	}

	let result = api
		.merge_pull_request(repo, number, head)
		.await
		.map_err(|e| ApiError::new(EntityKind::PullRequest, id, "merge", e))?;
	info!(pr = number, sha = head, merged = result.merged, "pull request merged");
	Ok(())
}
