// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The bot's built-in handlers and their registration order.

mod approved_label;
mod auto_merge;
mod board;
mod dismiss_reviews;
mod failed_status;
mod new_issue_labels;
mod remove_fixed;
mod review_request;
mod ui_review;
mod wip;

use std::sync::Arc;

use prbot_server_github_app::{
	BoardClientFactory, GithubApi, Issue, NewStatus, RepoRef, StatusState,
};
use tracing::debug;

use crate::deferred::DeferredActions;
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::Repository;
use crate::registry::HandlerRegistry;
use crate::text::has_equivalent_comment;

pub use approved_label::ApprovedLabel;
pub use auto_merge::AutoMerge;
pub use board::{extract_issue_references, BoardSync};
pub use dismiss_reviews::{DismissReviewsOnPush, DISMISS_MESSAGE};
pub use failed_status::{failure_message, FailedStatusComment};
pub use new_issue_labels::NewIssueLabels;
pub use remove_fixed::RemoveFixedStatusComments;
pub use review_request::{ReviewRequestLabel, REVIEW_CONTEXT};
pub use ui_review::UiReviewComment;
pub use wip::{WipStatus, WIP_CONTEXT};

/// Registry with every built-in handler.
///
/// Handlers are appended to each of their kinds in the order registered, so
/// this sequence fixes the dispatch order per kind.
pub fn default_registry(
	boards: Arc<dyn BoardClientFactory>,
	deferred: Arc<DeferredActions>,
) -> HandlerRegistry {
	HandlerRegistry::builder()
		.register(Arc::new(DismissReviewsOnPush))
		.register(Arc::new(ApprovedLabel))
		.register(Arc::new(ReviewRequestLabel))
		.register(Arc::new(WipStatus))
		.register(Arc::new(FailedStatusComment))
		.register(Arc::new(RemoveFixedStatusComments))
		.register(Arc::new(AutoMerge))
		.register(Arc::new(NewIssueLabels))
		.register(Arc::new(BoardSync::new(boards, deferred)))
		.register(Arc::new(UiReviewComment))
		.build()
}

pub(crate) fn issue_id(repo: &RepoRef, number: u64) -> String {
	format!("{repo}#{number}")
}

/// Open pull requests whose commits include `sha`.
pub(crate) async fn open_pull_requests_for_commit(
	api: &dyn GithubApi,
	repository: &Repository,
	sha: &str,
) -> Result<Vec<Issue>, HandlerError> {
	let query = format!("type:pr state:open repo:{} {}", repository.full_name, sha);
	let results = api
		.search_issues(&query)
		.await
		.map_err(|e| ApiError::new(EntityKind::Search, query.clone(), "search", e))?;
	Ok(results
		.into_iter()
		.filter(|issue| issue.pull_request.is_some())
		.collect())
}

/// Post `body` unless an equivalent comment is already there. Returns whether
/// a comment was created.
pub(crate) async fn comment_once(
	api: &dyn GithubApi,
	repo: &RepoRef,
	number: u64,
	body: &str,
) -> Result<bool, HandlerError> {
	let comments = api
		.list_comments(repo, number)
		.await
		.map_err(|e| ApiError::new(EntityKind::Comment, issue_id(repo, number), "list", e))?;
	if has_equivalent_comment(&comments, body) {
		debug!(pr = number, "equivalent comment exists");
		return Ok(false);
	}
	api.create_comment(repo, number, body)
		.await
		.map_err(|e| ApiError::new(EntityKind::Comment, issue_id(repo, number), "create", e))?;
	Ok(true)
}

pub(crate) async fn publish_status(
	api: &dyn GithubApi,
	repo: &RepoRef,
	sha: &str,
	context: &str,
	state: StatusState,
	description: impl Into<String>,
) -> Result<(), HandlerError> {
	let status = NewStatus {
		state,
		context: context.to_string(),
		description: description.into(),
		target_url: None,
	};
	api.create_status(repo, sha, &status)
		.await
		.map_err(|e| ApiError::new(EntityKind::Status, format!("{repo}@{sha}"), "create", e))?;
	debug!(context, state = %state, sha, "status published");
	Ok(())
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::EventKind;
	use crate::testing::MockBoardFactory;

	fn registry() -> HandlerRegistry {
		default_registry(
			Arc::new(MockBoardFactory::new(Arc::default())),
			Arc::new(DeferredActions::new()),
		)
	}

	fn names(registry: &HandlerRegistry, kind: EventKind) -> Vec<&'static str> {
		registry.handlers_for(kind).iter().map(|h| h.name()).collect()
	}

	#[test]
	fn test_registration_order() {
		let registry = registry();
		assert_eq!(
			names(&registry, EventKind::PullRequest),
			vec![
				"dismiss_reviews_on_push",
				"review_request_label",
				"wip_status",
				"auto_merge",
				"board_sync"
			]
		);
		assert_eq!(
			names(&registry, EventKind::PullRequestReview),
			vec!["approved_label", "review_request_label"]
		);
		assert_eq!(
			names(&registry, EventKind::Status),
			vec!["failed_status_comment", "remove_fixed_status_comments", "auto_merge"]
		);
		assert_eq!(
			names(&registry, EventKind::Issues),
			vec!["new_issue_labels", "board_sync"]
		);
		assert_eq!(names(&registry, EventKind::CheckRun), vec!["ui_review_comment"]);
	}
}
