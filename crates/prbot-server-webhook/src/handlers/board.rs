// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use prbot_server_config::{BoardColumn, BoardConfig, RepoPolicy};
use prbot_server_github_app::{BoardApi, BoardClientFactory, GithubApi};
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::issue_id;
use crate::deferred::DeferredActions;
use crate::error::{ApiError, EntityKind, HandlerError};
use crate::events::{EventKind, IssuesEvent, PullRequestEvent, WebhookEvent};
use crate::registry::EventHandler;

const KINDS: &[EventKind] = &[EventKind::Issues, EventKind::PullRequest];

static ISSUE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?i)\b(?:fix(?:e[sd]|ing)?|close[sd]?|closing|resolve[sd]?|resolving)\b:?\s+(?:https?://\S+?/issues/|#)(\d+)",
	)
	.expect("valid issue reference regex")
});

/// Issue numbers a commit message says it fixes, closes or resolves, in order
/// of first mention.
pub fn extract_issue_references(message: &str) -> Vec<u64> {
	let mut numbers = Vec::new();
	for captures in ISSUE_REFERENCE.captures_iter(message) {
		if let Some(n) = captures.get(1).and_then(|m| m.as_str().parse().ok()) {
			if !numbers.contains(&n) {
				numbers.push(n);
			}
		}
	}
	numbers
}

/// `<event>_<action>` to the column issues move into.
type ColumnMap = HashMap<String, BoardColumn>;

fn column_map(columns: &[BoardColumn]) -> ColumnMap {
	let mut map = ColumnMap::new();
	for column in columns {
		for key in &column.events {
			map.entry(key.to_ascii_lowercase())
				.or_insert_with(|| column.clone());
		}
	}
	map
}

/// Moves issues across the ZenHub board as issues and the pull requests that
/// reference them change state.
pub struct BoardSync {
	boards: Arc<dyn BoardClientFactory>,
	deferred: Arc<DeferredActions>,
	/// Repository full name to its column map, built on first use.
	columns: Mutex<HashMap<String, Arc<ColumnMap>>>,
}

impl BoardSync {
	pub fn new(boards: Arc<dyn BoardClientFactory>, deferred: Arc<DeferredActions>) -> Self {
		Self {
			boards,
			deferred,
			columns: Mutex::new(HashMap::new()),
		}
	}

	async fn columns_for(&self, repository: &str, board: &BoardConfig) -> Arc<ColumnMap> {
		let mut cache = self.columns.lock().await;
		cache
			.entry(repository.to_string())
			.or_insert_with(|| {
				debug!(repository, columns = board.columns.len(), "building board column map");
				Arc::new(column_map(&board.columns))
			})
			.clone()
	}

	async fn sync_issue(
		&self,
		event: &IssuesEvent,
		board: &BoardConfig,
		client: &dyn BoardApi,
	) -> Result<(), HandlerError> {
		let key = format!("issues_{}", event.action.to_ascii_lowercase());
		let columns = self.columns_for(&event.repository.full_name, board).await;
		let Some(column) = columns.get(&key) else {
			debug!(key, "unmapped board event");
			return Ok(());
		};
		move_issue(client, board.repo_id, event.issue.number, column).await
	}

	async fn sync_pull_request(
		&self,
		event: &PullRequestEvent,
		api: &dyn GithubApi,
		board: &BoardConfig,
		client: Arc<dyn BoardApi>,
	) -> Result<(), HandlerError> {
		let key = format!("pull_request_{}", event.action.to_ascii_lowercase());
		let columns = self.columns_for(&event.repository.full_name, board).await;
		let column = columns.get(&key);
		let post_merge = board
			.post_merge_pipeline
			.as_deref()
			.filter(|_| event.action.eq_ignore_ascii_case("closed") && event.pull_request.merged);
		if column.is_none() && post_merge.is_none() {
			debug!(key, "unmapped board event");
			return Ok(());
		}

		let repo = event.repository.repo_ref();
		let number = event.pull_request.number;
		let commits = api
			.list_pull_request_commits(&repo, number)
			.await
			.map_err(|e| ApiError::new(EntityKind::Commit, issue_id(&repo, number), "list", e))?;
		let mut issues: Vec<u64> = Vec::new();
		for commit in &commits {
			for n in extract_issue_references(&commit.commit.message) {
				if !issues.contains(&n) {
					issues.push(n);
				}
			}
		}
		if issues.is_empty() {
			debug!(pr = number, "no referenced issues");
			return Ok(());
		}

		let mut failures: Vec<HandlerError> = Vec::new();
		if let Some(column) = column {
			for issue in &issues {
				if let Err(e) = move_issue(client.as_ref(), board.repo_id, *issue, column).await {
					failures.push(e);
				}
			}
		}

		if let Some(pipeline) = post_merge {
			let delay = Duration::from_secs(board.post_merge_delay_secs);
			let repo_id = board.repo_id;
			let pipeline = pipeline.to_string();
			info!(pr = number, issues = ?issues, delay_secs = delay.as_secs(), "scheduling post-merge board move");
			let scheduled = self
				.deferred
				.schedule("post_merge_board_move", delay, async move {
					for issue in issues {
						if let Err(e) = client.move_issue(repo_id, issue, &pipeline).await {
							warn!(repo_id, issue, error = %e, "deferred board move failed");
						}
					}
				})
				.await;
			if !scheduled {
				warn!(pr = number, "post-merge board move dropped during shutdown");
			}
		}

		HandlerError::from_failures(failures)
	}
}

async fn move_issue(
	client: &dyn BoardApi,
	repo_id: u64,
	issue: u64,
	column: &BoardColumn,
) -> Result<(), HandlerError> {
	client
		.move_issue(repo_id, issue, &column.id)
		.await
		.map_err(|e| ApiError::new(EntityKind::BoardIssue, format!("{repo_id}#{issue}"), "move", e))?;
	info!(issue, column = %column.name, "issue moved on board");
	Ok(())
}

#[async_trait]
impl EventHandler for BoardSync {
	fn name(&self) -> &'static str {
		"board_sync"
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
		if !KINDS.contains(&event.kind()) {
			return Err(HandlerError::UnexpectedEvent {
				expected: KINDS,
				actual: event.kind(),
			});
		}
		let Some(board) = policy.board.as_ref() else {
			return Ok(());
		};
		let client = self.boards.for_board(&board.base_url, &board.zenhub_token);

		match event {
			WebhookEvent::Issues(event) => self.sync_issue(event, board, client.as_ref()).await,
			WebhookEvent::PullRequest(event) => {
				self.sync_pull_request(event, api, board, client).await
			}
			_ => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::fixtures;
	use crate::handlers::test_support::decode;
	use crate::testing::{MockBoard, MockBoardFactory, MockGithubApi};
	use serde_json::json;

	fn column(name: &str, id: &str, events: &[&str]) -> BoardColumn {
		BoardColumn {
			name: name.to_string(),
			id: id.to_string(),
			events: events.iter().map(|e| e.to_string()).collect(),
		}
	}

	fn policy(post_merge: Option<&str>) -> RepoPolicy {
		RepoPolicy {
			board: Some(BoardConfig {
				repo_id: 1296269,
				zenhub_token: "zh-token".into(),
				base_url: "https://api.zenhub.io".to_string(),
				columns: vec![
					column("Backlog", "p-backlog", &["issues_opened", "issues_reopened"]),
					column("Review", "p-review", &["pull_request_opened"]),
					column("Done", "p-done", &["issues_closed"]),
				],
				post_merge_pipeline: post_merge.map(str::to_string),
				post_merge_delay_secs: 30,
			}),
			..RepoPolicy::default()
		}
	}

	fn handler(board: &Arc<MockBoard>, deferred: &Arc<DeferredActions>) -> BoardSync {
		BoardSync::new(
			Arc::new(MockBoardFactory::new(board.clone())),
			deferred.clone(),
		)
	}

	fn issues_event(action: &str, number: u64) -> WebhookEvent {
		decode(
			EventKind::Issues,
			json!({
				"action": action,
				"issue": { "number": number },
				"repository": fixtures::repository(),
				"installation": { "id": 42 }
			}),
		)
	}

	fn pull_request_event(action: &str, merged: bool) -> WebhookEvent {
		let mut pr = fixtures::pull_request(20, "aaa", &[]);
		pr["merged"] = json!(merged);
		decode(
			EventKind::PullRequest,
			json!({
				"action": action,
				"number": 20,
				"pull_request": pr,
				"repository": fixtures::repository(),
				"installation": { "id": 42 }
			}),
		)
	}

	#[test]
	fn test_extract_issue_references() {
		assert_eq!(
			extract_issue_references("Fixes #12 and closes #7\n\nResolved: #12"),
			vec![12, 7]
		);
		assert_eq!(
			extract_issue_references("fix https://github.com/acme/widgets/issues/99"),
			vec![99]
		);
		assert!(extract_issue_references("Prefix #3, see #4").is_empty());
	}

	#[test]
	fn test_first_column_wins_for_duplicate_event() {
		let map = column_map(&[
			column("A", "a", &["issues_opened"]),
			column("B", "b", &["issues_opened"]),
		]);
		assert_eq!(map["issues_opened"].id, "a");
	}

	#[tokio::test]
	async fn test_issue_event_moves_issue() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		handler(&board, &deferred)
			.handle(&issues_event("opened", 3), &MockGithubApi::new(), &policy(None))
			.await
			.unwrap();
		assert_eq!(board.moves(), vec![(1296269, 3, "p-backlog".to_string())]);
	}

	#[tokio::test]
	async fn test_event_keys_compare_case_insensitively() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		let mut policy = policy(None);
		if let Some(board) = policy.board.as_mut() {
			board.columns = vec![column("Backlog", "p-backlog", &["Issues_Opened"])];
		}

		handler(&board, &deferred)
			.handle(&issues_event("OPENED", 3), &MockGithubApi::new(), &policy)
			.await
			.unwrap();

		assert_eq!(board.moves(), vec![(1296269, 3, "p-backlog".to_string())]);
	}

	#[tokio::test]
	async fn test_unmapped_or_unconfigured_does_nothing() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		let sync = handler(&board, &deferred);
		sync.handle(&issues_event("labeled", 3), &MockGithubApi::new(), &policy(None))
			.await
			.unwrap();
		sync.handle(
			&issues_event("opened", 3),
			&MockGithubApi::new(),
			&RepoPolicy::default(),
		)
		.await
		.unwrap();
		assert!(board.moves().is_empty());
	}

	#[tokio::test]
	async fn test_pull_request_moves_referenced_issues() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		let api = MockGithubApi::new().with_commits(20, &["Fixes #5", "Closes #6, fixes #5", "tidy"]);

		handler(&board, &deferred)
			.handle(&pull_request_event("opened", false), &api, &policy(None))
			.await
			.unwrap();

		assert_eq!(
			board.moves(),
			vec![
				(1296269, 5, "p-review".to_string()),
				(1296269, 6, "p-review".to_string()),
			]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_merged_close_schedules_post_merge_move() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		let api = MockGithubApi::new().with_commits(20, &["Fixes #5"]);

		handler(&board, &deferred)
			.handle(&pull_request_event("closed", true), &api, &policy(Some("p-released")))
			.await
			.unwrap();

		assert!(board.moves().is_empty());
		assert_eq!(deferred.pending().await, 1);

		tokio::time::sleep(Duration::from_secs(31)).await;
		assert_eq!(board.moves(), vec![(1296269, 5, "p-released".to_string())]);
	}

	#[tokio::test]
	async fn test_unmerged_close_schedules_nothing() {
		let board = Arc::new(MockBoard::new());
		let deferred = Arc::new(DeferredActions::new());
		let api = MockGithubApi::new().with_commits(20, &["Fixes #5"]);

		handler(&board, &deferred)
			.handle(&pull_request_event("closed", false), &api, &policy(Some("p-released")))
			.await
			.unwrap();

		assert_eq!(deferred.pending().await, 0);
		assert!(api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_board_failure_is_reported() {
		let board = Arc::new(MockBoard::failing());
		let deferred = Arc::new(DeferredActions::new());
		let err = handler(&board, &deferred)
			.handle(&issues_event("closed", 3), &MockGithubApi::new(), &policy(None))
			.await
			.unwrap_err();
		assert!(matches!(err, HandlerError::Api(ref e) if e.entity == EntityKind::BoardIssue));
	}
}
