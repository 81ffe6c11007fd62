// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory GitHub and board doubles that record every call.
//!
//! State is mutated by the calls, so a second handler invocation sees what
//! the first one did. One repository is assumed; the `repo` argument is
//! ignored.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prbot_common_secret::SecretString;
use prbot_server_github_app::{
	BoardApi, BoardClientFactory, ClientFactory, CombinedStatus, Comment, Commit, GithubApi,
	GithubAppError, Issue, Label, MergeResult, NewStatus, PullRequest, RepoRef,
	RequestedReviewers, Review, StatusState, User,
};

/// A recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	GetIssue { number: u64 },
	GetPullRequest { number: u64 },
	AddLabels { number: u64, labels: Vec<String> },
	RemoveLabel { number: u64, label: String },
	ListComments { number: u64 },
	CreateComment { number: u64, body: String },
	DeleteComment { comment_id: u64 },
	ListReviews { number: u64 },
	DismissReview { number: u64, review_id: u64, message: String },
	ListRequestedReviewers { number: u64 },
	RequestReviewers { number: u64, reviewers: Vec<String> },
	CombinedStatus { reference: String },
	RequiredStatusContexts { branch: String },
	CreateStatus { sha: String, status: NewStatus },
	MergePullRequest { number: u64, sha: String },
	SearchIssues { query: String },
	ListPullRequestCommits { number: u64 },
}

impl Call {
	/// Operation name accepted by [`MockGithubApi::fail_on`].
	pub fn operation(&self) -> &'static str {
		match self {
			Call::GetIssue { .. } => "get_issue",
			Call::GetPullRequest { .. } => "get_pull_request",
			Call::AddLabels { .. } => "add_labels",
			Call::RemoveLabel { .. } => "remove_label",
			Call::ListComments { .. } => "list_comments",
			Call::CreateComment { .. } => "create_comment",
			Call::DeleteComment { .. } => "delete_comment",
			Call::ListReviews { .. } => "list_reviews",
			Call::DismissReview { .. } => "dismiss_review",
			Call::ListRequestedReviewers { .. } => "list_requested_reviewers",
			Call::RequestReviewers { .. } => "request_reviewers",
			Call::CombinedStatus { .. } => "combined_status",
			Call::RequiredStatusContexts { .. } => "required_status_contexts",
			Call::CreateStatus { .. } => "create_status",
			Call::MergePullRequest { .. } => "merge_pull_request",
			Call::SearchIssues { .. } => "search_issues",
			Call::ListPullRequestCommits { .. } => "list_pull_request_commits",
		}
	}

	pub fn is_mutation(&self) -> bool {
		matches!(
			self,
			Call::AddLabels { .. }
				| Call::RemoveLabel { .. }
				| Call::CreateComment { .. }
				| Call::DeleteComment { .. }
				| Call::DismissReview { .. }
				| Call::RequestReviewers { .. }
				| Call::CreateStatus { .. }
				| Call::MergePullRequest { .. }
		)
	}
}

#[derive(Default)]
struct State {
	issues: HashMap<u64, Issue>,
	pulls: HashMap<u64, PullRequest>,
	comments: HashMap<u64, Vec<Comment>>,
	next_comment_id: u64,
	reviews: HashMap<u64, Vec<Review>>,
	requested: HashMap<u64, RequestedReviewers>,
	combined: HashMap<String, CombinedStatus>,
	required_contexts: Option<Vec<String>>,
	search_results: Vec<Issue>,
	commits: HashMap<u64, Vec<Commit>>,
	failing: HashSet<&'static str>,
	calls: Vec<Call>,
}

/// Spy implementation of [`GithubApi`].
pub struct MockGithubApi {
	state: Mutex<State>,
}

impl Default for MockGithubApi {
	fn default() -> Self {
		Self::new()
	}
}

impl MockGithubApi {
	/// Empty state; branches are unprotected.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(State {
				next_comment_id: 1000,
				..State::default()
			}),
		}
	}

	fn with_state(self, f: impl FnOnce(&mut State)) -> Self {
		f(&mut self.state.lock().unwrap());
		self
	}

	pub fn with_issue(self, issue: Issue) -> Self {
		self.with_state(|s| {
			s.issues.insert(issue.number, issue);
		})
	}

	/// Also registers the matching issue, as GitHub exposes every pull request
	/// through the issues API.
	pub fn with_pull_request(self, pr: PullRequest) -> Self {
		self.with_state(|s| {
			s.issues.insert(pr.number, issue_for(&pr));
			s.pulls.insert(pr.number, pr);
		})
	}

	pub fn with_comments(self, number: u64, bodies: &[&str]) -> Self {
		self.with_state(|s| {
			for body in bodies {
				let id = s.next_comment_id;
				s.next_comment_id += 1;
				s.comments.entry(number).or_default().push(Comment {
					id,
					body: body.to_string(),
					user: Some(User {
						login: "prbot[bot]".to_string(),
					}),
				});
			}
		})
	}

	pub fn with_reviews(self, number: u64, reviews: Vec<Review>) -> Self {
		self.with_state(|s| {
			s.reviews.insert(number, reviews);
		})
	}

	pub fn with_requested_reviewers(self, number: u64, reviewers: RequestedReviewers) -> Self {
		self.with_state(|s| {
			s.requested.insert(number, reviewers);
		})
	}

	pub fn with_combined_status(self, status: CombinedStatus) -> Self {
		self.with_state(|s| {
			s.combined.insert(status.sha.clone(), status);
		})
	}

	/// `None` makes the branch unprotected (404).
	pub fn with_required_contexts(self, contexts: Option<Vec<String>>) -> Self {
		self.with_state(|s| s.required_contexts = contexts)
	}

	pub fn with_search_results(self, results: Vec<Issue>) -> Self {
		self.with_state(|s| s.search_results = results)
	}

	pub fn with_commits(self, number: u64, messages: &[&str]) -> Self {
		self.with_state(|s| {
			let commits = messages
				.iter()
				.enumerate()
				.map(|(i, message)| Commit {
					sha: format!("{number}c{i}"),
					commit: prbot_server_github_app::CommitDetail {
						message: message.to_string(),
					},
				})
				.collect();
			s.commits.insert(number, commits);
		})
	}

	/// Make every call of `operation` fail with a 502.
	pub fn fail_on(self, operation: &'static str) -> Self {
		self.with_state(|s| {
			s.failing.insert(operation);
		})
	}

	pub fn calls(&self) -> Vec<Call> {
		self.state.lock().unwrap().calls.clone()
	}

	pub fn mutations(&self) -> Vec<Call> {
		self.calls().into_iter().filter(Call::is_mutation).collect()
	}

	pub fn issue(&self, number: u64) -> Option<Issue> {
		self.state.lock().unwrap().issues.get(&number).cloned()
	}

	pub fn comments_on(&self, number: u64) -> Vec<Comment> {
		self.state
			.lock()
			.unwrap()
			.comments
			.get(&number)
			.cloned()
			.unwrap_or_default()
	}

	fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>, GithubAppError> {
		let mut state = self.state.lock().unwrap();
		let operation = call.operation();
		state.calls.push(call);
		if state.failing.contains(operation) {
			return Err(GithubAppError::ApiError {
				status: 502,
				message: format!("{operation} failed"),
			});
		}
		Ok(state)
	}
}

fn issue_for(pr: &PullRequest) -> Issue {
	Issue {
		number: pr.number,
		title: pr.title.clone(),
		state: pr.state.clone(),
		labels: pr.labels.clone(),
		html_url: pr.html_url.clone(),
		pull_request: Some(serde_json::json!({ "url": pr.html_url })),
	}
}

fn not_found(what: impl Into<String>) -> GithubAppError {
	GithubAppError::NotFound(what.into())
}

#[async_trait]
impl GithubApi for MockGithubApi {
	async fn get_issue(&self, _repo: &RepoRef, number: u64) -> Result<Issue, GithubAppError> {
		let state = self.record(Call::GetIssue { number })?;
		state
			.issues
			.get(&number)
			.cloned()
			.ok_or_else(|| not_found(format!("issue {number}")))
	}

	async fn get_pull_request(
		&self,
		_repo: &RepoRef,
		number: u64,
	) -> Result<PullRequest, GithubAppError> {
		let state = self.record(Call::GetPullRequest { number })?;
		let mut pr = state
			.pulls
			.get(&number)
			.cloned()
			.ok_or_else(|| not_found(format!("pull request {number}")))?;
		if let Some(issue) = state.issues.get(&number) {
			pr.labels = issue.labels.clone();
		}
		Ok(pr)
	}

	async fn add_labels(
		&self,
		_repo: &RepoRef,
		number: u64,
		labels: &[String],
	) -> Result<(), GithubAppError> {
		let mut state = self.record(Call::AddLabels {
			number,
			labels: labels.to_vec(),
		})?;
		let issue = state.issues.entry(number).or_insert_with(|| Issue {
			number,
			..Issue::default()
		});
		for label in labels {
			if !issue.has_label(label) {
				issue.labels.push(Label {
					name: label.clone(),
				});
			}
		}
		Ok(())
	}

	async fn remove_label(
		&self,
		_repo: &RepoRef,
		number: u64,
		label: &str,
	) -> Result<(), GithubAppError> {
		let mut state = self.record(Call::RemoveLabel {
			number,
			label: label.to_string(),
		})?;
		if let Some(issue) = state.issues.get_mut(&number) {
			issue.labels.retain(|l| l.name != label);
		}
		Ok(())
	}

	async fn list_comments(
		&self,
		_repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Comment>, GithubAppError> {
		let state = self.record(Call::ListComments { number })?;
		Ok(state.comments.get(&number).cloned().unwrap_or_default())
	}

	async fn create_comment(
		&self,
		_repo: &RepoRef,
		number: u64,
		body: &str,
	) -> Result<Comment, GithubAppError> {
		let mut state = self.record(Call::CreateComment {
			number,
			body: body.to_string(),
		})?;
		let id = state.next_comment_id;
		state.next_comment_id += 1;
		let comment = Comment {
			id,
			body: body.to_string(),
			user: Some(User {
				login: "prbot[bot]".to_string(),
			}),
		};
		state.comments.entry(number).or_default().push(comment.clone());
		Ok(comment)
	}

	async fn delete_comment(&self, _repo: &RepoRef, comment_id: u64) -> Result<(), GithubAppError> {
		let mut state = self.record(Call::DeleteComment { comment_id })?;
		for comments in state.comments.values_mut() {
			comments.retain(|c| c.id != comment_id);
		}
		Ok(())
	}

	async fn list_reviews(
		&self,
		_repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Review>, GithubAppError> {
		let state = self.record(Call::ListReviews { number })?;
		Ok(state.reviews.get(&number).cloned().unwrap_or_default())
	}

	async fn dismiss_review(
		&self,
		_repo: &RepoRef,
		number: u64,
		review_id: u64,
		message: &str,
	) -> Result<(), GithubAppError> {
		let mut state = self.record(Call::DismissReview {
			number,
			review_id,
			message: message.to_string(),
		})?;
		if let Some(review) = state
			.reviews
			.get_mut(&number)
			.and_then(|reviews| reviews.iter_mut().find(|r| r.id == review_id))
		{
			review.state = "DISMISSED".to_string();
		}
		Ok(())
	}

	async fn list_requested_reviewers(
		&self,
		_repo: &RepoRef,
		number: u64,
	) -> Result<RequestedReviewers, GithubAppError> {
		let state = self.record(Call::ListRequestedReviewers { number })?;
		Ok(state.requested.get(&number).cloned().unwrap_or_default())
	}

	async fn request_reviewers(
		&self,
		_repo: &RepoRef,
		number: u64,
		reviewers: &[String],
	) -> Result<(), GithubAppError> {
		let mut state = self.record(Call::RequestReviewers {
			number,
			reviewers: reviewers.to_vec(),
		})?;
		let requested = state.requested.entry(number).or_default();
		for login in reviewers {
			requested.users.push(User {
				login: login.clone(),
			});
		}
		Ok(())
	}

	async fn combined_status(
		&self,
		_repo: &RepoRef,
		reference: &str,
	) -> Result<CombinedStatus, GithubAppError> {
		let state = self.record(Call::CombinedStatus {
			reference: reference.to_string(),
		})?;
		Ok(state
			.combined
			.get(reference)
			.cloned()
			.unwrap_or_else(|| CombinedStatus {
				state: StatusState::Pending,
				sha: reference.to_string(),
				statuses: Vec::new(),
			}))
	}

	async fn required_status_contexts(
		&self,
		_repo: &RepoRef,
		branch: &str,
	) -> Result<Vec<String>, GithubAppError> {
		let state = self.record(Call::RequiredStatusContexts {
			branch: branch.to_string(),
		})?;
		state
			.required_contexts
			.clone()
			.ok_or_else(|| not_found("Branch not protected"))
	}

	async fn create_status(
		&self,
		_repo: &RepoRef,
		sha: &str,
		status: &NewStatus,
	) -> Result<(), GithubAppError> {
		self.record(Call::CreateStatus {
			sha: sha.to_string(),
			status: status.clone(),
		})?;
		Ok(())
	}

	async fn merge_pull_request(
		&self,
		_repo: &RepoRef,
		number: u64,
		sha: &str,
	) -> Result<MergeResult, GithubAppError> {
		let mut state = self.record(Call::MergePullRequest {
			number,
			sha: sha.to_string(),
		})?;
		if let Some(pr) = state.pulls.get_mut(&number) {
			pr.merged = true;
		}
		Ok(MergeResult {
			sha: Some(sha.to_string()),
			merged: true,
			message: "Pull Request successfully merged".to_string(),
		})
	}

	async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, GithubAppError> {
		let state = self.record(Call::SearchIssues {
			query: query.to_string(),
		})?;
		Ok(state.search_results.clone())
	}

	async fn list_pull_request_commits(
		&self,
		_repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Commit>, GithubAppError> {
		let state = self.record(Call::ListPullRequestCommits { number })?;
		Ok(state.commits.get(&number).cloned().unwrap_or_default())
	}
}

/// Hands out one shared [`MockGithubApi`] and records the installations asked
/// for.
pub struct MockClientFactory {
	api: Arc<MockGithubApi>,
	installations: Mutex<Vec<u64>>,
}

impl MockClientFactory {
	pub fn new(api: Arc<MockGithubApi>) -> Self {
		Self {
			api,
			installations: Mutex::new(Vec::new()),
		}
	}

	pub fn installations(&self) -> Vec<u64> {
		self.installations.lock().unwrap().clone()
	}
}

impl ClientFactory for MockClientFactory {
	fn for_installation(&self, installation_id: u64) -> Arc<dyn GithubApi> {
		self.installations.lock().unwrap().push(installation_id);
		self.api.clone()
	}
}

/// A recorded board move: `(repo_id, issue, pipeline_id)`.
pub type BoardMove = (u64, u64, String);

#[derive(Default)]
pub struct MockBoard {
	moves: Mutex<Vec<BoardMove>>,
	fail: bool,
}

impl MockBoard {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing() -> Self {
		Self {
			fail: true,
			..Self::default()
		}
	}

	pub fn moves(&self) -> Vec<BoardMove> {
		self.moves.lock().unwrap().clone()
	}
}

#[async_trait]
impl BoardApi for MockBoard {
	async fn move_issue(
		&self,
		repo_id: u64,
		issue: u64,
		pipeline_id: &str,
	) -> Result<(), GithubAppError> {
		self.moves
			.lock()
			.unwrap()
			.push((repo_id, issue, pipeline_id.to_string()));
		if self.fail {
			return Err(GithubAppError::ApiError {
				status: 500,
				message: "board unavailable".to_string(),
			});
		}
		Ok(())
	}
}

/// Returns the same [`MockBoard`] for every board configuration.
pub struct MockBoardFactory {
	board: Arc<MockBoard>,
}

impl MockBoardFactory {
	pub fn new(board: Arc<MockBoard>) -> Self {
		Self { board }
	}
}

impl BoardClientFactory for MockBoardFactory {
	fn for_board(&self, _base_url: &str, _token: &SecretString) -> Arc<dyn BoardApi> {
		self.board.clone()
	}
}
