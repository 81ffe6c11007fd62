// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The platform operations handlers are allowed to perform.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GithubAppError;
use crate::types::{
	CombinedStatus, Comment, Commit, Issue, MergeResult, NewStatus, PullRequest, RepoRef,
	RequestedReviewers, Review,
};

/// GitHub operations scoped to one installation.
#[async_trait]
pub trait GithubApi: Send + Sync {
	async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<Issue, GithubAppError>;

	async fn get_pull_request(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<PullRequest, GithubAppError>;

	async fn add_labels(
		&self,
		repo: &RepoRef,
		number: u64,
		labels: &[String],
	) -> Result<(), GithubAppError>;

	/// Removing a label the issue does not carry succeeds.
	async fn remove_label(
		&self,
		repo: &RepoRef,
		number: u64,
		label: &str,
	) -> Result<(), GithubAppError>;

	async fn list_comments(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Comment>, GithubAppError>;

	async fn create_comment(
		&self,
		repo: &RepoRef,
		number: u64,
		body: &str,
	) -> Result<Comment, GithubAppError>;

	async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<(), GithubAppError>;

	async fn list_reviews(&self, repo: &RepoRef, number: u64)
		-> Result<Vec<Review>, GithubAppError>;

	async fn dismiss_review(
		&self,
		repo: &RepoRef,
		number: u64,
		review_id: u64,
		message: &str,
	) -> Result<(), GithubAppError>;

	async fn list_requested_reviewers(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<RequestedReviewers, GithubAppError>;

	async fn request_reviewers(
		&self,
		repo: &RepoRef,
		number: u64,
		reviewers: &[String],
	) -> Result<(), GithubAppError>;

	async fn combined_status(
		&self,
		repo: &RepoRef,
		reference: &str,
	) -> Result<CombinedStatus, GithubAppError>;

	/// Contexts branch protection requires. An unprotected branch yields
	/// [`GithubAppError::NotFound`].
	async fn required_status_contexts(
		&self,
		repo: &RepoRef,
		branch: &str,
	) -> Result<Vec<String>, GithubAppError>;

	async fn create_status(
		&self,
		repo: &RepoRef,
		sha: &str,
		status: &NewStatus,
	) -> Result<(), GithubAppError>;

	/// Merge only if the head is still `sha`.
	async fn merge_pull_request(
		&self,
		repo: &RepoRef,
		number: u64,
		sha: &str,
	) -> Result<MergeResult, GithubAppError>;

	async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, GithubAppError>;

	async fn list_pull_request_commits(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Commit>, GithubAppError>;
}

/// Produces installation-scoped API clients.
pub trait ClientFactory: Send + Sync {
	fn for_installation(&self, installation_id: u64) -> Arc<dyn GithubApi>;
}
