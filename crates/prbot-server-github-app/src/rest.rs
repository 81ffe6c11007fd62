// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! [`GithubApi`] over the GitHub REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::api::{ClientFactory, GithubApi};
use crate::credentials::{InstallationCredential, InstallationCredentialProvider};
use crate::error::{map_github_error, GithubAppError};
use crate::types::{
	CombinedStatus, Comment, Commit, Issue, MergeResult, NewStatus, PullRequest, RepoRef,
	RequestedReviewers, Review, SearchResponse,
};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

/// Installation-scoped REST client. Every request acquires the installation
/// credential first; a 401 invalidates it and the request is sent once more
/// with a freshly minted one.
#[derive(Clone)]
pub struct RestGithubClient {
	http: Client,
	base_url: Arc<str>,
	installation_id: u64,
	credentials: Arc<InstallationCredentialProvider>,
}

impl RestGithubClient {
	pub fn installation_id(&self) -> u64 {
		self.installation_id
	}

	fn request(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<&Value>,
		credential: &InstallationCredential,
	) -> RequestBuilder {
		let mut builder = self
			.http
			.request(method, format!("{}{path}", self.base_url))
			.header(
				"Authorization",
				format!("token {}", credential.token.expose()),
			)
			.header("Accept", "application/vnd.github+json")
			.header("X-GitHub-Api-Version", "2022-11-28");
		if !query.is_empty() {
			builder = builder.query(query);
		}
		if let Some(body) = body {
			builder = builder.json(body);
		}
		builder
	}

	async fn send(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<&Value>,
	) -> Result<Response, GithubAppError> {
		let credential = self.credentials.acquire(self.installation_id).await?;
		let response = self
			.request(method.clone(), path, query, body, &credential)
			.send()
			.await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return Ok(response);
		}

		info!(
			installation_id = self.installation_id,
			"Got 401, refreshing installation token"
		);
		self.credentials.invalidate(self.installation_id).await;
		let credential = self.credentials.acquire(self.installation_id).await?;
		Ok(self
			.request(method, path, query, body, &credential)
			.send()
			.await?)
	}

	async fn execute(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<&Value>,
	) -> Result<Response, GithubAppError> {
		debug!(%method, path, "GitHub API request");
		let response = self.send(method, path, query, body).await?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}
		Ok(response)
	}

	async fn json<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, String)],
		body: Option<&Value>,
	) -> Result<T, GithubAppError> {
		let response = self.execute(method, path, query, body).await?;
		response.json().await.map_err(|e| {
			error!(path, error = %e, "Failed to parse GitHub response");
			GithubAppError::InvalidResponse(format!("JSON parse error: {e}"))
		})
	}

	/// Follow `page=` until a short page, capped at [`MAX_PAGES`].
	async fn paginate<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GithubAppError> {
		let mut items = Vec::new();
		for page in 1..=MAX_PAGES {
			let batch: Vec<T> = self
				.json(
					Method::GET,
					path,
					&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())],
					None,
				)
				.await?;
			let len = batch.len();
			items.extend(batch);
			if len < PER_PAGE {
				break;
			}
		}
		Ok(items)
	}
}

fn repo_path(repo: &RepoRef) -> String {
	format!("/repos/{}/{}", repo.owner, repo.name)
}

#[async_trait]
impl GithubApi for RestGithubClient {
	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<Issue, GithubAppError> {
		self.json(
			Method::GET,
			&format!("{}/issues/{number}", repo_path(repo)),
			&[],
			None,
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn get_pull_request(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<PullRequest, GithubAppError> {
		self.json(
			Method::GET,
			&format!("{}/pulls/{number}", repo_path(repo)),
			&[],
			None,
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn add_labels(
		&self,
		repo: &RepoRef,
		number: u64,
		labels: &[String],
	) -> Result<(), GithubAppError> {
		self.execute(
			Method::POST,
			&format!("{}/issues/{number}/labels", repo_path(repo)),
			&[],
			Some(&json!({ "labels": labels })),
		)
		.await?;
		Ok(())
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn remove_label(
		&self,
		repo: &RepoRef,
		number: u64,
		label: &str,
	) -> Result<(), GithubAppError> {
		let path = format!(
			"{}/issues/{number}/labels/{}",
			repo_path(repo),
			urlencoding::encode(label)
		);
		match self.execute(Method::DELETE, &path, &[], None).await {
			Ok(_) => Ok(()),
			Err(e) if e.is_not_found() => {
				debug!(label, "Label already absent");
				Ok(())
			}
			Err(e) => Err(e),
		}
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn list_comments(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Comment>, GithubAppError> {
		self.paginate(&format!("{}/issues/{number}/comments", repo_path(repo)))
			.await
	}

	#[instrument(skip(self, body), fields(installation_id = self.installation_id))]
	async fn create_comment(
		&self,
		repo: &RepoRef,
		number: u64,
		body: &str,
	) -> Result<Comment, GithubAppError> {
		self.json(
			Method::POST,
			&format!("{}/issues/{number}/comments", repo_path(repo)),
			&[],
			Some(&json!({ "body": body })),
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<(), GithubAppError> {
		self.execute(
			Method::DELETE,
			&format!("{}/issues/comments/{comment_id}", repo_path(repo)),
			&[],
			None,
		)
		.await?;
		Ok(())
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn list_reviews(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Review>, GithubAppError> {
		self.paginate(&format!("{}/pulls/{number}/reviews", repo_path(repo)))
			.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn dismiss_review(
		&self,
		repo: &RepoRef,
		number: u64,
		review_id: u64,
		message: &str,
	) -> Result<(), GithubAppError> {
		self.execute(
			Method::PUT,
			&format!(
				"{}/pulls/{number}/reviews/{review_id}/dismissals",
				repo_path(repo)
			),
			&[],
			Some(&json!({ "message": message })),
		)
		.await?;
		Ok(())
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn list_requested_reviewers(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<RequestedReviewers, GithubAppError> {
		self.json(
			Method::GET,
			&format!("{}/pulls/{number}/requested_reviewers", repo_path(repo)),
			&[],
			None,
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn request_reviewers(
		&self,
		repo: &RepoRef,
		number: u64,
		reviewers: &[String],
	) -> Result<(), GithubAppError> {
		self.execute(
			Method::POST,
			&format!("{}/pulls/{number}/requested_reviewers", repo_path(repo)),
			&[],
			Some(&json!({ "reviewers": reviewers })),
		)
		.await?;
		Ok(())
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn combined_status(
		&self,
		repo: &RepoRef,
		reference: &str,
	) -> Result<CombinedStatus, GithubAppError> {
		self.json(
			Method::GET,
			&format!("{}/commits/{reference}/status", repo_path(repo)),
			&[("per_page", PER_PAGE.to_string())],
			None,
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn required_status_contexts(
		&self,
		repo: &RepoRef,
		branch: &str,
	) -> Result<Vec<String>, GithubAppError> {
		self.json(
			Method::GET,
			&format!(
				"{}/branches/{branch}/protection/required_status_checks/contexts",
				repo_path(repo)
			),
			&[],
			None,
		)
		.await
	}

	#[instrument(skip(self, status), fields(installation_id = self.installation_id, context = %status.context))]
	async fn create_status(
		&self,
		repo: &RepoRef,
		sha: &str,
		status: &NewStatus,
	) -> Result<(), GithubAppError> {
		let body = serde_json::to_value(status)
			.map_err(|e| GithubAppError::InvalidResponse(format!("status encode error: {e}")))?;
		self.execute(
			Method::POST,
			&format!("{}/statuses/{sha}", repo_path(repo)),
			&[],
			Some(&body),
		)
		.await?;
		Ok(())
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn merge_pull_request(
		&self,
		repo: &RepoRef,
		number: u64,
		sha: &str,
	) -> Result<MergeResult, GithubAppError> {
		self.json(
			Method::PUT,
			&format!("{}/pulls/{number}/merge", repo_path(repo)),
			&[],
			Some(&json!({ "sha": sha })),
		)
		.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, GithubAppError> {
		let response: SearchResponse = self
			.json(
				Method::GET,
				"/search/issues",
				&[("q", query.to_string()), ("per_page", PER_PAGE.to_string())],
				None,
			)
			.await?;
		Ok(response.items)
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn list_pull_request_commits(
		&self,
		repo: &RepoRef,
		number: u64,
	) -> Result<Vec<Commit>, GithubAppError> {
		self.paginate(&format!("{}/pulls/{number}/commits", repo_path(repo)))
			.await
	}
}

/// Hands out [`RestGithubClient`]s that share one transport and one
/// credential cache.
pub struct InstallationClientFactory {
	http: Client,
	base_url: Arc<str>,
	credentials: Arc<InstallationCredentialProvider>,
}

impl InstallationClientFactory {
	pub fn new(
		http: Client,
		base_url: impl Into<String>,
		credentials: Arc<InstallationCredentialProvider>,
	) -> Self {
		let base_url: String = base_url.into();
		Self {
			http,
			base_url: Arc::from(base_url.trim_end_matches('/')),
			credentials,
		}
	}

	pub fn client(&self, installation_id: u64) -> RestGithubClient {
		RestGithubClient {
			http: self.http.clone(),
			base_url: self.base_url.clone(),
			installation_id,
			credentials: self.credentials.clone(),
		}
	}
}

impl ClientFactory for InstallationClientFactory {
	fn for_installation(&self, installation_id: u64) -> Arc<dyn GithubApi> {
		Arc::new(self.client(installation_id))
	}
}
