// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request and response types for the GitHub REST operations the bot uses.
//!
//! Only the fields prbot reads are modelled; serde ignores the rest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
	pub owner: String,
	pub name: String,
}

impl RepoRef {
	pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			name: name.into(),
		}
	}

	/// Split `owner/name`. Returns `None` without exactly one slash.
	pub fn parse(full_name: &str) -> Option<Self> {
		let (owner, name) = full_name.split_once('/')?;
		if owner.is_empty() || name.is_empty() || name.contains('/') {
			return None;
		}
		Some(Self::new(owner, name))
	}

	pub fn full_name(&self) -> String {
		format!("{}/{}", self.owner, self.name)
	}
}

impl fmt::Display for RepoRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.owner, self.name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
	pub name: String,
}

/// Issue or pull request as returned by the issues and search endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
	pub number: u64,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub labels: Vec<Label>,
	#[serde(default)]
	pub html_url: String,
	/// Present when the issue is a pull request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pull_request: Option<serde_json::Value>,
}

impl Issue {
	pub fn has_label(&self, name: &str) -> bool {
		self.labels.iter().any(|l| l.name == name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
	pub sha: String,
	#[serde(rename = "ref")]
	pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
	pub number: u64,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub merged: bool,
	#[serde(default)]
	pub html_url: String,
	pub head: BranchRef,
	pub base: BranchRef,
	#[serde(default)]
	pub labels: Vec<Label>,
}

impl PullRequest {
	pub fn has_label(&self, name: &str) -> bool {
		self.labels.iter().any(|l| l.name == name)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
	pub id: u64,
	#[serde(default)]
	pub body: String,
	#[serde(default)]
	pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
	pub id: u64,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
	pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedReviewers {
	#[serde(default)]
	pub users: Vec<User>,
	#[serde(default)]
	pub teams: Vec<Team>,
}

impl RequestedReviewers {
	pub fn is_empty(&self) -> bool {
		self.users.is_empty() && self.teams.is_empty()
	}
}

/// Commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
	Pending,
	Success,
	Failure,
	Error,
}

impl StatusState {
	pub fn as_str(&self) -> &'static str {
		match self {
			StatusState::Pending => "pending",
			StatusState::Success => "success",
			StatusState::Failure => "failure",
			StatusState::Error => "error",
		}
	}
}

impl fmt::Display for StatusState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One context's latest report within a combined status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitStatus {
	pub context: String,
	pub state: StatusState,
	#[serde(default)]
	pub target_url: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

/// Latest status per context for a ref.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedStatus {
	pub state: StatusState,
	#[serde(default)]
	pub sha: String,
	#[serde(default)]
	pub statuses: Vec<CommitStatus>,
}

/// Body for creating a commit status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStatus {
	pub state: StatusState,
	pub context: String,
	pub description: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
	#[serde(default)]
	pub sha: Option<String>,
	pub merged: bool,
	#[serde(default)]
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
	#[serde(default)]
	pub message: String,
}

/// Entry from the pull request commits listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
	pub sha: String,
	pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
	#[serde(default)]
	pub items: Vec<Issue>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_repo_ref_parse() {
		let repo = RepoRef::parse("acme/widgets").unwrap();
		assert_eq!(repo.owner, "acme");
		assert_eq!(repo.name, "widgets");
		assert_eq!(repo.to_string(), "acme/widgets");

		assert!(RepoRef::parse("widgets").is_none());
		assert!(RepoRef::parse("a/b/c").is_none());
		assert!(RepoRef::parse("/b").is_none());
	}

	#[test]
	fn test_pull_request_deserializes_ref_field() {
		let pr: PullRequest = serde_json::from_value(serde_json::json!({
			"number": 7,
			"head": { "sha": "abc123", "ref": "feature" },
			"base": { "sha": "def456", "ref": "main" },
			"labels": [{ "name": "approved" }],
			"user": { "login": "ignored" }
		}))
		.unwrap();
		assert_eq!(pr.head.ref_name, "feature");
		assert_eq!(pr.base.ref_name, "main");
		assert!(pr.has_label("approved"));
		assert!(!pr.merged);
	}

	#[test]
	fn test_new_status_omits_missing_target_url() {
		let status = NewStatus {
			state: StatusState::Pending,
			context: "prbot/wip".to_string(),
			description: "Pending".to_string(),
			target_url: None,
		};
		let json = serde_json::to_value(&status).unwrap();
		assert_eq!(json["state"], "pending");
		assert!(json.get("target_url").is_none());
	}
}
