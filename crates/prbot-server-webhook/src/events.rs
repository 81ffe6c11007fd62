// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Webhook event model.
//!
//! [`WebhookEvent`] is a closed sum over the event types prbot routes, plus
//! [`WebhookEvent::Unrouted`] for every other tag GitHub sends (`ping`,
//! `push`, `installation`, ...). The repository and installation of any
//! event are read through exhaustive matches in [`WebhookEvent::repository`]
//! and [`WebhookEvent::installation_id`].

use std::fmt;
use std::str::FromStr;

use prbot_server_github_app::{Issue, Label, PullRequest, RepoRef, StatusState, User};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Event-type tag carried in the `X-GitHub-Event` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
	PullRequest,
	PullRequestReview,
	Status,
	Issues,
	CheckRun,
	/// Any tag outside [`EventKind::ALL`]. No handler registers for it.
	Unrouted,
}

impl EventKind {
	pub const ALL: [EventKind; 5] = [
		EventKind::PullRequest,
		EventKind::PullRequestReview,
		EventKind::Status,
		EventKind::Issues,
		EventKind::CheckRun,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			EventKind::PullRequest => "pull_request",
			EventKind::PullRequestReview => "pull_request_review",
			EventKind::Status => "status",
			EventKind::Issues => "issues",
			EventKind::CheckRun => "check_run",
			EventKind::Unrouted => "unrouted",
		}
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EventKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		EventKind::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| s.to_string())
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Repository {
	pub id: u64,
	pub name: String,
	pub full_name: String,
	pub owner: User,
}

impl Repository {
	pub fn repo_ref(&self) -> RepoRef {
		RepoRef::new(self.owner.login.clone(), self.name.clone())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Installation {
	pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestEvent {
	pub action: String,
	pub number: u64,
	pub pull_request: PullRequest,
	#[serde(default)]
	pub requested_reviewer: Option<User>,
	#[serde(default)]
	pub label: Option<Label>,
	pub repository: Repository,
	#[serde(default)]
	pub installation: Option<Installation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewPayload {
	pub id: u64,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub html_url: String,
	pub user: User,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestReviewEvent {
	pub action: String,
	pub review: ReviewPayload,
	pub pull_request: PullRequest,
	pub repository: Repository,
	#[serde(default)]
	pub installation: Option<Installation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusEvent {
	pub sha: String,
	pub state: StatusState,
	pub context: String,
	#[serde(default)]
	pub target_url: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	pub repository: Repository,
	#[serde(default)]
	pub installation: Option<Installation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssuesEvent {
	pub action: String,
	pub issue: Issue,
	#[serde(default)]
	pub label: Option<Label>,
	pub repository: Repository,
	#[serde(default)]
	pub installation: Option<Installation>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckRunOutput {
	#[serde(default)]
	pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckRunPullRequest {
	pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckRun {
	pub head_sha: String,
	#[serde(default)]
	pub conclusion: Option<String>,
	#[serde(default)]
	pub output: CheckRunOutput,
	#[serde(default)]
	pub pull_requests: Vec<CheckRunPullRequest>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckRunEvent {
	pub action: String,
	pub check_run: CheckRun,
	pub repository: Repository,
	#[serde(default)]
	pub installation: Option<Installation>,
}

/// Payload of an event type prbot does not route. Only the fields common to
/// every GitHub event are kept. Each is `None` when absent or shaped
/// differently from the routed events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnroutedEvent {
	/// The `X-GitHub-Event` tag.
	#[serde(skip)]
	pub event_type: String,
	#[serde(default, deserialize_with = "lenient")]
	pub action: Option<String>,
	#[serde(default, deserialize_with = "lenient")]
	pub repository: Option<Repository>,
	#[serde(default, deserialize_with = "lenient")]
	pub installation: Option<Installation>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
	D: Deserializer<'de>,
	T: DeserializeOwned,
{
	let value = Option::<serde_json::Value>::deserialize(deserializer)?;
	Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Decoded webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
	PullRequest(PullRequestEvent),
	PullRequestReview(PullRequestReviewEvent),
	Status(StatusEvent),
	Issues(IssuesEvent),
	CheckRun(CheckRunEvent),
	Unrouted(UnroutedEvent),
}

impl WebhookEvent {
	/// Decode a delivery by its `X-GitHub-Event` tag. Tags outside
	/// [`EventKind::ALL`] decode leniently as [`WebhookEvent::Unrouted`]; the
	/// body still has to be a JSON object.
	pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
		match event_type.parse::<EventKind>() {
			Ok(kind) => Self::decode(kind, body),
			Err(_) => {
				let mut event: UnroutedEvent = serde_json::from_slice(body)?;
				event.event_type = event_type.to_string();
				Ok(WebhookEvent::Unrouted(event))
			}
		}
	}

	/// Decode `body` as the variant `kind` names.
	pub fn decode(kind: EventKind, body: &[u8]) -> Result<Self, serde_json::Error> {
		Ok(match kind {
			EventKind::PullRequest => WebhookEvent::PullRequest(serde_json::from_slice(body)?),
			EventKind::PullRequestReview => {
				WebhookEvent::PullRequestReview(serde_json::from_slice(body)?)
			}
			EventKind::Status => WebhookEvent::Status(serde_json::from_slice(body)?),
			EventKind::Issues => WebhookEvent::Issues(serde_json::from_slice(body)?),
			EventKind::CheckRun => WebhookEvent::CheckRun(serde_json::from_slice(body)?),
			EventKind::Unrouted => WebhookEvent::Unrouted(serde_json::from_slice(body)?),
		})
	}

	pub fn kind(&self) -> EventKind {
		match self {
			WebhookEvent::PullRequest(_) => EventKind::PullRequest,
			WebhookEvent::PullRequestReview(_) => EventKind::PullRequestReview,
			WebhookEvent::Status(_) => EventKind::Status,
			WebhookEvent::Issues(_) => EventKind::Issues,
			WebhookEvent::CheckRun(_) => EventKind::CheckRun,
			WebhookEvent::Unrouted(_) => EventKind::Unrouted,
		}
	}

	/// The tag the delivery arrived with.
	pub fn event_type(&self) -> &str {
		match self {
			WebhookEvent::Unrouted(e) => &e.event_type,
			other => other.kind().as_str(),
		}
	}

	/// Target repository. Routed kinds always carry one; unrouted events such
	/// as `installation` may not.
	pub fn repository(&self) -> Option<&Repository> {
		match self {
			WebhookEvent::PullRequest(e) => Some(&e.repository),
			WebhookEvent::PullRequestReview(e) => Some(&e.repository),
			WebhookEvent::Status(e) => Some(&e.repository),
			WebhookEvent::Issues(e) => Some(&e.repository),
			WebhookEvent::CheckRun(e) => Some(&e.repository),
			WebhookEvent::Unrouted(e) => e.repository.as_ref(),
		}
	}

	pub fn installation_id(&self) -> Option<u64> {
		let installation = match self {
			WebhookEvent::PullRequest(e) => e.installation,
			WebhookEvent::PullRequestReview(e) => e.installation,
			WebhookEvent::Status(e) => e.installation,
			WebhookEvent::Issues(e) => e.installation,
			WebhookEvent::CheckRun(e) => e.installation,
			WebhookEvent::Unrouted(e) => e.installation,
		};
		installation.map(|i| i.id)
	}

	/// Payload `action`. Status events carry none.
	pub fn action(&self) -> Option<&str> {
		match self {
			WebhookEvent::PullRequest(e) => Some(&e.action),
			WebhookEvent::PullRequestReview(e) => Some(&e.action),
			WebhookEvent::Issues(e) => Some(&e.action),
			WebhookEvent::CheckRun(e) => Some(&e.action),
			WebhookEvent::Unrouted(e) => e.action.as_deref(),
			WebhookEvent::Status(_) => None,
		}
	}
}

#[cfg(test)]
pub(crate) mod fixtures {
	use serde_json::{json, Value};

	pub fn repository() -> Value {
		json!({
			"id": 1296269,
			"name": "widgets",
			"full_name": "acme/widgets",
			"owner": { "login": "acme" }
		})
	}

	pub fn pull_request(number: u64, head_sha: &str, labels: &[&str]) -> Value {
		json!({
			"number": number,
			"title": "Add widget",
			"state": "open",
			"html_url": format!("https://github.com/acme/widgets/pull/{number}"),
			"head": { "sha": head_sha, "ref": "feature" },
			"base": { "sha": "base000", "ref": "main" },
			"labels": labels.iter().map(|l| json!({ "name": l })).collect::<Vec<_>>()
		})
	}

	pub fn pull_request_event(action: &str, installation_id: u64) -> Value {
		json!({
			"action": action,
			"number": 42,
			"pull_request": pull_request(42, "def456", &[]),
			"repository": repository(),
			"installation": { "id": installation_id }
		})
	}

	pub fn status_event(sha: &str, state: &str, installation_id: u64) -> Value {
		json!({
			"sha": sha,
			"state": state,
			"context": "ci/build",
			"target_url": "https://ci.example.com/builds/1",
			"repository": repository(),
			"installation": { "id": installation_id }
		})
	}
}
