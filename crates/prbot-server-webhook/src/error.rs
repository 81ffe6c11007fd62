// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Webhook error taxonomy.
//!
//! [`SignatureError`] and [`ParseError`] end a request before dispatch.
//! [`HandlerError`]s are isolated per handler and collected into an
//! [`AggregateOutcome`] that keeps every constituent failure.

use std::fmt;

use prbot_server_github_app::GithubAppError;
use thiserror::Error;

use crate::events::EventKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("missing X-Hub-Signature-256 header")]
	Missing,

	#[error("webhook signature does not match payload")]
	Mismatch,
}

#[derive(Debug, Error)]
pub enum ParseError {
	#[error("missing X-GitHub-Event header")]
	MissingEventType,

	#[error("invalid {event_type} payload: {source}")]
	InvalidPayload {
		event_type: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Errors that stop a delivery before any handler runs.
#[derive(Debug, Error)]
pub enum WebhookError {
	#[error(transparent)]
	Signature(#[from] SignatureError),

	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("{event_type} event has handlers but no installation id")]
	MissingInstallation { event_type: EventKind },
}

/// Kind of platform entity an API call acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
	Issue,
	PullRequest,
	Comment,
	Review,
	Reviewers,
	Label,
	Status,
	Commit,
	Search,
	BranchProtection,
	BoardIssue,
}

impl EntityKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EntityKind::Issue => "issue",
			EntityKind::PullRequest => "pull_request",
			EntityKind::Comment => "comment",
			EntityKind::Review => "review",
			EntityKind::Reviewers => "reviewers",
			EntityKind::Label => "label",
			EntityKind::Status => "status",
			EntityKind::Commit => "commit",
			EntityKind::Search => "search",
			EntityKind::BranchProtection => "branch_protection",
			EntityKind::BoardIssue => "board_issue",
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A failed platform call with the entity and operation it concerned.
#[derive(Debug, Error)]
#[error("{operation} {entity} {id} failed: {source}")]
pub struct ApiError {
	pub entity: EntityKind,
	/// e.g. `acme/widgets#7`
	pub id: String,
	pub operation: &'static str,
	#[source]
	pub source: GithubAppError,
}

impl ApiError {
	pub fn new(
		entity: EntityKind,
		id: impl Into<String>,
		operation: &'static str,
		source: GithubAppError,
	) -> Self {
		Self {
			entity,
			id: id.into(),
			operation,
			source,
		}
	}
}

#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("handler for {expected:?} received a {actual} event")]
	UnexpectedEvent {
		expected: &'static [EventKind],
		actual: EventKind,
	},

	#[error(transparent)]
	Api(#[from] ApiError),

	#[error("invalid policy value for {field}: {message}")]
	InvalidPolicy { field: &'static str, message: String },

	/// Several independent operations failed within one handler.
	#[error("{} operations failed", .0.len())]
	Multiple(Vec<HandlerError>),
}

impl HandlerError {
	/// Collapse a list of failures; `Ok` when empty.
	pub fn from_failures(mut failures: Vec<HandlerError>) -> Result<(), HandlerError> {
		match failures.len() {
			0 => Ok(()),
			1 => Err(failures.remove(0)),
			_ => Err(HandlerError::Multiple(failures)),
		}
	}

	fn flatten_into(self, out: &mut Vec<HandlerError>) {
		match self {
			HandlerError::Multiple(errors) => {
				for error in errors {
					error.flatten_into(out);
				}
			}
			other => out.push(other),
		}
	}
}

/// One handler's failure within a dispatch.
#[derive(Debug)]
pub struct HandlerFailure {
	pub handler: &'static str,
	pub error: HandlerError,
}

impl fmt::Display for HandlerFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.handler, self.error)
	}
}

/// Every failure from one dispatch, in handler order. Empty means success.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
	failures: Vec<HandlerFailure>,
}

impl AggregateOutcome {
	pub fn success() -> Self {
		Self::default()
	}

	/// Record a handler's failure. [`HandlerError::Multiple`] is split so
	/// each constituent is its own record.
	pub fn record(&mut self, handler: &'static str, error: HandlerError) {
		let mut errors = Vec::new();
		error.flatten_into(&mut errors);
		self.failures.extend(
			errors
				.into_iter()
				.map(|error| HandlerFailure { handler, error }),
		);
	}

	pub fn is_success(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn failures(&self) -> &[HandlerFailure] {
		&self.failures
	}

	pub fn into_failures(self) -> Vec<HandlerFailure> {
		self.failures
	}
}

impl fmt::Display for AggregateOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.failures.is_empty() {
			return f.write_str("all handlers succeeded");
		}
		write!(f, "{} handler failure(s)", self.failures.len())?;
		for failure in &self.failures {
			write!(f, "; {failure}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn api_failure(id: &str) -> HandlerError {
		HandlerError::Api(ApiError::new(
			EntityKind::Review,
			id,
			"dismiss",
			GithubAppError::Timeout,
		))
	}

	#[test]
	fn test_empty_outcome_is_success() {
		let outcome = AggregateOutcome::success();
		assert!(outcome.is_success());
		assert_eq!(outcome.to_string(), "all handlers succeeded");
	}

	#[test]
	fn test_every_failure_is_kept() {
		let mut outcome = AggregateOutcome::success();
		outcome.record("first", api_failure("acme/widgets#1"));
		outcome.record(
			"second",
			HandlerError::InvalidPolicy {
				field: "wip_patterns",
				message: "bad".to_string(),
			},
		);

		assert!(!outcome.is_success());
		let display = outcome.to_string();
		assert!(display.contains("2 handler failure(s)"));
		assert!(display.contains("first: dismiss review acme/widgets#1 failed"));
		assert!(display.contains("second: invalid policy value for wip_patterns"));
	}

	#[test]
	fn test_multiple_is_split_into_records() {
		let mut outcome = AggregateOutcome::success();
		outcome.record(
			"dismiss",
			HandlerError::Multiple(vec![
				api_failure("acme/widgets#1"),
				HandlerError::Multiple(vec![api_failure("acme/widgets#2")]),
			]),
		);

		let failures = outcome.into_failures();
		assert_eq!(failures.len(), 2);
		assert!(failures.iter().all(|f| f.handler == "dismiss"));
	}

	#[test]
	fn test_from_failures() {
		assert!(HandlerError::from_failures(vec![]).is_ok());
		assert!(matches!(
			HandlerError::from_failures(vec![api_failure("x")]),
			Err(HandlerError::Api(_))
		));
		assert!(matches!(
			HandlerError::from_failures(vec![api_failure("x"), api_failure("y")]),
			Err(HandlerError::Multiple(v)) if v.len() == 2
		));
	}
}
