// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::LazyLock;

use async_trait::async_trait;
use prbot_server_config::RepoPolicy;
use prbot_server_github_app::GithubApi;
use regex::Regex;
use tracing::{debug, instrument};

use super::comment_once;
use crate::error::HandlerError;
use crate::events::{EventKind, WebhookEvent};
use crate::registry::{expect_event, EventHandler};

static UI_DOC_LINK: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[ui-doc\]\(\D+([0-9]+)").expect("valid ui-doc regex"));

/// CI build number from a check run summary's `[ui-doc](...)` link.
fn build_number(summary: &str) -> Option<&str> {
	UI_DOC_LINK
		.captures(summary)
		.and_then(|c| c.get(1))
		.map(|m| m.as_str())
}

fn review_url(build: &str, repo_id: u64) -> String {
	format!(
		"https://{build}-{repo_id}-gh.circle-artifacts.com/0/home/circleci/src/app/ui-react/doc/index.html"
	)
}

/// Links the rendered UI docs of a successful build on its pull request.
pub struct UiReviewComment;

#[async_trait]
impl EventHandler for UiReviewComment {
	fn name(&self) -> &'static str {
		"ui_review_comment"
	}

	fn event_kinds(&self) -> &'static [EventKind] {
		&[EventKind::CheckRun]
	}

	#[instrument(skip_all, fields(handler = self.name()))]
	async fn handle(
		&self,
		event: &WebhookEvent,
		api: &dyn GithubApi,
		policy: &RepoPolicy,
	) -> Result<(), HandlerError> {
		let event = expect_event!(event, CheckRun, self.event_kinds());
		if !policy.ui_review_comments {
			return Ok(());
		}
		let run = &event.check_run;
		if !run
			.conclusion
			.as_deref()
			.is_some_and(|c| c.eq_ignore_ascii_case("success"))
		{
			return Ok(());
		}
		let Some(pr) = run.pull_requests.first() else {
			return Ok(());
		};
		let Some(build) = run.output.summary.as_deref().and_then(build_number) else {
			debug!("no ui-doc link in check run summary");
			return Ok(());
		};

		let message = format!(
			"Please review UI for {} [here]({})",
			run.head_sha,
			review_url(build, event.repository.id)
		);
		comment_once(api, &event.repository.repo_ref(), pr.number, &message).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::fixtures;
	use crate::handlers::test_support::decode;
	use crate::testing::{Call, MockGithubApi};
	use serde_json::json;

	fn check_run(conclusion: &str, summary: &str, prs: &[u64]) -> WebhookEvent {
		decode(
			EventKind::CheckRun,
			json!({
				"action": "completed",
				"check_run": {
					"head_sha": "beef",
					"conclusion": conclusion,
					"output": { "summary": summary },
					"pull_requests": prs.iter().map(|n| json!({ "number": n })).collect::<Vec<_>>()
				},
				"repository": fixtures::repository(),
				"installation": { "id": 42 }
			}),
		)
	}

	fn enabled() -> RepoPolicy {
		RepoPolicy {
			ui_review_comments: true,
			..RepoPolicy::default()
		}
	}

	#[test]
	fn test_build_number_extraction() {
		assert_eq!(
			build_number("Docs: [ui-doc](https://circleci.com/gh/acme/widgets/4711)"),
			Some("4711")
		);
		assert_eq!(build_number("no link here"), None);
	}

	#[tokio::test]
	async fn test_posts_review_link_once() {
		let api = MockGithubApi::new();
		let event = check_run(
			"success",
			"[ui-doc](https://circleci.com/gh/acme/widgets/4711)",
			&[12],
		);

		UiReviewComment.handle(&event, &api, &enabled()).await.unwrap();
		UiReviewComment.handle(&event, &api, &enabled()).await.unwrap();

		assert_eq!(
			api.mutations(),
			vec![Call::CreateComment {
				number: 12,
				body: "Please review UI for beef [here](https://4711-1296269-gh.circle-artifacts.com/0/home/circleci/src/app/ui-react/doc/index.html)".to_string(),
			}]
		);
	}

	#[tokio::test]
	async fn test_skips_without_pull_request_or_success() {
		let api = MockGithubApi::new();
		let link = "[ui-doc](https://circleci.com/gh/acme/widgets/4711)";
		UiReviewComment
			.handle(&check_run("success", link, &[]), &api, &enabled())
			.await
			.unwrap();
		UiReviewComment
			.handle(&check_run("failure", link, &[12]), &api, &enabled())
			.await
			.unwrap();
		UiReviewComment
			.handle(&check_run("success", link, &[12]), &api, &RepoPolicy::default())
			.await
			.unwrap();
		assert!(api.calls().is_empty());
	}
}
