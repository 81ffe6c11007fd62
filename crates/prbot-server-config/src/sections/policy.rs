// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-repository bot policy.
//!
//! The process carries one default [`RepoPolicyLayer`] plus optional
//! overrides keyed by repository full name (`owner/name`). The effective
//! policy for a delivery is computed fresh each time by overlaying, field by
//! field, the default and then the override onto an empty layer.

use std::collections::HashMap;

use prbot_common_config::SecretString;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_APPROVED_LABEL: &str = "approved";
pub const DEFAULT_ZENHUB_URL: &str = "https://api.zenhub.io";
const DEFAULT_POST_MERGE_DELAY_SECS: u64 = 30;

/// A ZenHub pipeline and the webhook events that move issues into it.
///
/// Event keys are `<event>_<action>`, e.g. `issues_opened` or
/// `pull_request_closed`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BoardColumn {
	pub name: String,
	pub id: String,
	#[serde(default)]
	pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BoardConfigLayer {
	pub repo_id: Option<u64>,
	pub zenhub_token: Option<SecretString>,
	pub base_url: Option<String>,
	pub columns: Option<Vec<BoardColumn>>,
	/// Pipeline id issues are moved to some time after their PR merges.
	pub post_merge_pipeline: Option<String>,
	pub post_merge_delay_secs: Option<u64>,
}

impl BoardConfigLayer {
	pub fn merge(&mut self, other: BoardConfigLayer) {
		if other.repo_id.is_some() {
			self.repo_id = other.repo_id;
		}
		if other.zenhub_token.is_some() {
			self.zenhub_token = other.zenhub_token;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.columns.is_some() {
			self.columns = other.columns;
		}
		if other.post_merge_pipeline.is_some() {
			self.post_merge_pipeline = other.post_merge_pipeline;
		}
		if other.post_merge_delay_secs.is_some() {
			self.post_merge_delay_secs = other.post_merge_delay_secs;
		}
	}

	/// A board is only usable with both a repository id and a token.
	pub fn finalize(self) -> Option<BoardConfig> {
		Some(BoardConfig {
			repo_id: self.repo_id?,
			zenhub_token: self.zenhub_token?,
			base_url: self
				.base_url
				.unwrap_or_else(|| DEFAULT_ZENHUB_URL.to_string())
				.trim_end_matches('/')
				.to_string(),
			columns: self.columns.unwrap_or_default(),
			post_merge_pipeline: self.post_merge_pipeline.filter(|p| !p.is_empty()),
			post_merge_delay_secs: self
				.post_merge_delay_secs
				.unwrap_or(DEFAULT_POST_MERGE_DELAY_SECS),
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
	pub repo_id: u64,
	pub zenhub_token: SecretString,
	pub base_url: String,
	pub columns: Vec<BoardColumn>,
	pub post_merge_pipeline: Option<String>,
	pub post_merge_delay_secs: u64,
}

/// Partial repository policy. `None` means "inherit".
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RepoPolicyLayer {
	/// Skip every handler for the repository.
	pub disabled: Option<bool>,
	pub approved_label: Option<String>,
	pub new_issue_labels: Option<Vec<String>>,
	pub review_requested_label: Option<String>,
	pub wip_patterns: Option<Vec<String>>,
	pub wip_labels: Option<Vec<String>>,
	pub ui_review_comments: Option<bool>,
	pub board: Option<BoardConfigLayer>,
}

impl RepoPolicyLayer {
	/// Overlay `other` onto `self`; every field set in `other` wins.
	pub fn merge(&mut self, other: RepoPolicyLayer) {
		if other.disabled.is_some() {
			self.disabled = other.disabled;
		}
		if other.approved_label.is_some() {
			self.approved_label = other.approved_label;
		}
		if other.new_issue_labels.is_some() {
			self.new_issue_labels = other.new_issue_labels;
		}
		if other.review_requested_label.is_some() {
			self.review_requested_label = other.review_requested_label;
		}
		if other.wip_patterns.is_some() {
			self.wip_patterns = other.wip_patterns;
		}
		if other.wip_labels.is_some() {
			self.wip_labels = other.wip_labels;
		}
		if other.ui_review_comments.is_some() {
			self.ui_review_comments = other.ui_review_comments;
		}
		match (self.board.as_mut(), other.board) {
			(Some(board), Some(other_board)) => board.merge(other_board),
			(None, Some(other_board)) => self.board = Some(other_board),
			_ => {}
		}
	}

	pub fn finalize(self) -> RepoPolicy {
		RepoPolicy {
			disabled: self.disabled.unwrap_or(false),
			approved_label: self
				.approved_label
				.filter(|l| !l.is_empty())
				.unwrap_or_else(|| DEFAULT_APPROVED_LABEL.to_string()),
			new_issue_labels: self.new_issue_labels.unwrap_or_default(),
			review_requested_label: self.review_requested_label.filter(|l| !l.is_empty()),
			wip_patterns: self.wip_patterns.unwrap_or_default(),
			wip_labels: self.wip_labels.unwrap_or_default(),
			ui_review_comments: self.ui_review_comments.unwrap_or(false),
			board: self.board.and_then(BoardConfigLayer::finalize),
		}
	}

	fn validate(&self, scope: &str) -> Result<(), ConfigError> {
		for pattern in self.wip_patterns.iter().flatten() {
			Regex::new(&format!(r"(?i)\b(?:{pattern})\b")).map_err(|e| {
				ConfigError::InvalidValue {
					key: format!("{scope}.wip_patterns"),
					message: format!("'{pattern}' is not a valid pattern: {e}"),
				}
			})?;
		}
		Ok(())
	}
}

/// Effective policy for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoPolicy {
	pub disabled: bool,
	pub approved_label: String,
	pub new_issue_labels: Vec<String>,
	pub review_requested_label: Option<String>,
	pub wip_patterns: Vec<String>,
	pub wip_labels: Vec<String>,
	pub ui_review_comments: bool,
	pub board: Option<BoardConfig>,
}

impl Default for RepoPolicy {
	fn default() -> Self {
		RepoPolicyLayer::default().finalize()
	}
}

impl RepoPolicy {
	pub fn wip_enabled(&self) -> bool {
		!self.wip_patterns.is_empty() || !self.wip_labels.is_empty()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfigLayer {
	#[serde(default)]
	pub default: Option<RepoPolicyLayer>,
	#[serde(default)]
	pub repositories: Option<HashMap<String, RepoPolicyLayer>>,
}

impl PolicyConfigLayer {
	pub fn merge(&mut self, other: PolicyConfigLayer) {
		match (self.default.as_mut(), other.default) {
			(Some(default), Some(other_default)) => default.merge(other_default),
			(None, Some(other_default)) => self.default = Some(other_default),
			_ => {}
		}

		if let Some(other_repos) = other.repositories {
			let repos = self.repositories.get_or_insert_with(HashMap::new);
			for (name, layer) in other_repos {
				repos.entry(name).or_default().merge(layer);
			}
		}
	}

	pub fn finalize(self) -> Result<PolicyConfig, ConfigError> {
		let default = self.default.unwrap_or_default();
		default.validate("policy.default")?;

		let mut repositories = HashMap::new();
		for (name, layer) in self.repositories.unwrap_or_default() {
			if !name.contains('/') {
				return Err(ConfigError::InvalidValue {
					key: format!("policy.repositories.{name}"),
					message: "repository keys must be 'owner/name'".to_string(),
				});
			}
			layer.validate(&format!("policy.repositories.\"{name}\""))?;
			repositories.insert(name.to_ascii_lowercase(), layer);
		}

		Ok(PolicyConfig {
			default,
			repositories,
		})
	}
}

/// Default policy plus per-repository overrides, as loaded.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
	pub default: RepoPolicyLayer,
	/// Keyed by lower-cased `owner/name`.
	pub repositories: HashMap<String, RepoPolicyLayer>,
}

impl PolicyConfig {
	/// Override layer for a repository. Full names compare case-insensitively,
	/// as they do on GitHub.
	pub fn overrides_for(&self, full_name: &str) -> Option<&RepoPolicyLayer> {
		self.repositories.get(&full_name.to_ascii_lowercase())
	}

	/// Overlay default then override onto an empty layer. Neither source is
	/// modified. Without a repository only the default applies.
	pub fn effective(&self, full_name: Option<&str>) -> RepoPolicy {
		let mut layer = RepoPolicyLayer::default();
		layer.merge(self.default.clone());
		if let Some(overrides) = full_name.and_then(|name| self.overrides_for(name)) {
			layer.merge(overrides.clone());
		}
		layer.finalize()
	}
}
