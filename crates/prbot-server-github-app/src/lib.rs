// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub App plumbing for prbot.
//!
//! An [`AppSigner`] mints short-lived app JWTs, the
//! [`InstallationCredentialProvider`] exchanges them for installation tokens
//! and caches those per installation, and an [`InstallationClientFactory`]
//! hands out [`GithubApi`] clients bound to one installation over a shared
//! transport. The ZenHub [`BoardApi`] lives here too since it is the other
//! outbound API handlers call.

pub mod api;
pub mod board;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod rest;
pub mod types;

pub use api::{ClientFactory, GithubApi};
pub use board::{BoardApi, BoardClientFactory, ZenhubClient, ZenhubClientFactory};
pub use credentials::{InstallationCredential, InstallationCredentialProvider};
pub use error::{map_github_error, AuthError, GithubAppError};
pub use jwt::AppSigner;
pub use rest::{InstallationClientFactory, RestGithubClient};
pub use types::{
	BranchRef, CombinedStatus, Comment, Commit, CommitDetail, CommitStatus, Issue, Label,
	MergeResult, NewStatus, PullRequest, RepoRef, RequestedReviewers, Review, StatusState, Team,
	User,
};
