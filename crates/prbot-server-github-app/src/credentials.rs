// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Installation access tokens, minted on demand and cached per installation.
//!
//! A cached credential is handed out only while it has more than
//! [`REFRESH_MARGIN_SECS`] left. Refreshes are serialized per installation with
//! double-checked locking, so concurrent callers for one installation share
//! a single token exchange.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use prbot_common_secret::SecretString;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace};

use crate::error::{map_github_error, AuthError, GithubAppError};
use crate::jwt::AppSigner;

/// Remaining lifetime below which a cached credential is replaced.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Installation-scoped bearer token and its absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationCredential {
	pub token: SecretString,
	pub expires_at: DateTime<Utc>,
}

impl InstallationCredential {
	pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
		now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
	}
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
	token: String,
	expires_at: DateTime<Utc>,
}

pub struct InstallationCredentialProvider {
	http: Client,
	signer: AppSigner,
	base_url: String,
	cache: Mutex<HashMap<u64, InstallationCredential>>,
	/// One exchange lock per installation. Entries nobody is waiting on are
	/// pruned by [`InstallationCredentialProvider::invalidate`].
	locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl InstallationCredentialProvider {
	/// `base_url` is the API root without trailing slash.
	pub fn new(http: Client, signer: AppSigner, base_url: impl Into<String>) -> Self {
		Self {
			http,
			signer,
			base_url: base_url.into(),
			cache: Mutex::new(HashMap::new()),
			locks: Mutex::new(HashMap::new()),
		}
	}

	async fn installation_lock(&self, installation_id: u64) -> Arc<Mutex<()>> {
		let mut locks = self.locks.lock().await;
		locks
			.entry(installation_id)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	async fn cached(&self, installation_id: u64) -> Option<InstallationCredential> {
		let cache = self.cache.lock().await;
		cache
			.get(&installation_id)
			.filter(|c| c.is_usable_at(Utc::now()))
			.cloned()
	}

	/// Return a credential for the installation, exchanging a fresh app JWT
	/// when none is cached or the cached one is within a minute of expiry.
	#[instrument(skip(self))]
	pub async fn acquire(&self, installation_id: u64) -> Result<InstallationCredential, AuthError> {
		if let Some(credential) = self.cached(installation_id).await {
			trace!(installation_id, "Using cached installation token");
			return Ok(credential);
		}

		let lock = self.installation_lock(installation_id).await;
		let _guard = lock.lock().await;

		if let Some(credential) = self.cached(installation_id).await {
			trace!(installation_id, "Using cached installation token (post-lock)");
			return Ok(credential);
		}

		debug!(installation_id, "Fetching new installation token");
		let credential = self
			.exchange(installation_id)
			.await
			.map_err(|source| match source {
				GithubAppError::Auth(auth) => auth,
				other => AuthError::Exchange {
					installation_id,
					source: Box::new(other),
				},
			})?;

		self.cache
			.lock()
			.await
			.insert(installation_id, credential.clone());

		info!(
			installation_id,
			expires_at = %credential.expires_at,
			"Installation token refreshed"
		);
		Ok(credential)
	}

	/// Drop the cached credential, e.g. after the API rejected it, along
	/// with the installation's exchange lock unless a caller still holds it.
	pub async fn invalidate(&self, installation_id: u64) {
		if self.cache.lock().await.remove(&installation_id).is_some() {
			info!(installation_id, "Invalidated installation token cache");
		}

		let mut locks = self.locks.lock().await;
		// Clones are only handed out under the map lock, so a count of one
		// means no caller holds or awaits this lock.
		if locks
			.get(&installation_id)
			.is_some_and(|lock| Arc::strong_count(lock) == 1)
		{
			locks.remove(&installation_id);
		}
	}

	async fn exchange(&self, installation_id: u64) -> Result<InstallationCredential, GithubAppError> {
		let jwt = self.signer.sign()?;
		let url = format!(
			"{}/app/installations/{installation_id}/access_tokens",
			self.base_url
		);

		let response = self
			.http
			.post(&url)
			.bearer_auth(jwt)
			.header("Accept", "application/vnd.github+json")
			.header("X-GitHub-Api-Version", "2022-11-28")
			.send()
			.await
			.map_err(|e| {
				error!(installation_id, error = %e, "Installation token request failed");
				GithubAppError::from(e)
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}

		let token: AccessTokenResponse = response.json().await.map_err(|e| {
			error!(error = %e, "Failed to parse access token response");
			GithubAppError::InvalidResponse(format!("JSON parse error: {e}"))
		})?;

		Ok(InstallationCredential {
			token: SecretString::new(token.token),
			expires_at: token.expires_at,
		})
	}

	#[cfg(test)]
	pub(crate) async fn tracked_locks(&self) -> usize {
		self.locks.lock().await.len()
	}

	#[cfg(test)]
	pub(crate) async fn seed(&self, installation_id: u64, credential: InstallationCredential) {
		self.cache.lock().await.insert(installation_id, credential);
	}
}
