// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! prbot HTTP service.

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use prbot_server_config::ServerConfig;
use prbot_server_github_app::{
	AppSigner, InstallationClientFactory, InstallationCredentialProvider, ZenhubClientFactory,
};
use prbot_server_webhook::{default_registry, DeferredActions, WebhookService};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{StartupError, WebhookRejection};

/// GitHub caps webhook payloads at 25 MiB.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
	pub webhook: Arc<WebhookService>,
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/webhook", post(routes::webhook::receive_webhook))
		.route("/health", get(routes::health::health_check))
		.layer(DefaultBodyLimit::disable())
		.layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_BODY_BYTES))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Everything the running server owns.
pub struct App {
	pub state: AppState,
	/// Drained on shutdown.
	pub deferred: Arc<DeferredActions>,
}

/// Wire the GitHub App, handlers and webhook service from configuration.
///
/// Fails on an unusable private key.
pub fn build_app(config: &ServerConfig) -> Result<App, StartupError> {
	let app_config = &config.github_app;
	let http = prbot_common_http::new_client(Duration::from_secs(app_config.request_timeout_secs))?;

	let signer = AppSigner::new(app_config.app_id, app_config.private_key_pem.expose())?;
	let credentials = Arc::new(InstallationCredentialProvider::new(
		http.clone(),
		signer,
		app_config.base_url.clone(),
	));
	let clients = Arc::new(InstallationClientFactory::new(
		http.clone(),
		app_config.base_url.clone(),
		credentials,
	));

	let deferred = Arc::new(DeferredActions::new());
	let registry = default_registry(Arc::new(ZenhubClientFactory::new(http)), deferred.clone());
	let webhook = WebhookService::new(
		registry,
		config.policy.clone(),
		clients,
		app_config.webhook_secret.clone(),
	);

	info!(
		app_id = app_config.app_id,
		base_url = %app_config.base_url,
		repositories = config.policy.repositories.len(),
		"prbot service assembled"
	);
	Ok(App {
		state: AppState {
			webhook: Arc::new(webhook),
		},
		deferred,
	})
}
