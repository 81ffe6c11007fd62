// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the prbot server.
//!
//! Layers, from lowest to highest precedence: built-in defaults, the TOML
//! config file, then `PRBOT_SERVER_*` environment variables. Repository
//! policy (the `[policy]` table) only comes from the file.
//!
//! ```ignore
//! let config = prbot_server_config::load_config()?;
//! let policy = config.policy.effective(Some("acme/widgets"));
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub logging: LoggingConfig,
	pub github_app: GitHubAppConfig,
	pub policy: PolicyConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load from defaults, `/etc/prbot/server.toml` and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Same as [`load_config`] with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let github_app = layer.github_app.unwrap_or_default().build()?;
	let policy = layer.policy.unwrap_or_default().finalize()?;

	info!(
		host = %http.host,
		port = http.port,
		app_id = github_app.app_id,
		github_api = %github_app.base_url,
		webhook_signed = github_app.webhook_secret.is_some(),
		repository_overrides = policy.repositories.len(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		logging,
		github_app,
		policy,
	})
}
