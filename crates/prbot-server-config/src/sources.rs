// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;
use std::str::FromStr;

use prbot_common_config::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{GitHubAppConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/prbot/server.toml";

/// Source precedence levels (higher overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `PRBOT_SERVER_<SECTION>_<FIELD>`. Repository policy is only
/// read from the config file.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			logging: Some(load_logging_from_env()?),
			github_app: Some(load_github_app_from_env()?),
			policy: None,
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("PRBOT_SERVER_HOST"),
		port: env_parse("PRBOT_SERVER_PORT", "u16")?,
		shutdown_timeout_secs: env_parse("PRBOT_SERVER_SHUTDOWN_TIMEOUT_SECS", "u64")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("PRBOT_SERVER_LOG_FORMAT") {
		Some(v) => Some(
			LogFormat::from_str(&v).map_err(|message| ConfigError::InvalidValue {
				key: "PRBOT_SERVER_LOG_FORMAT".to_string(),
				message,
			})?,
		),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("PRBOT_SERVER_LOG_LEVEL"),
		format,
	})
}

fn load_github_app_from_env() -> Result<GitHubAppConfigLayer, ConfigError> {
	Ok(GitHubAppConfigLayer {
		app_id: env_parse("PRBOT_SERVER_GITHUB_APP_ID", "u64")?,
		private_key_pem: load_secret_env("PRBOT_SERVER_GITHUB_APP_PRIVATE_KEY")?,
		private_key_file: None,
		webhook_secret: load_secret_env("PRBOT_SERVER_GITHUB_APP_WEBHOOK_SECRET")?,
		base_url: env_var("PRBOT_SERVER_GITHUB_APP_BASE_URL"),
		request_timeout_secs: env_parse("PRBOT_SERVER_GITHUB_APP_REQUEST_TIMEOUT_SECS", "u64")?,
	})
}
