// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Environment helpers for secret material.
//!
//! Secrets may be given inline (`VAR`) or as a path (`VAR_FILE`), the
//! convention used by Docker and Kubernetes secret mounts. The GitHub App
//! private key is almost always supplied as a file.

use std::path::{Path, PathBuf};
use std::{env, fs};

use prbot_common_secret::Secret;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load a secret using the `VAR` / `VAR_FILE` convention.
///
/// `VAR_FILE` wins when both are set. Returns `Ok(None)` when neither is.
pub fn load_secret_env(var: &str) -> Result<Option<Secret<String>>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path) = env::var(&file_var) {
		if path.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}
		return load_secret_file(path).map(Some);
	}

	Ok(env::var(var).ok().map(Secret::new))
}

/// Read a secret from a file, stripping a single trailing newline.
pub fn load_secret_file(path: impl AsRef<Path>) -> Result<Secret<String>, SecretEnvError> {
	let path = path.as_ref();
	let content = fs::read_to_string(path).map_err(|source| SecretEnvError::Io {
		path: path.to_path_buf(),
		source,
	})?;

	let trimmed = content.strip_suffix('\n').unwrap_or(&content).to_string();
	Ok(Secret::new(trimmed))
}
