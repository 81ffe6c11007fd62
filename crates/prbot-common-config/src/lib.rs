// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration primitives shared across prbot crates.
//!
//! - [`Secret`] re-exported from [`prbot_common_secret`]
//! - [`load_secret_env`] and [`load_secret_file`] for reading key material
//!   from the environment or mounted files

pub mod env;

pub use prbot_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, load_secret_file, SecretEnvError};
