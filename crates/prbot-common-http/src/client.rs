// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Applied when configuration does not say otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client builder with the prbot User-Agent and connect timeout preset.
///
/// GitHub rejects API requests without a User-Agent.
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.connect_timeout(CONNECT_TIMEOUT)
}

/// Build the shared transport with a total request timeout.
pub fn new_client(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// `prbot/{version}`
pub fn user_agent() -> String {
	format!("prbot/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_product_and_version() {
		let ua = user_agent();
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 2);
		assert_eq!(parts[0], "prbot");
		assert!(!parts[1].is_empty());
	}

	#[test]
	fn new_client_builds_with_timeout() {
		assert!(new_client(Duration::from_secs(5)).is_ok());
	}
}
