// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Effective repository policy for an event.

use prbot_server_config::{PolicyConfig, RepoPolicy};
use tracing::debug;

use crate::events::WebhookEvent;

/// Overlay the default policy and the event repository's override. The
/// loaded configuration is left untouched. An event without a repository
/// gets the default policy alone.
pub fn resolve(event: &WebhookEvent, config: &PolicyConfig) -> RepoPolicy {
	let Some(repository) = event.repository() else {
		debug!(event_type = event.event_type(), "event has no repository, using default policy");
		return config.effective(None);
	};
	let full_name = repository.full_name.as_str();
	let has_override = config.overrides_for(full_name).is_some();
	debug!(repository = full_name, has_override, "resolving repository policy");
	config.effective(Some(full_name))
}
