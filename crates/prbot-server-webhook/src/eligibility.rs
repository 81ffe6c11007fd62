// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Whether a pull request head satisfies its status checks.

use std::collections::HashMap;

use prbot_server_github_app::{CommitStatus, StatusState};

/// Decide merge eligibility from the head commit's statuses.
///
/// Without required contexts, every reported context must be successful;
/// no reports at all is eligible. With required contexts, each one must
/// have reported success. A required context that never reported fails.
///
/// When a context appears more than once the first entry wins; the API
/// lists the most recent report first.
pub fn is_eligible(statuses: &[CommitStatus], required_contexts: &[String]) -> bool {
	let mut latest: HashMap<&str, bool> = HashMap::with_capacity(statuses.len());
	for status in statuses {
		latest
			.entry(status.context.as_str())
			.or_insert(status.state == StatusState::Success);
	}

	if required_contexts.is_empty() {
		return latest.values().all(|success| *success);
	}

	required_contexts
		.iter()
		.all(|context| latest.get(context.as_str()).copied().unwrap_or(false))
}
