// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use prbot_server_github_app::Comment;

/// `a` and `b` are equal once all whitespace is removed.
pub fn same_ignoring_whitespace(a: &str, b: &str) -> bool {
	let mut left = a.chars().filter(|c| !c.is_whitespace());
	let mut right = b.chars().filter(|c| !c.is_whitespace());
	loop {
		match (left.next(), right.next()) {
			(None, None) => return true,
			(Some(x), Some(y)) if x == y => continue,
			_ => return false,
		}
	}
}

/// Whether any existing comment already says `body`.
pub fn has_equivalent_comment(comments: &[Comment], body: &str) -> bool {
	comments
		.iter()
		.any(|comment| same_ignoring_whitespace(&comment.body, body))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_whitespace_differences_are_ignored() {
		assert!(same_ignoring_whitespace(
			"Status check _ci_ returned **failure**.",
			"Status check  _ci_\nreturned **failure**. "
		));
		assert!(same_ignoring_whitespace("", " \t\n"));
	}

	#[test]
	fn test_content_differences_are_not_ignored() {
		assert!(!same_ignoring_whitespace("returned failure", "returned error"));
		assert!(!same_ignoring_whitespace("abc", "abcd"));
	}

	#[test]
	fn test_has_equivalent_comment() {
		let comments = vec![Comment {
			id: 1,
			body: "Please   review\n".to_string(),
			user: None,
		}];
		assert!(has_equivalent_comment(&comments, "Please review"));
		assert!(!has_equivalent_comment(&comments, "Please merge"));
		assert!(!has_equivalent_comment(&[], "Please review"));
	}

	proptest! {
		#[test]
		fn prop_inserted_whitespace_is_ignored(
			text in "[a-z_*.]{1,40}",
			positions in proptest::collection::vec((0usize..40, "[ \t\n]{1,3}"), 0..5),
		) {
			let mut padded = text.clone();
			for (pos, ws) in positions {
				let at = pos.min(padded.len());
				padded.insert_str(at, &ws);
			}
			prop_assert!(same_ignoring_whitespace(&text, &padded));
		}
	}
}
