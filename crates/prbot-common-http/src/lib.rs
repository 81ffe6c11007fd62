// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared outbound HTTP transport.
//!
//! One `reqwest::Client` is built at startup and cloned into every
//! installation client so connections are pooled across installations.
//! Every client built here carries a bounded timeout; nothing in prbot
//! issues an outbound request without one.

mod client;

pub use client::{builder, new_client, user_agent, DEFAULT_TIMEOUT};
