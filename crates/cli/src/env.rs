// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

/// Base URL of the relayd HTTP surface to talk to. Distinct from the
/// daemon's own `RELAY_HTTP_ADDR` (a bind address, not a URL) so the two
/// processes don't fight over one environment variable's format.
pub fn daemon_addr() -> String {
    std::env::var("RELAY_ADDR").unwrap_or_else(|_| "http://127.0.0.1:4180".to_string())
}

/// API key sent as `X-API-Key` on every request.
pub fn api_key() -> Option<String> {
    std::env::var("RELAY_API_KEY").ok().filter(|s| !s.is_empty())
}
