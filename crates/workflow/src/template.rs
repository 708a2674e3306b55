// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template variable interpolation for node configs.
//!
//! A node's `config` (the `command` a shell node runs, the `url`/`body` an
//! http node requests) may reference an upstream node's output port as
//! `${port_name}`. The engine resolves bound edges into a flat
//! name→value map before dispatch; this module only does the substitution.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// `${variable_name}` or `${namespace.variable_name}`.
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// `${VAR:-default}` environment variable expansion, resolved before
/// node-input substitution so a workflow author can fall back to process
/// environment for things like API base URLs.
#[allow(clippy::expect_used)]
static ENV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+):-([^}]*)\}").expect("constant regex pattern is valid"));

/// Escape a string for safe use inside shell double-quoted contexts.
///
/// Backslash, `$`, backtick, and `"` are backslash-escaped so a node
/// input can't be interpreted as a shell expansion once substituted into
/// a `command` string.
fn escape_for_shell(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '$' => result.push_str("\\$"),
            '`' => result.push_str("\\`"),
            '"' => result.push_str("\\\""),
            _ => result.push(c),
        }
    }
    result
}

/// Interpolate `${name}` placeholders with values from `vars`. Unknown
/// variables are left as-is. Used for non-shell contexts (an http node's
/// `url`/`body`) where no escaping is needed.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    interpolate_inner(template, vars, false)
}

/// Like [`interpolate`], but escapes substituted values for safe use in a
/// shell double-quoted context. Used by the `shell` node processor.
pub fn interpolate_shell(template: &str, vars: &HashMap<String, String>) -> String {
    interpolate_inner(template, vars, true)
}

fn interpolate_inner(template: &str, vars: &HashMap<String, String>, shell_escape: bool) -> String {
    let result = ENV_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = &caps[2];
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string();

    VAR_PATTERN
        .replace_all(&result, |caps: &regex::Captures| {
            let name = &caps[1];
            match vars.get(name) {
                Some(val) if shell_escape => escape_for_shell(val),
                Some(val) => val.clone(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
