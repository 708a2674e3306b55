// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout-bounded subprocess execution.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default bound for a `shell` node with no `timeout_secs` set.
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(300);

/// Run `cmd`, killing it if it runs past `timeout`. `description` is folded
/// into the error message so a timed-out node's log line names what hung.
pub async fn run_with_timeout(mut cmd: Command, timeout: Duration, description: &str) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("{description} failed: {e}")),
        Err(_) => Err(format!("{description} timed out after {timeout:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_with_timeout_returns_output_on_success() {
        let mut cmd = Command::new("true");
        cmd.kill_on_drop(true);
        let result = run_with_timeout(cmd, Duration::from_secs(5), "true").await;
        assert!(result.unwrap().status.success());
    }

    #[tokio::test]
    async fn run_with_timeout_times_out_long_running_command() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        cmd.kill_on_drop(true);
        let result = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await;
        assert!(result.unwrap_err().contains("timed out"));
    }
}
