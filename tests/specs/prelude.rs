//! Test helpers for behavioral specifications.
//!
//! Spawns a real `relayd` against an isolated state directory and loopback
//! port, then drives it with the real `relay` CLI binary. One `Daemon` per
//! test, dropped (and killed) at the end of the test.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output};
use std::time::Duration;

pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// This works with both standard builds and llvm-cov coverage runs.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale (e.g. compiled by a removed worktree
/// into a shared target directory).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn relay_binary() -> PathBuf {
    binary_path("relay")
}

fn relayd_binary() -> PathBuf {
    binary_path("relayd")
}

/// Poll a condition until it returns true or the timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// Reserve a loopback port by binding then immediately releasing it.
/// Small race window between release and relayd's own bind, acceptable
/// for test purposes.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local_addr").port()
}

/// A running `relayd` instance bound to an isolated state dir and port.
pub struct Daemon {
    child: Child,
    addr: String,
    state_dir: tempfile::TempDir,
    watch_dir: Option<tempfile::TempDir>,
}

pub struct DaemonBuilder {
    watch: bool,
    api_key: Option<String>,
}

impl Daemon {
    pub fn builder() -> DaemonBuilder {
        DaemonBuilder {
            watch: false,
            api_key: None,
        }
    }

    pub fn start() -> Self {
        Self::builder().start()
    }

    /// Base URL the CLI should dial (`http://127.0.0.1:PORT`).
    pub fn url(&self) -> &str {
        &self.addr
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn watch_path(&self) -> &Path {
        self.watch_dir
            .as_ref()
            .expect("daemon was not started with a watch root")
            .path()
    }

    /// Build a `relay` CLI command pointed at this daemon.
    pub fn cli(&self) -> CliBuilder {
        CliBuilder::new(self.addr.clone())
    }

    fn healthy(&self) -> bool {
        std::net::TcpStream::connect(self.addr.trim_start_matches("http://")).is_ok()
    }
}

impl DaemonBuilder {
    pub fn with_watch_root(mut self) -> Self {
        self.watch = true;
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn start(self) -> Daemon {
        let state_dir = tempfile::tempdir().expect("tempdir");
        let port = free_port();
        let addr = format!("http://127.0.0.1:{port}");

        let watch_dir = if self.watch {
            Some(tempfile::tempdir().expect("tempdir"))
        } else {
            None
        };

        if let Some(key) = &self.api_key {
            let keys_path = state_dir.path().join("api_keys.json");
            std::fs::write(
                &keys_path,
                format!(r#"[{{"name":"test","key":"{key}","allowed_projects":[],"expires_at":null}}]"#),
            )
            .expect("write api_keys.json");
        }

        let mut cmd = Command::new(relayd_binary());
        cmd.env("RELAY_STATE_DIR", state_dir.path())
            .env("RELAY_HTTP_ADDR", format!("127.0.0.1:{port}"))
            .env("RUST_LOG", "warn");
        if let Some(dir) = &watch_dir {
            cmd.env("RELAY_WATCH_ROOTS", dir.path());
        }
        cmd.stdout(std::process::Stdio::null());
        cmd.stderr(std::process::Stdio::null());

        let child = cmd.spawn().expect("relayd should start");

        let daemon = Daemon {
            child,
            addr,
            state_dir,
            watch_dir,
        };

        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || daemon.healthy()),
            "relayd did not open its listening port in time"
        );
        daemon
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Fluent builder for `relay` CLI invocations.
pub struct CliBuilder {
    addr: String,
    args: Vec<String>,
    api_key: Option<String>,
}

impl CliBuilder {
    fn new(addr: String) -> Self {
        Self {
            addr,
            args: Vec::new(),
            api_key: None,
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(relay_binary());
        cmd.arg("--addr").arg(&self.addr);
        if let Some(key) = &self.api_key {
            cmd.arg("--api-key").arg(key);
        }
        cmd.args(&self.args);
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }
}
