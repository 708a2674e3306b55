use crate::prelude::Daemon;

#[test]
fn healthz_reaches_a_running_daemon() {
    let daemon = Daemon::start();
    daemon.cli().args(&["healthz"]).passes().stdout_has("ok");
}

#[test]
fn healthz_does_not_require_an_api_key() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    daemon.cli().args(&["healthz"]).passes();
}
