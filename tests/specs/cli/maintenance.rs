use crate::prelude::Daemon;

#[test]
fn maintenance_sweep_reports_zero_against_an_empty_sink() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    daemon
        .cli()
        .api_key("secret-key")
        .args(&["maintenance"])
        .passes()
        .stdout_has("0 project(s)");
}

#[test]
fn maintenance_without_an_api_key_is_rejected() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    daemon.cli().args(&["maintenance"]).fails();
}
