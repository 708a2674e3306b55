use crate::prelude::Daemon;

#[test]
fn submit_then_query_roundtrips_through_the_cli() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    let cli = daemon.cli().api_key("secret-key");

    cli.args(&[
        "logs",
        "submit",
        "--project",
        "demo",
        "--level",
        "info",
        "--module",
        "ingest",
        "file indexed",
    ])
    .passes();

    daemon
        .cli()
        .api_key("secret-key")
        .args(&["logs", "query", "demo"])
        .passes()
        .stdout_has("file indexed");
}

#[test]
fn query_without_an_api_key_is_rejected() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    daemon
        .cli()
        .args(&["logs", "query", "demo"])
        .fails()
        .stderr_has("401");
}

#[test]
fn query_with_the_wrong_api_key_is_rejected() {
    let daemon = Daemon::builder().with_api_key("secret-key").start();
    daemon
        .cli()
        .api_key("not-the-right-key")
        .args(&["logs", "query", "demo"])
        .fails();
}
