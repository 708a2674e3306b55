// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay - CLI for the relayd file-event daemon

mod client;
mod color;
mod commands;
mod env;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};

use client::DaemonClient;
use commands::{logs, maintenance};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "relay - talk to the relayd file-event daemon",
    styles = color::styles()
)]
struct Cli {
    /// relayd HTTP address override
    #[arg(long, global = true)]
    addr: Option<String>,

    /// API key override (defaults to RELAY_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether relayd is reachable
    Healthz,
    /// Submit and query log entries
    Logs(logs::LogsArgs),
    /// Trigger a log retention sweep
    Maintenance(maintenance::MaintenanceArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let addr = cli.addr.unwrap_or_else(env::daemon_addr);
    let api_key = cli.api_key.or_else(env::api_key);
    let client = DaemonClient::new(addr, api_key);

    match cli.command {
        Commands::Healthz => {
            let body = client.healthz().await?;
            println!("{body}");
            Ok(())
        }
        Commands::Logs(args) => logs::run(args, &client, cli.output).await,
        Commands::Maintenance(args) => maintenance::run(args, &client, cli.output).await,
    }
}
