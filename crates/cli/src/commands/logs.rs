// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay logs` — submit and query the daemon's Log Sink.

use crate::client::DaemonClient;
use crate::output::OutputFormat;
use crate::table::{Column, Table};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Args)]
pub struct LogsArgs {
    #[command(subcommand)]
    command: LogsCommand,
}

#[derive(Subcommand)]
enum LogsCommand {
    /// Submit a log entry
    Submit(SubmitArgs),
    /// Query recent log entries for a project
    Query(QueryArgs),
    /// List entries correlated to a document
    Document(DocumentArgs),
}

#[derive(Args)]
struct SubmitArgs {
    /// Project namespace
    #[arg(long)]
    project: String,
    /// Severity: debug, info, warning, error, critical
    #[arg(long, default_value = "info")]
    level: String,
    /// Module that produced this entry
    #[arg(long)]
    module: String,
    /// Human-readable message
    message: String,
    /// Correlated document id
    #[arg(long)]
    document_id: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    project: String,
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

#[derive(Args)]
struct DocumentArgs {
    project: String,
    document_id: String,
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    project: &'a str,
    level: &'a str,
    module: &'a str,
    message: &'a str,
    document_id: Option<&'a str>,
}

#[derive(Debug, Deserialize, Serialize)]
struct LogEntryView {
    id: String,
    level: String,
    module: String,
    message: String,
    timestamp_ms: i64,
}

pub async fn run(args: LogsArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match args.command {
        LogsCommand::Submit(a) => submit(a, client, format).await,
        LogsCommand::Query(a) => query(a, client, format).await,
        LogsCommand::Document(a) => document(a, client, format).await,
    }
}

async fn submit(args: SubmitArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let body = SubmitBody {
        project: &args.project,
        level: &args.level,
        module: &args.module,
        message: &args.message,
        document_id: args.document_id.as_deref(),
    };
    let entry: LogEntryView = client.post_json("/v1/logs", &body).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entry)?),
        OutputFormat::Text => println!("logged {}", entry.id),
    }
    Ok(())
}

async fn query(args: QueryArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let entries: Vec<LogEntryView> = client
        .get_json(&format!("/v1/logs/{}?limit={}", args.project, args.limit))
        .await?;
    render(&entries, format)
}

async fn document(args: DocumentArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let entries: Vec<LogEntryView> = client
        .get_json(&format!("/v1/logs/{}/document/{}", args.project, args.document_id))
        .await?;
    render(&entries, format)
}

fn render(entries: &[LogEntryView], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Text => {
            let mut table = Table::new(vec![
                Column::status("LEVEL").with_max(10),
                Column::left("MODULE").with_max(20),
                Column::left("MESSAGE"),
                Column::muted("AGE"),
            ]);
            for entry in entries {
                table.row(vec![
                    entry.level.clone(),
                    entry.module.clone(),
                    entry.message.clone(),
                    crate::output::format_time_ago(entry.timestamp_ms),
                ]);
            }
            table.render(&mut std::io::stdout());
        }
    }
    Ok(())
}
