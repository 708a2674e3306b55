// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay maintenance` — trigger a Log Sink retention sweep.

use crate::client::DaemonClient;
use crate::output::OutputFormat;
use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Args)]
pub struct MaintenanceArgs;

#[derive(Debug, Deserialize, Serialize)]
struct MaintenanceReportView {
    projects_swept: usize,
    entries_dropped: usize,
    entries_remaining: usize,
}

pub async fn run(_args: MaintenanceArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let report: MaintenanceReportView = client.post_json("/maintenance", &()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "swept {} project(s), dropped {} entr(y/ies), {} remaining",
            report.projects_swept, report.entries_dropped, report.entries_remaining
        ),
    }
    Ok(())
}
