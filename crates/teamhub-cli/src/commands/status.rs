use serde::Serialize;
use teamhub_core::sync::StatusReport;

use crate::commands::common::{format_sync_timestamp, open_session, SessionOptions};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub phase: &'static str,
    pub online: bool,
    pub remote_configured: bool,
    pub local_available: bool,
    pub pending_ops: usize,
    pub last_sync_at: Option<i64>,
    pub files: usize,
    pub messages: usize,
    pub members: usize,
}

impl From<&StatusReport> for StatusItem {
    fn from(report: &StatusReport) -> Self {
        Self {
            phase: report.phase.as_str(),
            online: report.online,
            remote_configured: report.remote_configured,
            local_available: report.local_available,
            pending_ops: report.pending_ops,
            last_sync_at: report.last_sync_at,
            files: report.files,
            messages: report.messages,
            members: report.members,
        }
    }
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let last_sync = report
        .last_sync_at
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let remote = if report.remote_configured {
        "configured"
    } else {
        "not configured"
    };
    let storage = if report.local_available {
        "available"
    } else {
        "unavailable (memory only)"
    };

    vec![
        format!("Phase:          {}", report.phase),
        format!(
            "Connection:     {}",
            if report.online { "online" } else { "offline" }
        ),
        format!("Server:         {remote}"),
        format!("Local storage:  {storage}"),
        format!("Pending:        {}", report.pending_ops),
        format!("Last sync:      {last_sync}"),
        format!(
            "Records:        {} files, {} messages, {} members",
            report.files, report.messages, report.members
        ),
    ]
}

pub async fn run_status(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let report = session.orchestrator.status().await;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&StatusItem::from(&report))?
        );
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
