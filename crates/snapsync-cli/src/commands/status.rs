use chrono::Utc;
use serde::Serialize;
use snapsync_core::config::ClientConfig;
use snapsync_core::models::StatusSummary;

use crate::commands::common::{format_relative_time, format_sync_timestamp, open_replica};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub total: usize,
    pub pending: usize,
    pub conflicts: usize,
    pub last_sync: Option<i64>,
    pub last_sync_iso: Option<String>,
    pub server_url: Option<String>,
}

pub async fn run_status(config: &ClientConfig, as_json: bool) -> Result<(), CliError> {
    let replica = open_replica(config).await?;
    let summary = replica.status_summary().await;

    if as_json {
        let item = StatusItem {
            total: summary.total,
            pending: summary.pending,
            conflicts: summary.conflicts,
            last_sync: summary.last_sync,
            last_sync_iso: summary.last_sync.map(format_sync_timestamp),
            server_url: config.server_url.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let now_ms = Utc::now().timestamp_millis();
        for line in format_status_lines(&summary, config.server_url.as_deref(), now_ms) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_status_lines(
    summary: &StatusSummary,
    server_url: Option<&str>,
    now_ms: i64,
) -> Vec<String> {
    let last_sync = summary.last_sync.map_or_else(
        || "never".to_string(),
        |timestamp| {
            format!(
                "{} ({})",
                format_sync_timestamp(timestamp),
                format_relative_time(timestamp, now_ms)
            )
        },
    );

    vec![
        format!("Server:    {}", server_url.unwrap_or("not configured")),
        format!("Images:    {}", summary.total),
        format!("Pending:   {}", summary.pending),
        format!("Conflicts: {}", summary.conflicts),
        format!("Last sync: {last_sync}"),
    ]
}
