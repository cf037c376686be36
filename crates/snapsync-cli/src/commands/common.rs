use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use snapsync_core::config::ClientConfig;
use snapsync_core::db::LibSqlKeyValueStore;
use snapsync_core::util::normalize_text_option;
use snapsync_core::{LocalRecord, LocalReplica};

use crate::config_profiles::CliProfileConfig;
use crate::error::CliError;

pub type CliReplica = LocalReplica<LibSqlKeyValueStore>;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: i64,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub sync_status: String,
    pub last_modified: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

/// Layer flags and the profile file over the environment.
///
/// Server URL precedence: flag, then `SNAPSYNC_SERVER_URL`, then the profile.
pub fn resolve_client_config(
    env_config: ClientConfig,
    profile: &CliProfileConfig,
    server_url: Option<String>,
    replica_path: Option<PathBuf>,
) -> Result<ClientConfig, CliError> {
    let mut config = env_config;
    if let Some(path) = replica_path {
        config.replica_path = Some(path);
    }

    if let Some(url) = normalize_text_option(server_url) {
        config = config.with_server_url(url)?;
    } else if !config.is_sync_configured() {
        if let Some(url) = profile.server_url() {
            config = config.with_server_url(url)?;
        }
    }

    Ok(config)
}

pub fn resolve_replica_path(config: &ClientConfig) -> Result<PathBuf, CliError> {
    config
        .replica_path
        .clone()
        .map_or_else(default_replica_path, Ok)
}

pub fn default_replica_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("snapsync").join("replica.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_replica(config: &ClientConfig) -> Result<CliReplica, CliError> {
    let path = resolve_replica_path(config)?;
    open_replica_at(&path).await
}

pub async fn open_replica_at(path: &Path) -> Result<CliReplica, CliError> {
    let store = LibSqlKeyValueStore::open(path).await?;
    Ok(LocalReplica::new(store))
}

pub fn record_to_list_item(record: &LocalRecord) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id().value(),
        filename: record.image.filename.clone(),
        size: record.image.size,
        mime_type: record.image.mime_type.clone(),
        sync_status: record.sync_status.as_str().to_string(),
        last_modified: record.last_modified,
        updated_at: record.image.updated_at,
        relative_time: format_relative_time(record.last_modified, now_ms),
    }
}

pub fn format_record_lines(records: &[LocalRecord], now_ms: i64) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let filename = truncate_chars(&record.image.filename, 32);
            format!(
                "{:>6}  {:<8}  {filename:<32}  {:>10}  {}",
                record.id(),
                record.sync_status.as_str(),
                format_size(record.image.size),
                format_relative_time(record.last_modified, now_ms)
            )
        })
        .collect()
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
