use std::sync::Arc;

use snapsync_core::config::ClientConfig;
use snapsync_core::models::SyncResult;
use snapsync_core::transport::HttpSyncTransport;
use snapsync_core::SyncCoordinator;

use crate::commands::common::open_replica;
use crate::error::CliError;

pub async fn run_sync(config: &ClientConfig, as_json: bool) -> Result<(), CliError> {
    if !config.is_sync_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let transport = HttpSyncTransport::from_config(config)?;
    tracing::debug!(endpoint = transport.endpoint(), "Starting sync round");
    let replica = Arc::new(open_replica(config).await?);
    let coordinator = SyncCoordinator::new(replica, transport);

    let result = coordinator.run_sync().await;
    report_sync_result(&result, as_json)
}

pub fn report_sync_result(result: &SyncResult, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.success {
        println!("{}", format_sync_summary(result));
    }

    if result.success {
        Ok(())
    } else {
        Err(CliError::SyncFailed(
            result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

pub fn format_sync_summary(result: &SyncResult) -> String {
    let mut line = format!(
        "Sync completed: {} uploaded, {} downloaded",
        result.uploaded, result.downloaded
    );
    if result.conflicts > 0 {
        line.push_str(&format!(
            ", {} conflict(s) resolved in favor of local edits",
            result.conflicts
        ));
    }
    line
}
