use chrono::Utc;
use snapsync_core::config::ClientConfig;
use snapsync_core::LocalRecord;

use crate::commands::common::{
    format_record_lines, open_replica, record_to_list_item, RecordListItem,
};
use crate::error::CliError;

pub async fn run_list(
    config: &ClientConfig,
    pending_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let replica = open_replica(config).await?;
    let records: Vec<LocalRecord> = replica
        .load_all()
        .await
        .into_iter()
        .filter(|record| !pending_only || record.is_pending())
        .collect();

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No images in the local replica.");
    } else {
        for line in format_record_lines(&records, Utc::now().timestamp_millis()) {
            println!("{line}");
        }
    }

    Ok(())
}
