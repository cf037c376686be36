//! Validation of loosely-typed JSON crossing the transport or storage boundary.
//!
//! Whole-payload shape errors become [`Error::DataAnomaly`]. Individual
//! entries that fail to decode are dropped and counted so one bad record never
//! aborts a reconciliation round.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{
    ConflictEntry, ImageId, ImageRecord, LocalRecord, ReconciliationResult, SyncSummary,
};

/// Entries that survived validation plus the number dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub rejected: usize,
}

impl<T> Decoded<T> {
    fn log_rejections(&self, kind: &str) {
        if self.rejected > 0 {
            tracing::warn!(
                kind,
                rejected = self.rejected,
                kept = self.items.len(),
                "Dropped malformed entries"
            );
        }
    }
}

/// Decode the `localImages` list of a sync request.
///
/// Duplicate ids keep their first occurrence.
pub fn decode_sync_request(payload: Value) -> Result<Decoded<SyncSummary>> {
    let mut object = expect_object(payload, "sync request")?;
    let entries = take_array(&mut object, "localImages")?;
    let decoded = dedupe_by_id(decode_entries::<SyncSummary>(entries), |summary| summary.id);
    decoded.log_rejections("sync_summary");
    Ok(decoded)
}

/// Decode a comparator response into a typed result.
///
/// Returns the result together with the number of dropped entries.
pub fn decode_reconciliation(payload: Value) -> Result<(ReconciliationResult, usize)> {
    let mut object = expect_object(payload, "reconciliation result")?;

    let added = dedupe_by_id(
        decode_entries::<ImageRecord>(take_array(&mut object, "addedOrUpdated")?),
        |image| image.id,
    );
    let removed = decode_entries::<ImageId>(take_array(&mut object, "removed")?);
    let conflicts = decode_entries::<ConflictEntry>(take_array(&mut object, "conflicts")?);

    added.log_rejections("added_or_updated");
    removed.log_rejections("removed");
    conflicts.log_rejections("conflict");

    let rejected = added.rejected + removed.rejected + conflicts.rejected;
    let result = ReconciliationResult {
        added_or_updated: added.items,
        removed: removed.items,
        conflicts: conflicts.items,
    };
    Ok((result, rejected))
}

/// Decode the replica's persisted `images` value.
pub fn decode_local_records(raw: &str) -> Result<Decoded<LocalRecord>> {
    let payload: Value = serde_json::from_str(raw)?;
    let Value::Array(entries) = payload else {
        return Err(Error::DataAnomaly(
            "stored images value is not a JSON array".to_string(),
        ));
    };
    let decoded = dedupe_by_id(decode_entries::<LocalRecord>(entries), LocalRecord::id);
    decoded.log_rejections("local_record");
    Ok(decoded)
}

fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>) -> Decoded<T> {
    let total = entries.len();
    let items: Vec<T> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    Decoded {
        rejected: total - items.len(),
        items,
    }
}

fn dedupe_by_id<T>(decoded: Decoded<T>, id_of: impl Fn(&T) -> ImageId) -> Decoded<T> {
    let mut seen = HashSet::new();
    let total = decoded.items.len();
    let items: Vec<T> = decoded
        .items
        .into_iter()
        .filter(|item| seen.insert(id_of(item)))
        .collect();
    Decoded {
        rejected: decoded.rejected + (total - items.len()),
        items,
    }
}

fn expect_object(payload: Value, what: &str) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(object) => Ok(object),
        other => Err(Error::DataAnomaly(format!(
            "{what} must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn take_array(object: &mut Map<String, Value>, field: &str) -> Result<Vec<Value>> {
    match object.remove(field) {
        Some(Value::Array(entries)) => Ok(entries),
        Some(other) => Err(Error::DataAnomaly(format!(
            "field '{field}' must be an array, got {}",
            json_kind(&other)
        ))),
        None => Err(Error::DataAnomaly(format!("missing field '{field}'"))),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
