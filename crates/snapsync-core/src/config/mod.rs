//! Client configuration.
//!
//! Shared by every front end that drives a [`crate::SyncCoordinator`]. Values
//! come from environment variables; front ends layer their own sources
//! (flags, profile files) on top.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::normalize_base_url;
use crate::util::normalize_text_option;

pub const SERVER_URL_VAR: &str = "SNAPSYNC_SERVER_URL";
pub const SYNC_TIMEOUT_VAR: &str = "SNAPSYNC_SYNC_TIMEOUT_SECS";
pub const REPLICA_PATH_VAR: &str = "SNAPSYNC_REPLICA_PATH";

const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30;
const MAX_SYNC_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the sync server, without the `/sync` suffix
    pub server_url: Option<String>,
    /// Upper bound for one reconciliation request
    pub request_timeout: Duration,
    /// Replica database file; front ends pick a default when unset
    pub replica_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            request_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
            replica_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server_url = normalize_text_option(lookup(SERVER_URL_VAR))
            .map(normalize_base_url)
            .transpose()?;

        let timeout_secs = match normalize_text_option(lookup(SYNC_TIMEOUT_VAR)) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::InvalidInput(format!(
                    "{SYNC_TIMEOUT_VAR} must be an integer in [1, {MAX_SYNC_TIMEOUT_SECS}]"
                ))
            })?,
            None => DEFAULT_SYNC_TIMEOUT_SECS,
        };
        if !(1..=MAX_SYNC_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(Error::InvalidInput(format!(
                "{SYNC_TIMEOUT_VAR} must be in [1, {MAX_SYNC_TIMEOUT_SECS}]"
            )));
        }

        let replica_path = normalize_text_option(lookup(REPLICA_PATH_VAR)).map(PathBuf::from);

        Ok(Self {
            server_url,
            request_timeout: Duration::from_secs(timeout_secs),
            replica_path,
        })
    }

    /// Override the server URL, validating it
    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self> {
        self.server_url = Some(normalize_base_url(url.into())?);
        Ok(self)
    }

    /// Check if a sync server is configured
    pub const fn is_sync_configured(&self) -> bool {
        self.server_url.is_some()
    }
}
