//! Image metadata model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier assigned by the authoritative store when an image is created.
///
/// Never reassigned, so it is safe to use as the replica key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(i64);

impl ImageId {
    /// Wrap a raw store identifier
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Metadata of a single image in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Store-assigned identifier
    pub id: ImageId,
    /// Original file name
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp assigned by the authoritative store (Unix ms)
    pub updated_at: i64,
}

/// Payload for creating an image in the authoritative store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewImage {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
}

impl NewImage {
    /// Trim fields and reject values the store would not accept
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            filename: normalize_filename(&self.filename)?,
            size: self.size,
            mime_type: normalize_mime_type(&self.mime_type)?,
        })
    }
}

/// Partial update of an image; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdate {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ImageUpdate {
    /// Trim fields and reject values the store would not accept
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            filename: self.filename.as_deref().map(normalize_filename).transpose()?,
            size: self.size,
            mime_type: self
                .mime_type
                .as_deref()
                .map(normalize_mime_type)
                .transpose()?,
        })
    }

    /// Check whether the update carries no changes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.filename.is_none() && self.size.is_none() && self.mime_type.is_none()
    }
}

fn normalize_filename(raw: &str) -> Result<String> {
    let filename = raw.trim();
    if filename.is_empty() {
        return Err(Error::InvalidInput("filename cannot be empty".into()));
    }
    if filename.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "filename must not contain path separators: {filename}"
        )));
    }
    Ok(filename.to_string())
}

fn normalize_mime_type(raw: &str) -> Result<String> {
    let mime_type = raw.trim().to_ascii_lowercase();
    let valid = mime_type
        .split_once('/')
        .is_some_and(|(kind, subtype)| {
            !kind.is_empty() && !subtype.is_empty() && !subtype.contains('/')
        });
    if valid {
        Ok(mime_type)
    } else {
        Err(Error::InvalidInput(format!("invalid MIME type: {raw}")))
    }
}
