//! Identifiers stamped on every error instance.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a single error occurrence.
///
/// Uses UUIDv7 (time-ordered) so ids sort roughly by creation time in logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(Uuid);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid error id: {0}")]
pub struct InvalidErrorId(String);

impl ErrorId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ErrorId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ErrorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ErrorId {
    type Err = InvalidErrorId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s).map_err(|e| InvalidErrorId(format!("{s}: {e}")))?;
        Ok(Self(uuid))
    }
}
