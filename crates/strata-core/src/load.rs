//! Bulk-load lifecycle records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Outcome of the most recent bulk load for a table.
///
/// The integer encoding is part of the persisted hash layout; do not
/// renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
  Failed,
  Success,
  Running,
}

impl LoadStatus {
  pub fn code(self) -> u8 {
    match self {
      LoadStatus::Failed => 0,
      LoadStatus::Success => 1,
      LoadStatus::Running => 2,
    }
  }

  pub fn from_code(code: u8) -> Result<Self> {
    match code {
      0 => Ok(LoadStatus::Failed),
      1 => Ok(LoadStatus::Success),
      2 => Ok(LoadStatus::Running),
      other => Err(Error::BadRequest(format!("unknown load status {other}"))),
    }
  }
}

/// The last-load record for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Load {
  pub version:    u64,
  pub status:     LoadStatus,
  pub start_time: String,
  pub end_time:   String,
}

impl Load {
  /// Hash-field encoding used for the `lastload` key.
  pub fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("version".to_string(), self.version.to_string()),
      ("status".to_string(), self.status.code().to_string()),
      ("starttime".to_string(), self.start_time.clone()),
      ("endtime".to_string(), self.end_time.clone()),
    ]
  }

  /// Decode the `lastload` hash. An empty hash means no load has ever
  /// run, reported as [`Error::NotFound`].
  pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
    if fields.is_empty() {
      return Err(Error::NotFound);
    }
    let version = fields
      .get("version")
      .and_then(|v| v.parse().ok())
      .ok_or_else(|| Error::bad_request("malformed lastload version"))?;
    let status = fields
      .get("status")
      .and_then(|v| v.parse::<u8>().ok())
      .ok_or_else(|| Error::bad_request("malformed lastload status"))
      .and_then(LoadStatus::from_code)?;
    Ok(Self {
      version,
      status,
      start_time: fields.get("starttime").cloned().unwrap_or_default(),
      end_time: fields.get("endtime").cloned().unwrap_or_default(),
    })
  }
}
