//! Error taxonomy for the strata storage core.
//!
//! Every variant is distinguishable at the API boundary; the HTTP layer
//! maps them onto status codes without inspecting messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No matching records, or a missing schema / last-load record.
  #[error("no matching records found")]
  NotFound,

  /// Invalid paging, unknown or ill-typed filter column, malformed CSV or
  /// JSON input, bad file format.
  #[error("bad request: {0}")]
  BadRequest(String),

  /// Attempt to add a schema under a name that already has one.
  #[error("updating immutable key")]
  Immutable,

  /// A new load was attempted while the previous load is still running.
  #[error("last load still running")]
  Busy,

  /// An empty table name was supplied.
  #[error("empty key")]
  EmptyKey,

  /// A stored record's column set diverges from its table's schema.
  #[error("schema mismatch: {0}")]
  SchemaMismatch(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// KV engine or I/O failure.
  #[error("kv engine error: {0}")]
  Kv(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap an engine-level failure.
  pub fn kv(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Kv(Box::new(err))
  }

  pub fn bad_request(msg: impl Into<String>) -> Self {
    Self::BadRequest(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
