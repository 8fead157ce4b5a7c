//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use strata_core::Error;
use thiserror::Error as ThisError;

/// An error returned by an API handler: the storage-core taxonomy,
/// rendered as `{"error": ...}` with the matching status code.
#[derive(Debug, ThisError)]
#[error("{0}")]
pub struct ApiError(#[from] pub Error);

impl ApiError {
  pub fn bad_request(msg: impl Into<String>) -> Self {
    Self(Error::BadRequest(msg.into()))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      Error::NotFound => StatusCode::NOT_FOUND,
      Error::BadRequest(_)
      | Error::Immutable
      | Error::Busy
      | Error::EmptyKey => StatusCode::BAD_REQUEST,
      Error::SchemaMismatch(_) | Error::Serialization(_) | Error::Kv(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.0.to_string() }))).into_response()
  }
}
