//! Handlers for `/api/v1/schema` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/v1/schema` | Body: schema JSON; 400 on duplicate name |
//! | `GET`  | `/api/v1/schema` | List all schemas |
//! | `GET`  | `/api/v1/schema/:table` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use strata_core::{engine::KvEngine, schema::Schema};
use strata_store::TableStore;

use crate::error::ApiError;

/// `POST /api/v1/schema`
pub async fn create<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  body: Result<Json<Schema>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let Json(schema) =
    body.map_err(|rej| ApiError::bad_request(rej.body_text()))?;

  store.add_schema(&schema).await?;
  tracing::info!(table = schema.name(), "added schema");
  Ok(Json(json!({ "schema": schema })))
}

/// `GET /api/v1/schema`
pub async fn list<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
) -> Result<Json<Value>, ApiError> {
  let schemas = store.list_schemas().await?;
  Ok(Json(json!({ "schemas": schemas })))
}

/// `GET /api/v1/schema/:table`
pub async fn get_one<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
) -> Result<Json<Value>, ApiError> {
  let schema = store.get_schema(&table).await?;
  Ok(Json(json!({ "schema": schema })))
}
