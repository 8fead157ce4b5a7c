//! Handlers for record-level operations on `/api/v1/schema/:table/record`.
//!
//! | Method   | Body | Effect |
//! |----------|------|--------|
//! | `POST`   | `{"records":[{...}]}` | Append records to the current version |
//! | `GET`    | `{"conditions":[...]}` | Fetch records by condition |
//! | `DELETE` | `{"conditions":[...]}` | Delete records and their index entries |
//! | `PATCH`  | `{"conditions":[...],"changes":[...]}` | Update matching records |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use strata_core::{
  data::{Change, Condition, Record},
  engine::KvEngine,
};
use strata_store::TableStore;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub struct ConditionsBody {
  pub conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub conditions: Vec<Condition>,
  pub changes:    Vec<Change>,
}

fn parsed<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
  body
    .map(|Json(inner)| inner)
    .map_err(|rej| ApiError::bad_request(rej.body_text()))
}

/// `POST /api/v1/schema/:table/record`
pub async fn create<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = parsed(body)?;
  let count = store.create_records(&table, &body.records).await?;
  tracing::info!(table, count, "created records");
  Ok(Json(json!({ "created_records_count": count })))
}

/// `GET /api/v1/schema/:table/record`
pub async fn get_by_condition<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<ConditionsBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = parsed(body)?;
  let records = store.get_records(&table, &body.conditions).await?;
  Ok(Json(json!({ "records": records })))
}

/// `DELETE /api/v1/schema/:table/record`
pub async fn delete<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<ConditionsBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = parsed(body)?;
  let count = store.delete_records(&table, &body.conditions).await?;
  tracing::info!(table, count, "deleted records");
  Ok(Json(json!({ "deleted_records_count": count })))
}

/// `PATCH /api/v1/schema/:table/record`
pub async fn update<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = parsed(body)?;
  let count = store
    .update_records(&table, &body.conditions, &body.changes)
    .await?;
  tracing::info!(table, count, "updated records");
  Ok(Json(json!({ "updated_record_count": count })))
}
