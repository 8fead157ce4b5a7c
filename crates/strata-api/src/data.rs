//! Handlers for bulk load, filtered reads, bulk updates, and
//! aggregation.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/api/v1/schema/:table/load` | CSV body |
//! | `GET`   | `/api/v1/schema/:table/data` | Query JSON body; `limit`/`offset` URL params |
//! | `PATCH` | `/api/v1/schema/:table/update` | Query JSON with `updates` |
//! | `GET`   | `/api/v1/schema/:table/agg` | AggRequest JSON body |

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, Query as UrlQuery, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use strata_core::{data::AggRequest, engine::KvEngine, query::Query};
use strata_store::TableStore;

use crate::error::ApiError;

// ─── Pagination parameters ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<i64>,
  pub offset: Option<i64>,
}

impl PageParams {
  /// URL paging overrides whatever the body query carries. An absent
  /// limit means unlimited; a present one must be positive.
  fn apply(&self, query: &mut Query) -> Result<(), ApiError> {
    match self.limit {
      None => query.limit = -1,
      Some(limit) if limit > 0 => query.limit = limit,
      Some(_) => return Err(ApiError::bad_request("limit must be > 0")),
    }
    match self.offset {
      None => query.offset = 0,
      Some(offset) if offset >= 0 => query.offset = offset,
      Some(_) => return Err(ApiError::bad_request("offset must be >= 0")),
    }
    Ok(())
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `POST /api/v1/schema/:table/load`
pub async fn load<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, ApiError> {
  store.bulk_load(&table, &body, "csv").await.inspect_err(|err| {
    tracing::error!(table, error = %err, "bulk load failed");
  })?;
  Ok(Json(json!({ "status": "successfully loaded data" })))
}

/// `GET /api/v1/schema/:table/data`
///
/// The body is an optional query JSON; an absent body reads everything.
pub async fn get_data<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  UrlQuery(params): UrlQuery<PageParams>,
  body: Result<Option<Json<Query>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let mut query = match body
    .map_err(|rej| ApiError::bad_request(rej.body_text()))?
  {
    Some(Json(query)) => query,
    None => Query::default(),
  };
  params.apply(&mut query)?;

  let page = store.get_data(&table, &query).await?;
  Ok(Json(json!({
    "records": page.records,
    "metadata": page.metadata,
  })))
}

/// `PATCH /api/v1/schema/:table/update`
pub async fn update_data<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<Query>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let Json(query) =
    body.map_err(|rej| ApiError::bad_request(rej.body_text()))?;

  store.update_data(&table, &query).await?;
  tracing::info!(table, "updated records");
  Ok(Json(json!({ "status": "successfully updated records" })))
}

/// `GET /api/v1/schema/:table/agg`
pub async fn aggregate<E: KvEngine>(
  State(store): State<Arc<TableStore<E>>>,
  Path(table): Path<String>,
  body: Result<Json<AggRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let Json(request) =
    body.map_err(|rej| ApiError::bad_request(rej.body_text()))?;

  let rows = store.aggregate(&table, &request).await?;
  Ok(Json(json!({ "records": rows })))
}
