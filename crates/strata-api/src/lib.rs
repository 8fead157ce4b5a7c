//! JSON REST API for the strata tabular store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`strata_core::engine::KvEngine`]. Transport concerns (TLS, auth)
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = strata_api::api_router(Arc::new(store));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod records;
pub mod schemas;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use strata_core::engine::KvEngine;
use strata_store::TableStore;

pub use crate::{config::Settings, error::ApiError};

/// Build the full `/api/v1` router for `store`.
pub fn api_router<E: KvEngine>(store: Arc<TableStore<E>>) -> Router<()> {
  Router::new()
    // Schemas
    .route(
      "/api/v1/schema",
      post(schemas::create::<E>).get(schemas::list::<E>),
    )
    .route("/api/v1/schema/{table}", get(schemas::get_one::<E>))
    // Bulk load and filtered reads
    .route("/api/v1/schema/{table}/load", post(data::load::<E>))
    .route("/api/v1/schema/{table}/data", get(data::get_data::<E>))
    .route(
      "/api/v1/schema/{table}/update",
      patch(data::update_data::<E>),
    )
    .route("/api/v1/schema/{table}/agg", get(data::aggregate::<E>))
    // Record-level operations
    .route(
      "/api/v1/schema/{table}/record",
      post(records::create::<E>)
        .get(records::get_by_condition::<E>)
        .delete(records::delete::<E>)
        .patch(records::update::<E>),
    )
    .with_state(store)
}

// ─── Integration tests ───────────────────────────────────────────────────────
