//! [`TableStore`] — the storage-core handle, plus the schema registry.

use strata_core::{
  Error, Result,
  engine::{Batch, BatchOp, KvEngine},
  load::Load,
  schema::Schema,
};

use crate::keys::{self, TableKeys};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tabular store bound to one KV engine and key prefix.
///
/// Cloning is cheap — engines are shared connection handles.
#[derive(Clone)]
pub struct TableStore<E> {
  engine: E,
  prefix: String,
}

/// A table resolved against the registry: its schema and the keyspace of
/// its current version.
pub(crate) struct Table {
  pub schema: Schema,
  pub keys:   TableKeys,
}

impl<E: KvEngine> TableStore<E> {
  pub fn new(engine: E, prefix: impl Into<String>) -> Self {
    Self { engine, prefix: prefix.into() }
  }

  /// Liveness check against the engine.
  pub async fn ping(&self) -> Result<()> {
    self.engine.ping().await
  }

  pub(crate) fn engine(&self) -> &E {
    &self.engine
  }

  pub(crate) fn prefix(&self) -> &str {
    &self.prefix
  }

  // ── Schema registry ───────────────────────────────────────────────────────

  /// Persist a new schema and register its key in the all-schemas set.
  ///
  /// Schemas are write-once: adding a name that already exists fails
  /// with [`Error::Immutable`], even for identical content.
  pub async fn add_schema(&self, schema: &Schema) -> Result<()> {
    let key = keys::schema(&self.prefix, schema.name());

    if self.engine.get(&key).await?.is_some() {
      return Err(Error::Immutable);
    }

    let schema_json = serde_json::to_string(schema)?;

    let mut batch = Batch::new();
    batch.push(BatchOp::SAdd {
      key:    keys::all_schemas(&self.prefix),
      member: key.clone(),
    });
    batch.push(BatchOp::Set { key, value: schema_json });
    self.engine.exec(batch).await
  }

  /// Fetch the schema stored under `name`.
  pub async fn get_schema(&self, name: &str) -> Result<Schema> {
    if name.is_empty() {
      return Err(Error::EmptyKey);
    }
    self.schema_by_key(&keys::schema(&self.prefix, name)).await
  }

  /// Fetch every schema registered in the all-schemas set.
  ///
  /// The first decode failure aborts the listing; no partial results.
  pub async fn list_schemas(&self) -> Result<Vec<Schema>> {
    let schema_keys =
      self.engine.smembers(&keys::all_schemas(&self.prefix)).await?;

    let mut schemas = Vec::with_capacity(schema_keys.len());
    for key in &schema_keys {
      schemas.push(self.schema_by_key(key).await?);
    }
    Ok(schemas)
  }

  async fn schema_by_key(&self, key: &str) -> Result<Schema> {
    if key.is_empty() {
      return Err(Error::EmptyKey);
    }
    let schema_json = self.engine.get(key).await?.ok_or(Error::NotFound)?;
    Ok(serde_json::from_str(&schema_json)?)
  }

  // ── Table resolution ──────────────────────────────────────────────────────

  /// Resolve a table: its schema plus the keyspace of the version the
  /// last load wrote. A table with no loads yet resolves to version 0.
  pub(crate) async fn table(&self, name: &str) -> Result<Table> {
    let schema = self.get_schema(name).await?;

    let version = match self.last_load(name).await {
      Ok(Load { version, .. }) => version,
      Err(Error::NotFound) => 0,
      Err(err) => return Err(err),
    };

    Ok(Table {
      schema,
      keys: TableKeys::new(&self.prefix, name, version),
    })
  }
}
