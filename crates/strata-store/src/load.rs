//! Load controller and bulk ingest.
//!
//! A bulk load allocates the next version, flips the last-load record to
//! `Running`, streams the CSV into one atomic batch (record hashes,
//! filter sets, sortable score sets, the all-records set, and the search
//! index), and records the outcome. Any failure after the `Running` write
//! leaves the last-load record `Failed` with the original start time.

use chrono::Utc;
use strata_core::{
  Error, Result,
  data::Record,
  engine::{Batch, BatchOp, KvEngine},
  load::{Load, LoadStatus},
  query::parse_score,
  schema::Schema,
};

use crate::{
  keys,
  search,
  store::{Table, TableStore},
};

impl<E: KvEngine> TableStore<E> {
  // ── Load controller ───────────────────────────────────────────────────────

  /// Read the last-load record for `table`. [`Error::NotFound`] means the
  /// table has never been loaded.
  pub async fn last_load(&self, table: &str) -> Result<Load> {
    let fields = self
      .engine()
      .hgetall(&keys::last_load(self.prefix(), table))
      .await?;
    Load::from_fields(&fields)
  }

  /// Atomically write the full last-load record for `table`.
  pub(crate) async fn write_last_load(
    &self,
    table: &str,
    load: &Load,
  ) -> Result<()> {
    let mut batch = Batch::new();
    batch.push(BatchOp::HSet {
      key:    keys::last_load(self.prefix(), table),
      fields: load.to_fields(),
    });
    self.engine().exec(batch).await
  }

  /// The version the next load will write: 0 for a fresh table,
  /// `last + 1` otherwise. Fails with [`Error::Busy`] while a load is
  /// running.
  async fn next_version(&self, table: &str) -> Result<u64> {
    match self.last_load(table).await {
      Err(Error::NotFound) => Ok(0),
      Err(err) => Err(err),
      Ok(last) if last.status == LoadStatus::Running => Err(Error::Busy),
      Ok(last) => Ok(last.version + 1),
    }
  }

  // ── Bulk load ─────────────────────────────────────────────────────────────

  /// Load `data` into `table_name` as a new version.
  ///
  /// `format` names the payload encoding; only `"csv"` is supported. The
  /// first CSV row is the header and every header column must exist in
  /// the table's schema.
  pub async fn bulk_load(
    &self,
    table_name: &str,
    data: &[u8],
    format: &str,
  ) -> Result<()> {
    let start_time = Utc::now().to_rfc3339();

    let resolved = self.table(table_name).await?;
    let version = self.next_version(table_name).await?;
    let table = Table {
      schema: resolved.schema,
      keys:   keys::TableKeys::new(self.prefix(), table_name, version),
    };

    let mut load = Load {
      version,
      status: LoadStatus::Running,
      start_time,
      end_time: String::new(),
    };
    self.write_last_load(table_name, &load).await?;
    tracing::info!(table = table_name, version, "bulk load started");

    match self.run_load(&table, data, format).await {
      Ok(rows) => {
        load.status = LoadStatus::Success;
        load.end_time = Utc::now().to_rfc3339();
        self.write_last_load(table_name, &load).await?;
        tracing::info!(table = table_name, version, rows, "bulk load finished");
        Ok(())
      }
      Err(err) => {
        load.status = LoadStatus::Failed;
        if let Err(write_err) = self.write_last_load(table_name, &load).await {
          tracing::warn!(
            table = table_name,
            error = %write_err,
            "failed to record load failure"
          );
        }
        tracing::error!(table = table_name, version, error = %err, "bulk load failed");
        Err(err)
      }
    }
  }

  async fn run_load(
    &self,
    table: &Table,
    data: &[u8],
    format: &str,
  ) -> Result<u64> {
    if format != "csv" {
      return Err(Error::bad_request("invalid file format"));
    }

    let mut batch = Batch::new();
    let rows = csv_to_batch(&mut batch, table, data)?;
    if let Some(op) = search::index_create_op(table) {
      batch.push(op);
    }
    self.engine().exec(batch).await?;
    Ok(rows)
  }

  // ── Record creation ───────────────────────────────────────────────────────

  /// Append records to the table's current version, continuing the seq
  /// numbering from the highest existing score in the all-records set.
  /// Returns the number of records created.
  pub async fn create_records(
    &self,
    table_name: &str,
    records: &[Record],
  ) -> Result<u64> {
    if records.is_empty() {
      return Err(Error::bad_request("no records provided"));
    }

    let table = self.table(table_name).await?;
    for record in records {
      for col in record.keys() {
        if table.schema.column(col).is_none() {
          return Err(Error::BadRequest(format!("column {col} not in schema")));
        }
      }
    }

    let top = self
      .engine()
      .zrevrange_withscores(&table.keys.all_records(), 0, 0)
      .await?;
    let mut seq = match top.first() {
      Some((_, score)) => *score as u64 + 1,
      None => 0,
    };

    let mut batch = Batch::new();
    for record in records {
      let mut pairs: Vec<(String, String)> = record
        .iter()
        .map(|(col, val)| (col.clone(), val.clone()))
        .collect();
      pairs.sort();
      ingest_row(&mut batch, &table.keys, &table.schema, &pairs, seq)?;
      seq += 1;
    }
    self.engine().exec(batch).await?;

    Ok(records.len() as u64)
  }
}

// ─── Row ingest ──────────────────────────────────────────────────────────────

/// Stage one record and its derived index entries into `batch`.
///
/// Shared by bulk load, record creation, and the re-ingest half of
/// record-level updates, so every path derives indexes identically.
pub(crate) fn ingest_row(
  batch: &mut Batch,
  table_keys: &keys::TableKeys,
  schema: &Schema,
  pairs: &[(String, String)],
  seq: u64,
) -> Result<()> {
  let record_key = table_keys.record(seq);

  for (col, val) in pairs {
    let column = schema
      .column(col)
      .ok_or_else(|| Error::BadRequest(format!("column {col} not in schema")))?;

    if column.filterable {
      let filter_key = table_keys.filter(col, val);
      batch.push(BatchOp::SAdd {
        key:    filter_key.clone(),
        member: record_key.clone(),
      });

      if column.sortable {
        batch.push(BatchOp::ZAdd {
          key:    table_keys.sortable(col),
          member: filter_key,
          score:  parse_score(val)?,
        });
      }
    }
  }

  batch.push(BatchOp::HSet {
    key:    record_key.clone(),
    fields: pairs.to_vec(),
  });
  batch.push(BatchOp::ZAdd {
    key:    table_keys.all_records(),
    member: record_key,
    score:  seq as f64,
  });

  Ok(())
}

/// Parse header + rows into `batch`, returning the row count.
fn csv_to_batch(batch: &mut Batch, table: &Table, data: &[u8]) -> Result<u64> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .from_reader(data);
  let mut rows = reader.records();

  let header = match rows.next() {
    Some(record) => {
      parse_csv_header(&record.map_err(csv_error)?, &table.schema)?
    }
    None => return Err(Error::bad_request("empty csv")),
  };

  let mut seq = 0u64;
  for record in rows {
    let record = record.map_err(csv_error)?;
    let pairs: Vec<(String, String)> = header
      .iter()
      .zip(record.iter())
      .map(|(col, val)| (col.clone(), val.to_string()))
      .collect();
    ingest_row(batch, &table.keys, &table.schema, &pairs, seq)?;
    seq += 1;
  }
  Ok(seq)
}

/// Validate the header row: every named column must exist in `schema`.
/// Schema columns absent from the header are permitted (their fields are
/// simply not written).
fn parse_csv_header(
  record: &csv::StringRecord,
  schema: &Schema,
) -> Result<Vec<String>> {
  let mut header = Vec::with_capacity(record.len());
  for col in record.iter() {
    if schema.column(col).is_none() {
      return Err(Error::BadRequest(format!("column {col} not in schema")));
    }
    header.push(col.to_string());
  }
  Ok(header)
}

fn csv_error(err: csv::Error) -> Error {
  Error::BadRequest(format!("malformed csv: {err}"))
}
