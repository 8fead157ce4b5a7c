//! The update engine: filter-selected bulk updates, and record-level
//! get/update/delete addressed through the search index.
//!
//! Every mutation re-derives the affected filter and sortable entries so
//! the derived indexes stay consistent with the record hashes.

use std::collections::HashMap;

use strata_core::{
  Error, Result,
  data::{Change, Condition, Record},
  engine::{Batch, BatchOp, KvEngine, SearchHit},
  query::Query,
};

use crate::{
  load::ingest_row,
  materialize::fetch_record,
  search,
  store::{Table, TableStore},
};

impl<E: KvEngine> TableStore<E> {
  // ── Bulk update ───────────────────────────────────────────────────────────

  /// Update every record matched by `query.filters` with
  /// `query.updates`, re-deriving filter and sortable index entries in
  /// the same atomic batch as the hash writes.
  pub async fn update_data(
    &self,
    table_name: &str,
    query: &Query,
  ) -> Result<()> {
    let table = self.table(table_name).await?;
    query.validate_updates(&table.schema)?;
    query.validate(&table.schema)?;

    let (record_keys, _) = self.record_keys(&table, query).await?;

    let mut batch = Batch::new();
    for (col, val) in &query.updates {
      let filterable = table.schema.is_filterable(col)?;
      let sortable = table.schema.is_sortable(col)?;

      for record_key in &record_keys {
        if filterable {
          // The old value decides which filter set the key leaves.
          let record =
            fetch_record(self.engine(), &table.schema, record_key).await?;
          let old_val = record.get(col).cloned().unwrap_or_default();

          batch.push(BatchOp::SRem {
            key:    table.keys.filter(col, &old_val),
            member: record_key.clone(),
          });

          let new_filter = table.keys.filter(col, val);
          batch.push(BatchOp::SAdd {
            key:    new_filter.clone(),
            member: record_key.clone(),
          });

          if sortable {
            batch.push(BatchOp::ZAdd {
              key:    table.keys.sortable(col),
              member: new_filter,
              score:  strata_core::query::parse_score(val)?,
            });
          }
        }

        batch.push(BatchOp::HSet {
          key:    record_key.clone(),
          fields: vec![(col.clone(), val.clone())],
        });
      }
    }

    self.engine().exec(batch).await
  }

  // ── Record-level operations ───────────────────────────────────────────────

  /// Return every record matching the conjunction of `conditions`.
  pub async fn get_records(
    &self,
    table_name: &str,
    conditions: &[Condition],
  ) -> Result<Vec<Record>> {
    let table = self.table(table_name).await?;
    let hits = self.condition_hits(&table, conditions).await?;
    Ok(hits.into_iter().map(|hit| hit.fields).collect())
  }

  /// Delete every record matching `conditions`, removing its derived
  /// index entries. Returns the number of records deleted.
  pub async fn delete_records(
    &self,
    table_name: &str,
    conditions: &[Condition],
  ) -> Result<u64> {
    let table = self.table(table_name).await?;
    let hits = self.condition_hits(&table, conditions).await?;

    let count = hits.len() as u64;
    for hit in hits {
      let mut batch = Batch::new();
      remove_record_ops(&mut batch, &table, &hit.key, &hit.fields);
      self.engine().exec(batch).await?;
    }
    Ok(count)
  }

  /// Apply `changes` to every record matching `conditions`.
  ///
  /// Only columns the record already carries are changed. Each record's
  /// old index entries are removed and the updated record is re-ingested
  /// under its original seq, in one atomic batch per record. Returns the
  /// number of records updated.
  pub async fn update_records(
    &self,
    table_name: &str,
    conditions: &[Condition],
    changes: &[Change],
  ) -> Result<u64> {
    let table = self.table(table_name).await?;
    for change in changes {
      if table.schema.column(&change.column).is_none() {
        return Err(Error::BadRequest(format!(
          "column {} not in schema",
          change.column
        )));
      }
    }

    let hits = self.condition_hits(&table, conditions).await?;

    let mut count = 0u64;
    for hit in hits {
      let seq = record_seq(&hit.key)?;

      let mut updated = hit.fields.clone();
      for change in changes {
        if let Some(slot) = updated.get_mut(&change.column) {
          *slot = change.value.clone();
        }
      }

      let mut pairs: Vec<(String, String)> = updated.into_iter().collect();
      pairs.sort();

      let mut batch = Batch::new();
      remove_record_ops(&mut batch, &table, &hit.key, &hit.fields);
      ingest_row(&mut batch, &table.keys, &table.schema, &pairs, seq)?;
      self.engine().exec(batch).await?;
      count += 1;
    }
    Ok(count)
  }

  /// Resolve `conditions` through the search index. Zero matches is
  /// [`Error::NotFound`]; unknown condition columns are rejected.
  async fn condition_hits(
    &self,
    table: &Table,
    conditions: &[Condition],
  ) -> Result<Vec<SearchHit>> {
    if conditions.is_empty() {
      return Err(Error::bad_request("no conditions provided"));
    }
    for condition in conditions {
      if table.schema.column(&condition.column).is_none() {
        return Err(Error::BadRequest(format!(
          "column {} not in schema",
          condition.column
        )));
      }
    }

    let query = search::conditions_query(conditions);
    let hits = self
      .engine()
      .search(&table.keys.search_index(), &query, true)
      .await?;
    if hits.is_empty() {
      return Err(Error::NotFound);
    }
    Ok(hits)
  }
}

/// Stage the removal of one record and all its derived index entries.
fn remove_record_ops(
  batch: &mut Batch,
  table: &Table,
  record_key: &str,
  fields: &HashMap<String, String>,
) {
  for (col, val) in fields {
    let Some(column) = table.schema.column(col) else { continue };
    if !column.filterable {
      continue;
    }

    let filter_key = table.keys.filter(col, val);
    batch.push(BatchOp::SRem {
      key:    filter_key.clone(),
      member: record_key.to_string(),
    });
    if column.sortable {
      batch.push(BatchOp::ZRem {
        key:    table.keys.sortable(col),
        member: filter_key,
      });
    }
  }

  batch.push(BatchOp::ZRem {
    key:    table.keys.all_records(),
    member: record_key.to_string(),
  });
  batch.push(BatchOp::HDel {
    key:    record_key.to_string(),
    fields: fields.keys().cloned().collect(),
  });
}

/// The seq component of a record key (its final `:` segment).
fn record_seq(record_key: &str) -> Result<u64> {
  record_key
    .rsplit(':')
    .next()
    .and_then(|seq| seq.parse().ok())
    .ok_or_else(|| {
      Error::BadRequest(format!("malformed record key {record_key}"))
    })
}
