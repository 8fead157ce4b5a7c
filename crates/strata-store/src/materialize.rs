//! Record materialization: expanding an ordered key list into records
//! with a bounded worker pool.
//!
//! Jobs carry their output index, so the result vector is filled in input
//! order no matter which worker finishes first. The first error any
//! worker hits aborts the whole materialization.

use std::sync::Arc;

use strata_core::{
  Error, Result,
  data::Record,
  engine::KvEngine,
  schema::Schema,
};
use tokio::sync::{Mutex, mpsc};

use crate::store::TableStore;

/// Parallel fetchers per materialization.
const WORKERS: usize = 8;

struct Job {
  key:   String,
  index: usize,
}

struct JobResult {
  index:   usize,
  outcome: Result<Record>,
}

impl<E: KvEngine> TableStore<E> {
  /// Fetch every key's record hash, validating schema conformance,
  /// preserving the input order.
  pub(crate) async fn fetch_records(
    &self,
    schema: &Schema,
    record_keys: Vec<String>,
  ) -> Result<Vec<Record>> {
    if record_keys.is_empty() {
      return Ok(Vec::new());
    }

    let total = record_keys.len();
    let schema = Arc::new(schema.clone());

    let (job_tx, job_rx) = mpsc::channel::<Job>(total);
    let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(total);
    let job_rx = Arc::new(Mutex::new(job_rx));

    for _ in 0..WORKERS.min(total) {
      let engine = self.engine().clone();
      let schema = Arc::clone(&schema);
      let job_rx = Arc::clone(&job_rx);
      let result_tx = result_tx.clone();

      tokio::spawn(async move {
        loop {
          let job = { job_rx.lock().await.recv().await };
          let Some(job) = job else { break };

          let outcome = fetch_record(&engine, &schema, &job.key).await;
          let failed = outcome.is_err();
          if result_tx
            .send(JobResult { index: job.index, outcome })
            .await
            .is_err()
          {
            break;
          }
          if failed {
            break;
          }
        }
      });
    }
    drop(result_tx);

    // Capacity covers every job, so submission never blocks on workers.
    // A send only fails once every worker has already bailed out.
    for (index, key) in record_keys.into_iter().enumerate() {
      if job_tx.send(Job { key, index }).await.is_err() {
        break;
      }
    }
    drop(job_tx);

    let mut slots: Vec<Option<Record>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    while let Some(result) = result_rx.recv().await {
      match result.outcome {
        Ok(record) => slots[result.index] = Some(record),
        Err(err) => return Err(err),
      }
    }

    slots
      .into_iter()
      .map(|slot| {
        slot.ok_or_else(|| {
          Error::kv(std::io::Error::other("record fetch worker lost a job"))
        })
      })
      .collect()
  }
}

/// Fetch one record hash and check it against the schema.
pub(crate) async fn fetch_record<E: KvEngine>(
  engine: &E,
  schema: &Schema,
  key: &str,
) -> Result<Record> {
  let record = engine.hgetall(key).await?;
  if record.is_empty() {
    return Err(Error::NotFound);
  }
  conform(schema, key, &record)?;
  Ok(record)
}

/// A stored record must carry exactly its schema's column set — no
/// missing and no extra fields.
fn conform(schema: &Schema, key: &str, record: &Record) -> Result<()> {
  if schema.columns().len() != record.len() {
    return Err(Error::SchemaMismatch(format!(
      "number of columns for key {key} does not match schema"
    )));
  }
  for col in schema.columns() {
    if !record.contains_key(&col.name) {
      return Err(Error::SchemaMismatch(format!(
        "{} column not found in record {key}",
        col.name
      )));
    }
  }
  Ok(())
}
