//! [`RedisKv`] — the Redis implementation of the engine contract.
//!
//! Plain primitives go through the typed command API; atomic batches
//! become `MULTI`/`EXEC` pipelines; the search facility issues `FT.*`
//! commands and decodes their array replies.

use std::collections::HashMap;

use redis::{AsyncCommands, Value, aio::MultiplexedConnection};
use strata_core::{
  Error, Result,
  data::Record,
  engine::{Batch, BatchOp, KvEngine, ScoreBound, ScoreRange, SearchHit},
};

/// A KV engine backed by a Redis (or Redis Stack) server.
///
/// Cloning is cheap — the multiplexed connection is shared.
#[derive(Clone)]
pub struct RedisKv {
  conn: MultiplexedConnection,
}

impl RedisKv {
  /// Connect to `host:port` and verify liveness with a PING.
  pub async fn connect(host: &str, port: u16, password: &str) -> Result<Self> {
    let url = if password.is_empty() {
      format!("redis://{host}:{port}/")
    } else {
      format!("redis://:{password}@{host}:{port}/")
    };

    let client = redis::Client::open(url).map_err(Error::kv)?;
    let conn = client
      .get_multiplexed_tokio_connection()
      .await
      .map_err(Error::kv)?;

    let kv = Self { conn };
    kv.ping().await?;
    Ok(kv)
  }

  fn conn(&self) -> MultiplexedConnection {
    self.conn.clone()
  }
}

/// Render a score bound the way `ZRANGEBYSCORE` expects it.
fn bound_arg(bound: ScoreBound) -> String {
  match bound {
    ScoreBound::NegInf => "-inf".to_string(),
    ScoreBound::PosInf => "+inf".to_string(),
    ScoreBound::Incl(v) => v.to_string(),
    ScoreBound::Excl(v) => format!("({v}"),
  }
}

fn decode_error(what: &str) -> Error {
  Error::kv(std::io::Error::other(format!("unexpected {what} reply shape")))
}

fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::BulkString(bytes) => {
      Some(String::from_utf8_lossy(bytes).into_owned())
    }
    Value::SimpleString(s) => Some(s.clone()),
    Value::Int(i) => Some(i.to_string()),
    Value::Double(d) => Some(d.to_string()),
    _ => None,
  }
}

/// Decode an alternating `field, value, field, value, ...` array.
fn value_to_record(value: &Value) -> Result<Record> {
  let Value::Array(items) = value else {
    return Err(decode_error("document"));
  };
  let mut record = Record::new();
  for pair in items.chunks(2) {
    if let [field, val] = pair
      && let (Some(field), Some(val)) =
        (value_to_string(field), value_to_string(val))
    {
      record.insert(field, val);
    }
  }
  Ok(record)
}

impl KvEngine for RedisKv {
  async fn ping(&self) -> Result<()> {
    let mut conn = self.conn();
    redis::cmd("PING")
      .query_async::<String>(&mut conn)
      .await
      .map_err(Error::kv)?;
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let mut conn = self.conn();
    conn.get(key).await.map_err(Error::kv)
  }

  async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
    let mut conn = self.conn();
    conn.hgetall(key).await.map_err(Error::kv)
  }

  async fn smembers(&self, key: &str) -> Result<Vec<String>> {
    let mut conn = self.conn();
    conn.smembers(key).await.map_err(Error::kv)
  }

  async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
    let mut conn = self.conn();
    conn.sismember(key, member).await.map_err(Error::kv)
  }

  async fn scard(&self, key: &str) -> Result<u64> {
    let mut conn = self.conn();
    conn.scard(key).await.map_err(Error::kv)
  }

  async fn zcard(&self, key: &str) -> Result<u64> {
    let mut conn = self.conn();
    conn.zcard(key).await.map_err(Error::kv)
  }

  async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
    let mut conn = self.conn();
    conn
      .zrange(key, start as isize, stop as isize)
      .await
      .map_err(Error::kv)
  }

  async fn zrevrange_withscores(
    &self,
    key: &str,
    start: i64,
    stop: i64,
  ) -> Result<Vec<(String, f64)>> {
    let mut conn = self.conn();
    conn
      .zrevrange_withscores(key, start as isize, stop as isize)
      .await
      .map_err(Error::kv)
  }

  async fn zrangebyscore(
    &self,
    key: &str,
    range: ScoreRange,
  ) -> Result<Vec<String>> {
    let mut conn = self.conn();
    conn
      .zrangebyscore(key, bound_arg(range.min), bound_arg(range.max))
      .await
      .map_err(Error::kv)
  }

  async fn sadd(&self, key: &str, members: &[String]) -> Result<u64> {
    if members.is_empty() {
      return Ok(0);
    }
    let mut conn = self.conn();
    conn.sadd(key, members).await.map_err(Error::kv)
  }

  async fn sunionstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    if src.is_empty() {
      return Ok(0);
    }
    let mut conn = self.conn();
    conn.sunionstore(dst, src).await.map_err(Error::kv)
  }

  async fn sinterstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    if src.is_empty() {
      return Ok(0);
    }
    let mut conn = self.conn();
    conn.sinterstore(dst, src).await.map_err(Error::kv)
  }

  async fn zinterstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    if src.is_empty() {
      return Ok(0);
    }
    let mut conn = self.conn();
    redis::cmd("ZINTERSTORE")
      .arg(dst)
      .arg(src.len())
      .arg(src)
      .query_async(&mut conn)
      .await
      .map_err(Error::kv)
  }

  async fn exec(&self, batch: Batch) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }

    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.into_ops() {
      match op {
        BatchOp::Set { key, value } => {
          pipe.set(key, value).ignore();
        }
        BatchOp::SAdd { key, member } => {
          pipe.sadd(key, member).ignore();
        }
        BatchOp::SRem { key, member } => {
          pipe.srem(key, member).ignore();
        }
        BatchOp::HSet { key, fields } => {
          pipe.hset_multiple(key, &fields).ignore();
        }
        BatchOp::HDel { key, fields } => {
          pipe.hdel(key, fields).ignore();
        }
        BatchOp::ZAdd { key, member, score } => {
          pipe.zadd(key, member, score).ignore();
        }
        BatchOp::ZRem { key, member } => {
          pipe.zrem(key, member).ignore();
        }
        BatchOp::CreateSearchIndex { index, prefix, fields } => {
          let cmd = pipe
            .cmd("FT.CREATE")
            .arg(index)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(prefix)
            .arg("SCHEMA");
          for field in fields {
            cmd.arg(&field.name);
            cmd.arg(if field.numeric { "NUMERIC" } else { "TEXT" });
            if field.sortable {
              cmd.arg("SORTABLE");
            }
          }
          cmd.ignore();
        }
      }
    }

    let mut conn = self.conn();
    pipe.query_async::<()>(&mut conn).await.map_err(Error::kv)
  }

  async fn search(
    &self,
    index: &str,
    query: &str,
    with_content: bool,
  ) -> Result<Vec<SearchHit>> {
    let mut cmd = redis::cmd("FT.SEARCH");
    cmd.arg(index).arg(query);
    if !with_content {
      cmd.arg("NOCONTENT");
    }

    let mut conn = self.conn();
    let reply: Value = cmd.query_async(&mut conn).await.map_err(Error::kv)?;
    let Value::Array(items) = reply else {
      return Err(decode_error("FT.SEARCH"));
    };

    let items = items.get(1..).unwrap_or_default();
    let mut hits = Vec::new();
    if with_content {
      for pair in items.chunks(2) {
        if let [key, doc] = pair {
          let key = value_to_string(key)
            .ok_or_else(|| decode_error("FT.SEARCH key"))?;
          hits.push(SearchHit { key, fields: value_to_record(doc)? });
        }
      }
    } else {
      for key in items {
        let key =
          value_to_string(key).ok_or_else(|| decode_error("FT.SEARCH key"))?;
        hits.push(SearchHit { key, fields: Record::new() });
      }
    }
    Ok(hits)
  }

  async fn aggregate(
    &self,
    index: &str,
    group_by: &[String],
    operation: &str,
    column: Option<&str>,
    alias: &str,
  ) -> Result<Vec<Record>> {
    let mut cmd = redis::cmd("FT.AGGREGATE");
    cmd.arg(index).arg("*").arg("GROUPBY").arg(group_by.len());
    for col in group_by {
      cmd.arg(format!("@{col}"));
    }
    cmd.arg("REDUCE").arg(operation);
    match column {
      Some(col) => {
        cmd.arg(1).arg(format!("@{col}"));
      }
      None => {
        cmd.arg(0);
      }
    }
    cmd.arg("AS").arg(alias);

    let mut conn = self.conn();
    let reply: Value = cmd.query_async(&mut conn).await.map_err(Error::kv)?;
    let Value::Array(items) = reply else {
      return Err(decode_error("FT.AGGREGATE"));
    };

    items
      .get(1..)
      .unwrap_or_default()
      .iter()
      .map(value_to_record)
      .collect()
  }
}
