//! [`MemoryKv`] — an in-process implementation of the engine contract.
//!
//! Backs the test suites and local development, covering the search
//! facility as well as the set/sorted-set/hash primitives. Batches apply
//! under a single lock, giving the same all-or-nothing visibility as a
//! transactional pipeline.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
};

use strata_core::{
  Error, Result,
  data::Record,
  engine::{Batch, BatchOp, IndexField, KvEngine, ScoreRange, SearchHit},
};

#[derive(Default)]
struct IndexDef {
  prefix: String,
  fields: Vec<IndexField>,
}

#[derive(Default)]
struct MemState {
  strings: HashMap<String, String>,
  hashes:  HashMap<String, HashMap<String, String>>,
  sets:    HashMap<String, HashSet<String>>,
  zsets:   HashMap<String, HashMap<String, f64>>,
  indexes: HashMap<String, IndexDef>,
}

/// An in-memory KV engine.
#[derive(Clone, Default)]
pub struct MemoryKv {
  state: Arc<Mutex<MemState>>,
}

impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
    self.state.lock().expect("memory engine lock poisoned")
  }
}

impl MemState {
  /// Members with scores for keys usable as ZINTERSTORE operands: plain
  /// sets contribute score 1 per member.
  fn member_scores(&self, key: &str) -> Vec<(String, f64)> {
    if let Some(zset) = self.zsets.get(key) {
      return zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    }
    if let Some(set) = self.sets.get(key) {
      return set.iter().map(|m| (m.clone(), 1.0)).collect();
    }
    Vec::new()
  }

  fn sorted_zset(&self, key: &str) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = self
      .zsets
      .get(key)
      .map(|z| z.iter().map(|(m, s)| (m.clone(), *s)).collect())
      .unwrap_or_default();
    members
      .sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
  }

  fn apply(&mut self, op: BatchOp) {
    match op {
      BatchOp::Set { key, value } => {
        self.strings.insert(key, value);
      }
      BatchOp::SAdd { key, member } => {
        self.sets.entry(key).or_default().insert(member);
      }
      BatchOp::SRem { key, member } => {
        if let Some(set) = self.sets.get_mut(&key) {
          set.remove(&member);
          if set.is_empty() {
            self.sets.remove(&key);
          }
        }
      }
      BatchOp::HSet { key, fields } => {
        self.hashes.entry(key).or_default().extend(fields);
      }
      BatchOp::HDel { key, fields } => {
        if let Some(hash) = self.hashes.get_mut(&key) {
          for field in &fields {
            hash.remove(field);
          }
          if hash.is_empty() {
            self.hashes.remove(&key);
          }
        }
      }
      BatchOp::ZAdd { key, member, score } => {
        self.zsets.entry(key).or_default().insert(member, score);
      }
      BatchOp::ZRem { key, member } => {
        if let Some(zset) = self.zsets.get_mut(&key) {
          zset.remove(&member);
          if zset.is_empty() {
            self.zsets.remove(&key);
          }
        }
      }
      BatchOp::CreateSearchIndex { index, prefix, fields } => {
        self.indexes.insert(index, IndexDef { prefix, fields });
      }
    }
  }

  /// Indexed documents: hashes under the index's key prefix.
  fn indexed_docs(
    &self,
    def: &IndexDef,
  ) -> Vec<(String, HashMap<String, String>)> {
    let mut docs: Vec<(String, HashMap<String, String>)> = self
      .hashes
      .iter()
      .filter(|(key, _)| key.starts_with(&def.prefix))
      .map(|(key, hash)| (key.clone(), hash.clone()))
      .collect();
    docs.sort_by(|a, b| a.0.cmp(&b.0));
    docs
  }
}

/// Map rank-window arguments (with Redis negative-index semantics) onto a
/// slice range.
fn rank_window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
  let n = len as i64;
  let mut start = if start < 0 { n + start } else { start };
  let mut stop = if stop < 0 { n + stop } else { stop };
  if start < 0 {
    start = 0;
  }
  if stop >= n {
    stop = n - 1;
  }
  if n == 0 || start > stop || start >= n {
    return None;
  }
  Some((start as usize, stop as usize))
}

fn format_number(v: f64) -> String {
  if v.fract() == 0.0 && v.abs() < 1e15 {
    format!("{}", v as i64)
  } else {
    v.to_string()
  }
}

impl KvEngine for MemoryKv {
  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.lock().strings.get(key).cloned())
  }

  async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
    Ok(self.lock().hashes.get(key).cloned().unwrap_or_default())
  }

  async fn smembers(&self, key: &str) -> Result<Vec<String>> {
    Ok(
      self
        .lock()
        .sets
        .get(key)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
    Ok(
      self
        .lock()
        .sets
        .get(key)
        .is_some_and(|set| set.contains(member)),
    )
  }

  async fn scard(&self, key: &str) -> Result<u64> {
    Ok(self.lock().sets.get(key).map_or(0, |set| set.len() as u64))
  }

  async fn zcard(&self, key: &str) -> Result<u64> {
    Ok(self.lock().zsets.get(key).map_or(0, |zset| zset.len() as u64))
  }

  async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
    let members = self.lock().sorted_zset(key);
    let Some((lo, hi)) = rank_window(members.len(), start, stop) else {
      return Ok(Vec::new());
    };
    Ok(members[lo..=hi].iter().map(|(m, _)| m.clone()).collect())
  }

  async fn zrevrange_withscores(
    &self,
    key: &str,
    start: i64,
    stop: i64,
  ) -> Result<Vec<(String, f64)>> {
    let mut members = self.lock().sorted_zset(key);
    members.reverse();
    let Some((lo, hi)) = rank_window(members.len(), start, stop) else {
      return Ok(Vec::new());
    };
    Ok(members[lo..=hi].to_vec())
  }

  async fn zrangebyscore(
    &self,
    key: &str,
    range: ScoreRange,
  ) -> Result<Vec<String>> {
    Ok(
      self
        .lock()
        .sorted_zset(key)
        .into_iter()
        .filter(|(_, score)| range.contains(*score))
        .map(|(member, _)| member)
        .collect(),
    )
  }

  async fn sadd(&self, key: &str, members: &[String]) -> Result<u64> {
    if members.is_empty() {
      return Ok(0);
    }
    let mut state = self.lock();
    let set = state.sets.entry(key.to_string()).or_default();
    let mut added = 0;
    for member in members {
      if set.insert(member.clone()) {
        added += 1;
      }
    }
    Ok(added)
  }

  async fn sunionstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    let mut state = self.lock();
    let mut union = HashSet::new();
    for key in src {
      if let Some(set) = state.sets.get(key) {
        union.extend(set.iter().cloned());
      }
    }
    let cardinality = union.len() as u64;
    if union.is_empty() {
      state.sets.remove(dst);
    } else {
      state.sets.insert(dst.to_string(), union);
    }
    Ok(cardinality)
  }

  async fn sinterstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    let mut state = self.lock();
    let mut inter: Option<HashSet<String>> = None;
    for key in src {
      let set = state.sets.get(key).cloned().unwrap_or_default();
      inter = Some(match inter {
        None => set,
        Some(acc) => acc.intersection(&set).cloned().collect(),
      });
    }
    let inter = inter.unwrap_or_default();
    let cardinality = inter.len() as u64;
    if inter.is_empty() {
      state.sets.remove(dst);
    } else {
      state.sets.insert(dst.to_string(), inter);
    }
    Ok(cardinality)
  }

  async fn zinterstore(&self, dst: &str, src: &[String]) -> Result<u64> {
    let mut state = self.lock();

    let operands: Vec<HashMap<String, f64>> = src
      .iter()
      .map(|key| state.member_scores(key).into_iter().collect())
      .collect();

    let mut result: HashMap<String, f64> = HashMap::new();
    if let Some((first, rest)) = operands.split_first() {
      'members: for (member, score) in first {
        let mut sum = *score;
        for other in rest {
          match other.get(member) {
            Some(s) => sum += s,
            None => continue 'members,
          }
        }
        result.insert(member.clone(), sum);
      }
    }

    let cardinality = result.len() as u64;
    if result.is_empty() {
      state.zsets.remove(dst);
    } else {
      state.zsets.insert(dst.to_string(), result);
    }
    // The destination is a sorted set now; drop any plain set shadow.
    state.sets.remove(dst);
    Ok(cardinality)
  }

  async fn exec(&self, batch: Batch) -> Result<()> {
    let mut state = self.lock();
    for op in batch.into_ops() {
      state.apply(op);
    }
    Ok(())
  }

  async fn search(
    &self,
    index: &str,
    query: &str,
    with_content: bool,
  ) -> Result<Vec<SearchHit>> {
    let state = self.lock();
    let def = state
      .indexes
      .get(index)
      .ok_or_else(|| Error::kv(std::io::Error::other("no such index")))?;

    let docs = state.indexed_docs(def);
    let matched: Vec<(String, HashMap<String, String>)> =
      if let Some(conditions) = parse_condition_query(query) {
        docs
          .into_iter()
          .filter(|(_, doc)| {
            conditions.iter().all(|(col, val)| {
              def.fields.iter().any(|f| &f.name == col)
                && doc.get(col).is_some_and(|v| v == val)
            })
          })
          .collect()
      } else {
        let term = query.trim_matches('"').to_lowercase();
        docs
          .into_iter()
          .filter(|(_, doc)| {
            def.fields.iter().any(|field| {
              doc
                .get(&field.name)
                .is_some_and(|v| v.to_lowercase().contains(&term))
            })
          })
          .collect()
      };

    Ok(
      matched
        .into_iter()
        .map(|(key, doc)| SearchHit {
          key,
          fields: if with_content { doc } else { HashMap::new() },
        })
        .collect(),
    )
  }

  async fn aggregate(
    &self,
    index: &str,
    group_by: &[String],
    operation: &str,
    column: Option<&str>,
    alias: &str,
  ) -> Result<Vec<Record>> {
    let state = self.lock();
    let def = state
      .indexes
      .get(index)
      .ok_or_else(|| Error::kv(std::io::Error::other("no such index")))?;

    let mut groups: HashMap<Vec<String>, Vec<HashMap<String, String>>> =
      HashMap::new();
    for (_, doc) in state.indexed_docs(def) {
      let group: Vec<String> = group_by
        .iter()
        .map(|col| doc.get(col).cloned().unwrap_or_default())
        .collect();
      groups.entry(group).or_default().push(doc);
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (group, docs) in groups {
      let values: Vec<f64> = column
        .map(|col| {
          docs
            .iter()
            .filter_map(|doc| doc.get(col))
            .filter_map(|v| v.parse::<f64>().ok())
            .collect()
        })
        .unwrap_or_default();

      let reduced = match operation {
        "count" => docs.len() as f64,
        "sum" => values.iter().sum(),
        "avg" if !values.is_empty() => {
          values.iter().sum::<f64>() / values.len() as f64
        }
        "min" => values.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "avg" => 0.0,
        other => {
          return Err(Error::BadRequest(format!(
            "unknown aggregation operation {other}"
          )));
        }
      };

      let mut row = Record::new();
      for (col, val) in group_by.iter().zip(group) {
        row.insert(col.clone(), val);
      }
      row.insert(alias.to_string(), format_number(reduced));
      rows.push(row);
    }

    rows.sort_by(|a, b| {
      group_by
        .iter()
        .map(|col| (a.get(col), b.get(col)))
        .find(|(x, y)| x != y)
        .map(|(x, y)| x.cmp(&y))
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
  }
}

/// Parse a `@col:val@col:val` conjunction; `None` for free-text queries.
fn parse_condition_query(query: &str) -> Option<Vec<(String, String)>> {
  if !query.starts_with('@') {
    return None;
  }
  let mut conditions = Vec::new();
  for clause in query.split('@').skip(1) {
    let (col, val) = clause.split_once(':')?;
    conditions.push((col.to_string(), val.to_string()));
  }
  Some(conditions)
}
