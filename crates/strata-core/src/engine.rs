//! The KV engine contract.
//!
//! The trait is implemented by storage backends (e.g. the Redis driver in
//! `strata-store`). The storage core depends on this abstraction, not on
//! any concrete engine, and tests run against an in-process
//! implementation.
//!
//! All methods return `Send` futures so the trait can be used from
//! multi-threaded async runtimes (tokio with axum, spawned worker tasks).

use std::{collections::HashMap, future::Future};

use crate::{Result, data::Record};

// ─── Score ranges ────────────────────────────────────────────────────────────

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
  NegInf,
  PosInf,
  /// Inclusive bound.
  Incl(f64),
  /// Exclusive bound.
  Excl(f64),
}

impl ScoreBound {
  /// Whether `score` is on the admitted side of this bound when used as a
  /// minimum.
  pub fn admits_from_below(self, score: f64) -> bool {
    match self {
      ScoreBound::NegInf => true,
      ScoreBound::PosInf => false,
      ScoreBound::Incl(v) => score >= v,
      ScoreBound::Excl(v) => score > v,
    }
  }

  /// Whether `score` is on the admitted side of this bound when used as a
  /// maximum.
  pub fn admits_from_above(self, score: f64) -> bool {
    match self {
      ScoreBound::NegInf => false,
      ScoreBound::PosInf => true,
      ScoreBound::Incl(v) => score <= v,
      ScoreBound::Excl(v) => score < v,
    }
  }
}

/// A `[min, max]` score window for ranged sorted-set reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
  pub min: ScoreBound,
  pub max: ScoreBound,
}

impl ScoreRange {
  pub fn contains(&self, score: f64) -> bool {
    self.min.admits_from_below(score) && self.max.admits_from_above(score)
  }
}

// ─── Batched writes ──────────────────────────────────────────────────────────

/// A typed field of a search index schema.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
  pub name:     String,
  /// `NUMERIC` rather than `TEXT`.
  pub numeric:  bool,
  pub sortable: bool,
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
  Set { key: String, value: String },
  SAdd { key: String, member: String },
  SRem { key: String, member: String },
  HSet { key: String, fields: Vec<(String, String)> },
  HDel { key: String, fields: Vec<String> },
  ZAdd { key: String, member: String, score: f64 },
  ZRem { key: String, member: String },
  CreateSearchIndex { index: String, prefix: String, fields: Vec<IndexField> },
}

/// An ordered list of writes executed as one transactional pipeline:
/// either every operation applies, or none do.
#[derive(Debug, Clone, Default)]
pub struct Batch {
  ops: Vec<BatchOp>,
}

impl Batch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, op: BatchOp) {
    self.ops.push(op);
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn ops(&self) -> &[BatchOp] {
    &self.ops
  }

  pub fn into_ops(self) -> Vec<BatchOp> {
    self.ops
  }
}

// ─── Search facility ─────────────────────────────────────────────────────────

/// One hit from the search facility.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
  /// The record key backing the indexed document.
  pub key:    String,
  /// The document's fields; empty for content-less searches.
  pub fields: Record,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the KV engine the storage core runs on.
///
/// Engines are cheap to clone (a shared connection handle) so worker
/// tasks can each own one.
pub trait KvEngine: Clone + Send + Sync + 'static {
  /// Liveness check.
  fn ping(&self) -> impl Future<Output = Result<()>> + Send + '_;

  /// Read a plain string key; `None` if absent.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>>> + Send + 'a;

  /// Read all fields of a hash; empty if absent.
  fn hgetall<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<HashMap<String, String>>> + Send + 'a;

  fn smembers<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  fn sismember<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool>> + Send + 'a;

  fn scard<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  fn zcard<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  /// Members of a sorted set by rank window, score order; `stop = -1`
  /// means the end of the set.
  fn zrange<'a>(
    &'a self,
    key: &'a str,
    start: i64,
    stop: i64,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  /// Members with scores, highest score first.
  fn zrevrange_withscores<'a>(
    &'a self,
    key: &'a str,
    start: i64,
    stop: i64,
  ) -> impl Future<Output = Result<Vec<(String, f64)>>> + Send + 'a;

  /// Members whose score falls inside `range`, ascending.
  fn zrangebyscore<'a>(
    &'a self,
    key: &'a str,
    range: ScoreRange,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  /// Add members to a set, returning the new cardinality.
  fn sadd<'a>(
    &'a self,
    key: &'a str,
    members: &'a [String],
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  /// Store the union of `src` sets at `dst`, returning its cardinality.
  fn sunionstore<'a>(
    &'a self,
    dst: &'a str,
    src: &'a [String],
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  /// Store the intersection of `src` sets at `dst`, returning its
  /// cardinality.
  fn sinterstore<'a>(
    &'a self,
    dst: &'a str,
    src: &'a [String],
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  /// Store the sorted intersection of `src` keys (sets score 1, sorted
  /// sets their own scores, summed) at `dst`.
  fn zinterstore<'a>(
    &'a self,
    dst: &'a str,
    src: &'a [String],
  ) -> impl Future<Output = Result<u64>> + Send + 'a;

  /// Execute `batch` as one atomic pipeline.
  fn exec(&self, batch: Batch) -> impl Future<Output = Result<()>> + Send + '_;

  /// Run a query against a search index.
  ///
  /// `query` is either a quoted free-text term or a conjunction of
  /// `@column:value` clauses. With `with_content` the hits carry the
  /// full documents.
  fn search<'a>(
    &'a self,
    index: &'a str,
    query: &'a str,
    with_content: bool,
  ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send + 'a;

  /// Group-by aggregation over a search index. Returns one row per
  /// group: the group columns plus `alias` → reduced value.
  fn aggregate<'a>(
    &'a self,
    index: &'a str,
    group_by: &'a [String],
    operation: &'a str,
    column: Option<&'a str>,
    alias: &'a str,
  ) -> impl Future<Output = Result<Vec<Record>>> + Send + 'a;
}
