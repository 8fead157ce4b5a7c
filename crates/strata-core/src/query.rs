//! Query types — filters, paging, and update sets.
//!
//! The wire shape of a filter is `{"col": ..., "op": ..., "val": [...]}`;
//! internally the operator is a tagged variant so range operators cannot
//! carry the wrong number of values.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result, schema::Schema};

// ─── Filter operator ─────────────────────────────────────────────────────────

/// A filter operator together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
  /// Match any of the given values.
  Eq(Vec<String>),
  Gt(String),
  Lt(String),
  Gte(String),
  Lte(String),
}

impl FilterOp {
  /// The operand values, in wire order.
  pub fn values(&self) -> &[String] {
    match self {
      FilterOp::Eq(vals) => vals,
      FilterOp::Gt(v)
      | FilterOp::Lt(v)
      | FilterOp::Gte(v)
      | FilterOp::Lte(v) => std::slice::from_ref(v),
    }
  }

  fn keyword(&self) -> &'static str {
    match self {
      FilterOp::Eq(_) => "eq",
      FilterOp::Gt(_) => "gt",
      FilterOp::Lt(_) => "lt",
      FilterOp::Gte(_) => "gte",
      FilterOp::Lte(_) => "lte",
    }
  }
}

/// A single column filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub col: String,
  pub op:  FilterOp,
}

/// Wire form of [`Filter`].
#[derive(Serialize, Deserialize)]
struct RawFilter {
  col: String,
  #[serde(default)]
  op:  String,
  #[serde(default)]
  val: Vec<String>,
}

impl TryFrom<RawFilter> for Filter {
  type Error = Error;

  fn try_from(raw: RawFilter) -> Result<Self> {
    let op = match raw.op.to_lowercase().as_str() {
      "" | "eq" => FilterOp::Eq(raw.val),
      keyword @ ("gt" | "lt" | "gte" | "lte") => {
        let [val] = <[String; 1]>::try_from(raw.val).map_err(|_| {
          Error::bad_request("gt and lt ops must have only 1 val")
        })?;
        match keyword {
          "gt" => FilterOp::Gt(val),
          "lt" => FilterOp::Lt(val),
          "gte" => FilterOp::Gte(val),
          _ => FilterOp::Lte(val),
        }
      }
      _ => return Err(Error::bad_request("op is not a correct keyword")),
    };
    Ok(Filter { col: raw.col, op })
  }
}

impl<'de> Deserialize<'de> for Filter {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    let raw = RawFilter::deserialize(de)?;
    Filter::try_from(raw).map_err(serde::de::Error::custom)
  }
}

impl Serialize for Filter {
  fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
    RawFilter {
      col: self.col.clone(),
      op:  self.op.keyword().to_string(),
      val: self.op.values().to_vec(),
    }
    .serialize(ser)
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// A filtered, paginated read (or, with `updates`, a bulk update).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
  #[serde(default)]
  pub filters:     Vec<Filter>,
  /// Free-text search over searchable columns, intersected with the
  /// filter result.
  #[serde(default, rename = "searchTerm")]
  pub search_term: Option<String>,
  /// `-1` (or `0`) means unlimited.
  #[serde(default = "default_limit")]
  pub limit:       i64,
  #[serde(default)]
  pub offset:      i64,
  /// Column → new value, for bulk updates.
  #[serde(default)]
  pub updates:     HashMap<String, String>,
}

fn default_limit() -> i64 {
  -1
}

impl Default for Query {
  fn default() -> Self {
    Self {
      filters:     Vec::new(),
      search_term: None,
      limit:       default_limit(),
      offset:      0,
      updates:     HashMap::new(),
    }
  }
}

impl Query {
  /// Validate paging bounds and every filter against `schema`.
  ///
  /// Filter columns must exist; range operators additionally require a
  /// sortable column and a numeric operand. Nothing is mutated on error.
  pub fn validate(&self, schema: &Schema) -> Result<()> {
    if self.limit < -1 {
      return Err(Error::bad_request("invalid limit"));
    }
    if self.offset < 0 {
      return Err(Error::bad_request("invalid offset"));
    }
    for f in &self.filters {
      let sortable = schema.is_sortable(&f.col)?;
      if let FilterOp::Eq(_) = f.op {
        continue;
      }
      if !sortable {
        return Err(Error::BadRequest(format!(
          "can't perform gt or lt on non-sortable column {}",
          f.col
        )));
      }
      parse_score(&f.op.values()[0])?;
    }
    Ok(())
  }

  /// Validate the update map: every target column must exist in `schema`
  /// and the map must not be empty.
  pub fn validate_updates(&self, schema: &Schema) -> Result<()> {
    if self.updates.is_empty() {
      return Err(Error::bad_request("no values provided to update"));
    }
    for col in self.updates.keys() {
      if schema.column(col).is_none() {
        return Err(Error::BadRequest(format!("column {col} not found")));
      }
    }
    Ok(())
  }
}

/// Parse a filter or sortable-column value as a score.
pub fn parse_score(val: &str) -> Result<f64> {
  val
    .parse::<f64>()
    .map_err(|_| Error::BadRequest(format!("value {val} is not numeric")))
}
