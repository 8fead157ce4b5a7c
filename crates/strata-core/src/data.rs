//! Request and response shapes for data reads, aggregation, and
//! record-level operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A materialized record: column name → string value.
pub type Record = HashMap<String, String>;

/// Paging metadata for a data read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
  /// Records on this page.
  pub count:  usize,
  pub offset: i64,
  pub limit:  i64,
  /// Cardinality of the full (unpaged) result.
  pub total:  usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
  pub result_set: ResultSet,
}

/// The result of a data read: one page of records plus paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPage {
  pub records:  Vec<Record>,
  pub metadata: Metadata,
}

/// A group-by aggregation over the search index.
///
/// `operation` is passed through to the index's reducer (`count`, `sum`,
/// `avg`, `min`, `max`, ...); `count` ignores `column`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggRequest {
  pub operation: String,
  pub column:    String,
  #[serde(rename = "group_by")]
  pub group_by:  Vec<String>,
}

/// One conjunct of a record-level condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
  pub column: String,
  pub value:  String,
}

/// One column change of a record-level update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
  pub column: String,
  pub value:  String,
}
