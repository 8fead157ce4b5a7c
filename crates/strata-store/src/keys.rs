//! Deterministic naming of every derived key.
//!
//! The same table name at two different versions yields disjoint
//! record/filter/sortable keyspaces. These formats are part of the
//! persisted layout; changing them orphans existing datasets.

/// Key for the set of all schema keys.
pub fn all_schemas(prefix: &str) -> String {
  format!("{prefix}:schemas")
}

/// Key holding a table's schema JSON.
pub fn schema(prefix: &str, name: &str) -> String {
  format!("{prefix}:{name}:schema")
}

/// Key for a table's last-load hash.
pub fn last_load(prefix: &str, name: &str) -> String {
  format!("{prefix}:{name}:lastload")
}

/// Key namespace for one (table, version) pair.
#[derive(Debug, Clone)]
pub struct TableKeys {
  prefix:  String,
  table:   String,
  version: u64,
}

impl TableKeys {
  pub fn new(
    prefix: impl Into<String>,
    table: impl Into<String>,
    version: u64,
  ) -> Self {
    Self {
      prefix: prefix.into(),
      table: table.into(),
      version,
    }
  }

  fn base(&self) -> String {
    format!("{}:{}:{}", self.prefix, self.table, self.version)
  }

  /// Key of the record hash with sequence number `seq`.
  pub fn record(&self, seq: u64) -> String {
    format!("{}:{seq}", self.base())
  }

  /// Key of the ordered set of all record keys, scored by seq.
  pub fn all_records(&self) -> String {
    format!("{}:all", self.base())
  }

  /// Key of the filter set for one (column, value) pair.
  pub fn filter(&self, col: &str, val: &str) -> String {
    format!("{}:{col}:{val}", self.base())
  }

  /// Key of the sortable score set for a column. Members are filter
  /// keys, scored by the numeric value.
  pub fn sortable(&self, col: &str) -> String {
    format!("{}:{col}", self.base())
  }

  /// Name of the search index over this version's records.
  pub fn search_index(&self) -> String {
    self.base()
  }

  /// Key prefix the search index is bound to.
  pub fn search_index_prefix(&self) -> String {
    format!("{}:", self.base())
  }

  /// Ephemeral destination of a per-filter union store.
  pub fn union_store(&self, col: &str, vals: &[String], token: &str) -> String {
    let mut key = format!("{}:unionstore:{col}", self.base());
    for v in vals {
      key.push_str(&format!("_{v}_"));
    }
    key.push(':');
    key.push_str(token);
    key
  }

  /// Ephemeral destination of the intersection of union stores.
  pub fn inter_store(&self, union_keys: &[String], token: &str) -> String {
    let mut key = format!("{}:interstore:", self.base());
    for k in union_keys {
      key.push_str(&format!("_{k}_"));
    }
    key.push(':');
    key.push_str(token);
    key
  }

  /// Ephemeral set of record keys produced by a search.
  pub fn search_store(&self, term: &str, token: &str) -> String {
    format!("{}:searchstore:{term}:{token}", self.base())
  }
}
