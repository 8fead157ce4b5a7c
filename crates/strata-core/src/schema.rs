//! Table schemas — the write-once description of a table's columns.
//!
//! A schema is immutable once created. The constructor enforces the
//! column invariants, and deserialization routes through it, so an
//! invalid schema is unrepresentable.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The declared type of a column's values.
///
/// Values are stored as strings either way; the datatype governs which
/// columns may be sortable and how the search index types its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
  Int,
  Float,
  String,
  Bool,
}

impl DataType {
  /// Whether values of this type can back a sortable score set.
  pub fn numeric(self) -> bool {
    matches!(self, DataType::Int | DataType::Float)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
  pub name:       String,
  pub datatype:   DataType,
  #[serde(default)]
  pub filterable: bool,
  #[serde(default)]
  pub sortable:   bool,
  /// If true, the column is part of the search index's schema and
  /// full-text / condition searches will cover it.
  #[serde(default)]
  pub searchable: bool,
}

/// A validated table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct Schema {
  name:    String,
  columns: Vec<Column>,
}

/// Wire form of [`Schema`], prior to validation.
#[derive(Deserialize)]
struct RawSchema {
  name:    String,
  columns: Vec<Column>,
}

impl TryFrom<RawSchema> for Schema {
  type Error = Error;

  fn try_from(raw: RawSchema) -> Result<Self> {
    Schema::new(raw.name, raw.columns)
  }
}

impl Schema {
  /// Build a schema, enforcing the column invariants:
  /// names are non-empty, and `sortable` columns are filterable and of a
  /// numeric datatype.
  pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
    let name = name.into();
    if name.is_empty() {
      return Err(Error::bad_request("schema name must not be empty"));
    }
    for c in &columns {
      if c.name.is_empty() {
        return Err(Error::bad_request("column name must not be empty"));
      }
      if c.sortable {
        if !c.filterable {
          return Err(Error::BadRequest(format!(
            "invalid schema: {} is sortable but not filterable",
            c.name
          )));
        }
        if !c.datatype.numeric() {
          return Err(Error::BadRequest(format!(
            "invalid schema: {} datatype is not sortable",
            c.name
          )));
        }
      }
    }
    Ok(Self { name, columns })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn columns(&self) -> &[Column] {
    &self.columns
  }

  /// Look up a column by name.
  pub fn column(&self, name: &str) -> Option<&Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  /// Whether `col` is filterable. Errors if the column does not exist.
  pub fn is_filterable(&self, col: &str) -> Result<bool> {
    self
      .column(col)
      .map(|c| c.filterable)
      .ok_or_else(|| unknown_column(col))
  }

  /// Whether `col` is sortable. Errors if the column does not exist.
  pub fn is_sortable(&self, col: &str) -> Result<bool> {
    self
      .column(col)
      .map(|c| c.sortable)
      .ok_or_else(|| unknown_column(col))
  }

  /// Columns included in the search index.
  pub fn searchable_columns(&self) -> impl Iterator<Item = &Column> {
    self.columns.iter().filter(|c| c.searchable)
  }
}

fn unknown_column(col: &str) -> Error {
  Error::BadRequest(format!("column {col} not found in schema"))
}
