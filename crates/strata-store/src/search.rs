//! Search/aggregate driver: translating structured requests into search
//! index operations and decoding their tabular responses.

use strata_core::{
  Error, Result,
  data::{AggRequest, Condition, Record},
  engine::{BatchOp, IndexField, KvEngine},
};

use crate::store::{Table, TableStore};

/// The index-create command appended to every load batch, covering the
/// table's searchable columns. `None` when nothing is searchable.
pub(crate) fn index_create_op(table: &Table) -> Option<BatchOp> {
  let fields: Vec<IndexField> = table
    .schema
    .searchable_columns()
    .map(|col| IndexField {
      name:     col.name.clone(),
      numeric:  col.datatype.numeric(),
      sortable: col.sortable,
    })
    .collect();

  if fields.is_empty() {
    return None;
  }
  Some(BatchOp::CreateSearchIndex {
    index:  table.keys.search_index(),
    prefix: table.keys.search_index_prefix(),
    fields,
  })
}

/// Compile a conjunction of conditions into the index's query syntax.
pub(crate) fn conditions_query(conditions: &[Condition]) -> String {
  let mut query = String::new();
  for condition in conditions {
    query.push_str(&format!("@{}:{}", condition.column, condition.value));
  }
  query
}

impl<E: KvEngine> TableStore<E> {
  /// Run a full-text search and park the matching record keys in an
  /// ephemeral search-store set the planner can intersect with.
  pub(crate) async fn search_record_keys(
    &self,
    table: &Table,
    term: &str,
    token: &str,
  ) -> Result<String> {
    let quoted = format!("\"{term}\"");
    let hits = self
      .engine()
      .search(&table.keys.search_index(), &quoted, false)
      .await?;
    if hits.is_empty() {
      return Err(Error::NotFound);
    }

    let members: Vec<String> = hits.into_iter().map(|hit| hit.key).collect();
    let store_key = table.keys.search_store(term, token);
    self.engine().sadd(&store_key, &members).await?;
    Ok(store_key)
  }

  /// Group-by aggregation over the search index.
  ///
  /// Returns one row per group: the group columns plus
  /// `{operation}_result`. `count` ignores the column argument.
  pub async fn aggregate(
    &self,
    table_name: &str,
    request: &AggRequest,
  ) -> Result<Vec<Record>> {
    let table = self.table(table_name).await?;

    let operation = request.operation.to_lowercase();
    if operation.is_empty() {
      return Err(Error::bad_request("no aggregation operation provided"));
    }
    for col in &request.group_by {
      if table.schema.column(col).is_none() {
        return Err(Error::BadRequest(format!("column {col} not in schema")));
      }
    }

    let column = if operation == "count" {
      None
    } else {
      if table.schema.column(&request.column).is_none() {
        return Err(Error::BadRequest(format!(
          "column {} not in schema",
          request.column
        )));
      }
      Some(request.column.as_str())
    };

    let alias = format!("{operation}_result");
    self
      .engine()
      .aggregate(
        &table.keys.search_index(),
        &request.group_by,
        &operation,
        column,
        &alias,
      )
      .await
  }
}
