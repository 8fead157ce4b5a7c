//! Query planning: translating a [`Query`] into set-store and
//! sorted-range commands that yield one final, seq-ordered key list.
//!
//! All ephemeral destinations carry a per-invocation token, so concurrent
//! planners never collide. The engine is free to reclaim them.

use strata_core::{
  Error, Result,
  data::{DataPage, Metadata, ResultSet},
  engine::{KvEngine, ScoreBound, ScoreRange},
  query::{Filter, FilterOp, Query, parse_score},
};
use uuid::Uuid;

use crate::store::{Table, TableStore};

impl<E: KvEngine> TableStore<E> {
  /// Run a validated, filtered, paginated read.
  pub async fn get_data(
    &self,
    table_name: &str,
    query: &Query,
  ) -> Result<DataPage> {
    let table = self.table(table_name).await?;
    query.validate(&table.schema)?;

    let (record_keys, result_set) = self.record_keys(&table, query).await?;
    let records = self.fetch_records(&table.schema, record_keys).await?;

    Ok(DataPage {
      records,
      metadata: Metadata { result_set },
    })
  }

  /// Plan `query` down to the requested page of record keys.
  pub(crate) async fn record_keys(
    &self,
    table: &Table,
    query: &Query,
  ) -> Result<(Vec<String>, ResultSet)> {
    let token = plan_token();

    let mut final_key = table.keys.all_records();
    if !query.filters.is_empty() {
      final_key =
        self.filtered_record_keys(table, &query.filters, &token).await?;
    }

    if let Some(term) = query.search_term.as_deref() {
      let search_key = self.search_record_keys(table, term, &token).await?;
      self
        .engine()
        .zinterstore(&search_key, &[final_key, search_key.clone()])
        .await?;
      final_key = search_key;
    }

    self.paged_record_keys(&final_key, query.limit, query.offset).await
  }

  /// Union each filter's source keys, intersect the unions, and order
  /// the intersection by seq via the all-records set.
  async fn filtered_record_keys(
    &self,
    table: &Table,
    filters: &[Filter],
    token: &str,
  ) -> Result<String> {
    let mut union_keys = Vec::with_capacity(filters.len());
    for filter in filters {
      union_keys.push(self.filter_union_key(table, filter, token).await?);
    }

    let inter_key = table.keys.inter_store(&union_keys, token);
    self.engine().sinterstore(&inter_key, &union_keys).await?;

    let final_key = format!("{inter_key}_final");
    self
      .engine()
      .zinterstore(&final_key, &[table.keys.all_records(), inter_key])
      .await?;
    Ok(final_key)
  }

  /// Resolve one filter to a stored union of record-key sets.
  ///
  /// Equality filters name their per-value filter sets directly; range
  /// filters read the matching filter keys out of the column's sortable
  /// score set first. An empty union fails the whole query.
  async fn filter_union_key(
    &self,
    table: &Table,
    filter: &Filter,
    token: &str,
  ) -> Result<String> {
    let dst = table.keys.union_store(&filter.col, filter.op.values(), token);

    let source_keys = match &filter.op {
      FilterOp::Eq(vals) => vals
        .iter()
        .map(|v| table.keys.filter(&filter.col, v))
        .collect(),
      op => {
        self
          .engine()
          .zrangebyscore(&table.keys.sortable(&filter.col), score_range(op)?)
          .await?
      }
    };

    let cardinality = self.engine().sunionstore(&dst, &source_keys).await?;
    if cardinality == 0 {
      return Err(Error::NotFound);
    }
    Ok(dst)
  }

  /// Page `key` (a seq-scored sorted set) and report paging metadata.
  /// `limit <= 0` means unlimited.
  pub(crate) async fn paged_record_keys(
    &self,
    key: &str,
    limit: i64,
    offset: i64,
  ) -> Result<(Vec<String>, ResultSet)> {
    let stop = if limit <= 0 { -1 } else { offset + limit - 1 };
    let record_keys = self.engine().zrange(key, offset, stop).await?;
    let total = self.engine().zcard(key).await? as usize;

    let result_set = ResultSet {
      count: record_keys.len(),
      offset,
      limit,
      total,
    };
    Ok((record_keys, result_set))
  }
}

/// A unique token for one planner invocation.
fn plan_token() -> String {
  Uuid::new_v4().simple().to_string()
}

/// The score window a range operator selects from a sortable score set.
fn score_range(op: &FilterOp) -> Result<ScoreRange> {
  let range = match op {
    FilterOp::Gt(v) => ScoreRange {
      min: ScoreBound::Excl(parse_score(v)?),
      max: ScoreBound::PosInf,
    },
    FilterOp::Gte(v) => ScoreRange {
      min: ScoreBound::Incl(parse_score(v)?),
      max: ScoreBound::PosInf,
    },
    FilterOp::Lt(v) => ScoreRange {
      min: ScoreBound::NegInf,
      max: ScoreBound::Excl(parse_score(v)?),
    },
    FilterOp::Lte(v) => ScoreRange {
      min: ScoreBound::NegInf,
      max: ScoreBound::Incl(parse_score(v)?),
    },
    FilterOp::Eq(_) => {
      return Err(Error::bad_request("eq filters take no score range"));
    }
  };
  Ok(range)
}
