//! Integration tests for the storage core against the in-process engine.

use std::collections::HashMap;

use strata_core::{
  Error,
  data::{AggRequest, Change, Condition, Record},
  engine::{Batch, BatchOp, KvEngine},
  load::{Load, LoadStatus},
  query::{Filter, FilterOp, Query},
  schema::{Column, DataType, Schema},
};

use crate::{TableStore, engine::MemoryKv, keys};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// 24 companies across three regions. Distributions are pinned by the
/// paging/filter tests below; edit with care.
const COMPANIES_CSV: &str = "\
col2_string,col1_int,col3_string,col4_int,ea_number,tokens_allocated
company1,846039907,AMER,0.0,111736949,0.0
company2,203991583,AMER,100.0,120049817,100.0
company3,770399021,EMEA,0.0,129556283,0.0
company4,318402817,APAC,50.0,137029811,50.0
company5,559841724,APAC,100.0,144208100,100.0
company6,662918374,AMER,1000.0,152330756,1000.0
company7,410273985,AMER,100.0,160114902,100.0
company8,935108244,EMEA,20000.0,168092265,20000.0
company9,281937465,AMER,0.0,175881436,0.0
company5,728456193,APAC,2000.0,183207559,2000.0
company10,604381927,AMER,100.0,191554873,100.0
company11,457091836,AMER,25000.0,199038412,25000.0
company12,111155042,AMER,0.0,207716645,0.0
company13,830264179,EMEA,31000.0,215902734,31000.0
company14,392817465,EMEA,100.0,224187956,100.0
company15,518604923,APAC,48000.0,232449801,48000.0
company16,674092381,AMER,50000.0,240534072,50000.0
company17,201948376,EMEA,500.0,248761594,500.0
company18,112539291,EMEA,396000.0,256092387,396000.0
company19,845210936,EMEA,100.0,264378051,100.0
company20,367491820,EMEA,0.0,272804196,0.0
company21,590284167,AMER,100.0,280951342,100.0
company22,438160759,APAC,75000.0,289137460,75000.0
company23,114175679,AMER,13100.0,297310568,13100.0
";

fn column(
  name: &str,
  datatype: DataType,
  filterable: bool,
  sortable: bool,
  searchable: bool,
) -> Column {
  Column {
    name: name.to_string(),
    datatype,
    filterable,
    sortable,
    searchable,
  }
}

fn companies_schema() -> Schema {
  Schema::new("table1", vec![
    column("col1_int", DataType::Int, true, false, false),
    column("col2_string", DataType::String, true, false, true),
    column("col3_string", DataType::String, true, false, true),
    column("col4_int", DataType::Float, true, true, true),
    column("ea_number", DataType::Int, true, false, false),
    column("tokens_allocated", DataType::Float, true, true, false),
  ])
  .unwrap()
}

fn store() -> TableStore<MemoryKv> {
  TableStore::new(MemoryKv::new(), "rdb")
}

/// A store with the companies schema added and the fixture loaded once.
async fn loaded_store() -> TableStore<MemoryKv> {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();
  s.bulk_load("table1", COMPANIES_CSV.as_bytes(), "csv")
    .await
    .unwrap();
  s
}

fn eq(col: &str, vals: &[&str]) -> Filter {
  Filter {
    col: col.to_string(),
    op:  FilterOp::Eq(vals.iter().map(|v| v.to_string()).collect()),
  }
}

fn filter(col: &str, op: FilterOp) -> Filter {
  Filter { col: col.to_string(), op }
}

fn query(filters: Vec<Filter>) -> Query {
  Query { filters, ..Default::default() }
}

fn record(pairs: &[(&str, &str)]) -> Record {
  pairs
    .iter()
    .map(|(col, val)| (col.to_string(), val.to_string()))
    .collect()
}

// ─── Schema registry ─────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_schema() {
  let s = store();
  let schema = companies_schema();
  s.add_schema(&schema).await.unwrap();

  assert_eq!(s.get_schema("table1").await.unwrap(), schema);

  // The schema key is registered in the all-schemas set.
  let registered = s
    .engine()
    .sismember(&keys::all_schemas("rdb"), &keys::schema("rdb", "table1"))
    .await
    .unwrap();
  assert!(registered);
}

#[tokio::test]
async fn add_schema_twice_is_immutable() {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();

  // Identical content makes no difference: still rejected.
  let err = s.add_schema(&companies_schema()).await.unwrap_err();
  assert!(matches!(err, Error::Immutable));
}

#[tokio::test]
async fn get_schema_missing_and_empty() {
  let s = store();
  assert!(matches!(
    s.get_schema("missing_table").await.unwrap_err(),
    Error::NotFound
  ));
  assert!(matches!(
    s.get_schema("").await.unwrap_err(),
    Error::EmptyKey
  ));
}

#[tokio::test]
async fn list_schemas_returns_all() {
  let s = store();
  assert!(s.list_schemas().await.unwrap().is_empty());

  let other = Schema::new("table2", vec![
    column("col1", DataType::String, false, false, false),
    column("col2", DataType::Int, true, true, false),
  ])
  .unwrap();
  s.add_schema(&companies_schema()).await.unwrap();
  s.add_schema(&other).await.unwrap();

  let schemas = s.list_schemas().await.unwrap();
  assert_eq!(schemas.len(), 2);
  let mut names: Vec<&str> = schemas.iter().map(|sch| sch.name()).collect();
  names.sort();
  assert_eq!(names, ["table1", "table2"]);
}

// ─── Load controller ─────────────────────────────────────────────────────────

#[tokio::test]
async fn last_load_missing_is_not_found() {
  let s = store();
  assert!(matches!(
    s.last_load("table1").await.unwrap_err(),
    Error::NotFound
  ));
}

#[tokio::test]
async fn last_load_roundtrip() {
  let s = store();
  let load = Load {
    version:    3,
    status:     LoadStatus::Failed,
    start_time: "2026-03-01T10:00:00Z".to_string(),
    end_time:   "2026-03-01T10:00:09Z".to_string(),
  };
  s.write_last_load("table1", &load).await.unwrap();
  assert_eq!(s.last_load("table1").await.unwrap(), load);
}

#[tokio::test]
async fn bulk_load_writes_records_and_indexes() {
  let s = loaded_store().await;

  let load = s.last_load("table1").await.unwrap();
  assert_eq!(load.status, LoadStatus::Success);
  assert_eq!(load.version, 0);
  assert!(!load.end_time.is_empty());

  let table_keys = keys::TableKeys::new("rdb", "table1", 0);

  // Spot-check record hashes.
  let rec0 = s.engine().hgetall(&table_keys.record(0)).await.unwrap();
  assert_eq!(
    rec0,
    record(&[
      ("col2_string", "company1"),
      ("col1_int", "846039907"),
      ("col3_string", "AMER"),
      ("col4_int", "0.0"),
      ("ea_number", "111736949"),
      ("tokens_allocated", "0.0"),
    ])
  );
  let rec18 = s.engine().hgetall(&table_keys.record(18)).await.unwrap();
  assert_eq!(rec18["col2_string"], "company18");
  assert_eq!(rec18["col4_int"], "396000.0");
  let rec23 = s.engine().hgetall(&table_keys.record(23)).await.unwrap();
  assert_eq!(rec23["col2_string"], "company23");

  // Filter sets.
  let amer = s
    .engine()
    .scard(&table_keys.filter("col3_string", "AMER"))
    .await
    .unwrap();
  assert_eq!(amer, 11);
  let member = s
    .engine()
    .sismember(
      &table_keys.filter("col3_string", "EMEA"),
      &table_keys.record(19),
    )
    .await
    .unwrap();
  assert!(member);

  // All-records set cardinality matches the row count.
  assert_eq!(
    s.engine().zcard(&table_keys.all_records()).await.unwrap(),
    24
  );
}

#[tokio::test]
async fn bulk_load_bumps_version() {
  let s = loaded_store().await;
  s.bulk_load("table1", COMPANIES_CSV.as_bytes(), "csv")
    .await
    .unwrap();

  let load = s.last_load("table1").await.unwrap();
  assert_eq!(load.version, 1);
  assert_eq!(load.status, LoadStatus::Success);

  // The new version has its own keyspace, fully populated.
  let v1 = keys::TableKeys::new("rdb", "table1", 1);
  assert_eq!(s.engine().zcard(&v1.all_records()).await.unwrap(), 24);
}

#[tokio::test]
async fn bulk_load_requires_schema() {
  let s = store();
  let err = s
    .bulk_load("table1", COMPANIES_CSV.as_bytes(), "csv")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn bulk_load_rejects_unknown_format() {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();
  let err = s
    .bulk_load("table1", COMPANIES_CSV.as_bytes(), "cs")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
  assert_eq!(
    s.last_load("table1").await.unwrap().status,
    LoadStatus::Failed
  );
}

#[tokio::test]
async fn bulk_load_rejects_empty_csv() {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();
  let err = s.bulk_load("table1", b"", "csv").await.unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn bulk_load_unknown_header_column_leaves_no_partial_writes() {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();

  let csv = "col2_string,bogus\ncompany1,x\n";
  let err = s.bulk_load("table1", csv.as_bytes(), "csv").await.unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));

  let load = s.last_load("table1").await.unwrap();
  assert_eq!(load.status, LoadStatus::Failed);

  let table_keys = keys::TableKeys::new("rdb", "table1", 0);
  assert_eq!(s.engine().zcard(&table_keys.all_records()).await.unwrap(), 0);
}

#[tokio::test]
async fn bulk_load_rejects_non_numeric_sortable_value() {
  let s = store();
  s.add_schema(&companies_schema()).await.unwrap();

  let csv = "col2_string,col4_int\ncompany1,not-a-number\n";
  let err = s.bulk_load("table1", csv.as_bytes(), "csv").await.unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
  assert_eq!(
    s.last_load("table1").await.unwrap().status,
    LoadStatus::Failed
  );
}

#[tokio::test]
async fn bulk_load_busy_while_running() {
  let s = loaded_store().await;

  let mut running = s.last_load("table1").await.unwrap();
  running.status = LoadStatus::Running;
  s.write_last_load("table1", &running).await.unwrap();

  let err = s
    .bulk_load("table1", COMPANIES_CSV.as_bytes(), "csv")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Busy));
}

// ─── Filtered reads ──────────────────────────────────────────────────────────

#[tokio::test]
async fn get_all_data_in_seq_order() {
  let s = loaded_store().await;
  let page = s.get_data("table1", &Query::default()).await.unwrap();

  assert_eq!(page.records.len(), 24);
  assert_eq!(page.records[5]["col2_string"], "company6");
  assert_eq!(page.records[12]["col2_string"], "company12");
  assert_eq!(page.records[23]["col2_string"], "company23");

  assert_eq!(page.metadata.result_set.count, 24);
  assert_eq!(page.metadata.result_set.total, 24);
}

#[tokio::test]
async fn eq_filters_union_and_intersect() {
  let s = loaded_store().await;

  let page = s
    .get_data("table1", &query(vec![eq("col3_string", &["AMER"])]))
    .await
    .unwrap();
  assert_eq!(page.records.len(), 11);

  let page = s
    .get_data("table1", &query(vec![eq("col3_string", &["AMER", "EMEA"])]))
    .await
    .unwrap();
  assert_eq!(page.records.len(), 19);

  let page = s
    .get_data(
      "table1",
      &query(vec![
        eq("col3_string", &["AMER", "EMEA"]),
        eq("col4_int", &["0.0"]),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 5);

  let page = s
    .get_data(
      "table1",
      &query(vec![
        eq("col3_string", &["APAC", "EMEA"]),
        eq("col4_int", &["0.0", "100.0"]),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 5);
}

#[tokio::test]
async fn range_filters_over_sortable_column() {
  let s = loaded_store().await;

  let cases = [
    (FilterOp::Lte("100.0".to_string()), 13),
    (FilterOp::Lt("100.0".to_string()), 6),
    (FilterOp::Gt("100.0".to_string()), 11),
    (FilterOp::Gte("100.0".to_string()), 18),
  ];
  for (op, expected) in cases {
    let page = s
      .get_data("table1", &query(vec![filter("col4_int", op.clone())]))
      .await
      .unwrap();
    assert_eq!(page.records.len(), expected, "op {op:?}");
  }

  // Two range filters on the same column.
  let page = s
    .get_data(
      "table1",
      &query(vec![
        filter("col4_int", FilterOp::Gte("100.0".to_string())),
        filter("col4_int", FilterOp::Lt("20000.0".to_string())),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 11);

  // Plus an equality filter.
  let page = s
    .get_data(
      "table1",
      &query(vec![
        filter("col4_int", FilterOp::Gte("100.0".to_string())),
        filter("col4_int", FilterOp::Lt("20000.0".to_string())),
        eq("col2_string", &["company17"]),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 1);
  assert_eq!(page.records[0]["col2_string"], "company17");
}

#[tokio::test]
async fn filter_with_no_matches_is_not_found() {
  let s = loaded_store().await;
  let err = s
    .get_data("table1", &query(vec![eq("col3_string", &["blah"])]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn invalid_filters_are_rejected() {
  let s = loaded_store().await;

  // Unknown column.
  let err = s
    .get_data("table1", &query(vec![eq("blah", &["blah"])]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));

  // Range op on a non-sortable column.
  let err = s
    .get_data(
      "table1",
      &query(vec![filter(
        "col2_string",
        FilterOp::Lte("blah".to_string()),
      )]),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));

  // Non-numeric value on a sortable column.
  let err = s
    .get_data(
      "table1",
      &query(vec![filter(
        "tokens_allocated",
        FilterOp::Lte("blah".to_string()),
      )]),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn invalid_paging_is_rejected() {
  let s = loaded_store().await;

  let q = Query { limit: -2, ..Default::default() };
  assert!(matches!(
    s.get_data("table1", &q).await.unwrap_err(),
    Error::BadRequest(_)
  ));

  let q = Query { offset: -1, ..Default::default() };
  assert!(matches!(
    s.get_data("table1", &q).await.unwrap_err(),
    Error::BadRequest(_)
  ));
}

// ─── Paging ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn paging_windows_preserve_seq_order() {
  let s = loaded_store().await;

  let q = Query { limit: 10, ..Default::default() };
  let page = s.get_data("table1", &q).await.unwrap();
  assert_eq!(page.records.len(), 10);
  assert_eq!(page.records[0]["col2_string"], "company1");
  assert_eq!(page.records[5]["col2_string"], "company6");
  assert_eq!(page.records[9]["col2_string"], "company5");
  assert_eq!(page.metadata.result_set.total, 24);

  let q = Query { limit: 0, offset: 10, ..Default::default() };
  let page = s.get_data("table1", &q).await.unwrap();
  assert_eq!(page.records.len(), 14);
  assert_eq!(page.records[0]["col2_string"], "company10");
  assert_eq!(page.records[8]["col2_string"], "company18");

  let q = Query { limit: 7, offset: 4, ..Default::default() };
  let page = s.get_data("table1", &q).await.unwrap();
  assert_eq!(page.records.len(), 7);
  assert_eq!(page.records[0]["col2_string"], "company5");
  assert_eq!(page.records[3]["col2_string"], "company8");

  // Window running past the last record.
  let q = Query { limit: 10, offset: 23, ..Default::default() };
  let page = s.get_data("table1", &q).await.unwrap();
  assert_eq!(page.records.len(), 1);
  assert_eq!(page.records[0]["col2_string"], "company23");
}

#[tokio::test]
async fn consecutive_pages_concatenate_to_full_result() {
  let s = loaded_store().await;
  let full = s.get_data("table1", &Query::default()).await.unwrap();

  let mut stitched = Vec::new();
  for offset in (0..24).step_by(7) {
    let q = Query { limit: 7, offset, ..Default::default() };
    stitched.extend(s.get_data("table1", &q).await.unwrap().records);
  }
  assert_eq!(stitched, full.records);
}

#[tokio::test]
async fn unlimited_limits_and_offset_past_end() {
  let s = loaded_store().await;

  for limit in [-1, 0] {
    let q = Query { limit, ..Default::default() };
    assert_eq!(s.get_data("table1", &q).await.unwrap().records.len(), 24);
  }

  let q = Query { offset: 24, ..Default::default() };
  let page = s.get_data("table1", &q).await.unwrap();
  assert!(page.records.is_empty());
  assert_eq!(page.metadata.result_set.count, 0);
  assert_eq!(page.metadata.result_set.total, 24);
}

// ─── Record conformance ──────────────────────────────────────────────────────

#[tokio::test]
async fn extra_record_column_fails_reads() {
  let s = loaded_store().await;
  let table_keys = keys::TableKeys::new("rdb", "table1", 0);

  let mut batch = Batch::new();
  batch.push(BatchOp::HSet {
    key:    table_keys.record(12),
    fields: vec![("bogus".to_string(), "x".to_string())],
  });
  s.engine().exec(batch).await.unwrap();

  let err = s.get_data("table1", &Query::default()).await.unwrap_err();
  assert!(matches!(err, Error::SchemaMismatch(_)));
}

#[tokio::test]
async fn missing_record_column_fails_reads() {
  let s = loaded_store().await;
  let table_keys = keys::TableKeys::new("rdb", "table1", 0);

  let mut batch = Batch::new();
  batch.push(BatchOp::HDel {
    key:    table_keys.record(12),
    fields: vec!["col2_string".to_string()],
  });
  s.engine().exec(batch).await.unwrap();

  let err = s.get_data("table1", &Query::default()).await.unwrap_err();
  assert!(matches!(err, Error::SchemaMismatch(_)));
}

// ─── Bulk updates ────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_all_records_moves_filter_sets() {
  let s = loaded_store().await;
  let table_keys = keys::TableKeys::new("rdb", "table1", 0);

  let q = Query {
    updates: HashMap::from([("ea_number".to_string(), "0".to_string())]),
    ..Default::default()
  };
  s.update_data("table1", &q).await.unwrap();

  let page = s
    .get_data("table1", &query(vec![eq("ea_number", &["0"])]))
    .await
    .unwrap();
  assert_eq!(page.records.len(), 24);

  // The old filter set is drained, the new one holds every record.
  assert_eq!(
    s.engine()
      .scard(&table_keys.filter("ea_number", "111736949"))
      .await
      .unwrap(),
    0
  );
  assert_eq!(
    s.engine()
      .scard(&table_keys.filter("ea_number", "0"))
      .await
      .unwrap(),
    24
  );
}

#[tokio::test]
async fn update_filtered_records_only() {
  let s = loaded_store().await;

  let q = Query {
    filters: vec![eq("tokens_allocated", &["100.0"])],
    updates: HashMap::from([("ea_number".to_string(), "0".to_string())]),
    ..Default::default()
  };
  s.update_data("table1", &q).await.unwrap();

  let page = s
    .get_data("table1", &query(vec![eq("ea_number", &["0"])]))
    .await
    .unwrap();
  assert_eq!(page.records.len(), 7);

  let table_keys = keys::TableKeys::new("rdb", "table1", 0);
  assert_eq!(
    s.engine()
      .scard(&table_keys.filter("ea_number", "0"))
      .await
      .unwrap(),
    7
  );
}

#[tokio::test]
async fn update_rescores_sortable_columns() {
  let s = loaded_store().await;

  // Move everything at tokens_allocated <= 100.0 down to -1.0.
  let q = Query {
    filters: vec![filter(
      "tokens_allocated",
      FilterOp::Lte("100.0".to_string()),
    )],
    updates: HashMap::from([
      ("ea_number".to_string(), "0".to_string()),
      ("tokens_allocated".to_string(), "-1.0".to_string()),
    ]),
    ..Default::default()
  };
  s.update_data("table1", &q).await.unwrap();

  let page = s
    .get_data(
      "table1",
      &query(vec![
        filter("tokens_allocated", FilterOp::Lt("0.0".to_string())),
        eq("ea_number", &["0"]),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 13);

  // Nothing is left in the old [0, 100] window; the stale filter keys
  // are empty sets, so the intersection is empty but not an error.
  let page = s
    .get_data(
      "table1",
      &query(vec![
        filter("tokens_allocated", FilterOp::Gte("0.0".to_string())),
        filter("tokens_allocated", FilterOp::Lte("100.0".to_string())),
      ]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 0);
}

#[tokio::test]
async fn update_validation_errors() {
  let s = loaded_store().await;

  let q = Query::default();
  assert!(matches!(
    s.update_data("table1", &q).await.unwrap_err(),
    Error::BadRequest(_)
  ));

  let q = Query {
    updates: HashMap::from([("bogus".to_string(), "0".to_string())]),
    ..Default::default()
  };
  assert!(matches!(
    s.update_data("table1", &q).await.unwrap_err(),
    Error::BadRequest(_)
  ));
}

// ─── Record-level operations via the search index ────────────────────────────

const ACCOUNTS_CSV: &str = "\
col2_string,col1_int,col3_string,col4_int
CIBC,300,EMEA,10
VMW,500,AMER,50
";

fn accounts_schema() -> Schema {
  Schema::new("accounts", vec![
    column("col1_int", DataType::String, false, false, true),
    column("col2_string", DataType::String, true, false, true),
    column("col3_string", DataType::String, true, false, true),
    column("col4_int", DataType::Float, true, true, true),
  ])
  .unwrap()
}

async fn accounts_store() -> TableStore<MemoryKv> {
  let s = store();
  s.add_schema(&accounts_schema()).await.unwrap();
  s.bulk_load("accounts", ACCOUNTS_CSV.as_bytes(), "csv")
    .await
    .unwrap();
  s
}

fn conditions(pairs: &[(&str, &str)]) -> Vec<Condition> {
  pairs
    .iter()
    .map(|(column, value)| Condition {
      column: column.to_string(),
      value:  value.to_string(),
    })
    .collect()
}

#[tokio::test]
async fn get_records_by_condition() {
  let s = accounts_store().await;

  let records = s
    .get_records("accounts", &conditions(&[("col3_string", "EMEA")]))
    .await
    .unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0]["col2_string"], "CIBC");
  assert_eq!(records[0]["col1_int"], "300");
  assert_eq!(records[0]["col4_int"], "10");
}

#[tokio::test]
async fn get_records_errors() {
  let s = accounts_store().await;

  assert!(matches!(
    s.get_records("accounts", &conditions(&[("col3_string", "LATAM")]))
      .await
      .unwrap_err(),
    Error::NotFound
  ));
  assert!(matches!(
    s.get_records("accounts", &conditions(&[("bogus", "x")]))
      .await
      .unwrap_err(),
    Error::BadRequest(_)
  ));
  assert!(matches!(
    s.get_records("accounts", &[]).await.unwrap_err(),
    Error::BadRequest(_)
  ));
}

#[tokio::test]
async fn delete_records_cleans_derived_indexes() {
  let s = accounts_store().await;

  let deleted = s
    .delete_records("accounts", &conditions(&[("col3_string", "AMER")]))
    .await
    .unwrap();
  assert_eq!(deleted, 1);

  let table_keys = keys::TableKeys::new("rdb", "accounts", 0);
  assert_eq!(s.engine().zcard(&table_keys.all_records()).await.unwrap(), 1);
  assert_eq!(
    s.engine()
      .scard(&table_keys.filter("col3_string", "AMER"))
      .await
      .unwrap(),
    0
  );

  let page = s.get_data("accounts", &Query::default()).await.unwrap();
  assert_eq!(page.records.len(), 1);
  assert_eq!(page.records[0]["col2_string"], "CIBC");
}

#[tokio::test]
async fn update_records_reindexes_under_same_seq() {
  let s = accounts_store().await;

  let updated = s
    .update_records(
      "accounts",
      &conditions(&[("col2_string", "CIBC")]),
      &[Change {
        column: "col4_int".to_string(),
        value:  "111".to_string(),
      }],
    )
    .await
    .unwrap();
  assert_eq!(updated, 1);

  let records = s
    .get_records("accounts", &conditions(&[("col2_string", "CIBC")]))
    .await
    .unwrap();
  assert_eq!(records[0]["col4_int"], "111");

  // The sortable score set reflects the new value: only the updated
  // record clears the 100 threshold.
  let page = s
    .get_data(
      "accounts",
      &query(vec![filter("col4_int", FilterOp::Gte("100.0".to_string()))]),
    )
    .await
    .unwrap();
  assert_eq!(page.records.len(), 1);
  assert_eq!(page.records[0]["col2_string"], "CIBC");
}

#[tokio::test]
async fn update_records_rejects_unknown_change_column() {
  let s = accounts_store().await;
  let err = s
    .update_records(
      "accounts",
      &conditions(&[("col2_string", "CIBC")]),
      &[Change {
        column: "bogus".to_string(),
        value:  "1".to_string(),
      }],
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
}

// ─── Record creation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_records_continues_seq_numbering() {
  let s = accounts_store().await;

  let created = s
    .create_records("accounts", &[record(&[
      ("col2_string", "NTAP"),
      ("col1_int", "700"),
      ("col3_string", "APAC"),
      ("col4_int", "75"),
    ])])
    .await
    .unwrap();
  assert_eq!(created, 1);

  let page = s.get_data("accounts", &Query::default()).await.unwrap();
  assert_eq!(page.records.len(), 3);
  assert_eq!(page.records[2]["col2_string"], "NTAP");

  let table_keys = keys::TableKeys::new("rdb", "accounts", 0);
  let rec2 = s.engine().hgetall(&table_keys.record(2)).await.unwrap();
  assert_eq!(rec2["col2_string"], "NTAP");
}

#[tokio::test]
async fn create_records_validates_columns() {
  let s = accounts_store().await;
  let err = s
    .create_records("accounts", &[record(&[("bogus", "x")])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));

  let err = s.create_records("accounts", &[]).await.unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
}

// ─── Search and aggregation ──────────────────────────────────────────────────

#[tokio::test]
async fn search_term_narrows_reads() {
  let s = accounts_store().await;

  let q = Query {
    search_term: Some("CIBC".to_string()),
    ..Default::default()
  };
  let page = s.get_data("accounts", &q).await.unwrap();
  assert_eq!(page.records.len(), 1);
  assert_eq!(page.records[0]["col2_string"], "CIBC");

  // Search intersected with a disjoint filter: empty page, no error.
  let q = Query {
    filters:     vec![eq("col3_string", &["AMER"])],
    search_term: Some("CIBC".to_string()),
    ..Default::default()
  };
  let page = s.get_data("accounts", &q).await.unwrap();
  assert!(page.records.is_empty());

  // No hits at all surfaces NotFound.
  let q = Query {
    search_term: Some("missing".to_string()),
    ..Default::default()
  };
  assert!(matches!(
    s.get_data("accounts", &q).await.unwrap_err(),
    Error::NotFound
  ));
}

#[tokio::test]
async fn aggregate_sum_and_count_by_group() {
  let s = accounts_store().await;

  let rows = s
    .aggregate("accounts", &AggRequest {
      operation: "sum".to_string(),
      column:    "col4_int".to_string(),
      group_by:  vec!["col3_string".to_string()],
    })
    .await
    .unwrap();
  assert_eq!(rows.len(), 2);
  let by_region: HashMap<&str, &str> = rows
    .iter()
    .map(|r| (r["col3_string"].as_str(), r["sum_result"].as_str()))
    .collect();
  assert_eq!(by_region["EMEA"], "10");
  assert_eq!(by_region["AMER"], "50");

  let rows = s
    .aggregate("accounts", &AggRequest {
      operation: "count".to_string(),
      column:    String::new(),
      group_by:  vec!["col3_string".to_string()],
    })
    .await
    .unwrap();
  assert_eq!(rows.len(), 2);
  assert!(rows.iter().all(|r| r["count_result"] == "1"));
}

#[tokio::test]
async fn aggregate_validates_columns() {
  let s = accounts_store().await;

  let err = s
    .aggregate("accounts", &AggRequest {
      operation: "sum".to_string(),
      column:    "bogus".to_string(),
      group_by:  vec!["col3_string".to_string()],
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));

  let err = s
    .aggregate("accounts", &AggRequest {
      operation: "sum".to_string(),
      column:    "col4_int".to_string(),
      group_by:  vec!["bogus".to_string()],
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BadRequest(_)));
}
