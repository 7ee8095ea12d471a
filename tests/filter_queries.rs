//! End-to-end query scenarios against the assembled store.

use lodestore::{DataStore, FilterOptions, InjectOptions, ResourceDefinition, SharedRecord};
use serde_json::{json, Value};

fn seeded_store() -> DataStore {
    let store = DataStore::new();
    store.register_resource(ResourceDefinition::new("post")).unwrap();
    store
        .inject(
            "post",
            json!([
                {"id": 5, "age": 30, "author": "John"},
                {"id": 6, "age": 31, "author": "Sally"},
                {"id": 7, "age": 32, "author": "Adam"},
                {"id": 8, "age": 33, "author": "Sally"},
            ]),
            &InjectOptions::default(),
        )
        .unwrap();
    store
}

fn ids(records: &[SharedRecord]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap_or(-1))
        .collect()
}

#[test]
fn where_order_and_pagination_compose() {
    let store = seeded_store();

    let records = store
        .filter(
            "post",
            &json!({"query": {
                "where": {"age": {">": 30}},
                "orderBy": [["age", "DESC"]],
                "skip": 1,
                "limit": 1,
            }}),
        )
        .unwrap();
    // Matching 31..33, descending 33,32,31, skip one, take one.
    assert_eq!(ids(&records), vec![7]);
}

#[test]
fn results_are_handles_into_the_store() {
    let store = seeded_store();
    let records = store
        .filter("post", &json!({"query": {"where": {"author": "John"}}}))
        .unwrap();
    assert_eq!(records.len(), 1);

    // Query results alias store state: a later inject shows through them.
    store
        .inject("post", json!({"id": 5, "age": 99}), &InjectOptions::default())
        .unwrap();
    assert_eq!(records[0].get("age"), Some(json!(99)));
}

#[test]
fn filter_reflects_latest_injections() {
    let store = seeded_store();
    store
        .inject("post", json!({"id": 6, "author": "John"}), &InjectOptions::default())
        .unwrap();

    let johns = store
        .filter("post", &json!({"query": {"where": {"author": "John"}}}))
        .unwrap();
    assert_eq!(ids(&johns), vec![5, 6]);
}

#[test]
fn malformed_params_fail_before_evaluation() {
    let store = seeded_store();
    for bad in [
        json!(null),
        json!({"query": {"where": []}}),
        json!({"query": {"orderBy": {}}}),
        json!({"query": {"limit": 1.5}}),
    ] {
        let err = store.filter("post", &bad).unwrap_err();
        assert!(err.is_illegal_argument(), "params: {bad}");
    }
}

#[test]
fn custom_filter_applies_through_the_facade() {
    let store = DataStore::new();
    store
        .register_resource(ResourceDefinition::new("comment").with_custom_filter(
            |_, where_clause, record| {
                let min = where_clause["age"]["AT_LEAST"].as_i64().unwrap_or(0);
                Ok(record.get("age").and_then(Value::as_i64).unwrap_or(0) >= min)
            },
        ))
        .unwrap();
    store
        .inject(
            "comment",
            json!([{"id": 1, "age": 10}, {"id": 2, "age": 20}]),
            &InjectOptions::default(),
        )
        .unwrap();

    let records = store
        .filter("comment", &json!({"query": {"where": {"age": {"AT_LEAST": 15}}}}))
        .unwrap();
    assert_eq!(ids(&records), vec![2]);
}

#[test]
fn load_from_server_without_runtime_still_answers() {
    let store = seeded_store();
    // No tokio runtime here: the background trigger is skipped, the cached
    // answer returns as usual.
    let records = store
        .filter_with_options(
            "post",
            &json!({}),
            &FilterOptions { load_from_server: true },
        )
        .unwrap();
    assert_eq!(ids(&records), vec![5, 6, 7, 8]);
}
