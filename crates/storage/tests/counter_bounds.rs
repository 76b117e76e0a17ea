#![forbid(unsafe_code)]

use sc_storage::{CounterAdjustRequest, CounterResetRequest, SqliteStore};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("sc_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn setup(test_name: &str) -> SqliteStore {
    SqliteStore::open(temp_dir(test_name)).expect("open store")
}

fn increment(store: &mut SqliteStore, name: &str, step: i64) -> sc_storage::CounterAdjustResult {
    store
        .counter_increment(CounterAdjustRequest {
            name: name.to_string(),
            step,
            min_value: None,
            max_value: None,
        })
        .expect("increment")
}

#[test]
fn fresh_counter_starts_at_zero() {
    let mut store = setup("fresh_counter");

    let result = increment(&mut store, "hits", 5);
    assert_eq!(result.previous_value, 0);
    assert_eq!(result.value, 5);
    assert!(!result.capped);
}

#[test]
fn max_bound_caps_and_persists() {
    let mut store = setup("max_bound");
    increment(&mut store, "hits", 5);

    let result = store
        .counter_increment(CounterAdjustRequest {
            name: "hits".to_string(),
            step: 10,
            min_value: None,
            max_value: Some(8),
        })
        .expect("increment");
    assert_eq!(result.previous_value, 5);
    assert_eq!(result.value, 8);
    assert!(result.capped);

    // The bound is stored; an unqualified increment inherits it.
    let result = increment(&mut store, "hits", 100);
    assert_eq!(result.value, 8);
    assert!(result.capped);

    let row = store.counter_get("hits").expect("get").expect("exists");
    assert_eq!(row.value, 8);
    assert_eq!(row.max_value, Some(8));
}

#[test]
fn min_bound_floors_decrements() {
    let mut store = setup("min_bound");

    let result = store
        .counter_decrement(CounterAdjustRequest {
            name: "credits".to_string(),
            step: 10,
            min_value: Some(0),
            max_value: None,
        })
        .expect("decrement");
    assert_eq!(result.previous_value, 0);
    assert_eq!(result.value, 0);
    assert!(result.capped);
}

#[test]
fn value_stays_within_bounds_across_mixed_calls() {
    let mut store = setup("mixed_calls");
    store
        .counter_increment(CounterAdjustRequest {
            name: "gauge".to_string(),
            step: 0,
            min_value: Some(-3),
            max_value: Some(3),
        })
        .expect("create");

    let steps: &[i64] = &[5, -1, -10, 2, 2, 2, 7, -20];
    for &step in steps {
        let result = increment(&mut store, "gauge", step);
        assert!((-3..=3).contains(&result.value), "value {}", result.value);
        let unclamped = result.previous_value + step;
        assert_eq!(result.capped, result.value != unclamped);
    }
}

#[test]
fn reset_ignores_bounds() {
    let mut store = setup("reset");
    store
        .counter_increment(CounterAdjustRequest {
            name: "gauge".to_string(),
            step: 1,
            min_value: Some(0),
            max_value: Some(10),
        })
        .expect("create");

    let result = store
        .counter_reset(CounterResetRequest {
            reset_to: 99,
            name: "gauge".to_string(),
        })
        .expect("reset");
    assert_eq!(result.previous_value, 1);
    assert_eq!(result.value, 99);

    let row = store.counter_get("gauge").expect("get").expect("exists");
    assert_eq!(row.value, 99);
}

#[test]
fn reset_creates_missing_counter() {
    let mut store = setup("reset_creates");

    let result = store
        .counter_reset(CounterResetRequest {
            name: "unseen".to_string(),
            reset_to: 7,
        })
        .expect("reset");
    assert_eq!(result.previous_value, 0);
    assert_eq!(result.value, 7);
}

#[test]
fn list_is_ordered_by_name() {
    let mut store = setup("list_ordered");
    for name in ["bravo", "alpha", "charlie"] {
        increment(&mut store, name, 1);
    }

    let rows = store.counter_list().expect("list");
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
}

#[test]
fn delete_reports_absence() {
    let mut store = setup("delete");
    increment(&mut store, "hits", 1);

    assert!(store.counter_delete("hits").expect("delete"));
    assert!(!store.counter_delete("hits").expect("delete again"));
    assert!(store.counter_get("hits").expect("get").is_none());
}

#[test]
fn invalid_bounds_are_rejected_before_write() {
    let mut store = setup("invalid_bounds");

    let err = store
        .counter_increment(CounterAdjustRequest {
            name: "gauge".to_string(),
            step: 1,
            min_value: Some(10),
            max_value: Some(0),
        })
        .expect_err("min > max must fail");
    assert!(matches!(err, sc_storage::StoreError::InvalidInput(_)));
    assert!(store.counter_get("gauge").expect("get").is_none());
}

#[test]
fn empty_name_is_rejected() {
    let mut store = setup("empty_name");
    let err = store
        .counter_increment(CounterAdjustRequest {
            name: "   ".to_string(),
            step: 1,
            min_value: None,
            max_value: None,
        })
        .expect_err("blank name must fail");
    assert!(matches!(err, sc_storage::StoreError::InvalidInput(_)));
}
