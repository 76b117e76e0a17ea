#![forbid(unsafe_code)]

use sc_storage::{RecordListRequest, RecordPutRequest, SqliteStore};
use serde_json::json;
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

#[test]
fn put_get_delete_round_trip() {
    let mut store = setup("round_trip");

    let put = store
        .record_put(RecordPutRequest {
            key: "profile".to_string(),
            value: json!({"theme": "dark"}),
            metadata: Some(json!({"source": "test"})),
        })
        .expect("put");
    assert_eq!(put.value, json!({"theme": "dark"}));

    let got = store.record_get("profile").expect("get").expect("exists");
    assert_eq!(got.value, json!({"theme": "dark"}));
    assert_eq!(got.metadata, Some(json!({"source": "test"})));

    assert!(store.record_delete("profile").expect("delete"));
    assert!(store.record_get("profile").expect("get").is_none());
    assert!(!store.record_delete("profile").expect("delete again"));
}

#[test]
fn upsert_preserves_created_at() {
    let mut store = setup("upsert");

    let first = store
        .record_put(RecordPutRequest {
            key: "k".to_string(),
            value: json!(1),
            metadata: None,
        })
        .expect("put");

    let second = store
        .record_put(RecordPutRequest {
            key: "k".to_string(),
            value: json!(2),
            metadata: None,
        })
        .expect("put again");

    assert_eq!(second.created_at_ms, first.created_at_ms);
    assert!(second.updated_at_ms >= first.updated_at_ms);

    let got = store.record_get("k").expect("get").expect("exists");
    assert_eq!(got.value, json!(2));
    assert_eq!(got.created_at_ms, first.created_at_ms);
}

#[test]
fn list_is_ordered_and_paged() {
    let mut store = setup("list");
    for key in ["bravo", "alpha", "charlie"] {
        store
            .record_put(RecordPutRequest {
                key: key.to_string(),
                value: json!(key),
                metadata: None,
            })
            .expect("put");
    }

    let rows = store
        .record_list(RecordListRequest { limit: 2, offset: 0 })
        .expect("list");
    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["alpha", "bravo"]);

    let rows = store
        .record_list(RecordListRequest { limit: 2, offset: 2 })
        .expect("list");
    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["charlie"]);
}
