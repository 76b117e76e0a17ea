#![forbid(unsafe_code)]

use sc_actor::Dispatcher;
use sc_core::ids::OwnerId;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("sc_actor_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn same_owner_resolves_to_same_actor() {
    let dispatcher = Dispatcher::new(temp_dir("identity"));
    let owner = OwnerId::try_new("alice").expect("owner id");

    let first = dispatcher.owner(&owner).expect("handle");
    let second = dispatcher.owner(&owner).expect("handle");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn owners_are_isolated_on_disk_and_in_state() {
    let data_dir = temp_dir("isolation");
    let dispatcher = Dispatcher::new(&data_dir);

    let alice = dispatcher
        .owner(&OwnerId::try_new("alice").expect("owner id"))
        .expect("handle");
    let bob = dispatcher
        .owner(&OwnerId::try_new("bob").expect("owner id"))
        .expect("handle");

    alice
        .dispatch("counterIncrement", &json!({ "name": "hits", "step": 3 }))
        .expect("increment");

    let listed = bob.dispatch("counterList", &json!({})).expect("list");
    assert_eq!(listed, json!({ "counters": [] }));

    assert!(data_dir.join("alice").join("statecell.db").is_file());
    assert!(data_dir.join("bob").join("statecell.db").is_file());
}

#[test]
fn concurrent_increments_lose_no_updates() {
    let dispatcher = Dispatcher::new(temp_dir("concurrency"));
    let owner = OwnerId::try_new("shared").expect("owner id");
    let handle = dispatcher.owner(&owner).expect("handle");

    const THREADS: usize = 8;
    const PER_THREAD: i64 = 25;

    let mut joins = Vec::new();
    for _ in 0..THREADS {
        let handle = Arc::clone(&handle);
        joins.push(std::thread::spawn(move || {
            for _ in 0..PER_THREAD {
                handle
                    .dispatch("counterIncrement", &json!({ "name": "total" }))
                    .expect("increment");
            }
        }));
    }
    for join in joins {
        join.join().expect("thread");
    }

    let got = handle
        .dispatch("counterGet", &json!({ "name": "total" }))
        .expect("get");
    assert_eq!(got["value"], json!(THREADS as i64 * PER_THREAD));
}
