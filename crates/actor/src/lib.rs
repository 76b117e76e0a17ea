#![forbid(unsafe_code)]

//! Per-owner actor layer. A [`Dispatcher`] maps caller identities to
//! [`OwnerHandle`]s; each handle wraps one owner's private store behind a
//! mutex, so all operations against one owner execute in strict sequence
//! while different owners proceed in parallel.

mod dispatch;

pub use dispatch::{DispatchError, OPERATIONS};

use sc_core::ids::OwnerId;
use sc_storage::{SqliteStore, StoreError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const DATA_DIR_ENV: &str = "STATECELL_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "statecell_data";

/// Process-local registry of per-owner actors. The same identity always
/// resolves to the same handle for the dispatcher's lifetime; storage is
/// created (and its schema bootstrapped) on first contact.
pub struct Dispatcher {
    data_dir: PathBuf,
    actors: Mutex<HashMap<OwnerId, Arc<OwnerHandle>>>,
}

impl Dispatcher {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Data directory from `STATECELL_DATA_DIR`, falling back to a
    /// relative default.
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        Self::new(data_dir)
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn owner(&self, owner: &OwnerId) -> Result<Arc<OwnerHandle>, StoreError> {
        let mut actors = self
            .actors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(handle) = actors.get(owner) {
            return Ok(Arc::clone(handle));
        }

        let storage_dir = self.data_dir.join(owner.as_str());
        let store = SqliteStore::open(storage_dir)?;
        debug!(owner = owner.as_str(), "actor created");

        let handle = Arc::new(OwnerHandle {
            owner: owner.clone(),
            store: Mutex::new(store),
        });
        actors.insert(owner.clone(), Arc::clone(&handle));
        Ok(handle)
    }
}

/// One owner's serialized view of its store. Cloning the `Arc` shares
/// the same underlying actor; the mutex is the single-writer boundary.
pub struct OwnerHandle {
    owner: OwnerId,
    store: Mutex<SqliteStore>,
}

impl OwnerHandle {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, SqliteStore> {
        // A poisoned mutex means a panic mid-operation; the transaction
        // already rolled back, so the store itself is consistent.
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs a typed operation against the store under the actor's lock.
    pub fn with_store<T>(
        &self,
        op: impl FnOnce(&mut SqliteStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        op(&mut self.store())
    }
}
