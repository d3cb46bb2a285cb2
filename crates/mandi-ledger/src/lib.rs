//! Parchi stores: a file-backed SQLite store and an in-memory key-value
//! document store, both behind [`mandi_core::ParchiStore`].

mod memory;
mod sqlite;

#[cfg(test)]
mod conformance;

use std::path::PathBuf;

use mandi_core::{DatabaseError, LedgerResult, ParchiStore};
use tracing::info;

pub use memory::MemoryParchiStore;
pub use sqlite::SqliteParchiStore;

/// Which backing store to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite { db_path: PathBuf },
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Memory => "memory",
        }
    }
}

/// Builds the configured store and initializes it.
pub async fn open_store(backend: &StoreBackend) -> LedgerResult<Box<dyn ParchiStore>> {
    let store: Box<dyn ParchiStore> = match backend {
        StoreBackend::Sqlite { db_path } => Box::new(SqliteParchiStore::new(db_path.clone())),
        StoreBackend::Memory => Box::new(MemoryParchiStore::default()),
    };

    store.initialize().await?;
    info!(store_type = store.store_type(), "parchi store ready");

    Ok(store)
}

/// Lifecycle of a store's connection handle.
#[derive(Debug, Default)]
pub(crate) enum ConnectionState<T> {
    #[default]
    Pending,
    Open(T),
    Closed,
}

impl<T> ConnectionState<T> {
    pub(crate) fn handle(&self) -> Result<&T, DatabaseError> {
        match self {
            Self::Open(handle) => Ok(handle),
            Self::Pending => Err(DatabaseError::NotInitialized),
            Self::Closed => Err(DatabaseError::Closed),
        }
    }
}
