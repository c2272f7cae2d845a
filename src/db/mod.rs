pub mod account_repo;
pub mod credential_repo;
pub mod session_repo;
pub mod stock_repo;
pub mod view_repo;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on table '{table}': {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt table '{table}': {source}")]
    Corrupt {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON-file-per-table record store with per-table mutual exclusion.
///
/// Each logical table is one pretty-printed JSON array at
/// `<dir>/<table>.json`. Writers must hold the table's lock across their
/// read-modify-write sequence; `list_rows`/`replace_rows` take it for the
/// single call, `lock_tables` takes several tables at once for multi-table
/// commits. There is no cross-table atomicity — a crash between two writes
/// leaves the tables inconsistent, which callers handle with idempotent
/// retry (see session::commit).
pub struct JsonStore {
    dir: PathBuf,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

pub async fn init_store(data_dir: &str) -> anyhow::Result<Arc<JsonStore>> {
    let store = JsonStore::open(data_dir).await?;
    Ok(Arc::new(store))
}

impl JsonStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| StoreError::Io {
            table: dir.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    fn lock_handle(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("table lock map poisoned");
        locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// Read a table without taking its lock. Callers go through `list_rows`
    /// or a `TableTxn`.
    async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        let path = self.table_path(table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            // A table that was never written is empty, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    table: table.to_string(),
                    source: e,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            table: table.to_string(),
            source: e,
        })
    }

    /// Write a table without taking its lock. Tmp-file + rename so readers
    /// never observe a half-written file.
    async fn write_table<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), StoreError> {
        let io_err = |e| StoreError::Io {
            table: table.to_string(),
            source: e,
        };
        let json = serde_json::to_vec_pretty(rows).map_err(|e| StoreError::Corrupt {
            table: table.to_string(),
            source: e,
        })?;
        let tmp = self.dir.join(format!("{table}.json.tmp"));
        tokio::fs::write(&tmp, &json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, self.table_path(table))
            .await
            .map_err(io_err)
    }

    /// Read all rows of a table under its lock.
    pub async fn list_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        let handle = self.lock_handle(table);
        let _guard = handle.lock().await;
        self.read_table(table).await
    }

    /// Replace a table's entire contents under its lock.
    pub async fn replace_rows<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
    ) -> Result<(), StoreError> {
        let handle = self.lock_handle(table);
        let _guard = handle.lock().await;
        self.write_table(table, rows).await
    }

    /// Lock several tables for a read-modify-write sequence. Locks are
    /// always acquired in sorted-name order so two concurrent multi-table
    /// writers cannot deadlock. The returned txn only guards the tables it
    /// was given; callers must not touch others through it.
    pub async fn lock_tables(&self, tables: &[&str]) -> TableTxn<'_> {
        let mut names: Vec<&str> = tables.to_vec();
        names.sort_unstable();
        names.dedup();

        let mut guards = Vec::with_capacity(names.len());
        for name in names {
            let handle = self.lock_handle(name);
            guards.push(handle.lock_owned().await);
        }
        TableTxn {
            store: self,
            _guards: guards,
        }
    }
}

/// Holds the locks of a fixed set of tables; list/replace through it run
/// against already-locked tables.
pub struct TableTxn<'a> {
    store: &'a JsonStore,
    _guards: Vec<tokio::sync::OwnedMutexGuard<()>>,
}

impl TableTxn<'_> {
    pub async fn list_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        self.store.read_table(table).await
    }

    pub async fn replace_rows<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
    ) -> Result<(), StoreError> {
        self.store.write_table(table, rows).await
    }
}
