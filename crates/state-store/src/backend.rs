// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The durable key-value backend the core consumes (§6.3). Its wire
//! format and storage layout are explicitly out of scope (§1
//! Non-goals); this module only fixes the trait contract and ships an
//! in-memory implementation for tests and the integration scenarios.

use chain_executor_types::{Entry, StoreError, Table};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

pub trait Backend: Send + Sync {
    fn get_row(&self, table: &str, key: &str) -> Result<Option<Entry>, StoreError>;
    fn get_primary_keys(&self, table: &str) -> Result<Vec<String>, StoreError>;
    fn open_table(&self, name: &str) -> Result<Option<Table>, StoreError>;
    fn create_table(&self, name: &str, value_fields: &str) -> Result<Table, StoreError>;

    /// Serializes `rows` (this block's overlay mutations) into the
    /// backend's write-ahead area for block `number`. Must return
    /// success only after durable acknowledgement (§4.A "2PC").
    fn prepare(
        &self,
        number: u64,
        rows: Vec<((String, String), Entry)>,
        tables: Vec<Table>,
    ) -> Result<(), StoreError>;

    /// Atomically promotes the prepared set for `number`.
    fn commit(&self, number: u64) -> Result<(), StoreError>;

    /// Discards the prepared set for `number`.
    fn rollback(&self, number: u64) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Staged {
    rows: Vec<((String, String), Entry)>,
    tables: Vec<Table>,
}

/// A process-local backend used by tests and the end-to-end scenarios.
/// Not a production storage layer: table/row persistence is a plain
/// in-memory map, guarded by a single mutex, with no write-ahead log.
pub struct InMemoryBackend {
    rows: Mutex<BTreeMap<(String, String), Entry>>,
    tables: Mutex<HashMap<String, Table>>,
    staged: Mutex<HashMap<u64, Staged>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            tables: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
        }
    }
}

impl Backend for InMemoryBackend {
    fn get_row(&self, table: &str, key: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .rows
            .lock()
            .get(&(table.to_string(), key.to_string()))
            .cloned()
            .filter(|e| !e.is_deleted()))
    }

    fn get_primary_keys(&self, table: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|((t, _), e)| t == table && !e.is_deleted())
            .map(|((_, k), _)| k.clone())
            .collect())
    }

    fn open_table(&self, name: &str) -> Result<Option<Table>, StoreError> {
        Ok(self.tables.lock().get(name).cloned())
    }

    fn create_table(&self, name: &str, value_fields: &str) -> Result<Table, StoreError> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(StoreError::TableAlreadyExists(name.to_string()));
        }
        let table = Table::new(name, value_fields);
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    fn prepare(
        &self,
        number: u64,
        rows: Vec<((String, String), Entry)>,
        tables: Vec<Table>,
    ) -> Result<(), StoreError> {
        self.staged.lock().insert(number, Staged { rows, tables });
        Ok(())
    }

    fn commit(&self, number: u64) -> Result<(), StoreError> {
        let staged = self
            .staged
            .lock()
            .remove(&number)
            .ok_or(StoreError::NoUncommittedState)?;
        let mut rows = self.rows.lock();
        for (k, v) in staged.rows {
            rows.insert(k, v);
        }
        drop(rows);
        let mut tables = self.tables.lock();
        for t in staged.tables {
            tables.entry(t.name.clone()).or_insert(t);
        }
        Ok(())
    }

    fn rollback(&self, number: u64) -> Result<(), StoreError> {
        self.staged
            .lock()
            .remove(&number)
            .ok_or(StoreError::NoUncommittedState)?;
        Ok(())
    }
}
