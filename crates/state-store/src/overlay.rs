// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::backend::Backend;
use crate::recoder::{Recoder, RecoderEntry};
use chain_executor_types::{Entry, StoreError, Table};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A transactional `StateStorage` overlay scoped to one block (§3
/// "StateStorage"): a mapping from `(tableName, key)` to [`Entry`],
/// layered atop a parent overlay or, at the root, the durable
/// backend. An overlay is exclusively owned by exactly one
/// `BlockContext` at a time; parent overlays may be shared
/// immutably by child overlays as a read-through fallback.
///
/// Every mutating call takes the caller's own [`Recoder`] explicitly
/// rather than an implicit "active recoder" slot on the overlay
/// itself — multiple executives mutate the same overlay concurrently
/// in DAG mode (§4.G, §5), each with its own independent undo log, so
/// the recoder is owned by the executive and threaded through, not
/// shared mutable state on the overlay.
pub struct Overlay {
    pub number: u64,
    parent: Option<Arc<Overlay>>,
    backend: Option<Arc<dyn Backend>>,
    rows: RwLock<BTreeMap<(String, String), Entry>>,
    tables: RwLock<HashMap<String, Table>>,
}

impl Overlay {
    pub fn root(backend: Arc<dyn Backend>) -> Arc<Self> {
        Arc::new(Self {
            number: 0,
            parent: None,
            backend: Some(backend),
            rows: RwLock::new(BTreeMap::new()),
            tables: RwLock::new(HashMap::new()),
        })
    }

    pub fn child(number: u64, parent: Arc<Overlay>) -> Arc<Self> {
        Arc::new(Self {
            number,
            parent: Some(parent),
            backend: None,
            rows: RwLock::new(BTreeMap::new()),
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// `getRow`: topmost non-tombstone entry on the overlay chain, or
    /// absent (testable property 3).
    pub fn get_row(&self, table: &str, key: &str) -> Option<Entry> {
        if let Some(e) = self.rows.read().get(&(table.to_string(), key.to_string())) {
            return if e.is_deleted() { None } else { Some(e.clone()) };
        }
        if let Some(parent) = &self.parent {
            return parent.get_row(table, key);
        }
        self.backend
            .as_ref()
            .and_then(|b| b.get_row(table, key).ok().flatten())
    }

    pub fn get_rows(&self, table: &str, keys: &[String]) -> Vec<Option<Entry>> {
        keys.iter().map(|k| self.get_row(table, k)).collect()
    }

    /// The version `setRow` should use next for `(table, key)`: the
    /// last observed version plus one, or `0` if absent (§4.C `set`).
    pub fn next_version(&self, table: &str, key: &str) -> u64 {
        self.get_row(table, key).map_or(0, |e| e.version + 1)
    }

    /// `setRow`: writes into the current overlay only, recording the
    /// overlay's own prior value (or `None`) into `recoder`.
    pub fn set_row(&self, table: &str, key: &str, entry: Entry, recoder: &mut Recoder) {
        let table_key = (table.to_string(), key.to_string());
        let prior = self.rows.read().get(&table_key).cloned();
        recoder.push(RecoderEntry::Row {
            table: table.to_string(),
            key: key.to_string(),
            prior,
        });
        self.rows.write().insert(table_key, entry);
    }

    fn table_exists_anywhere(&self, name: &str) -> bool {
        if self.tables.read().contains_key(name) {
            return true;
        }
        if let Some(parent) = &self.parent {
            return parent.table_exists_anywhere(name);
        }
        self.backend
            .as_ref()
            .map(|b| matches!(b.open_table(name), Ok(Some(_))))
            .unwrap_or(false)
    }

    pub fn create_table(
        &self,
        name: &str,
        value_fields: &str,
        recoder: &mut Recoder,
    ) -> Result<Table, StoreError> {
        if self.table_exists_anywhere(name) {
            return Err(StoreError::TableAlreadyExists(name.to_string()));
        }
        let table = Table::new(name, value_fields);
        self.tables.write().insert(name.to_string(), table.clone());
        recoder.push(RecoderEntry::TableCreated {
            name: name.to_string(),
        });
        Ok(table)
    }

    pub fn open_table(&self, name: &str) -> Option<Table> {
        if let Some(t) = self.tables.read().get(name) {
            return Some(t.clone());
        }
        if let Some(parent) = &self.parent {
            return parent.open_table(name);
        }
        self.backend.as_ref().and_then(|b| b.open_table(name).ok().flatten())
    }

    /// `getPrimaryKeys`: merges this overlay's own writes/tombstones
    /// over the parent chain's key set for `table`, optionally
    /// filtered by `condition` over the resolved entry's fields.
    pub fn get_primary_keys(
        &self,
        table: &str,
        condition: Option<&dyn Fn(&Entry) -> bool>,
    ) -> Vec<String> {
        let mut present = self.collect_primary_keys(table);
        present.retain(|_, keep| *keep);
        let mut keys: Vec<String> = present.into_keys().collect();
        keys.sort();
        if let Some(cond) = condition {
            keys.retain(|k| self.get_row(table, k).map(|e| cond(&e)).unwrap_or(false));
        }
        keys
    }

    fn collect_primary_keys(&self, table: &str) -> BTreeMap<String, bool> {
        let mut acc = if let Some(parent) = &self.parent {
            parent.collect_primary_keys(table)
        } else if let Some(backend) = &self.backend {
            backend
                .get_primary_keys(table)
                .unwrap_or_default()
                .into_iter()
                .map(|k| (k, true))
                .collect()
        } else {
            BTreeMap::new()
        };
        for ((t, k), entry) in self.rows.read().iter() {
            if t == table {
                acc.insert(k.clone(), !entry.is_deleted());
            }
        }
        acc
    }

    /// `rollback(recoder)`: restores each entry to its prior value in
    /// reverse order (§3 "Recoder"). Undoes exactly this recoder's
    /// writes and table creations, leaving parent frames and any
    /// committed descendant's writes untouched (§4.A
    /// "Transactionality", testable property 2).
    pub fn rollback(&self, recoder: &Recoder) {
        let mut rows = self.rows.write();
        let mut tables = self.tables.write();
        for entry in recoder.iter_rev() {
            match entry {
                RecoderEntry::Row { table, key, prior } => {
                    let table_key = (table.clone(), key.clone());
                    match prior {
                        Some(e) => {
                            rows.insert(table_key, e.clone());
                        },
                        None => {
                            rows.remove(&table_key);
                        },
                    }
                },
                RecoderEntry::TableCreated { name } => {
                    tables.remove(name);
                },
            }
        }
    }

    /// The overlay's own mutations (not the parent chain's), in
    /// canonical `(table, key)` order — the input to both `hash()`
    /// and `prepare()`.
    pub fn own_mutations(&self) -> Vec<((String, String), Entry)> {
        self.rows
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn own_tables(&self) -> Vec<Table> {
        self.tables.read().values().cloned().collect()
    }
}
