//! JSON-file document store.
//!
//! The file maps table name -> document id -> field object. Every write
//! rewrites the whole file through a temp file in the same directory so a
//! crash never leaves a half-written store behind. A write that fails to
//! reach disk is rolled back in memory as well.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

pub type DocId = u64;
pub type Fields = Map<String, Value>;

type TableData = BTreeMap<DocId, Fields>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("record encoding error: {0}")]
    Encode(serde_json::Error),
    #[error("record for table '{0}' is not a JSON object")]
    NotAnObject(String),
}

#[derive(Debug)]
struct Table {
    docs: TableData,
    next_id: DocId,
}

impl Table {
    fn from_docs(docs: TableData) -> Self {
        let next_id = docs.keys().next_back().map_or(1, |id| id + 1);
        Self { docs, next_id }
    }
}

#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    tables: BTreeMap<String, Table>,
}

impl DocumentStore {
    /// Open the store at `path`; a missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        let tables = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            let parsed: BTreeMap<String, TableData> =
                serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                    path: path.clone(),
                    source,
                })?;
            parsed
                .into_iter()
                .map(|(name, docs)| (name, Table::from_docs(docs)))
                .collect()
        };
        debug!("opened document store at {}", path.display());
        Ok(Self { path, tables })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&mut self, table: &str, fields: Fields) -> Result<DocId, StoreError> {
        let entry = self.table_mut(table);
        let id = entry.next_id;
        entry.next_id += 1;
        entry.docs.insert(id, fields);
        if let Err(err) = self.save() {
            let entry = self.table_mut(table);
            entry.docs.remove(&id);
            entry.next_id = id;
            return Err(err);
        }
        Ok(id)
    }

    /// Swap the whole content of `table` for a single document in one write.
    pub fn replace(&mut self, table: &str, fields: Fields) -> Result<DocId, StoreError> {
        let entry = self.table_mut(table);
        let id = entry.next_id;
        entry.next_id += 1;
        let previous = std::mem::replace(&mut entry.docs, TableData::from([(id, fields)]));
        if let Err(err) = self.save() {
            let entry = self.table_mut(table);
            entry.docs = previous;
            entry.next_id = id;
            return Err(err);
        }
        Ok(id)
    }

    pub fn get(&self, table: &str, id: DocId) -> Option<&Fields> {
        self.tables.get(table)?.docs.get(&id)
    }

    /// Merge `fields` into an existing document. Returns `false` when absent.
    pub fn update(&mut self, table: &str, id: DocId, fields: Fields) -> Result<bool, StoreError> {
        let Some(doc) = self
            .tables
            .get_mut(table)
            .and_then(|entry| entry.docs.get_mut(&id))
        else {
            return Ok(false);
        };
        let previous = doc.clone();
        doc.extend(fields);
        if let Err(err) = self.save() {
            if let Some(doc) = self.docs_mut(table).and_then(|docs| docs.get_mut(&id)) {
                *doc = previous;
            }
            return Err(err);
        }
        Ok(true)
    }

    /// Remove a document. Removing an absent id is a no-op returning `false`.
    pub fn remove(&mut self, table: &str, id: DocId) -> Result<bool, StoreError> {
        let Some(removed) = self.docs_mut(table).and_then(|docs| docs.remove(&id)) else {
            return Ok(false);
        };
        if let Err(err) = self.save() {
            if let Some(docs) = self.docs_mut(table) {
                docs.insert(id, removed);
            }
            return Err(err);
        }
        Ok(true)
    }

    /// Drop every document in `table`. Ids stay monotonic afterwards.
    pub fn truncate(&mut self, table: &str) -> Result<(), StoreError> {
        let previous = std::mem::take(&mut self.table_mut(table).docs);
        if let Err(err) = self.save() {
            self.table_mut(table).docs = previous;
            return Err(err);
        }
        Ok(())
    }

    /// All documents in ascending id order, which is insertion order.
    pub fn all(&self, table: &str) -> Vec<(DocId, &Fields)> {
        self.search(table, |_| true)
    }

    pub fn search<F>(&self, table: &str, predicate: F) -> Vec<(DocId, &Fields)>
    where
        F: Fn(&Fields) -> bool,
    {
        self.tables
            .get(table)
            .map(|entry| {
                entry
                    .docs
                    .iter()
                    .filter(|(_, fields)| predicate(fields))
                    .map(|(id, fields)| (*id, fields))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |entry| entry.docs.len())
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn docs_mut(&mut self, table: &str) -> Option<&mut TableData> {
        self.tables.get_mut(table).map(|entry| &mut entry.docs)
    }

    fn table_mut(&mut self, table: &str) -> &mut Table {
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| Table::from_docs(TableData::new()))
    }

    fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let snapshot: BTreeMap<&str, &TableData> = self
            .tables
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.docs))
            .collect();
        let payload = serde_json::to_vec(&snapshot).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&payload)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Encode a serializable record into a field object for `table`.
pub fn to_fields<T: serde::Serialize>(table: &str, record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record).map_err(StoreError::Encode)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::NotAnObject(table.to_string())),
    }
}
