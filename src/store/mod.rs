//! Persistent n-gram frequency store using redb
//!
//! One redb file per n-gram order (`1grams/ngrams.redb`, ...). Counts live in a
//! multimap table keyed by the n-gram text: a key normally maps to exactly one
//! count, and a second value under the same key is store corruption, reported
//! as [`StoreError::InvariantViolation`] instead of being summed or ignored.
//!
//! Merges are committed non-durably so they are visible to `get` on the same
//! handle right away; [`FrequencyStore::refresh`] makes everything merged so
//! far durable. No reader is ever re-opened.

mod counts;
mod index;

pub use counts::{MemoryCounts, NgramCounts};
pub use index::{NgramIndex, StoreStats};

use crate::ngram::NGram;
use redb::{
    Database, Durability, MultimapTableDefinition, ReadableMultimapTable, ReadableTable,
    TableDefinition,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

// redb table definitions
const NGRAMS_TABLE: MultimapTableDefinition<&str, u64> = MultimapTableDefinition::new("ngrams");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const TOTAL_TOKEN_COUNT_KEY: &str = "totalTokenCount";

/// File name of the database inside each order directory.
pub const DB_FILE_NAME: &str = "ngrams.redb";

/// Errors raised by the frequency store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store at {path} is unavailable: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("store corrupted: {count} records found for n-gram '{ngram}' in the {order}-gram store")]
    InvariantViolation { ngram: String, order: usize, count: usize },

    #[error("store at {0} was opened read-only")]
    ReadOnly(PathBuf),

    #[error("{got}-gram '{ngram}' does not belong in the {expected}-gram store")]
    WrongOrder { ngram: String, expected: usize, got: usize },

    #[error("the total token count is only kept in the 1-gram store, not the {0}-gram store")]
    NotUnigramStore(usize),

    #[error("storage backend error: {0}")]
    Backend(#[from] redb::Error),
}

impl StoreError {
    /// Integrity failures must stop the whole run; everything else may be
    /// scoped to the operation that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::InvariantViolation { .. })
    }
}

macro_rules! backend_error {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for StoreError {
                fn from(e: $t) -> Self {
                    StoreError::Backend(redb::Error::from(e))
                }
            }
        )*
    };
}

backend_error!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type StoreResult<T> = Result<T, StoreError>;

/// How a store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Single writer, creates the database if missing
    ReadWrite,
    /// Database must exist. redb locks the file for one handle, so
    /// concurrent readers share a single handle (`&FrequencyStore` is `Sync`)
    /// and a second process opening the same store gets `StoreUnavailable`.
    ReadOnly,
}

/// Reason text for a failed open; a held lock gets a hint.
fn open_failure(e: redb::DatabaseError) -> String {
    match e {
        redb::DatabaseError::DatabaseAlreadyOpen => {
            "database is in use by another handle or process; \
             share one open index between readers"
                .to_string()
        }
        other => other.to_string(),
    }
}

/// One order-partition of the n-gram index
pub struct FrequencyStore {
    db: Database,
    order: usize,
    mode: OpenMode,
    path: PathBuf,
}

impl FrequencyStore {
    /// Open the store for n-grams of `order` in `dir`.
    ///
    /// Fails with `StoreUnavailable` if the database is locked by another
    /// handle (in this process or another one, read-only included), missing (read-only mode) or not a valid database file.
    pub fn open(dir: &Path, order: usize, mode: OpenMode) -> StoreResult<Self> {
        let path = dir.join(DB_FILE_NAME);
        let unavailable = |reason: String| StoreError::StoreUnavailable {
            path: path.clone(),
            reason,
        };

        let db = match mode {
            OpenMode::ReadWrite => {
                std::fs::create_dir_all(dir).map_err(|e| unavailable(e.to_string()))?;
                Database::create(&path).map_err(|e| unavailable(open_failure(e)))?
            }
            OpenMode::ReadOnly => {
                if !path.is_file() {
                    return Err(unavailable("no such database file".to_string()));
                }
                Database::open(&path).map_err(|e| unavailable(open_failure(e)))?
            }
        };

        let store = Self { db, order, mode, path };
        if mode == OpenMode::ReadWrite {
            store.ensure_tables()?;
        }
        debug!("Opened {}-gram store at {} ({:?})", order, store.path.display(), mode);
        Ok(store)
    }

    /// Create the tables up front so readers never see a half-initialised file.
    fn ensure_tables(&self) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_multimap_table(NGRAMS_TABLE)?;
            write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly(self.path.clone()));
        }
        Ok(())
    }

    fn check_order(&self, ngram: &NGram) -> StoreResult<()> {
        if ngram.order() != self.order {
            return Err(StoreError::WrongOrder {
                ngram: ngram.key(),
                expected: self.order,
                got: ngram.order(),
            });
        }
        Ok(())
    }

    /// Count for an n-gram, 0 if absent.
    pub fn get(&self, ngram: &NGram) -> StoreResult<u64> {
        self.check_order(ngram)?;
        self.get_key(&ngram.key())
    }

    /// Count for a raw space-joined key, 0 if absent.
    pub fn get_key(&self, key: &str) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_multimap_table(NGRAMS_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::with_capacity(1);
        for value in table.get(key)? {
            values.push(value?.value());
        }
        match values.as_slice() {
            [] => Ok(0),
            [count] => Ok(*count),
            _ => Err(StoreError::InvariantViolation {
                ngram: key.to_string(),
                order: self.order,
                count: values.len(),
            }),
        }
    }

    /// Add `delta` to the stored count of `ngram`.
    pub fn merge_add(&self, ngram: &NGram, delta: u64) -> StoreResult<()> {
        self.check_order(ngram)?;
        self.merge_batch(std::iter::once((ngram.key(), delta)))?;
        Ok(())
    }

    /// Merge a batch of `(key, delta)` pairs in one transaction.
    ///
    /// Each entry is a read-modify-write: insert if absent, replace with
    /// `old + delta` if present. If any key already has more than one
    /// record the transaction is abandoned and nothing of the batch is kept.
    /// Returns the number of keys that were newly inserted.
    pub fn merge_batch<I, K>(&self, entries: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        self.check_writable()?;

        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::None);
        let mut inserted = 0;
        {
            let mut table = write_txn.open_multimap_table(NGRAMS_TABLE)?;
            for (key, delta) in entries {
                let key = key.as_ref();
                if key.split(' ').count() != self.order {
                    return Err(StoreError::WrongOrder {
                        ngram: key.to_string(),
                        expected: self.order,
                        got: key.split(' ').count(),
                    });
                }

                let mut existing = Vec::with_capacity(1);
                for value in table.get(key)? {
                    existing.push(value?.value());
                }
                match existing.as_slice() {
                    [] => {
                        table.insert(key, delta)?;
                        inserted += 1;
                    }
                    [old] => {
                        let old = *old;
                        let new = old.checked_add(delta).unwrap_or_else(|| {
                            warn!("Count overflow for '{}', saturating", key);
                            u64::MAX
                        });
                        table.remove(key, old)?;
                        table.insert(key, new)?;
                    }
                    _ => {
                        return Err(StoreError::InvariantViolation {
                            ngram: key.to_string(),
                            order: self.order,
                            count: existing.len(),
                        });
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Overwrite the total token count record. Unigram store only.
    pub fn set_total_token_count(&self, value: u64) -> StoreResult<()> {
        self.check_writable()?;
        if self.order != 1 {
            return Err(StoreError::NotUnigramStore(self.order));
        }
        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::None);
        {
            let mut table = write_txn.open_table(META_TABLE)?;
            table.insert(TOTAL_TOKEN_COUNT_KEY, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The total token count record, 0 if it was never set.
    pub fn total_token_count(&self) -> StoreResult<u64> {
        if self.order != 1 {
            return Err(StoreError::NotUnigramStore(self.order));
        }
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(META_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        Ok(table
            .get(TOTAL_TOKEN_COUNT_KEY)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    /// Make every merge since the last refresh durable.
    ///
    /// Readers on this handle already see merged data; this is the commit
    /// point a crash cannot roll back past.
    pub fn refresh(&self) -> StoreResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Ok(());
        }
        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::Immediate);
        write_txn.commit()?;
        Ok(())
    }

    /// Number of distinct n-gram keys and the sum of their counts.
    pub fn stats(&self) -> StoreResult<(u64, u64)> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_multimap_table(NGRAMS_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok((0, 0)),
            Err(e) => return Err(e.into()),
        };
        let mut keys = 0u64;
        let mut total = 0u64;
        for item in table.iter()? {
            let (_, values) = item?;
            keys += 1;
            for value in values {
                total = total.saturating_add(value?.value());
            }
        }
        Ok((keys, total))
    }

    /// Flush and release the database. A fresh `open` on the same directory
    /// sees every successfully merged record.
    pub fn close(self) -> StoreResult<()> {
        self.refresh()?;
        debug!("Closed {}-gram store at {}", self.order, self.path.display());
        Ok(())
    }

    /// Insert a raw value without merging. Only used to simulate corruption.
    #[cfg(test)]
    fn insert_raw(&self, key: &str, value: u64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_multimap_table(NGRAMS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
