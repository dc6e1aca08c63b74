//! The three order-partitions opened together from one top directory

use super::{FrequencyStore, NgramCounts, OpenMode, StoreError, StoreResult};
use crate::ngram::{NGram, MAX_ORDER};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory name of the store for `order` (`1grams`, `2grams`, `3grams`).
pub fn order_dir_name(order: usize) -> String {
    format!("{}grams", order)
}

/// 1-, 2- and 3-gram stores under `<top>/{1,2,3}grams`
pub struct NgramIndex {
    top_dir: PathBuf,
    stores: Vec<FrequencyStore>,
}

/// Per-order record counts
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub order: usize,
    pub distinct_ngrams: u64,
    pub occurrences: u64,
}

impl NgramIndex {
    /// Open all orders. In read-only mode the top directory must already
    /// contain `1grams`, `2grams` and `3grams`.
    pub fn open(top_dir: &Path, mode: OpenMode) -> StoreResult<Self> {
        if mode == OpenMode::ReadOnly {
            validate_directory(top_dir)?;
        }
        let mut stores = Vec::with_capacity(MAX_ORDER);
        for order in 1..=MAX_ORDER {
            let dir = top_dir.join(order_dir_name(order));
            stores.push(FrequencyStore::open(&dir, order, mode)?);
        }
        info!("Opened n-gram index at {} ({:?})", top_dir.display(), mode);
        Ok(Self {
            top_dir: top_dir.to_path_buf(),
            stores,
        })
    }

    pub fn top_dir(&self) -> &Path {
        &self.top_dir
    }

    /// The store for `order` (1..=3).
    pub fn store(&self, order: usize) -> Option<&FrequencyStore> {
        order.checked_sub(1).and_then(|i| self.stores.get(i))
    }

    /// All stores, ordered by n-gram order.
    pub fn stores(&self) -> &[FrequencyStore] {
        &self.stores
    }

    fn store_for(&self, ngram: &NGram) -> StoreResult<&FrequencyStore> {
        self.store(ngram.order()).ok_or_else(|| StoreError::WrongOrder {
            ngram: ngram.key(),
            expected: MAX_ORDER,
            got: ngram.order(),
        })
    }

    pub fn unigrams(&self) -> &FrequencyStore {
        &self.stores[0]
    }

    /// Make every merge durable on all orders.
    pub fn refresh(&self) -> StoreResult<()> {
        for store in &self.stores {
            store.refresh()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> StoreResult<Vec<StoreStats>> {
        self.stores
            .iter()
            .map(|store| {
                let (distinct_ngrams, occurrences) = store.stats()?;
                Ok(StoreStats {
                    order: store.order(),
                    distinct_ngrams,
                    occurrences,
                })
            })
            .collect()
    }

    pub fn close(self) -> StoreResult<()> {
        for store in self.stores {
            store.close()?;
        }
        Ok(())
    }
}

impl NgramCounts for NgramIndex {
    fn count(&self, ngram: &NGram) -> StoreResult<u64> {
        self.store_for(ngram)?.get(ngram)
    }

    fn total_token_count(&self) -> StoreResult<u64> {
        self.unigrams().total_token_count()
    }
}

impl std::fmt::Debug for NgramIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NgramIndex")
            .field("top_dir", &self.top_dir)
            .field("orders", &self.stores.len())
            .finish()
    }
}

/// Reject a top directory that does not look like an n-gram index.
pub fn validate_directory(top_dir: &Path) -> StoreResult<()> {
    let unavailable = |reason: String| StoreError::StoreUnavailable {
        path: top_dir.to_path_buf(),
        reason,
    };
    if !top_dir.is_dir() {
        return Err(unavailable("not found or not a directory".to_string()));
    }
    let missing: Vec<String> = (1..=MAX_ORDER)
        .map(order_dir_name)
        .filter(|name| !top_dir.join(name).is_dir())
        .collect();
    if !missing.is_empty() {
        return Err(unavailable(format!(
            "expected '1grams', '2grams' and '3grams' sub directories, missing {:?}",
            missing
        )));
    }
    Ok(())
}
