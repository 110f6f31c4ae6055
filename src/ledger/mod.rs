// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Permanent log of completed transfers, keyed by item name and collection.
//!
//! The log is append-only: records are never updated or removed. A lookup
//! distinguishes "not recorded" ([`LedgerLookup::Absent`]) from a failing
//! store (`Err`), and callers must never treat the latter as absence.

mod file;
mod listing;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::locator::ItemName;

pub use file::JsonFileLedger;
pub use listing::ListingLedger;
pub use memory::MemoryLedger;

/// Result of a successful ledger lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerLookup {
    Present,
    Absent,
}

/// One completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub item_name: String,
    pub collection: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl LedgerRecord {
    pub fn new(item: &ItemName, collection: &str, content_hash: Option<String>) -> Self {
        Self {
            item_name: item.to_string(),
            collection: collection.to_string(),
            recorded_at: Utc::now(),
            content_hash,
        }
    }

    pub fn matches(&self, item: &str, collection: &str) -> bool {
        self.item_name == item && self.collection == collection
    }
}

/// Key-value store holding ledger records
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up a record by its composite key
    async fn get(&self, item: &ItemName, collection: &str) -> Result<LedgerLookup, LedgerError>;

    /// Store a record. Storing the same key twice must be harmless.
    async fn put(&self, record: &LedgerRecord) -> Result<(), LedgerError>;
}

/// A shared reference to a ledger store
pub type SharedLedgerStore = Arc<dyn LedgerStore>;

/// Dedup ledger consulted and updated by the sync pipeline
#[derive(Clone)]
pub struct Ledger {
    store: SharedLedgerStore,
}

impl Ledger {
    pub fn new(store: SharedLedgerStore) -> Self {
        Self { store }
    }

    /// Has this item already been transferred for the collection?
    pub async fn exists(
        &self,
        item: &ItemName,
        collection: &str,
    ) -> Result<LedgerLookup, LedgerError> {
        let lookup = self.store.get(item, collection).await?;
        debug!(item = %item, collection, ?lookup, "ledger lookup");
        Ok(lookup)
    }

    /// Record a completed transfer
    pub async fn record(
        &self,
        item: &ItemName,
        collection: &str,
        content_hash: Option<String>,
    ) -> Result<(), LedgerError> {
        info!(item = %item, collection, "adding to archive");
        self.store
            .put(&LedgerRecord::new(item, collection, content_hash))
            .await
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}
