// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::locator::ItemName;
use crate::storage::RemoteStorage;

use super::{LedgerLookup, LedgerRecord, LedgerStore};

/// Ledger derived from the destination directory listing
///
/// An item counts as recorded when a file of the same name exists at the
/// destination. The collection is implied by the destination, so it is not
/// part of the lookup, and `put` has nothing to store.
pub struct ListingLedger<S> {
    storage: Arc<S>,
    destination: String,
}

impl<S: RemoteStorage> ListingLedger<S> {
    pub fn new(storage: Arc<S>, destination: impl Into<String>) -> Self {
        Self {
            storage,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl<S: RemoteStorage> LedgerStore for ListingLedger<S> {
    async fn get(&self, item: &ItemName, _collection: &str) -> Result<LedgerLookup, LedgerError> {
        let handle = self
            .storage
            .resolve(&self.destination)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let names = self
            .storage
            .list(&handle)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        if names.iter().any(|n| n == item.as_str()) {
            Ok(LedgerLookup::Present)
        } else {
            Ok(LedgerLookup::Absent)
        }
    }

    async fn put(&self, _record: &LedgerRecord) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::MediaLocator;
    use crate::storage::LocalDirStorage;
    use tempfile::tempdir;

    fn name(s: &str) -> ItemName {
        MediaLocator::new(format!("https://example.com/{s}"))
            .item_name()
            .unwrap()
    }

    #[tokio::test]
    async fn presence_follows_destination_contents() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("Show")).unwrap();
        std::fs::write(root.path().join("Show/ep1.mp3"), b"audio").unwrap();

        let ledger = ListingLedger::new(Arc::new(LocalDirStorage::new(root.path())), "Show");

        assert_eq!(
            ledger.get(&name("ep1.mp3"), "Show").await.unwrap(),
            LedgerLookup::Present
        );
        assert_eq!(
            ledger.get(&name("ep2.mp3"), "Show").await.unwrap(),
            LedgerLookup::Absent
        );
    }

    #[tokio::test]
    async fn missing_destination_is_an_error() {
        let root = tempdir().unwrap();
        let ledger = ListingLedger::new(Arc::new(LocalDirStorage::new(root.path())), "Gone");

        let err = ledger.get(&name("ep1.mp3"), "Show").await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }
}
