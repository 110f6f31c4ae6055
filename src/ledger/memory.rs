// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::locator::ItemName;

use super::{LedgerLookup, LedgerRecord, LedgerStore};

/// Ledger store kept in process memory
///
/// Nothing survives the process; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored records in insertion order
    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get(&self, item: &ItemName, collection: &str) -> Result<LedgerLookup, LedgerError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.iter().any(|r| r.matches(item.as_str(), collection)) {
            Ok(LedgerLookup::Present)
        } else {
            Ok(LedgerLookup::Absent)
        }
    }

    async fn put(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if !records
            .iter()
            .any(|r| r.matches(&record.item_name, &record.collection))
        {
            records.push(record.clone());
        }
        Ok(())
    }
}
