// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::locator::ItemName;

use super::{LedgerLookup, LedgerRecord, LedgerStore};

/// Ledger store persisted as a JSON-lines file, one record per line
///
/// Records are only ever appended. Several independent processes may share
/// the file; each append is a single `write` of one complete line.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLedger {
    /// Open the ledger at `path`, creating the file (and its parent
    /// directories) if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| LedgerError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Read and parse every record in the file
    pub async fn records(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| LedgerError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
                    path: self.path.clone(),
                    line: index + 1,
                    source: e,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for JsonFileLedger {
    async fn get(&self, item: &ItemName, collection: &str) -> Result<LedgerLookup, LedgerError> {
        let found = self
            .records()
            .await?
            .iter()
            .any(|r| r.matches(item.as_str(), collection));

        Ok(if found {
            LedgerLookup::Present
        } else {
            LedgerLookup::Absent
        })
    }

    async fn put(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LedgerError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| LedgerError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        file.flush().await.map_err(|e| LedgerError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}
