// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::error::{ConfigError, SyncError};
use crate::http::ReqwestClient;
use crate::ledger::{JsonFileLedger, ListingLedger, MemoryLedger, SharedLedgerStore};
use crate::notify::{LogNotifier, SharedNotifier, WebhookNotifier};
use crate::storage::LocalDirStorage;
use crate::sync::{Collaborators, SyncOptions, SyncPipeline, SyncRequest};

/// Where the dedup ledger lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerConfig {
    /// JSON-lines file at the given path
    File { path: PathBuf },
    /// Derive presence from the destination directory listing
    StorageListing,
    /// Keep the ledger in memory for this run only
    Memory,
}

impl FromStr for LedgerConfig {
    type Err = Infallible;

    /// `listing` and `memory` select those modes, anything else is a file path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "listing" => LedgerConfig::StorageListing,
            "memory" => LedgerConfig::Memory,
            path => LedgerConfig::File {
                path: PathBuf::from(path),
            },
        })
    }
}

/// How the operator is notified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Operator address passed on to the notification transport
    pub address: Option<String>,
    /// Endpoint receiving notifications; log only if None
    pub webhook_url: Option<Url>,
}

impl NotifierConfig {
    pub fn build(&self) -> SharedNotifier {
        match &self.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), self.address.clone())),
            None => LogNotifier::shared(),
        }
    }
}

/// Everything a backup run needs
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub request: SyncRequest,
    /// Root directory of the remote store
    pub storage_root: PathBuf,
    pub ledger: LedgerConfig,
    pub notifier: NotifierConfig,
    pub options: SyncOptions,
}

impl SyncConfig {
    /// Construct the collaborators and the pipeline
    ///
    /// Fails if the ledger cannot be opened.
    pub async fn build_pipeline(
        self,
    ) -> Result<SyncPipeline<ReqwestClient, LocalDirStorage>, SyncError> {
        let storage = Arc::new(LocalDirStorage::new(&self.storage_root));
        let ledger = open_ledger(&self.ledger, &storage, &self.request).await?;
        let notifier = self.notifier.build();

        Ok(SyncPipeline::new(
            self.request,
            self.options,
            Collaborators {
                client: ReqwestClient::new(),
                storage,
                ledger,
                notifier,
            },
        ))
    }
}

async fn open_ledger(
    config: &LedgerConfig,
    storage: &Arc<LocalDirStorage>,
    request: &SyncRequest,
) -> Result<SharedLedgerStore, SyncError> {
    let ledger: SharedLedgerStore = match config {
        LedgerConfig::File { path } => {
            info!(path = %path.display(), "opening ledger");
            Arc::new(JsonFileLedger::open(path).await?)
        }
        LedgerConfig::StorageListing => Arc::new(ListingLedger::new(
            Arc::clone(storage),
            request.target_directory.clone(),
        )),
        LedgerConfig::Memory => Arc::new(MemoryLedger::new()),
    };
    Ok(ledger)
}

/// Read a sync request from a JSON trigger event
///
/// The event uses the keys `feed_url`, `target_directory` and `podcast`.
pub fn load_request(path: &Path) -> Result<SyncRequest, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::JsonParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
