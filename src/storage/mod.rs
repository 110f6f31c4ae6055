// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::locator::ItemName;

pub use local::{LocalDir, LocalDirStorage};

/// Remote store that receives backed-up media files
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Resolved destination directory
    type Handle: Send + Sync;

    /// Resolve a slash-delimited logical path to an existing directory
    async fn resolve(&self, path: &str) -> Result<Self::Handle, StorageError>;

    /// Upload `local_file` into the directory under `name`
    async fn push(
        &self,
        handle: &Self::Handle,
        local_file: &Path,
        name: &ItemName,
    ) -> Result<(), StorageError>;

    /// Names of the files stored in the directory
    async fn list(&self, handle: &Self::Handle) -> Result<Vec<String>, StorageError>;
}
