// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::locator::ItemName;

use super::RemoteStorage;

const PARTIAL_SUFFIX: &str = ".partial";

/// A directory below the storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDir(PathBuf);

impl LocalDir {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Remote storage backed by a directory tree on a mounted filesystem
///
/// Pushes are written to `<name>.partial` first and renamed into place, so
/// an interrupted push never leaves a file that looks complete.
#[derive(Debug, Clone)]
pub struct LocalDirStorage {
    root: PathBuf,
}

impl LocalDirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[async_trait]
impl RemoteStorage for LocalDirStorage {
    type Handle = LocalDir;

    async fn resolve(&self, path: &str) -> Result<LocalDir, StorageError> {
        let mut dir = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !is_plain_name(segment) {
                return Err(StorageError::NotFound(path.to_string()));
            }
            dir.push(segment);
        }

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {
                debug!(path, dir = %dir.display(), "destination resolved");
                Ok(LocalDir(dir))
            }
            Ok(_) => Err(StorageError::NotFound(path.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(io_error(&dir)(e)),
        }
    }

    async fn push(
        &self,
        handle: &LocalDir,
        local_file: &Path,
        name: &ItemName,
    ) -> Result<(), StorageError> {
        if !is_plain_name(name.as_str()) {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        let final_path = handle.0.join(name.as_str());
        let partial_path = handle.0.join(format!("{name}{PARTIAL_SUFFIX}"));

        let copied = tokio::fs::copy(local_file, &partial_path)
            .await
            .map_err(io_error(&partial_path));
        let copied = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial_path).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&partial_path, &final_path)
            .await
            .map_err(io_error(&final_path))?;

        debug!(file = %final_path.display(), bytes = copied, "pushed");
        Ok(())
    }

    async fn list(&self, handle: &LocalDir) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&handle.0)
            .await
            .map_err(io_error(&handle.0))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&handle.0))? {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !name.ends_with(PARTIAL_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
