// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{DownloadError, StorageError};
use crate::http::HttpClient;
use crate::locator::{ItemName, MediaLocator};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::storage::RemoteStorage;

const TEMP_PREFIX: &str = "podcast";

/// Position of an item within the current run, for progress reporting
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Index of this item in feed order
    pub item_index: usize,
    /// Number of locators in the feed
    pub total_items: usize,
}

/// A downloaded media file held in transient local storage
///
/// The file is deleted when the artifact is dropped, whichever way the
/// item's processing ends.
#[derive(Debug)]
pub struct TempArtifact {
    file: NamedTempFile,
    /// Number of bytes written
    pub bytes: u64,
    /// `sha256:<hex>` digest of the content
    pub content_hash: String,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

fn create_temp_file(temp_dir: Option<&Path>) -> Result<NamedTempFile, DownloadError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(DownloadError::TempFileFailed)
}

/// Download a media item into a fresh temporary file
///
/// Streams the response body to disk, hashing it on the way and reporting
/// progress through the reporter. Nothing is left on disk when this fails.
pub async fn download_to_temp<C: HttpClient>(
    client: &C,
    locator: &MediaLocator,
    item: &ItemName,
    temp_dir: Option<&Path>,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<TempArtifact, DownloadError> {
    let url = locator.as_str();
    info!(url, "downloading media");

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        item_name: item.to_string(),
        item_index: context.item_index,
        total_items: context.total_items,
        content_length: response.content_length,
    });

    let temp = create_temp_file(temp_dir)?;
    let temp_path: PathBuf = temp.path().to_path_buf();
    let write_error = |e: std::io::Error| DownloadError::FileWriteFailed {
        path: temp_path.clone(),
        source: e,
    };

    let std_file = temp.as_file().try_clone().map_err(write_error)?;
    let mut file = tokio::fs::File::from_std(std_file);

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk).await.map_err(write_error)?;
        hasher.update(&chunk);
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            item_name: item.to_string(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush().await.map_err(write_error)?;
    file.sync_all().await.map_err(write_error)?;

    let content_hash = format!("sha256:{:x}", hasher.finalize());
    debug!(item = %item, bytes = bytes_downloaded, %content_hash, "bytes copied to temp file");

    reporter.report(ProgressEvent::DownloadCompleted {
        item_name: item.to_string(),
        bytes_downloaded,
    });

    Ok(TempArtifact {
        file: temp,
        bytes: bytes_downloaded,
        content_hash,
    })
}

/// Push a downloaded artifact to `destination/item` on the remote store
pub async fn push_artifact<S: RemoteStorage>(
    storage: &S,
    destination: &S::Handle,
    artifact: &TempArtifact,
    item: &ItemName,
    reporter: &SharedProgressReporter,
) -> Result<(), StorageError> {
    reporter.report(ProgressEvent::Uploading {
        item_name: item.to_string(),
    });

    storage.push(destination, artifact.path(), item).await?;
    info!(item = %item, bytes = artifact.bytes, "uploaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, BytesResponse, HttpResponse};
    use crate::progress::NoopReporter;
    use crate::storage::LocalDirStorage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, reqwest::Error> {
            Ok(BytesResponse {
                status: self.status,
                body: Bytes::from(self.response_data.clone()),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    /// Sends one chunk of the body and then breaks the connection
    struct TruncatingHttpClient;

    fn connection_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
    }

    #[async_trait]
    impl HttpClient for TruncatingHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, reqwest::Error> {
            Err(connection_error())
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let stream: ByteStream = Box::pin(futures::stream::iter(vec![
                Ok(Bytes::from_static(b"first half of the audio")),
                Err(connection_error()),
            ]));

            Ok(HttpResponse {
                status: 200,
                content_length: Some(1024),
                body: stream,
            })
        }
    }

    fn locator() -> (MediaLocator, ItemName) {
        let locator = MediaLocator::new("https://example.com/episode.mp3");
        let name = locator.item_name().unwrap();
        (locator, name)
    }

    fn context() -> DownloadContext {
        DownloadContext {
            item_index: 0,
            total_items: 1,
        }
    }

    #[tokio::test]
    async fn download_writes_temp_file_and_hash() {
        let scratch = tempdir().unwrap();
        let client = MockHttpClient {
            response_data: b"test audio content".to_vec(),
            status: 200,
        };
        let (locator, name) = locator();

        let artifact = download_to_temp(
            &client,
            &locator,
            &name,
            Some(scratch.path()),
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(artifact.bytes, 18);
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"test audio content");
        assert!(artifact.content_hash.starts_with("sha256:"));
        assert_eq!(artifact.content_hash.len(), "sha256:".len() + 64);
    }

    #[tokio::test]
    async fn dropping_artifact_removes_temp_file() {
        let scratch = tempdir().unwrap();
        let client = MockHttpClient {
            response_data: b"audio".to_vec(),
            status: 200,
        };
        let (locator, name) = locator();

        let artifact = download_to_temp(
            &client,
            &locator,
            &name,
            Some(scratch.path()),
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn download_fails_on_http_error_without_leftovers() {
        let scratch = tempdir().unwrap();
        let client = MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        };
        let (locator, name) = locator();

        let result = download_to_temp(
            &client,
            &locator,
            &name,
            Some(scratch.path()),
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_no_partial_temp_file() {
        let scratch = tempdir().unwrap();
        let (locator, name) = locator();

        let result = download_to_temp(
            &TruncatingHttpClient,
            &locator,
            &name,
            Some(scratch.path()),
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(result, Err(DownloadError::StreamFailed { .. })));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn push_artifact_stores_under_item_name() {
        let scratch = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let client = MockHttpClient {
            response_data: b"audio".to_vec(),
            status: 200,
        };
        let (locator, name) = locator();
        let reporter = NoopReporter::shared();

        let artifact = download_to_temp(
            &client,
            &locator,
            &name,
            Some(scratch.path()),
            &context(),
            &reporter,
        )
        .await
        .unwrap();

        let storage = LocalDirStorage::new(remote.path());
        let destination = storage.resolve("").await.unwrap();
        push_artifact(&storage, &destination, &artifact, &name, &reporter)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(remote.path().join("episode.mp3")).unwrap(),
            b"audio"
        );
    }
}
