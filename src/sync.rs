// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::feed::fetch_feed;
use crate::http::HttpClient;
use crate::item::{self, ItemOutcome};
use crate::ledger::{Ledger, SharedLedgerStore};
use crate::locator::MediaLocator;
use crate::notify::SharedNotifier;
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};
use crate::report::{RunReport, notify_operator, render};
use crate::storage::RemoteStorage;
use crate::transfer::{DownloadContext, download_to_temp, push_artifact};

/// What to back up and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// URL of the RSS feed
    pub feed_url: String,
    /// Slash-delimited directory on the remote store
    pub target_directory: String,
    /// Collection the items belong to, e.g. the show name
    pub podcast: String,
}

/// Options for a backup run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Stop starting new items once this much time has passed
    pub deadline: Option<Duration>,
    /// Directory for transient downloads (system temp dir if None)
    pub temp_dir: Option<PathBuf>,
}

/// Result of a backup run
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Backed up and failed items, in feed order
    pub report: RunReport,
    /// Rendered report, empty if there was nothing to report
    pub message: String,
    /// Number of items already in the ledger
    pub skipped: usize,
    /// Number of items not started because the deadline passed
    pub deferred: usize,
    /// Whether the operator was notified
    pub notified: bool,
}

/// Collaborators the pipeline talks to
pub struct Collaborators<C, S> {
    pub client: C,
    pub storage: Arc<S>,
    pub ledger: SharedLedgerStore,
    pub notifier: SharedNotifier,
}

/// Backs up the media items of one feed
///
/// A run fetches the feed, resolves the destination, then takes every
/// locator through ledger check, download, upload and record, one at a
/// time in feed order. Item failures are collected into the report; only
/// feed and destination problems abort the run.
pub struct SyncPipeline<C, S> {
    request: SyncRequest,
    options: SyncOptions,
    client: C,
    storage: Arc<S>,
    ledger: Ledger,
    notifier: SharedNotifier,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient, S: RemoteStorage> SyncPipeline<C, S> {
    pub fn new(request: SyncRequest, options: SyncOptions, collaborators: Collaborators<C, S>) -> Self {
        Self {
            request,
            options,
            client: collaborators.client,
            storage: collaborators.storage,
            ledger: Ledger::new(collaborators.ledger),
            notifier: collaborators.notifier,
            reporter: NoopReporter::shared(),
        }
    }

    /// Replace the progress reporter
    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn request(&self) -> &SyncRequest {
        &self.request
    }

    /// Execute one run to completion
    pub async fn run(&self) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        let request = &self.request;

        self.reporter.report(ProgressEvent::FetchingFeed {
            url: request.feed_url.clone(),
        });
        let links = fetch_feed(&self.client, &request.feed_url).await?;
        self.reporter.report(ProgressEvent::FeedParsed {
            total_links: links.len(),
        });

        info!(path = %request.target_directory, "resolving destination");
        let destination = self
            .storage
            .resolve(&request.target_directory)
            .await
            .map_err(|e| SyncError::DestinationUnresolvable {
                path: request.target_directory.clone(),
                source: e,
            })?;
        self.reporter.report(ProgressEvent::DestinationResolved {
            path: request.target_directory.clone(),
        });

        let mut report = RunReport::default();
        let mut skipped = 0;
        let mut deferred = 0;
        let total_items = links.len();

        for (item_index, locator) in links.iter().enumerate() {
            if let Some(deadline) = self.options.deadline
                && started.elapsed() >= deadline
            {
                deferred = total_items - item_index;
                warn!(deferred, "deadline reached, not starting further items");
                break;
            }

            let context = DownloadContext {
                item_index,
                total_items,
            };
            let outcome = self.process_item(locator, &context, &destination).await;

            match &outcome {
                ItemOutcome::Skipped(item) => {
                    info!(item = %item, "already backed up, skipping");
                    skipped += 1;
                    self.reporter.report(ProgressEvent::ItemSkipped {
                        item_name: item.to_string(),
                    });
                }
                ItemOutcome::Failed(failure) => {
                    warn!(item = %failure.subject, stage = %failure.stage, cause = %failure.cause, "item failed");
                    self.reporter.report(ProgressEvent::ItemFailed {
                        item_name: failure.subject.clone(),
                        error: format!("{} failed: {}", failure.stage, failure.cause),
                    });
                }
                ItemOutcome::Succeeded(item) => {
                    self.reporter.report(ProgressEvent::ItemSucceeded {
                        item_name: item.to_string(),
                    });
                }
            }

            report.push(&outcome);
        }

        self.reporter.report(ProgressEvent::SyncCompleted {
            succeeded_count: report.successes.len(),
            skipped_count: skipped,
            failed_count: report.failures.len(),
            deferred_count: deferred,
        });

        if report.successes.is_empty() {
            info!("no files were backed up");
        }

        let message = render(&report);
        let notified = notify_operator(self.notifier.as_ref(), &message).await;

        Ok(SyncResult {
            report,
            message,
            skipped,
            deferred,
            notified,
        })
    }

    async fn process_item(
        &self,
        locator: &MediaLocator,
        context: &DownloadContext,
        destination: &S::Handle,
    ) -> ItemOutcome {
        match self.advance_item(locator, context, destination).await {
            Ok(outcome) | Err(outcome) => outcome,
        }
    }

    /// Walk one item through its states; `Err` carries an early terminal
    /// outcome
    async fn advance_item(
        &self,
        locator: &MediaLocator,
        context: &DownloadContext,
        destination: &S::Handle,
    ) -> Result<ItemOutcome, ItemOutcome> {
        let collection = self.request.podcast.as_str();

        let item = item::named(locator, locator.item_name()).into_result()?;

        item::ledger_checked(&item, self.ledger.exists(&item, collection).await).into_result()?;

        let artifact = item::downloaded(
            &item,
            download_to_temp(
                &self.client,
                locator,
                &item,
                self.options.temp_dir.as_deref(),
                context,
                &self.reporter,
            )
            .await,
        )
        .into_result()?;

        let pushed = push_artifact(
            self.storage.as_ref(),
            destination,
            &artifact,
            &item,
            &self.reporter,
        )
        .await;
        let content_hash = artifact.content_hash.clone();
        drop(artifact);

        item::uploaded(&item, pushed).into_result()?;

        let recorded = self
            .ledger
            .record(&item, collection, Some(content_hash))
            .await;
        Ok(item::recorded(&item, recorded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{FeedError, LedgerError, NotifyError, StorageError};
    use crate::http::{ByteStream, BytesResponse, HttpResponse};
    use crate::item::FailureStage;
    use crate::ledger::{LedgerLookup, LedgerRecord, LedgerStore, MemoryLedger};
    use crate::locator::ItemName;
    use crate::notify::Notifier;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    const FEED_URL: &str = "https://example.com/feed.xml";

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast</description>
    <item>
      <title>Episode 1</title>
      <enclosure url="https://example.com/ep1.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Trailer without audio</title>
    </item>
    <item>
      <title>Episode 2</title>
      <media:content url="https://example.com/ep2.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 3</title>
      <enclosure url="https://example.com/ep3.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    const EMPTY_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test Podcast</title>
    <description>Nothing yet</description>
  </channel>
</rss>"#;

    #[derive(Clone)]
    struct MockHttpClient {
        feed_status: u16,
        feed_xml: String,
        missing_media: HashSet<String>,
        streamed: Arc<Mutex<Vec<String>>>,
    }

    impl MockHttpClient {
        fn new(feed_xml: &str) -> Self {
            Self {
                feed_status: 200,
                feed_xml: feed_xml.to_string(),
                missing_media: HashSet::new(),
                streamed: Arc::default(),
            }
        }

        fn streamed(&self) -> Vec<String> {
            self.streamed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, reqwest::Error> {
            Ok(BytesResponse {
                status: self.feed_status,
                body: Bytes::from(self.feed_xml.clone()),
            })
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.streamed.lock().unwrap().push(url.to_string());

            let status = if self.missing_media.contains(url) {
                404
            } else {
                200
            };
            let data = format!("audio for {url}").into_bytes();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    /// Remote store that keeps pushed files in memory
    #[derive(Default)]
    struct RecordingStorage {
        unresolvable: bool,
        reject: HashSet<String>,
        calls: AtomicUsize,
        files: Mutex<HashMap<String, Vec<u8>>>,
        pushed_from: Mutex<Vec<std::path::PathBuf>>,
    }

    impl RecordingStorage {
        fn names(&self) -> Vec<String> {
            let mut names: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl RemoteStorage for RecordingStorage {
        type Handle = String;

        async fn resolve(&self, path: &str) -> Result<String, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unresolvable {
                Err(StorageError::NotFound(path.to_string()))
            } else {
                Ok(path.to_string())
            }
        }

        async fn push(
            &self,
            _handle: &String,
            local_file: &Path,
            name: &ItemName,
        ) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pushed_from
                .lock()
                .unwrap()
                .push(local_file.to_path_buf());

            if self.reject.contains(name.as_str()) {
                return Err(StorageError::InvalidName(name.to_string()));
            }

            let content = std::fs::read(local_file).map_err(|e| StorageError::Io {
                path: local_file.to_path_buf(),
                source: e,
            })?;
            self.files.lock().unwrap().insert(name.to_string(), content);
            Ok(())
        }

        async fn list(&self, _handle: &String) -> Result<Vec<String>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.names())
        }
    }

    /// Ledger wrapper that can fail lookups or writes for chosen items
    #[derive(Default)]
    struct FlakyLedger {
        inner: MemoryLedger,
        fail_lookup: HashSet<String>,
        fail_put: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerStore for FlakyLedger {
        async fn get(
            &self,
            item: &ItemName,
            collection: &str,
        ) -> Result<LedgerLookup, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup.contains(item.as_str()) {
                return Err(LedgerError::Unavailable("throttled".to_string()));
            }
            self.inner.get(item, collection).await
        }

        async fn put(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_put {
                return Err(LedgerError::Unavailable("read only".to_string()));
            }
            self.inner.put(record).await
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    struct Harness {
        client: MockHttpClient,
        storage: Arc<RecordingStorage>,
        ledger: Arc<FlakyLedger>,
        notifier: Arc<RecordingNotifier>,
        options: SyncOptions,
    }

    impl Harness {
        fn new(feed_xml: &str) -> Self {
            Self {
                client: MockHttpClient::new(feed_xml),
                storage: Arc::default(),
                ledger: Arc::default(),
                notifier: Arc::default(),
                options: SyncOptions::default(),
            }
        }

        fn pipeline(&self) -> SyncPipeline<MockHttpClient, RecordingStorage> {
            SyncPipeline::new(
                SyncRequest {
                    feed_url: FEED_URL.to_string(),
                    target_directory: "Backups/Test Podcast".to_string(),
                    podcast: "Test Podcast".to_string(),
                },
                self.options.clone(),
                Collaborators {
                    client: self.client.clone(),
                    storage: self.storage.clone(),
                    ledger: self.ledger.clone(),
                    notifier: self.notifier.clone(),
                },
            )
        }

        fn recorded(&self) -> Vec<String> {
            self.ledger
                .inner
                .records()
                .into_iter()
                .map(|r| r.item_name)
                .collect()
        }

        fn notifications(&self) -> usize {
            self.notifier.sent.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn sync_backs_up_all_episodes() {
        let harness = Harness::new(SAMPLE_FEED);

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ep1.mp3", "ep2.mp3", "ep3.mp3"]);
        assert!(result.report.failures.is_empty());
        assert_eq!(result.skipped, 0);
        assert_eq!(harness.recorded(), vec!["ep1.mp3", "ep2.mp3", "ep3.mp3"]);
        assert_eq!(harness.storage.names(), vec!["ep1.mp3", "ep2.mp3", "ep3.mp3"]);
        assert_eq!(
            harness.storage.files.lock().unwrap()["ep2.mp3"],
            b"audio for https://example.com/ep2.mp3".to_vec()
        );
        assert!(result.notified);
        assert_eq!(harness.notifications(), 1);
    }

    #[tokio::test]
    async fn second_run_skips_everything_and_stays_silent() {
        let harness = Harness::new(SAMPLE_FEED);

        harness.pipeline().run().await.unwrap();
        let result = harness.pipeline().run().await.unwrap();

        assert!(result.report.is_empty());
        assert_eq!(result.skipped, 3);
        assert_eq!(result.message, "");
        assert!(!result.notified);
        assert_eq!(harness.notifications(), 1);
        assert_eq!(harness.client.streamed().len(), 3);
    }

    #[tokio::test]
    async fn ledger_lookup_error_fails_only_that_item() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.ledger = Arc::new(FlakyLedger {
            fail_lookup: HashSet::from(["ep2.mp3".to_string()]),
            ..Default::default()
        });

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ep1.mp3", "ep3.mp3"]);
        assert_eq!(result.report.failures.len(), 1);
        assert!(result.report.failures[0].starts_with("ep2.mp3: ledger check failed"));
        assert!(
            !harness
                .client
                .streamed()
                .contains(&"https://example.com/ep2.mp3".to_string())
        );
        assert_eq!(result.skipped, 0);
    }

    #[tokio::test]
    async fn empty_feed_aborts_before_ledger_and_storage() {
        let harness = Harness::new(EMPTY_FEED);

        let err = harness.pipeline().run().await.unwrap_err();

        assert!(matches!(err, SyncError::Feed(FeedError::Empty { .. })));
        assert_eq!(harness.ledger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.storage.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.notifications(), 0);
    }

    #[tokio::test]
    async fn unreachable_feed_aborts_run() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.client.feed_status = 500;

        let err = harness.pipeline().run().await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Feed(FeedError::Unavailable { status: 500, .. })
        ));
        assert_eq!(harness.ledger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolvable_destination_aborts_run() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.storage = Arc::new(RecordingStorage {
            unresolvable: true,
            ..Default::default()
        });

        let err = harness.pipeline().run().await.unwrap_err();

        assert!(matches!(err, SyncError::DestinationUnresolvable { .. }));
        assert_eq!(harness.ledger.calls.load(Ordering::SeqCst), 0);
        assert!(harness.client.streamed().is_empty());
        assert_eq!(harness.notifications(), 0);
    }

    #[tokio::test]
    async fn upload_failure_is_reported_and_not_recorded() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.storage = Arc::new(RecordingStorage {
            reject: HashSet::from(["ep1.mp3".to_string()]),
            ..Default::default()
        });

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ep2.mp3", "ep3.mp3"]);
        assert_eq!(result.report.failures.len(), 1);
        assert!(result.report.failures[0].starts_with("ep1.mp3: upload failed"));
        assert_eq!(harness.recorded(), vec!["ep2.mp3", "ep3.mp3"]);

        let text = &result.message;
        assert!(text.find("Failures:").unwrap() < text.find("Successfully backed up:").unwrap());
    }

    #[tokio::test]
    async fn download_failure_continues_with_next_item() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness
            .client
            .missing_media
            .insert("https://example.com/ep1.mp3".to_string());

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ep2.mp3", "ep3.mp3"]);
        assert_eq!(result.report.failures.len(), 1);
        assert!(result.report.failures[0].contains("404"));
        assert_eq!(
            result.report.successes.len() + result.report.failures.len(),
            3
        );
    }

    #[tokio::test]
    async fn record_failure_still_counts_as_success() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.ledger = Arc::new(FlakyLedger {
            fail_put: true,
            ..Default::default()
        });

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes.len(), 3);
        assert!(result.report.is_clean());
        assert!(harness.recorded().is_empty());
    }

    #[tokio::test]
    async fn temp_files_are_gone_after_run() {
        let scratch = tempdir().unwrap();
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.options.temp_dir = Some(scratch.path().to_path_buf());
        harness.storage = Arc::new(RecordingStorage {
            reject: HashSet::from(["ep3.mp3".to_string()]),
            ..Default::default()
        });
        harness
            .client
            .missing_media
            .insert("https://example.com/ep2.mp3".to_string());

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ep1.mp3"]);
        assert_eq!(result.report.failures.len(), 2);

        let pushed_from = harness.storage.pushed_from.lock().unwrap().clone();
        assert_eq!(pushed_from.len(), 2);
        assert!(pushed_from.iter().all(|p| p.starts_with(scratch.path())));
        assert!(pushed_from.iter().all(|p| !p.exists()));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn expired_deadline_defers_remaining_items() {
        let mut harness = Harness::new(SAMPLE_FEED);
        harness.options.deadline = Some(Duration::ZERO);

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.deferred, 3);
        assert!(result.report.is_empty());
        assert!(harness.client.streamed().is_empty());
        assert!(!result.notified);
    }

    #[tokio::test]
    async fn items_without_name_are_failures() {
        let feed = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test</title>
    <item><enclosure url="https://example.com/media/" type="audio/mpeg"/></item>
    <item><enclosure url="https://example.com/ok.mp3" type="audio/mpeg"/></item>
  </channel>
</rss>"#;
        let harness = Harness::new(feed);

        let result = harness.pipeline().run().await.unwrap();

        assert_eq!(result.report.successes, vec!["ok.mp3"]);
        assert_eq!(result.report.failures.len(), 1);
        assert!(
            result.report.failures[0]
                .starts_with(&format!("https://example.com/media/: {}", FailureStage::Locator))
        );
    }
}
