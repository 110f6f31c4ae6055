// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted during a backup run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed successfully
    FeedParsed { total_links: usize },

    /// Destination directory on the remote store was found
    DestinationResolved { path: String },

    /// Item is already in the ledger
    ItemSkipped { item_name: String },

    /// A download is starting
    DownloadStarting {
        item_name: String,
        /// Index of this item in feed order
        item_index: usize,
        /// Number of media links in the feed
        total_items: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        item_name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// Download finished, the file is in local temporary storage
    DownloadCompleted {
        item_name: String,
        bytes_downloaded: u64,
    },

    /// Upload to the destination is starting
    Uploading { item_name: String },

    /// Item was backed up
    ItemSucceeded { item_name: String },

    /// Item could not be backed up
    ItemFailed {
        /// Item name, or the raw locator when no name could be derived
        item_name: String,
        error: String,
    },

    /// Run finished processing items
    SyncCompleted {
        succeeded_count: usize,
        skipped_count: usize,
        failed_count: usize,
        deferred_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
