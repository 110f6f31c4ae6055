pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod item;
pub mod ledger;
pub mod locator;
pub mod notify;
pub mod progress;
pub mod report;
pub mod storage;
pub mod sync;
pub mod transfer;

// Re-export main types for convenience
pub use config::{LedgerConfig, NotifierConfig, SyncConfig, load_request};
pub use error::{
    ConfigError, DownloadError, FeedError, LedgerError, LocatorError, NotifyError, StorageError,
    SyncError,
};
pub use feed::{fetch_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use item::{FailureStage, ItemFailure, ItemOutcome};
pub use ledger::{
    JsonFileLedger, Ledger, LedgerLookup, LedgerRecord, LedgerStore, ListingLedger, MemoryLedger,
};
pub use locator::{ItemName, MediaLocator};
pub use notify::{LogNotifier, Notifier, WebhookNotifier};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use report::{RunReport, render};
pub use storage::{LocalDirStorage, RemoteStorage};
pub use sync::{Collaborators, SyncOptions, SyncPipeline, SyncRequest, SyncResult};
