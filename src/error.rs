use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {url} is unavailable (HTTP status {status})")]
    Unavailable { url: String, status: u16 },

    #[error("Failed to parse RSS feed: {0}")]
    Malformed(#[source] rss::Error),

    #[error("Feed {url} contains no items")]
    Empty { url: String },
}

/// Errors that can occur when deriving an item name from a media locator
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Invalid media URL '{locator}': {source}")]
    Invalid {
        locator: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Media URL '{locator}' has no file name")]
    EmptyName { locator: String },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create temporary file: {0}")]
    TempFileFailed(#[source] std::io::Error),

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors reported by a remote storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Destination path '{0}' was not found")]
    NotFound(String),

    #[error("'{0}' is not a valid file name on the remote store")]
    InvalidName(String),

    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a ledger store
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt ledger record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize ledger record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Ledger backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when notifying the operator
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification endpoint rejected the message with HTTP status {status}")]
    Rejected { status: u16 },
}

/// Errors that can occur while loading run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read event file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse event JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
}

/// Errors that abort a whole sync run before any item is processed
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Destination '{path}' cannot be resolved: {source}")]
    DestinationUnresolvable {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
