use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use url::Url;

use podbackup::{
    ConfigError, LedgerConfig, NoopReporter, NotifierConfig, ProgressEvent, ProgressReporter,
    SharedProgressReporter, SyncConfig, SyncOptions, SyncRequest, load_request,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Back up podcast episodes from an RSS feed to remote storage
#[derive(Parser, Debug)]
#[command(name = "podbackup")]
#[command(about = "Back up podcast episodes from an RSS feed to remote storage")]
#[command(version)]
struct Args {
    /// JSON trigger event with feed_url, target_directory and podcast;
    /// takes precedence over the individual request options
    #[arg(long)]
    event: Option<PathBuf>,

    /// RSS feed URL
    #[arg(long, env = "PODBACKUP_FEED_URL")]
    feed_url: Option<String>,

    /// Destination directory on the remote store, slash-delimited
    #[arg(long, env = "PODBACKUP_TARGET_DIRECTORY")]
    target_directory: Option<String>,

    /// Collection name used to scope the ledger (usually the show name)
    #[arg(long, env = "PODBACKUP_PODCAST")]
    podcast: Option<String>,

    /// Root directory of the remote store
    #[arg(long, env = "PODBACKUP_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Ledger file path, or `listing` / `memory`
    #[arg(long, env = "PODBACKUP_LEDGER", default_value = "podbackup-ledger.jsonl")]
    ledger: LedgerConfig,

    /// Operator address for notifications
    #[arg(long, env = "PODBACKUP_NOTIFY_EMAIL")]
    notify_email: Option<String>,

    /// Webhook receiving notifications as JSON
    #[arg(long, env = "PODBACKUP_NOTIFY_WEBHOOK")]
    notify_webhook: Option<Url>,

    /// Stop starting new downloads after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Directory for transient downloads
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn request(&self) -> Result<SyncRequest, ConfigError> {
        if let Some(path) = &self.event {
            return load_request(path);
        }

        Ok(SyncRequest {
            feed_url: self.feed_url.clone().ok_or(ConfigError::Missing("feed_url"))?,
            target_directory: self
                .target_directory
                .clone()
                .ok_or(ConfigError::Missing("target_directory"))?,
            podcast: self.podcast.clone().ok_or(ConfigError::Missing("podcast"))?,
        })
    }

    fn config(&self) -> Result<SyncConfig, ConfigError> {
        Ok(SyncConfig {
            request: self.request()?,
            storage_root: self.storage_root.clone(),
            ledger: self.ledger.clone(),
            notifier: NotifierConfig {
                address: self.notify_email.clone(),
                webhook_url: self.notify_webhook.clone(),
            },
            options: SyncOptions {
                deadline: self.deadline_secs.map(Duration::from_secs),
                temp_dir: self.temp_dir.clone(),
            },
        })
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    current: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_bar = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} {wide_msg}") {
            main_bar.set_style(style);
        }
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            current: Mutex::new(None),
            main_bar,
        }
    }

    fn start_bar(&self, length: u64, message: String) {
        let bar = self.multi.add(ProgressBar::new(length));
        if let Ok(style) = ProgressStyle::default_bar().template(&format!(
            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
        )) {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_message(message);

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = current.as_ref() {
            f(bar);
        }
    }

    fn finish_bar(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = current.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed { total_links } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} media links found",
                    total_links.to_string().cyan()
                ));
            }

            ProgressEvent::DestinationResolved { path } => {
                self.main_bar
                    .set_message(format!("{FOLDER}Backing up to {}", path.cyan()));
            }

            ProgressEvent::ItemSkipped { item_name } => {
                self.main_bar
                    .set_message(format!("{} {}", "Already backed up:".dimmed(), item_name));
            }

            ProgressEvent::DownloadStarting {
                item_name,
                item_index,
                total_items,
                content_length,
            } => {
                self.start_bar(
                    content_length.unwrap_or(0),
                    format!(
                        "[{}/{}] {}",
                        (item_index + 1).to_string().cyan(),
                        total_items.to_string().cyan(),
                        truncate_title(&item_name, 40)
                    ),
                );
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => self.with_bar(|bar| {
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }),

            ProgressEvent::DownloadCompleted {
                bytes_downloaded, ..
            } => self.with_bar(|bar| bar.set_position(bytes_downloaded)),

            ProgressEvent::Uploading { item_name } => {
                self.main_bar.set_message(format!(
                    "{UPLOAD}Uploading {}",
                    truncate_title(&item_name, 40)
                ));
            }

            ProgressEvent::ItemSucceeded { item_name } => {
                self.finish_bar();
                self.main_bar.println(format!(
                    "{SUCCESS}{}",
                    truncate_title(&item_name, 60).green()
                ));
            }

            ProgressEvent::ItemFailed { item_name, error } => {
                self.finish_bar();
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&item_name, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::SyncCompleted {
                succeeded_count,
                skipped_count,
                failed_count,
                deferred_count,
            } => {
                self.finish_bar();
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} backed up, {} skipped, {} failed, {} deferred",
                    "Backup complete:".bold().green(),
                    succeeded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    },
                    deferred_count.to_string().dimmed()
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podbackup".bold().magenta(),
            "- Podcast Backup".dimmed()
        );
    }

    let config = args.config().context("Invalid configuration")?;

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let pipeline = config
        .build_pipeline()
        .await
        .context("Failed to set up backup")?
        .with_reporter(reporter);

    let result = pipeline.run().await.context("Backup run failed")?;

    if !args.quiet && !result.message.is_empty() {
        println!("\n{}", result.message);
    }

    if !result.report.failures.is_empty() && result.report.successes.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
