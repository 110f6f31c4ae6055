// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Write;

use serde::Serialize;
use tracing::{info, warn};

use crate::item::ItemOutcome;
use crate::notify::Notifier;

/// Subject line of operator notifications
pub const NOTIFICATION_SUBJECT: &str = "Podcast backup notification";

/// Outcomes of one run, in feed order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Names of the items that were backed up
    pub successes: Vec<String>,
    /// One line per item that could not be backed up
    pub failures: Vec<String>,
}

impl RunReport {
    /// Add an item outcome. Skipped items are not part of the report.
    pub fn push(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded(item) => self.successes.push(item.to_string()),
            ItemOutcome::Failed(failure) => self.failures.push(failure.to_string()),
            ItemOutcome::Skipped(_) => {}
        }
    }

    /// True if no item failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.failures.is_empty()
    }
}

/// Render the operator-facing summary
///
/// Failures come first, then successes, one entry per line. The text is
/// empty only if both lists are empty.
pub fn render(report: &RunReport) -> String {
    let mut text = String::new();

    if !report.failures.is_empty() {
        text.push_str("Failures:\n");
        for failure in &report.failures {
            let _ = writeln!(text, "{failure}");
        }
        text.push('\n');
    }

    if !report.successes.is_empty() {
        text.push_str("Successfully backed up:\n");
        for item in &report.successes {
            let _ = writeln!(text, "{item}");
        }
    }

    text
}

/// Notify the operator unless the rendered report is empty
///
/// Returns whether a notification was attempted. A failing notifier is
/// logged and otherwise ignored.
pub async fn notify_operator(notifier: &dyn Notifier, text: &str) -> bool {
    if text.is_empty() {
        info!("nothing to report, no notification sent");
        return false;
    }

    match notifier.send(NOTIFICATION_SUBJECT, text).await {
        Ok(()) => info!("operator notified"),
        Err(e) => warn!(error = %e, "failed to notify operator"),
    }
    true
}
