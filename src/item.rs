// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-item backup steps as explicit transitions.
//!
//! Every step of an item's processing (name derivation, ledger check,
//! download, upload, record) maps the collaborator's result to either the
//! next state or a terminal [`ItemOutcome`]. The functions here hold no I/O,
//! so each transition can be tested on its own.

use std::fmt;

use tracing::warn;

use crate::error::{DownloadError, LedgerError, LocatorError, StorageError};
use crate::ledger::LedgerLookup;
use crate::locator::{ItemName, MediaLocator};

/// Step at which an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Locator,
    LedgerCheck,
    Download,
    Upload,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Locator => "name lookup",
            FailureStage::LedgerCheck => "ledger check",
            FailureStage::Download => "download",
            FailureStage::Upload => "upload",
        })
    }
}

/// Why an item could not be backed up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Item name, or the raw locator when no name could be derived
    pub subject: String,
    pub stage: FailureStage,
    pub cause: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} failed: {}", self.subject, self.stage, self.cause)
    }
}

/// Terminal state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already recorded in the ledger
    Skipped(ItemName),
    Failed(ItemFailure),
    Succeeded(ItemName),
}

/// Result of one step: carry on with `T`, or stop with an outcome
#[derive(Debug)]
pub enum Transition<T> {
    Proceed(T),
    Finished(ItemOutcome),
}

impl<T> Transition<T> {
    /// `Ok` to proceed, `Err` with the terminal outcome otherwise
    pub fn into_result(self) -> Result<T, ItemOutcome> {
        match self {
            Transition::Proceed(value) => Ok(value),
            Transition::Finished(outcome) => Err(outcome),
        }
    }
}

fn failed<T>(subject: impl ToString, stage: FailureStage, cause: impl ToString) -> Transition<T> {
    Transition::Finished(ItemOutcome::Failed(ItemFailure {
        subject: subject.to_string(),
        stage,
        cause: cause.to_string(),
    }))
}

/// Discovered → named
pub fn named(
    locator: &MediaLocator,
    result: Result<ItemName, LocatorError>,
) -> Transition<ItemName> {
    match result {
        Ok(item) => Transition::Proceed(item),
        Err(e) => failed(locator, FailureStage::Locator, e),
    }
}

/// LedgerChecking → {Skipped | Failed | Downloading}
///
/// A failing lookup is a failure of this item, never a reason to download.
pub fn ledger_checked(
    item: &ItemName,
    result: Result<LedgerLookup, LedgerError>,
) -> Transition<()> {
    match result {
        Ok(LedgerLookup::Absent) => Transition::Proceed(()),
        Ok(LedgerLookup::Present) => Transition::Finished(ItemOutcome::Skipped(item.clone())),
        Err(e) => failed(item, FailureStage::LedgerCheck, e),
    }
}

/// Downloading → {Failed | Downloaded}
pub fn downloaded<A>(item: &ItemName, result: Result<A, DownloadError>) -> Transition<A> {
    match result {
        Ok(artifact) => Transition::Proceed(artifact),
        Err(e) => failed(item, FailureStage::Download, e),
    }
}

/// Uploading → {Failed | Uploaded}
pub fn uploaded(item: &ItemName, result: Result<(), StorageError>) -> Transition<()> {
    match result {
        Ok(()) => Transition::Proceed(()),
        Err(e) => failed(item, FailureStage::Upload, e),
    }
}

/// Uploaded → Recorded
///
/// The item stays succeeded even if recording fails: the file is stored,
/// the only consequence is that a later run may transfer it again.
pub fn recorded(item: &ItemName, result: Result<(), LedgerError>) -> ItemOutcome {
    if let Err(e) = result {
        warn!(item = %item, error = %e, "failed to record transfer in ledger");
    }
    ItemOutcome::Succeeded(item.clone())
}
