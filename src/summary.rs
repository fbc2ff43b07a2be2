//! Structured results of a cleanup run.

use crate::error::CleanError;
use std::path::{Path, PathBuf};

/// What happened to a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    DeletedDirectory,
    DeletedFile,
    CleanedSolution,
    CleanedProject { bindings_removed: usize },
    /// Matched a pattern but was left alone
    Skipped { reason: String },
}

/// A successful or skipped entry, in the order it was processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub path: PathBuf,
    pub action: Action,
}

/// Category of a per-entry failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryErrorKind {
    Access,
    Parse,
    Write,
}

/// A per-entry failure. These never stop a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    pub path: PathBuf,
    pub kind: EntryErrorKind,
    pub message: String,
}

impl From<CleanError> for EntryError {
    fn from(err: CleanError) -> Self {
        let kind = match &err {
            CleanError::Parse { .. } => EntryErrorKind::Parse,
            CleanError::Write { .. } => EntryErrorKind::Write,
            _ => EntryErrorKind::Access,
        };

        Self {
            path: err.path().map(Path::to_path_buf).unwrap_or_default(),
            kind,
            message: err.to_string(),
        }
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one entry was deleted or rewritten
    Cleaned,
    /// The run completed without finding anything to change
    NothingToClean,
}

/// One line of the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntry<'a> {
    Outcome(&'a EntryOutcome),
    Error(&'a EntryError),
}

#[derive(Debug, Clone, Copy)]
enum Logged {
    Outcome(usize),
    Error(usize),
}

/// Counters and per-entry log for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    root: PathBuf,
    dry_run: bool,
    directories_deleted: usize,
    files_deleted: usize,
    solution_files_cleaned: usize,
    project_files_cleaned: usize,
    bytes_reclaimed: Option<u64>,
    outcomes: Vec<EntryOutcome>,
    entry_errors: Vec<EntryError>,
    order: Vec<Logged>,
}

impl RunSummary {
    pub(crate) fn new(root: &Path, dry_run: bool, calculate_sizes: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            dry_run,
            bytes_reclaimed: calculate_sizes.then_some(0),
            ..Default::default()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Counts describe what would have changed, nothing was touched
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn directories_deleted(&self) -> usize {
        self.directories_deleted
    }

    pub fn files_deleted(&self) -> usize {
        self.files_deleted
    }

    pub fn solution_files_cleaned(&self) -> usize {
        self.solution_files_cleaned
    }

    pub fn project_files_cleaned(&self) -> usize {
        self.project_files_cleaned
    }

    /// Bytes freed by deletions, if sizes were measured
    pub fn bytes_reclaimed(&self) -> Option<u64> {
        self.bytes_reclaimed
    }

    pub fn outcomes(&self) -> &[EntryOutcome] {
        &self.outcomes
    }

    pub fn entry_errors(&self) -> &[EntryError] {
        &self.entry_errors
    }

    /// Outcomes and errors interleaved in the order entries were processed
    pub fn log(&self) -> impl Iterator<Item = LogEntry<'_>> {
        self.order.iter().map(|logged| match *logged {
            Logged::Outcome(i) => LogEntry::Outcome(&self.outcomes[i]),
            Logged::Error(i) => LogEntry::Error(&self.entry_errors[i]),
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, Action::Skipped { .. }))
    }

    pub fn has_errors(&self) -> bool {
        !self.entry_errors.is_empty()
    }

    pub fn total_actions(&self) -> usize {
        self.directories_deleted
            + self.files_deleted
            + self.solution_files_cleaned
            + self.project_files_cleaned
    }

    pub fn status(&self) -> RunStatus {
        if self.total_actions() == 0 {
            RunStatus::NothingToClean
        } else {
            RunStatus::Cleaned
        }
    }

    pub(crate) fn record(&mut self, path: &Path, action: Action) {
        match action {
            Action::DeletedDirectory => self.directories_deleted += 1,
            Action::DeletedFile => self.files_deleted += 1,
            Action::CleanedSolution => self.solution_files_cleaned += 1,
            Action::CleanedProject { .. } => self.project_files_cleaned += 1,
            Action::Skipped { .. } => {}
        }

        self.order.push(Logged::Outcome(self.outcomes.len()));
        self.outcomes.push(EntryOutcome {
            path: path.to_path_buf(),
            action,
        });
    }

    pub(crate) fn add_bytes(&mut self, bytes: u64) {
        if let Some(total) = self.bytes_reclaimed.as_mut() {
            *total += bytes;
        }
    }

    pub(crate) fn record_error(&mut self, error: impl Into<EntryError>) {
        self.order.push(Logged::Error(self.entry_errors.len()));
        self.entry_errors.push(error.into());
    }
}
