//! Orchestration of a full cleanup run.

use crate::bindings::{solution_section_regex, BindingStripper};
use crate::deleter::{disk_usage, Deleter};
use crate::error::CleanError;
use crate::filesystem::{FileSystem, OsFileSystem};
use crate::patterns::PatternTable;
use crate::safety::SafetyHeuristic;
use crate::scanner::{CandidateEntry, TreeScanner};
use crate::summary::{Action, EntryError, RunSummary};

use regex::bytes::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flags and pattern data for a run
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Scan every level below the root, not just the root itself
    pub recursive: bool,
    /// Clear read-only attributes before deleting
    pub force: bool,
    /// Also remove binding elements from project files
    pub strip_project_bindings: bool,
    /// Report what would change without touching the tree
    pub dry_run: bool,
    /// Measure the size of everything deleted
    pub calculate_sizes: bool,
    pub patterns: PatternTable,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            recursive: true,
            force: true,
            strip_project_bindings: false,
            dry_run: false,
            calculate_sizes: false,
            patterns: PatternTable::default(),
        }
    }
}

impl Configuration {
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_strip_project_bindings(mut self, strip: bool) -> Self {
        self.strip_project_bindings = strip;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_calculate_sizes(mut self, calculate_sizes: bool) -> Self {
        self.calculate_sizes = calculate_sizes;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternTable) -> Self {
        self.patterns = patterns;
        self
    }
}

/// Runs the cleanup phases over one root directory.
///
/// Phases run in a fixed order and each one always finishes: per-entry failures
/// are recorded in the summary and the next entry is attempted.
pub struct Cleaner {
    root: PathBuf,
    config: Configuration,
    fs: Box<dyn FileSystem>,
    solution_section: Regex,
}

/// Mutable state shared by the phases of a single run
struct RunState {
    summary: RunSummary,
    /// Candidates already handled, since overlapping patterns yield the same path twice
    seen: HashSet<PathBuf>,
    /// Directories removed (or that would be, in a dry run)
    removed_dirs: Vec<PathBuf>,
    /// Errors already reported. Every pass re-walks the tree, so an unreadable
    /// directory fails once per pattern.
    reported: HashSet<(PathBuf, String)>,
}

impl RunState {
    fn new(summary: RunSummary) -> Self {
        Self {
            summary,
            seen: HashSet::new(),
            removed_dirs: Vec::new(),
            reported: HashSet::new(),
        }
    }

    fn record_error(&mut self, error: impl Into<EntryError>) {
        let error = error.into();
        if self
            .reported
            .insert((error.path.clone(), error.message.clone()))
        {
            warn!("{}", error.message);
            self.summary.record_error(error);
        }
    }

    /// Whether an entry disappeared with a directory removed earlier in the run
    fn is_gone(&self, path: &Path) -> bool {
        self.removed_dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// Filter the next candidate: records scan errors, drops repeats and removed entries
    fn accept(&mut self, candidate: Result<CandidateEntry, EntryError>) -> Option<PathBuf> {
        let entry = match candidate {
            Ok(entry) => entry,
            // Walks race the deletions: a removed directory can no longer be read
            Err(err) if self.is_gone(&err.path) => return None,
            Err(err) => {
                self.record_error(err);
                return None;
            }
        };

        if self.is_gone(&entry.path) || !self.seen.insert(entry.path.clone()) {
            return None;
        }

        Some(entry.path)
    }
}

impl Cleaner {
    /// Fails with [`CleanError::RootNotFound`] unless `root` is an existing directory,
    /// and with [`CleanError::InvalidTable`] if the solution section names cannot be compiled
    pub fn new(root: impl AsRef<Path>, config: Configuration) -> Result<Self, CleanError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|_| CleanError::RootNotFound(root.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(CleanError::RootNotFound(root.to_path_buf()));
        }

        let solution_section = solution_section_regex(&config.patterns.solution_sections)?;

        Ok(Self {
            root: canonical,
            config,
            fs: Box::new(OsFileSystem),
            solution_section,
        })
    }

    /// Route deletions and rewrites through another filesystem implementation
    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Run every phase and return the summary
    pub fn clean_all(&self) -> RunSummary {
        let stripper = BindingStripper::new(
            self.fs.as_ref(),
            &self.config.patterns.binding_elements,
            self.solution_section.clone(),
            self.config.dry_run,
        );

        info!("cleaning {}", self.root.display());

        let mut state = RunState::new(RunSummary::new(
            &self.root,
            self.config.dry_run,
            self.config.calculate_sizes,
        ));

        self.delete_directories(&mut state);
        self.delete_files(&mut state);
        self.strip_solutions(&stripper, &mut state);
        if self.config.strip_project_bindings {
            self.strip_projects(&stripper, &mut state);
        }

        info!(
            "finished {}: {} directories, {} files, {} solutions, {} projects, {} errors",
            self.root.display(),
            state.summary.directories_deleted(),
            state.summary.files_deleted(),
            state.summary.solution_files_cleaned(),
            state.summary.project_files_cleaned(),
            state.summary.entry_errors().len()
        );

        state.summary
    }

    fn scanner(&self) -> TreeScanner {
        TreeScanner::new(&self.root, self.config.recursive)
    }

    fn deleter(&self) -> Deleter<'_> {
        Deleter::new(self.fs.as_ref(), self.config.force, self.config.dry_run)
    }

    fn delete_directories(&self, state: &mut RunState) {
        debug!("phase: delete directories");
        let safety = SafetyHeuristic::from_table(&self.config.patterns);
        let deleter = self.deleter();

        let mut candidates = self
            .scanner()
            .find_directories(&self.config.patterns.directories);
        while let Some(candidate) = candidates.next() {
            let Some(path) = state.accept(candidate) else {
                continue;
            };

            if !safety.is_safe_to_delete(&path) {
                debug!("skipping {}: no project file next to it", path.display());
                state.summary.record(
                    &path,
                    Action::Skipped {
                        reason: "it doesn't look like build output (no project file next to it)"
                            .to_string(),
                    },
                );
                continue;
            }

            let size = self.config.calculate_sizes.then(|| disk_usage(&path));
            candidates.skip_current_dir();

            match deleter.delete_directory(&path) {
                Ok(()) => {
                    debug!("deleted directory {}", path.display());
                    state.summary.record(&path, Action::DeletedDirectory);
                    state.summary.add_bytes(size.unwrap_or(0));
                    state.removed_dirs.push(path);
                }
                Err(err) => state.record_error(err),
            }
        }
    }

    fn delete_files(&self, state: &mut RunState) {
        debug!("phase: delete files");
        let deleter = self.deleter();

        for candidate in self.scanner().find_files(&self.config.patterns.files) {
            let Some(path) = state.accept(candidate) else {
                continue;
            };

            let size = self.config.calculate_sizes.then(|| disk_usage(&path));

            match deleter.delete_file(&path) {
                Ok(()) => {
                    debug!("deleted file {}", path.display());
                    state.summary.record(&path, Action::DeletedFile);
                    state.summary.add_bytes(size.unwrap_or(0));
                }
                Err(err) => state.record_error(err),
            }
        }
    }

    fn strip_solutions(&self, stripper: &BindingStripper<'_>, state: &mut RunState) {
        debug!("phase: strip solution bindings");

        for path in self.descriptors(&self.config.patterns.solutions, state) {
            match stripper.strip_solution_file(&path) {
                Ok(true) => {
                    debug!("removed source control bindings from {}", path.display());
                    state.summary.record(&path, Action::CleanedSolution);
                }
                Ok(false) => debug!("no bindings in {}", path.display()),
                Err(err) => state.record_error(err),
            }
        }
    }

    fn strip_projects(&self, stripper: &BindingStripper<'_>, state: &mut RunState) {
        debug!("phase: strip project bindings");

        for path in self.descriptors(&self.config.patterns.projects, state) {
            match stripper.strip_project_file(&path) {
                Ok(0) => debug!("no bindings in {}", path.display()),
                Ok(removed) => {
                    debug!(
                        "removed {} binding elements from {}",
                        removed,
                        path.display()
                    );
                    state.summary.record(
                        &path,
                        Action::CleanedProject {
                            bindings_removed: removed,
                        },
                    );
                }
                Err(err) => state.record_error(err),
            }
        }
    }

    /// Collect descriptor files up front so rewriting never races the walk.
    /// Descriptors are searched at every level, whatever `recursive` says.
    fn descriptors(&self, patterns: &[String], state: &mut RunState) -> Vec<PathBuf> {
        TreeScanner::new(&self.root, true)
            .find_files(patterns)
            .filter_map(|candidate| state.accept(candidate))
            .collect()
    }
}

/// Clean `root` with `config` on the real filesystem
pub fn run(root: impl AsRef<Path>, config: Configuration) -> Result<RunSummary, CleanError> {
    Ok(Cleaner::new(root, config)?.clean_all())
}
