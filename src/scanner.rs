//! Tree walking and candidate discovery.

use crate::error::CleanError;
use crate::patterns::NamePattern;
use crate::summary::EntryError;

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, WalkDir};

/// Modern VCS internals that are never traversed or offered as candidates.
pub const NEVER_TRAVERSE: &[&str] = &[".git", ".jj"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// A filesystem entry that matched a deletion or descriptor pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Walks a root directory looking for entries whose names match patterns.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    recursive: bool,
}

impl TreeScanner {
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            root: root.into(),
            recursive,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories whose name matches any of `patterns`
    pub fn find_directories(&self, patterns: &[String]) -> Candidates {
        self.candidates(patterns, EntryKind::Directory)
    }

    /// Regular files whose name matches any of `patterns`
    pub fn find_files(&self, patterns: &[String]) -> Candidates {
        self.candidates(patterns, EntryKind::File)
    }

    fn candidates(&self, patterns: &[String], kind: EntryKind) -> Candidates {
        let patterns: Vec<NamePattern> = patterns.iter().map(|p| NamePattern::new(p)).collect();

        Candidates {
            root: self.root.clone(),
            max_depth: if self.recursive { usize::MAX } else { 1 },
            kind,
            patterns: patterns.into_iter(),
            current: None,
        }
    }
}

type Walker = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// Lazy sequence of candidates.
///
/// Patterns are walked one after another in configured order, each with a fresh
/// walk of the tree, so an entry matched by two patterns is yielded twice.
/// Matching directories are descended into like any other, so nested matches
/// are yielded too; call [`Candidates::skip_current_dir`] to prune one.
/// Unreadable sub-paths are yielded as errors and the walk carries on.
pub struct Candidates {
    root: PathBuf,
    max_depth: usize,
    kind: EntryKind,
    patterns: std::vec::IntoIter<NamePattern>,
    current: Option<(NamePattern, Walker)>,
}

impl Candidates {
    /// Don't descend into the directory yielded last.
    ///
    /// Call it before removing that directory, so the walk holds no handle on it
    /// and never revisits it.
    pub fn skip_current_dir(&mut self) {
        if let Some((_, walker)) = self.current.as_mut() {
            walker.skip_current_dir();
        }
    }

    fn walk(&self) -> Walker {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(is_traversable as fn(&DirEntry) -> bool)
    }
}

impl Iterator for Candidates {
    type Item = Result<CandidateEntry, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let pattern = self.patterns.next()?;
                self.current = Some((pattern, self.walk()));
            }

            let (pattern, walker) = self.current.as_mut()?;

            let entry = match walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(CleanError::access(path, err.into()).into()));
                }
                None => {
                    // This pattern is exhausted, move on to the next one
                    self.current = None;
                    continue;
                }
            };

            let file_type = entry.file_type();
            let wanted = match self.kind {
                EntryKind::Directory => file_type.is_dir(),
                EntryKind::File => file_type.is_file(),
            };
            if !wanted || !pattern.is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }

            tracing::trace!("{} matches {}", entry.path().display(), pattern.as_str());

            return Some(Ok(CandidateEntry {
                path: entry.into_path(),
                kind: self.kind,
            }));
        }
    }
}

fn is_traversable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !NEVER_TRAVERSE.contains(&&*name)
}
