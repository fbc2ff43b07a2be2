//! Guard against deleting directories that only look like build output.

use crate::patterns::PatternTable;
use std::fs;
use std::path::Path;

/// Decides whether a directory that matched a deletion pattern may really go.
///
/// Most matches are trusted. Guarded names such as `bin` are common enough in
/// hand-made trees that they are only removed when the parent directory holds a
/// project file.
#[derive(Debug, Clone)]
pub struct SafetyHeuristic {
    guarded: Vec<String>,
    project_extensions: Vec<String>,
}

impl Default for SafetyHeuristic {
    fn default() -> Self {
        Self::from_table(&PatternTable::default())
    }
}

impl SafetyHeuristic {
    pub fn from_table(table: &PatternTable) -> Self {
        Self {
            guarded: table.guarded_directories.clone(),
            project_extensions: table.project_extensions.clone(),
        }
    }

    /// Whether the directory name is one that needs a sibling project file
    pub fn is_guarded(&self, dir: &Path) -> bool {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.guarded.iter().any(|g| g.eq_ignore_ascii_case(&name))
    }

    pub fn is_safe_to_delete(&self, dir: &Path) -> bool {
        if !self.is_guarded(dir) {
            return true;
        }

        match dir.parent() {
            Some(parent) => self.has_project_file(parent),
            None => false,
        }
    }

    /// Check whether a directory directly contains a recognised project file
    fn has_project_file(&self, dir: &Path) -> bool {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("cannot list {}: {}", dir.display(), err);
                return false;
            }
        };

        entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_file()))
            .any(|entry| {
                let path = entry.path();
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy())
                    .unwrap_or_default();
                self.project_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(&ext))
            })
    }
}
