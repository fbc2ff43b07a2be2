//! TreeScrub - project tree sanitizer
//!
//! Removes build output, editor/IDE scratch files and legacy source-control
//! metadata from a project tree, and strips source-control bindings out of
//! solution (`.sln`) and project (`.csproj`, `.vbproj`, `.fsproj`) descriptors.
//!
//! ## Run phases
//!
//! 1. Delete directories matching the directory patterns. Guarded names such as
//!    `bin` are only removed when the parent directory holds a project file.
//! 2. Delete files matching the file patterns.
//! 3. Remove the source-control `GlobalSection` from solution files.
//! 4. Optionally remove `Scc*` binding elements from project files.
//! 5. Return a [`RunSummary`] for the caller to render.
//!
//! Only a missing root aborts a run. Every other failure is recorded against the
//! entry it happened on and the run carries on.

pub mod bindings;
pub mod cleaner;
pub mod deleter;
pub mod error;
pub mod filesystem;
pub mod patterns;
pub mod safety;
pub mod scanner;
pub mod summary;

// Re-export commonly used items
pub use cleaner::{run, Cleaner, Configuration};
pub use error::{CleanError, DescriptorError};
pub use filesystem::{FileSystem, OsFileSystem};
pub use patterns::{matches, NamePattern, PatternTable};
pub use safety::SafetyHeuristic;
pub use scanner::{CandidateEntry, Candidates, EntryKind, TreeScanner};
pub use summary::{
    Action, EntryError, EntryErrorKind, EntryOutcome, LogEntry, RunStatus, RunSummary,
};
