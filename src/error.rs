//! Error types for the cleanup engine.
//!
//! Only [`CleanError::RootNotFound`] and [`CleanError::InvalidTable`] ever escape a run.
//! Every other variant is produced per entry and folded into the run summary.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while cleaning a tree
#[derive(Debug, Error)]
pub enum CleanError {
    /// The scan root does not exist or is not a directory
    #[error("root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The pattern table cannot be compiled into matchers
    #[error("invalid pattern table: {0}")]
    InvalidTable(#[from] regex::Error),

    /// A candidate could not be read, enumerated or removed
    #[error("cannot access {}: {source}", path.display())]
    EntryAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A descriptor file is not a well-formed document
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },

    /// A descriptor matched but rewriting it failed
    #[error("cannot rewrite {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CleanError {
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::EntryAccess {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: DescriptorError) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// The path this error is about
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::RootNotFound(path) => Some(path),
            Self::InvalidTable(_) => None,
            Self::EntryAccess { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => {
                Some(path)
            }
        }
    }
}

/// Structural problems found while reading a project descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("document has no root element")]
    NoRootElement,

    #[error("document ends inside an open element")]
    UnexpectedEof,

    #[error("closing tag without a matching opening tag")]
    UnbalancedClose,

    #[error("document is not valid UTF-16")]
    InvalidUtf16,
}
