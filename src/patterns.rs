//! Name pattern matching and the cleanup pattern table.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Directories removed by default. Matched against the directory name only.
pub const DEFAULT_DIRECTORIES: &[&str] = &[
    // Build output
    "bin",
    "obj",
    "Debug",
    "Release",
    "pkg",
    "pkgobj",
    // Editor/IDE scratch
    "_ReSharper*",
    ".vs",
    // Project conversion leftovers
    "_UpgradeLog",
    "_UpgradeReport_Files",
    // Legacy VCS metadata
    ".svn",
    "_svn",
    ".hg",
];

/// Files removed by default
pub const DEFAULT_FILES: &[&str] = &[
    // Legacy VCS binding markers
    "*.scc",
    "*.vssscc",
    "*.vspscc",
    // IDE per-user settings
    "*.suo",
    "*.csproj.user",
    "*.vbproj.user",
    "*.fsproj.user",
    // Upgrade logs
    "UpgradeLog.xml",
    "UpgradeLog*.htm",
    // OS metadata
    ".DS_Store",
    "Thumbs.db",
];

/// Solution descriptors that may carry a source-control section
pub const DEFAULT_SOLUTIONS: &[&str] = &["*.sln"];

/// Project descriptors that may carry binding elements
pub const DEFAULT_PROJECTS: &[&str] = &["*.csproj", "*.vbproj", "*.fsproj"];

/// Local names of project elements that record a source-control binding
pub const DEFAULT_BINDING_ELEMENTS: &[&str] =
    &["SccProjectName", "SccLocalPath", "SccAuxPath", "SccProvider"];

/// `GlobalSection(...)` names in solution files that hold source-control bindings
pub const DEFAULT_SOLUTION_SECTIONS: &[&str] = &["TeamFoundationVersionControl", "SourceCodeControl"];

/// Directory names that are only removed when they sit next to a project file
pub const DEFAULT_GUARDED_DIRECTORIES: &[&str] = &["bin"];

/// Extensions that mark a directory as a project directory
pub const DEFAULT_PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "fsproj", "modelproj"];

/// A single compiled shell-style pattern, matched case-insensitively against a name.
///
/// `*` matches any run of characters and `?` exactly one; every other character
/// is literal, including the brackets and braces a full glob language would treat
/// as syntax.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: String,
    matcher: Option<GlobMatcher>,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Self {
        let matcher = GlobBuilder::new(&literalize(pattern))
            .case_insensitive(true)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .ok()
            .map(|glob| glob.compile_matcher());

        Self {
            pattern: pattern.to_string(),
            matcher,
        }
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, name: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(name),
            // Anything globset still refuses is treated as a literal substring
            None => name
                .to_lowercase()
                .contains(&self.pattern.to_lowercase()),
        }
    }
}

/// Check a single name against a single pattern
pub fn matches(name: &str, pattern: &str) -> bool {
    NamePattern::new(pattern).is_match(name)
}

/// Rewrite a pattern so globset only sees `*` and `?` as wildcards
fn literalize(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut previous_star = false;

    for c in pattern.chars() {
        match c {
            // Runs of stars mean the same thing as one star for a single name
            '*' if previous_star => continue,
            '[' => out.push_str("[[]"),
            ']' => out.push_str("[]]"),
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            _ => out.push(c),
        }
        previous_star = c == '*';
    }

    out
}

/// All configurable pattern data for a cleanup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTable {
    pub directories: Vec<String>,
    pub files: Vec<String>,
    pub solutions: Vec<String>,
    pub projects: Vec<String>,
    pub binding_elements: Vec<String>,
    pub solution_sections: Vec<String>,
    pub guarded_directories: Vec<String>,
    pub project_extensions: Vec<String>,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            directories: owned(DEFAULT_DIRECTORIES),
            files: owned(DEFAULT_FILES),
            solutions: owned(DEFAULT_SOLUTIONS),
            projects: owned(DEFAULT_PROJECTS),
            binding_elements: owned(DEFAULT_BINDING_ELEMENTS),
            solution_sections: owned(DEFAULT_SOLUTION_SECTIONS),
            guarded_directories: owned(DEFAULT_GUARDED_DIRECTORIES),
            project_extensions: owned(DEFAULT_PROJECT_EXTENSIONS),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Overrides read from a TOML file. Present keys replace the default list,
/// `extra_*` keys append to it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableOverrides {
    directories: Option<Vec<String>>,
    files: Option<Vec<String>>,
    solutions: Option<Vec<String>>,
    projects: Option<Vec<String>>,
    binding_elements: Option<Vec<String>>,
    solution_sections: Option<Vec<String>>,
    guarded_directories: Option<Vec<String>>,
    project_extensions: Option<Vec<String>>,
    #[serde(default)]
    extra_directories: Vec<String>,
    #[serde(default)]
    extra_files: Vec<String>,
}

impl PatternTable {
    /// Build a table from TOML overrides layered on top of the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let overrides: TableOverrides =
            toml::from_str(content).context("Failed to parse pattern table TOML")?;

        let mut table = Self::default();

        // Replace whole lists where the override names them
        let replacements = [
            (overrides.directories, &mut table.directories),
            (overrides.files, &mut table.files),
            (overrides.solutions, &mut table.solutions),
            (overrides.projects, &mut table.projects),
            (overrides.binding_elements, &mut table.binding_elements),
            (overrides.solution_sections, &mut table.solution_sections),
            (overrides.guarded_directories, &mut table.guarded_directories),
            (overrides.project_extensions, &mut table.project_extensions),
        ];
        for (replacement, target) in replacements {
            if let Some(list) = replacement {
                *target = list;
            }
        }

        table.directories.extend(overrides.extra_directories);
        table.files.extend(overrides.extra_files);

        // Extensions are compared without the leading dot
        for ext in &mut table.project_extensions {
            if let Some(stripped) = ext.strip_prefix('.') {
                *ext = stripped.to_string();
            }
        }

        Ok(table)
    }

    /// Load overrides from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid pattern file {}", path.display()))
    }
}
