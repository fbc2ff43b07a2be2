//! Removal of legacy source-control bindings from project and solution descriptors.
//!
//! Both strippers work on the raw bytes and splice out only the matched regions,
//! so everything else in the file (formatting, comments, encoding declaration,
//! byte-order mark) is written back unchanged. A file without bindings is never
//! rewritten.

use crate::error::{CleanError, DescriptorError};
use crate::filesystem::FileSystem;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::bytes::Regex;
use std::ops::Range;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Byte order of a UTF-16 document, told apart by its BOM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Utf16 {
    Little,
    Big,
}

impl Utf16 {
    fn detect(source: &[u8]) -> Option<Self> {
        match source {
            [0xFF, 0xFE, ..] => Some(Self::Little),
            [0xFE, 0xFF, ..] => Some(Self::Big),
            _ => None,
        }
    }

    /// Decode everything after the BOM
    fn decode(self, source: &[u8]) -> Result<String, DescriptorError> {
        let body = &source[2..];
        if body.len() % 2 != 0 {
            return Err(DescriptorError::InvalidUtf16);
        }

        let units = body.chunks_exact(2).map(|pair| match self {
            Self::Little => u16::from_le_bytes([pair[0], pair[1]]),
            Self::Big => u16::from_be_bytes([pair[0], pair[1]]),
        });
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|_| DescriptorError::InvalidUtf16)
    }

    /// Encode `text` behind the same BOM it was read with
    fn encode(self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + text.len() * 2);
        for unit in std::iter::once(0xFEFF).chain(text.encode_utf16()) {
            match self {
                Self::Little => out.extend_from_slice(&unit.to_le_bytes()),
                Self::Big => out.extend_from_slice(&unit.to_be_bytes()),
            }
        }
        out
    }
}

/// A descriptor with its binding regions removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub contents: Vec<u8>,
    pub regions_removed: usize,
}

/// Remove every element whose local name is in `element_names`, anywhere in the document.
///
/// Matching ignores namespace prefixes and default namespace declarations.
/// UTF-16 documents are written back in the byte order they came in.
/// Returns `Ok(None)` when nothing matched.
pub fn strip_project_bindings(
    source: &[u8],
    element_names: &[String],
) -> Result<Option<Stripped>, DescriptorError> {
    let Some(order) = Utf16::detect(source) else {
        return strip_utf8_project(source, element_names);
    };

    let text = order.decode(source)?;
    let Some(stripped) = strip_utf8_project(text.as_bytes(), element_names)? else {
        return Ok(None);
    };
    // Only whole markup and ASCII whitespace were cut, so the text is still UTF-8
    let text = String::from_utf8(stripped.contents).map_err(|_| DescriptorError::InvalidUtf16)?;

    Ok(Some(Stripped {
        contents: order.encode(&text),
        regions_removed: stripped.regions_removed,
    }))
}

fn strip_utf8_project(
    source: &[u8],
    element_names: &[String],
) -> Result<Option<Stripped>, DescriptorError> {
    // Keep the BOM out of the parser so byte offsets line up with `source`
    let offset = if source.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    let body = &source[offset..];

    let mut reader = Reader::from_reader(body);
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    // Start offset and depth of the binding element currently open
    let mut open: Option<(usize, usize)> = None;

    let is_binding = |name: &[u8]| element_names.iter().any(|n| n.as_bytes() == name);

    loop {
        let before = markup_start(body, reader.buffer_position() as usize);

        match reader.read_event()? {
            Event::Start(e) => {
                if open.is_none() && is_binding(e.local_name().as_ref()) {
                    open = Some((before, depth));
                }
                depth += 1;
                seen_root = true;
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(DescriptorError::UnbalancedClose)?;
                if let Some((start, open_depth)) = open {
                    if open_depth == depth {
                        spans.push(start..reader.buffer_position() as usize);
                        open = None;
                    }
                }
            }
            Event::Empty(e) => {
                seen_root = true;
                if open.is_none() && is_binding(e.local_name().as_ref()) {
                    spans.push(before..reader.buffer_position() as usize);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(DescriptorError::UnexpectedEof);
    }
    if !seen_root {
        return Err(DescriptorError::NoRootElement);
    }
    if spans.is_empty() {
        return Ok(None);
    }

    let regions_removed = spans.len();
    let spans: Vec<Range<usize>> = spans
        .into_iter()
        .map(|span| {
            let start = line_start(body, span.start);
            start + offset..span.end + offset
        })
        .collect();

    Ok(Some(Stripped {
        contents: splice_out(source, &spans),
        regions_removed,
    }))
}

/// Build the matcher for source-control `GlobalSection` blocks in solution files.
///
/// The match takes the whitespace before the section header with it, so the
/// surrounding lines close up.
pub fn solution_section_regex(section_names: &[String]) -> Result<Regex, regex::Error> {
    let names = section_names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!(
        r"(?s-u)\s+GlobalSection\((?:{names})\).*?EndGlobalSection"
    ))
}

/// Remove the first source-control section from a solution file.
///
/// Returns `None` when the file has no such section.
pub fn strip_solution_bindings(source: &[u8], section: &Regex) -> Option<Stripped> {
    let found = section.find(source)?;

    Some(Stripped {
        contents: splice_out(source, &[found.range()]),
        regions_removed: 1,
    })
}

/// The parser may report a position just past the `<` that opens the next event
fn markup_start(body: &[u8], position: usize) -> usize {
    let limit = (position + 1).min(body.len());
    body[..limit]
        .iter()
        .rposition(|&b| b == b'<')
        .filter(|&p| p + 1 >= position)
        .unwrap_or(position)
}

/// Widen a removal to take the element's own indentation and line break with it,
/// when the element sits on a line of its own
fn line_start(body: &[u8], start: usize) -> usize {
    let mut s = start;
    while s > 0 && matches!(body[s - 1], b' ' | b'\t') {
        s -= 1;
    }

    if s > 0 && body[s - 1] == b'\n' {
        s -= 1;
        if s > 0 && body[s - 1] == b'\r' {
            s -= 1;
        }
        s
    } else {
        start
    }
}

/// Copy `source` without the given sorted, non-overlapping ranges
fn splice_out(source: &[u8], spans: &[Range<usize>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len());
    let mut cursor = 0;

    for span in spans {
        let start = span.start.max(cursor);
        out.extend_from_slice(&source[cursor..start]);
        cursor = span.end.max(cursor);
    }
    out.extend_from_slice(&source[cursor..]);

    out
}

/// File-level binding removal. Parse and write failures come back as per-file errors.
pub struct BindingStripper<'a> {
    fs: &'a dyn FileSystem,
    element_names: &'a [String],
    section: Regex,
    dry_run: bool,
}

impl<'a> BindingStripper<'a> {
    /// `section` comes from [`solution_section_regex`]
    pub fn new(
        fs: &'a dyn FileSystem,
        element_names: &'a [String],
        section: Regex,
        dry_run: bool,
    ) -> Self {
        Self {
            fs,
            element_names,
            section,
            dry_run,
        }
    }

    /// Strip binding elements from a project file, returning how many were removed
    pub fn strip_project_file(&self, path: &Path) -> Result<usize, CleanError> {
        let source = self
            .fs
            .read(path)
            .map_err(|err| CleanError::access(path, err))?;

        match strip_project_bindings(&source, self.element_names)
            .map_err(|err| CleanError::parse(path, err))?
        {
            Some(stripped) => {
                self.rewrite(path, &stripped.contents)?;
                Ok(stripped.regions_removed)
            }
            None => Ok(0),
        }
    }

    /// Strip the source-control section from a solution file.
    /// Returns whether the file had one.
    pub fn strip_solution_file(&self, path: &Path) -> Result<bool, CleanError> {
        let source = self
            .fs
            .read(path)
            .map_err(|err| CleanError::access(path, err))?;

        match strip_solution_bindings(&source, &self.section) {
            Some(stripped) => {
                self.rewrite(path, &stripped.contents)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn rewrite(&self, path: &Path, contents: &[u8]) -> Result<(), CleanError> {
        if self.dry_run {
            return Ok(());
        }

        let readonly = self
            .fs
            .is_readonly(path)
            .map_err(|err| CleanError::write(path, err))?;
        if readonly {
            self.fs
                .clear_readonly(path)
                .map_err(|err| CleanError::write(path, err))?;
        }

        self.fs
            .write(path, contents)
            .map_err(|err| CleanError::write(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::OsFileSystem;
    use crate::patterns::PatternTable;
    use std::fs;
    use tempfile::tempdir;

    const BOUND_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <Configuration Condition=" '$(Configuration)' == '' ">Debug</Configuration>
    <ProjectGuid>{6C2B4D1E-0F3A-4C59-9B6E-2D0E7A1F3C11}</ProjectGuid>
    <SccProjectName>SAK</SccProjectName>
    <OutputType>Library</OutputType>
    <SccLocalPath>SAK</SccLocalPath>
    <SccAuxPath>SAK</SccAuxPath>
    <SccProvider>SAK</SccProvider>
    <AssemblyName>App</AssemblyName>
  </PropertyGroup>
  <ItemGroup>
    <!-- keep me -->
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>
"#;

    const CLEAN_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <Configuration Condition=" '$(Configuration)' == '' ">Debug</Configuration>
    <ProjectGuid>{6C2B4D1E-0F3A-4C59-9B6E-2D0E7A1F3C11}</ProjectGuid>
    <OutputType>Library</OutputType>
    <AssemblyName>App</AssemblyName>
  </PropertyGroup>
  <ItemGroup>
    <!-- keep me -->
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>
"#;

    const BOUND_SOLUTION: &str = "\u{feff}\r\nMicrosoft Visual Studio Solution File, Format Version 11.00\r\n# Visual Studio 2010\r\nProject(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App\\App.csproj\", \"{6C2B4D1E-0F3A-4C59-9B6E-2D0E7A1F3C11}\"\r\nEndProject\r\nGlobal\r\n\tGlobalSection(TeamFoundationVersionControl) = preSolution\r\n\t\tSccNumberOfProjects = 2\r\n\t\tSccEnterpriseProvider = {4CA58AB2-18FA-4F8D-95D4-32DDF27D184C}\r\n\t\tSccTeamFoundationServer = http://tfs:8080/tfs/\r\n\tEndGlobalSection\r\n\tGlobalSection(SolutionConfigurationPlatforms) = preSolution\r\n\t\tDebug|Any CPU = Debug|Any CPU\r\n\tEndGlobalSection\r\nEndGlobal\r\n";

    const CLEAN_SOLUTION: &str = "\u{feff}\r\nMicrosoft Visual Studio Solution File, Format Version 11.00\r\n# Visual Studio 2010\r\nProject(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App\\App.csproj\", \"{6C2B4D1E-0F3A-4C59-9B6E-2D0E7A1F3C11}\"\r\nEndProject\r\nGlobal\r\n\tGlobalSection(SolutionConfigurationPlatforms) = preSolution\r\n\t\tDebug|Any CPU = Debug|Any CPU\r\n\tEndGlobalSection\r\nEndGlobal\r\n";

    fn names() -> Vec<String> {
        PatternTable::default().binding_elements
    }

    fn sections() -> Regex {
        solution_section_regex(&PatternTable::default().solution_sections).unwrap()
    }

    #[test]
    fn test_project_bindings_removed_and_siblings_kept() {
        let stripped = strip_project_bindings(BOUND_PROJECT.as_bytes(), &names())
            .unwrap()
            .unwrap();

        assert_eq!(stripped.regions_removed, 4);
        assert_eq!(String::from_utf8(stripped.contents).unwrap(), CLEAN_PROJECT);
    }

    #[test]
    fn test_project_without_namespace_matches_the_same() {
        let with_ns = strip_project_bindings(BOUND_PROJECT.as_bytes(), &names())
            .unwrap()
            .unwrap();

        let bare = BOUND_PROJECT.replace(
            r#" xmlns="http://schemas.microsoft.com/developer/msbuild/2003""#,
            "",
        );
        let without_ns = strip_project_bindings(bare.as_bytes(), &names())
            .unwrap()
            .unwrap();

        assert_eq!(with_ns.regions_removed, without_ns.regions_removed);
        assert_eq!(
            String::from_utf8(without_ns.contents).unwrap(),
            CLEAN_PROJECT.replace(
                r#" xmlns="http://schemas.microsoft.com/developer/msbuild/2003""#,
                ""
            )
        );
    }

    #[test]
    fn test_prefixed_and_nested_bindings_match_by_local_name() {
        let doc = r#"<m:Project xmlns:m="urn:x"><m:ItemGroup><m:Item><m:SccProvider>SAK</m:SccProvider></m:Item></m:ItemGroup><Other/></m:Project>"#;
        let stripped = strip_project_bindings(doc.as_bytes(), &names())
            .unwrap()
            .unwrap();

        assert_eq!(
            String::from_utf8(stripped.contents).unwrap(),
            r#"<m:Project xmlns:m="urn:x"><m:ItemGroup><m:Item></m:Item></m:ItemGroup><Other/></m:Project>"#
        );
    }

    #[test]
    fn test_self_closing_binding_is_removed() {
        let doc = "<Project>\n  <PropertyGroup>\n    <SccAuxPath />\n    <Keep>1</Keep>\n  </PropertyGroup>\n</Project>";
        let stripped = strip_project_bindings(doc.as_bytes(), &names())
            .unwrap()
            .unwrap();

        assert_eq!(
            String::from_utf8(stripped.contents).unwrap(),
            "<Project>\n  <PropertyGroup>\n    <Keep>1</Keep>\n  </PropertyGroup>\n</Project>"
        );
    }

    #[test]
    fn test_project_strip_is_idempotent() {
        let first = strip_project_bindings(BOUND_PROJECT.as_bytes(), &names())
            .unwrap()
            .unwrap();
        let second = strip_project_bindings(&first.contents, &names()).unwrap();

        assert!(second.is_none());
    }

    #[test]
    fn test_bom_is_preserved() {
        let mut doc = UTF8_BOM.to_vec();
        doc.extend_from_slice(b"<Project>\r\n  <SccLocalPath>SAK</SccLocalPath>\r\n</Project>");

        let stripped = strip_project_bindings(&doc, &names()).unwrap().unwrap();

        let mut expected = UTF8_BOM.to_vec();
        expected.extend_from_slice(b"<Project>\r\n</Project>");
        assert_eq!(stripped.contents, expected);
    }

    fn utf16(order: Utf16, text: &str) -> Vec<u8> {
        order.encode(text)
    }

    #[test]
    fn test_utf16_project_is_stripped_in_its_own_encoding() {
        let bound = BOUND_PROJECT.replace("utf-8", "utf-16");
        let clean = CLEAN_PROJECT.replace("utf-8", "utf-16");

        for order in [Utf16::Little, Utf16::Big] {
            let stripped = strip_project_bindings(&utf16(order, &bound), &names())
                .unwrap()
                .unwrap();

            assert_eq!(stripped.regions_removed, 4);
            assert_eq!(stripped.contents, utf16(order, &clean));
        }
    }

    #[test]
    fn test_utf16_project_without_bindings_is_untouched() {
        let doc = utf16(Utf16::Little, CLEAN_PROJECT);
        assert!(strip_project_bindings(&doc, &names()).unwrap().is_none());
    }

    #[test]
    fn test_truncated_utf16_is_an_error() {
        let mut doc = utf16(Utf16::Little, "<Project><SccAuxPath /></Project>");
        doc.pop();

        assert!(matches!(
            strip_project_bindings(&doc, &names()),
            Err(DescriptorError::InvalidUtf16)
        ));
    }

    #[test]
    fn test_utf16_project_file_is_rewritten() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("App.csproj");
        fs::write(&project, utf16(Utf16::Little, BOUND_PROJECT)).unwrap();

        let table = PatternTable::default();
        let stripper =
            BindingStripper::new(&OsFileSystem, &table.binding_elements, sections(), false);

        assert_eq!(stripper.strip_project_file(&project).unwrap(), 4);
        assert_eq!(
            fs::read(&project).unwrap(),
            utf16(Utf16::Little, CLEAN_PROJECT)
        );
    }

    #[test]
    fn test_malformed_project_is_an_error() {
        assert!(strip_project_bindings(b"<Project><PropertyGroup></Project>", &names()).is_err());
        assert!(strip_project_bindings(b"<Project><PropertyGroup>", &names()).is_err());
        assert!(strip_project_bindings(b"not xml at all", &names()).is_err());
    }

    #[test]
    fn test_solution_section_removed_verbatim() {
        let stripped = strip_solution_bindings(BOUND_SOLUTION.as_bytes(), &sections()).unwrap();
        let text = String::from_utf8(stripped.contents).unwrap();

        assert_eq!(text, CLEAN_SOLUTION);
        assert!(!text.contains("TeamFoundationVersionControl"));
        assert_eq!(text.matches("EndGlobalSection").count(), 1);
    }

    #[test]
    fn test_solution_strip_is_idempotent() {
        let first = strip_solution_bindings(BOUND_SOLUTION.as_bytes(), &sections()).unwrap();
        assert!(strip_solution_bindings(&first.contents, &sections()).is_none());
    }

    #[test]
    fn test_older_source_code_control_section() {
        let sln = "Global\n\tGlobalSection(SourceCodeControl) = preSolution\n\t\tSccNumberOfProjects = 1\n\tEndGlobalSection\nEndGlobal\n";
        let stripped = strip_solution_bindings(sln.as_bytes(), &sections()).unwrap();

        assert_eq!(
            String::from_utf8(stripped.contents).unwrap(),
            "Global\nEndGlobal\n"
        );
    }

    #[test]
    fn test_file_without_bindings_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("App.csproj");
        let solution = dir.path().join("App.sln");
        fs::write(&project, CLEAN_PROJECT).unwrap();
        fs::write(&solution, CLEAN_SOLUTION).unwrap();
        let project_mtime = fs::metadata(&project).unwrap().modified().unwrap();
        let solution_mtime = fs::metadata(&solution).unwrap().modified().unwrap();

        let table = PatternTable::default();
        let stripper =
            BindingStripper::new(&OsFileSystem, &table.binding_elements, sections(), false);

        assert_eq!(stripper.strip_project_file(&project).unwrap(), 0);
        assert!(!stripper.strip_solution_file(&solution).unwrap());
        assert_eq!(
            fs::metadata(&project).unwrap().modified().unwrap(),
            project_mtime
        );
        assert_eq!(
            fs::metadata(&solution).unwrap().modified().unwrap(),
            solution_mtime
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_descriptor_is_rewritten() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let solution = dir.path().join("App.sln");
        fs::write(&solution, BOUND_SOLUTION).unwrap();
        fs::set_permissions(&solution, fs::Permissions::from_mode(0o444)).unwrap();

        let table = PatternTable::default();
        let stripper =
            BindingStripper::new(&OsFileSystem, &table.binding_elements, sections(), false);

        assert!(stripper.strip_solution_file(&solution).unwrap());
        assert_eq!(fs::read_to_string(&solution).unwrap(), CLEAN_SOLUTION);
        assert!(!fs::metadata(&solution).unwrap().permissions().readonly());
    }

    #[test]
    fn test_malformed_project_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("Broken.csproj");
        fs::write(&project, "<Project><SccProvider>SAK</Project>").unwrap();

        let table = PatternTable::default();
        let stripper =
            BindingStripper::new(&OsFileSystem, &table.binding_elements, sections(), false);

        let err = stripper.strip_project_file(&project).unwrap_err();
        assert!(matches!(err, CleanError::Parse { .. }));
        assert_eq!(
            fs::read_to_string(&project).unwrap(),
            "<Project><SccProvider>SAK</Project>"
        );
    }
}
