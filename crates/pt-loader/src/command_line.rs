//! Compiler command-line parsing for deferred projects.
//!
//! Descriptors carry the raw compiler arguments of each project. A
//! [`CommandLineParser`] turns them into a [`ParsedCommandLine`]: output
//! binary, binary references, sources, additional files and analyzers.
//! [`CscStyleParser`] understands the usual `csc`/`vbc` switches:
//!
//! | Switch                         | Meaning                            |
//! |--------------------------------|------------------------------------|
//! | `/out:<file>`                  | Output binary                      |
//! | `/reference:` or `/r:`         | Binary references, `,`/`;` separated, or `alias=file` |
//! | `/analyzer:` or `/a:`          | Analyzer assemblies                |
//! | `/additionalfile:`             | Additional files                   |
//! | anything not starting a switch | Source file                        |
//!
//! Other switches are kept verbatim as options. Relative paths resolve
//! against the project's working folder.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use pt_core::MetadataReference;
use smallvec::smallvec;

/// The parts of a compiler command line the tracker cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommandLine {
    /// Output binary from `/out:`.
    pub output_path: Option<Utf8PathBuf>,
    /// Binary references, in command-line order.
    pub metadata_references: Vec<MetadataReference>,
    /// Source files.
    pub source_files: Vec<Utf8PathBuf>,
    /// Additional files.
    pub additional_files: Vec<Utf8PathBuf>,
    /// Analyzer assemblies.
    pub analyzer_references: Vec<Utf8PathBuf>,
    /// Switches not interpreted above.
    pub options: Vec<String>,
}

/// Parses the command line of one deferred project.
pub trait CommandLineParser: Send + Sync {
    /// Parses `arguments`, resolving relative paths against `base_directory`.
    fn parse(&self, arguments: &[String], base_directory: &Utf8Path) -> ParsedCommandLine;
}

/// Parser for `csc`/`vbc` style switches.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pt_loader::{CommandLineParser, CscStyleParser};
///
/// let args = vec![
///     "/out:bin/App.dll".to_owned(),
///     "/r:lib/A.dll;lib/B.dll".to_owned(),
///     "Program.cs".to_owned(),
/// ];
/// let parsed = CscStyleParser.parse(&args, Utf8Path::new("/src/App"));
///
/// assert_eq!(parsed.output_path.as_deref().map(|p| p.as_str()), Some("/src/App/bin/App.dll"));
/// assert_eq!(parsed.metadata_references.len(), 2);
/// assert_eq!(parsed.source_files.len(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CscStyleParser;

impl CommandLineParser for CscStyleParser {
    fn parse(&self, arguments: &[String], base_directory: &Utf8Path) -> ParsedCommandLine {
        let mut parsed = ParsedCommandLine::default();

        for argument in arguments {
            let argument = argument.trim();
            if argument.is_empty() {
                continue;
            }

            let Some((name, value)) = split_switch(argument) else {
                parsed
                    .source_files
                    .push(resolve_path(base_directory, unquote(argument)));
                continue;
            };

            match name.to_ascii_lowercase().as_str() {
                "out" => {
                    parsed.output_path = Some(resolve_path(base_directory, unquote(value)));
                }
                "reference" | "r" => {
                    parse_references(value, base_directory, &mut parsed.metadata_references);
                }
                "analyzer" | "a" => parsed
                    .analyzer_references
                    .extend(split_list(value).map(|path| resolve_path(base_directory, path))),
                "additionalfile" => parsed
                    .additional_files
                    .extend(split_list(value).map(|path| resolve_path(base_directory, path))),
                _ => parsed.options.push(argument.to_owned()),
            }
        }

        parsed
    }
}

/// Splits `/name:value` or `-name:value` into its parts.
///
/// Returns `None` for arguments that look like paths (`/src/a.cs`).
fn split_switch(argument: &str) -> Option<(&str, &str)> {
    let body = argument
        .strip_prefix('/')
        .or_else(|| argument.strip_prefix('-'))?;
    let (name, value) = body.split_once(':').unwrap_or((body, ""));
    if name.is_empty() || name.contains(['/', '\\', '.']) {
        return None;
    }
    Some((name, value))
}

fn parse_references(value: &str, base: &Utf8Path, out: &mut Vec<MetadataReference>) {
    // `alias=file` takes a single file; aliases may be comma separated.
    if let Some((aliases, path)) = value.split_once('=') {
        out.push(MetadataReference {
            path: resolve_path(base, unquote(path)),
            aliases: aliases
                .split(',')
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(str::to_owned)
                .collect(),
        });
        return;
    }

    out.extend(split_list(value).map(|path| MetadataReference {
        path: resolve_path(base, path),
        aliases: smallvec![],
    }));
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split([',', ';'])
        .map(|item| unquote(item.trim()))
        .filter(|item| !item.is_empty())
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

/// Joins `raw` onto `base` unless it is absolute, then removes `.` and
/// `..` components lexically.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pt_loader::resolve_path;
///
/// assert_eq!(resolve_path(Utf8Path::new("/src/App"), "../Core/Core.csproj"), "/src/Core/Core.csproj");
/// assert_eq!(resolve_path(Utf8Path::new("/src/App"), "/lib/x.dll"), "/lib/x.dll");
/// ```
#[must_use]
pub fn resolve_path(base: &Utf8Path, raw: &str) -> Utf8PathBuf {
    let raw = Utf8Path::new(raw);
    if raw.is_absolute() {
        normalize(raw)
    } else {
        normalize(&base.join(raw))
    }
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                } else {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}
