//! Reader for STAT product makefiles.
//!
//! A STAT makefile is a make-style file whose variable assignments describe a
//! test product: its output name, sources, dummy interfaces, include paths and
//! preprocessor definitions. Only the variable layer is interpreted; rules and
//! recipes are skipped.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the artifact the product builds.
pub const OUTPUT_NAME: &str = "OUTPUT_NAME";
/// Whitespace-separated list of source files.
pub const SOURCES: &str = "SOURCES";
/// Whitespace-separated list of header names replaced by dummies.
pub const INTERFACES: &str = "DUMMY_INTERFACES";
/// Whitespace-separated list of include-search directories.
pub const INCLUDES: &str = "INCLUDES";
/// Whitespace-separated list of preprocessor definitions.
pub const DEFINES: &str = "DEFINES";

/// Errors that can occur when parsing STAT makefiles.
#[derive(Debug, Error)]
pub enum MakefileError {
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Syntax error in {path:?} at line {line}: {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("Makefile {path:?} includes itself")]
    IncludeCycle { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, MakefileError>;

/// Parsed variable table of a STAT makefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatMakefile {
    pub name: String,
    pub path: PathBuf,
    variables: Vec<(String, String)>,
}

impl StatMakefile {
    /// Parse a makefile from disk, following its `include` directives.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut parser = Parser::default();
        parser.parse_file(path, false)?;
        Ok(Self::finish(path, parser))
    }

    /// Parse makefile contents that were already read from `path`.
    ///
    /// `path` names the makefile and anchors relative `include` directives.
    pub fn parse(path: impl AsRef<Path>, contents: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut parser = Parser::default();
        parser.stack.push(normalize_path(path));
        parser.parse_contents(path, contents)?;
        Ok(Self::finish(path, parser))
    }

    fn finish(path: &Path, parser: Parser) -> Self {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        StatMakefile {
            name,
            path: normalize_path(path),
            variables: parser.variables,
        }
    }

    /// Raw value of `key`, if the makefile defines it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Whitespace-separated items of `key`; empty when the key is undefined.
    pub fn list<'a>(&'a self, key: &str) -> std::str::SplitWhitespace<'a> {
        self.get(key).unwrap_or("").split_whitespace()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Defined keys in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl<'a> IntoIterator for &'a StatMakefile {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    Recursive,
    Simple,
    Conditional,
    Append,
}

#[derive(Default)]
struct Parser {
    variables: Vec<(String, String)>,
    stack: Vec<PathBuf>,
}

impl Parser {
    fn parse_file(&mut self, path: &Path, optional: bool) -> Result<()> {
        let normalized = normalize_path(path);
        if self.stack.contains(&normalized) {
            return Err(MakefileError::IncludeCycle { path: normalized });
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if optional && err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Skipping missing optional include {}", path.display());
                return Ok(());
            }
            Err(source) => {
                return Err(MakefileError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        self.stack.push(normalized);
        let result = self.parse_contents(path, &contents);
        self.stack.pop();
        result
    }

    fn parse_contents(&mut self, path: &Path, contents: &str) -> Result<()> {
        let base_dir = path
            .parent()
            .map(normalize_path)
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_number, line) in logical_lines(contents) {
            if line.starts_with('\t') {
                continue;
            }
            let stripped = strip_comment(&line).replace("\\#", "#");
            let trimmed = stripped.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some((rest, optional)) = directive_arguments(trimmed) {
                let rest = self.expand(rest, path, line_number)?;
                for token in rest.split_whitespace() {
                    let included = resolve_path(&base_dir, Path::new(token));
                    tracing::trace!(
                        "{} includes {}",
                        path.display(),
                        included.display()
                    );
                    self.parse_file(&included, optional)?;
                }
                continue;
            }

            let Some((head, op, value)) = split_assignment(trimmed) else {
                continue;
            };
            let name = variable_name(head).ok_or_else(|| MakefileError::Syntax {
                path: path.to_path_buf(),
                line: line_number,
                message: format!("invalid variable name {:?}", head.trim()),
            })?;
            let value = value.trim();

            match op {
                AssignOp::Conditional if self.lookup(name).is_some() => {}
                AssignOp::Append => {
                    let expanded = self.expand(value, path, line_number)?;
                    let combined = match self.lookup(name) {
                        Some(existing) if !existing.is_empty() => {
                            format!("{existing} {expanded}")
                        }
                        _ => expanded,
                    };
                    self.set(name, combined);
                }
                _ => {
                    let expanded = self.expand(value, path, line_number)?;
                    self.set(name, expanded);
                }
            }
        }

        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, name: &str, value: String) {
        match self.variables.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.variables.push((name.to_string(), value)),
        }
    }

    fn expand(&self, value: &str, path: &Path, line: usize) -> Result<String> {
        let mut expanded = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(pos) = rest.find('$') {
            expanded.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            match after.chars().next() {
                None => {
                    expanded.push('$');
                    rest = "";
                }
                Some('$') => {
                    expanded.push('$');
                    rest = &after[1..];
                }
                Some(open @ ('(' | '{')) => {
                    let close = if open == '(' { ')' } else { '}' };
                    let body = &after[1..];
                    let end = matching_close(body, open, close).ok_or_else(|| {
                        MakefileError::Syntax {
                            path: path.to_path_buf(),
                            line,
                            message: format!("unterminated variable reference in {value:?}"),
                        }
                    })?;
                    let reference = self.expand(&body[..end], path, line)?;
                    expanded.push_str(&self.resolve_reference(&reference));
                    rest = &body[end + 1..];
                }
                Some(other) => {
                    let mut buf = [0u8; 4];
                    expanded.push_str(self.lookup(other.encode_utf8(&mut buf)).unwrap_or(""));
                    rest = &after[other.len_utf8()..];
                }
            }
        }

        expanded.push_str(rest);
        Ok(expanded)
    }

    fn resolve_reference(&self, reference: &str) -> String {
        if let Some((name, substitution)) = reference.split_once(':') {
            if let Some((from, to)) = substitution.split_once('=') {
                let value = self.lookup(name.trim()).unwrap_or("");
                return value
                    .split_whitespace()
                    .map(|word| match word.strip_suffix(from) {
                        Some(stem) if !from.is_empty() => format!("{stem}{to}"),
                        _ => word.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        }

        if reference.contains(char::is_whitespace) {
            tracing::trace!("Unsupported make function $({reference}) expands to nothing");
            return String::new();
        }

        self.lookup(reference).unwrap_or("").to_string()
    }
}

fn logical_lines(contents: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (index, raw_line) in contents.lines().enumerate() {
        let mut line = raw_line.trim_end_matches('\r');
        let mut continued = false;

        if line.trim_end().ends_with('\\') {
            continued = true;
            line = line
                .trim_end()
                .trim_end_matches('\\')
                .trim_end_matches(char::is_whitespace);
        }

        if current.is_empty() {
            start = index + 1;
            current.push_str(line);
        } else {
            current.push(' ');
            current.push_str(line.trim_start());
        }

        if !continued && !current.is_empty() {
            lines.push((start, std::mem::take(&mut current)));
        }
    }

    if !current.trim().is_empty() {
        lines.push((start, current));
    }

    lines
}

fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && (i == 0 || bytes[i - 1] != b'\\') {
            return &line[..i];
        }
        i += 1;
    }
    line
}

/// Arguments of an `include` line and whether missing files are tolerated.
fn directive_arguments(line: &str) -> Option<(&str, bool)> {
    const DIRECTIVES: [(&str, bool); 3] =
        [("include", false), ("-include", true), ("sinclude", true)];

    for (directive, optional) in DIRECTIVES.iter() {
        if let Some(rest) = line.strip_prefix(directive) {
            if rest.chars().next().map_or(false, char::is_whitespace) {
                return Some((rest.trim_start(), *optional));
            }
        }
    }

    None
}

fn split_assignment(line: &str) -> Option<(&str, AssignOp, &str)> {
    let idx = line.find(|ch| ch == ':' || ch == '=')?;
    let (head, tail) = line.split_at(idx);

    if let Some(value) = tail.strip_prefix("::=") {
        return Some((head, AssignOp::Simple, value));
    }
    if let Some(value) = tail.strip_prefix(":=") {
        return Some((head, AssignOp::Simple, value));
    }
    // Rule line.
    let value = tail.strip_prefix('=')?;

    if let Some(head) = head.strip_suffix('+') {
        Some((head, AssignOp::Append, value))
    } else if let Some(head) = head.strip_suffix('?') {
        Some((head, AssignOp::Conditional, value))
    } else {
        Some((head, AssignOp::Recursive, value))
    }
}

fn variable_name(head: &str) -> Option<&str> {
    let mut name = head.trim();
    for modifier in ["export", "override"] {
        if let Some(rest) = name.strip_prefix(modifier) {
            if rest.starts_with(char::is_whitespace) {
                name = rest.trim_start();
            }
        }
    }

    if name.is_empty()
        || name
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '$' | '(' | ')' | '{' | '}'))
    {
        None
    } else {
        Some(name)
    }
}

fn matching_close(body: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in body.char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            if depth == 0 {
                return Some(idx);
            }
            depth -= 1;
        }
    }
    None
}

fn resolve_path(base: &Path, relative: &Path) -> PathBuf {
    if relative
        .components()
        .next()
        .map(|component| matches!(component, Component::Prefix(_)))
        .unwrap_or(false)
    {
        return normalize_path(relative);
    }

    if relative.is_absolute() {
        normalize_path(relative)
    } else {
        normalize_path(&base.join(relative))
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    normalized
}
