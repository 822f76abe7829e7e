// User configuration and the compatibility fake header.
//
// Config files are line-oriented `key: value` pairs; one key may repeat. The
// fake header is a preamble of declarations (an `opencl-c.h` include plus any
// user macros) injected ahead of kernel source purely so device-only syntax
// parses; it is guarded so repeated injection is detected, and always removed
// from user-visible artifacts.
//
// Preconditions: none.
// Postconditions: `add_fake_header` followed by `remove_fake_header` returns
//   text byte-identical to the original.
// Failure modes: unreadable config file; header removal on a file without one.
// Side effects: none (file I/O stays with the caller).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// Include guard of the injected fake header.
pub const FAKE_HEADER_GUARD: &str = "OCL_KERNEL_COVERAGE_FAKE_HEADER";

/// Config key listing macros to predefine in the fake header.
pub const MACRO_KEY: &str = "macro";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {path}: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
        }
    }
}

/// Parsed user configuration: multi-valued `key: value` pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserConfig {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl UserConfig {
    /// Parse config text. Malformed lines (no key, nothing after the
    /// separator) are skipped, not errors.
    pub fn parse(text: &str) -> Self {
        let mut entries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for line in text.lines() {
            let trimmed = line.trim_start_matches(' ');
            let Some(sep) = trimmed.find([':', ' ']) else {
                continue;
            };
            let key = &trimmed[..sep];
            if key.is_empty() {
                continue;
            }
            let value = trimmed[sep..].trim_start_matches([':', ' ']);
            if value.is_empty() {
                continue;
            }
            entries
                .entry(key.to_string())
                .or_default()
                .insert(value.to_string());
        }
        UserConfig { entries }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// All values recorded for `key`.
    pub fn values(&self, key: &str) -> BTreeSet<String> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// First value recorded for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|set| set.iter().next())
            .map(String::as_str)
    }

    /// Macros to predefine in the fake header.
    pub fn macros(&self) -> BTreeSet<String> {
        self.values(MACRO_KEY)
    }
}

// ── Fake header ──

/// True if `source` already carries the injected header: some line equals the
/// guard's `#ifndef` exactly. A mere mention of the guard name (say, in a
/// comment) is not a header.
pub fn has_fake_header(source: &str) -> bool {
    let needle = format!("#ifndef {FAKE_HEADER_GUARD}");
    source
        .lines()
        .any(|line| line.trim_end_matches('\r') == needle)
}

/// Render the header block for the given macro set.
fn render_fake_header(macros: &BTreeSet<String>) -> String {
    let mut header = String::new();
    let _ = writeln!(header, "#ifndef {FAKE_HEADER_GUARD}");
    let _ = writeln!(header, "#define {FAKE_HEADER_GUARD}");
    let _ = writeln!(header, "#include <opencl-c.h>");
    for m in macros {
        let _ = writeln!(header, "#define {m}");
    }
    let _ = writeln!(header, "#endif");
    header
}

/// Prepend the fake header to `source`. Returns the new text and the number
/// of lines added; a source that already carries the header is returned
/// unchanged with 0 added lines.
pub fn add_fake_header(source: &str, macros: &BTreeSet<String>) -> (String, u32) {
    if has_fake_header(source) {
        return (source.to_string(), 0);
    }
    let header = render_fake_header(macros);
    let lines = 4 + macros.len() as u32;
    (format!("{header}{source}"), lines)
}

/// Strip the fake header: remove the exact byte range from its `#ifndef`
/// guard line through the end of the next `#endif` line. Every byte outside
/// that range is preserved, including line endings and a missing final
/// newline. `None` if no complete header is present.
pub fn remove_fake_header(source: &str) -> Option<String> {
    let guard_line = format!("#ifndef {FAKE_HEADER_GUARD}");
    let mut offset = 0usize;
    let mut header_start: Option<usize> = None;
    for line in source.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        if header_start.is_none() {
            if content == guard_line {
                header_start = Some(offset);
            }
        } else if content == "#endif" {
            let header_end = offset + line.len();
            let mut out = String::with_capacity(source.len());
            out.push_str(&source[..header_start.unwrap()]);
            out.push_str(&source[header_end..]);
            return Some(out);
        }
        offset += line.len();
    }
    None
}
