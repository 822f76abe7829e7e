// Per-file instrumentation session and pass orchestration.
//
// One session owns all state for exactly one kernel file: the injected
// preamble, both passes, the edit list, and the metadata records. Sessions
// are constructed fresh per file and discarded after their outcome is
// consumed; nothing is shared across files.
//
// Pass sequence: inject preamble (in memory) → parse → analyze (pass 1) →
// layout → instrument (pass 2) → materialize edits → strip preamble →
// prepend barrier support block if any barrier was rewritten.
//
// Preconditions: `original` is the user's file text, unmodified.
// Postconditions: on success the instrumented text carries no preamble and
//   metadata locations refer to the user's original file; no partial output
//   is ever produced.
// Failure modes: parse errors; an internally inconsistent edit set.
// Side effects: verbose pass timings on stderr. All file I/O stays with the
//   caller.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use crate::analyze::{self, Analysis};
use crate::config;
use crate::edit::EditError;
use crate::instrument;
use crate::layout::RecorderLayout;
use crate::metadata::KernelMetadata;
use crate::parser::{self, ParseError};
use crate::source_map::SourceMap;

// ── Provenance ──

/// Provenance metadata recorded alongside generated artifacts.
///
/// `source_hash`: SHA-256 of the user's original kernel text.
/// `rewriter_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub rewriter_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.source_hash {
            use std::fmt::Write;
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

/// Compute provenance from the original source text.
pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(&result);

    Provenance {
        source_hash,
        rewriter_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Error type ──

#[derive(Debug)]
pub enum SessionError {
    Parse {
        file: String,
        errors: Vec<ParseError>,
    },
    Edit {
        file: String,
        source: EditError,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Parse { file, errors } => {
                write!(f, "{file}: {} parse error(s)", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ", first: {first}")?;
                }
                Ok(())
            }
            SessionError::Edit { file, source } => {
                write!(f, "{file}: inconsistent edit set: {source}")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Parse { .. } => None,
            SessionError::Edit { source, .. } => Some(source),
        }
    }
}

// ── Outcome ──

/// Everything a successful instrumentation produced for one kernel file.
#[derive(Debug)]
pub struct InstrumentedKernel {
    /// Final kernel text: edits applied, preamble stripped, barrier support
    /// block prepended when barriers were rewritten.
    pub source: String,
    pub metadata: KernelMetadata,
    pub analysis: Analysis,
    pub provenance: Provenance,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Instrumented(Box<InstrumentedKernel>),
    /// Zero branches and zero barriers: valid, nothing is rewritten.
    NothingToInstrument,
}

// ── Session runner ──

/// Run both passes over one kernel file's text.
///
/// `file` labels metadata records and error messages. `macros` feeds the
/// injected preamble. A file that already carries the preamble is parsed
/// as-is with no line correction.
pub fn run_session(
    file: &str,
    original: &str,
    macros: &BTreeSet<String>,
    verbose: bool,
) -> Result<SessionOutcome, SessionError> {
    let provenance = compute_provenance(original);

    let (text, preamble_lines) = if config::has_fake_header(original) {
        (original.to_string(), 0)
    } else {
        config::add_fake_header(original, macros)
    };

    let t = Instant::now();
    let parsed = parser::parse(&text);
    if !parsed.errors.is_empty() {
        return Err(SessionError::Parse {
            file: file.to_string(),
            errors: parsed.errors,
        });
    }
    if verbose {
        eprintln!(
            "oclbc: parse complete, {:.1}ms",
            t.elapsed().as_secs_f64() * 1000.0
        );
    }

    let t = Instant::now();
    let analysis = analyze::analyze(&parsed.unit);
    if verbose {
        eprintln!(
            "oclbc: analysis complete, {} branch(es), {} barrier(s), {:.1}ms",
            analysis.branch_count,
            analysis.barrier_count,
            t.elapsed().as_secs_f64() * 1000.0
        );
    }
    if analysis.is_empty() {
        return Ok(SessionOutcome::NothingToInstrument);
    }

    let layout = RecorderLayout::new(analysis.branch_count, analysis.barrier_count);
    let map = SourceMap::new(&text, preamble_lines);

    let t = Instant::now();
    let out = instrument::instrument(
        &parsed.unit,
        &text,
        layout,
        &analysis.helper_functions,
        &map,
        file,
    );
    let rewritten = out.edits.apply(&text).map_err(|source| SessionError::Edit {
        file: file.to_string(),
        source,
    })?;
    if verbose {
        eprintln!(
            "oclbc: instrumentation complete, {} edit(s), {:.1}ms",
            out.edits.len(),
            t.elapsed().as_secs_f64() * 1000.0
        );
    }

    // The preamble never reaches user-visible artifacts.
    let stripped = config::remove_fake_header(&rewritten).unwrap_or(rewritten);

    let mut source = String::with_capacity(stripped.len());
    if layout.has_barriers() {
        source.push_str(&layout.barrier_support_block());
    }
    for line in stripped.lines() {
        source.push_str(line);
        source.push('\n');
    }

    Ok(SessionOutcome::Instrumented(Box::new(InstrumentedKernel {
        source,
        metadata: out.metadata,
        analysis,
        provenance,
    })))
}
