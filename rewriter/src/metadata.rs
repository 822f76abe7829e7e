// Per-branch and per-barrier metadata records, plus the `.dat` renderer.
//
// The `.dat` shape is consumed by an external report viewer; its textual
// layout is frozen. Records also derive `Serialize` for the optional JSON
// sibling output.
//
// Preconditions: locations are already corrected for any injected preamble.
// Postconditions: `render_dat` output ends with a blank line.
// Failure modes: none.
// Side effects: none.

use serde::Serialize;
use std::fmt::Write;

use crate::source_map::SourceLocation;

/// Shape of one arm of an instrumented conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmShape {
    Compound,
    Single,
}

/// Shape of the else arm, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElseShape {
    /// No else arm in the source; one was synthesized.
    None,
    Compound,
    Single,
    /// `else if`: the false-path recorder wraps the chained conditional.
    ChainedIf,
}

/// One instrumented conditional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRecord {
    pub id: u32,
    pub location: SourceLocation,
    pub condition: String,
    pub then_shape: ArmShape,
    pub else_shape: ElseShape,
}

/// One rewritten barrier call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarrierRecord {
    pub id: u32,
    pub location: SourceLocation,
    pub scope: String,
}

/// Everything the report writer emits for one kernel file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelMetadata {
    pub file: String,
    pub branches: Vec<BranchRecord>,
    pub barriers: Vec<BarrierRecord>,
}

impl KernelMetadata {
    pub fn new(file: impl Into<String>) -> Self {
        KernelMetadata {
            file: file.into(),
            branches: Vec::new(),
            barriers: Vec::new(),
        }
    }

    /// Render the line-oriented `.dat` report.
    pub fn render_dat(&self) -> String {
        let mut out = String::new();
        for branch in &self.branches {
            let _ = writeln!(out, "Condition ID: {}", branch.id);
            let _ = writeln!(out, "Source code line: {}:{}", self.file, branch.location);
            let _ = writeln!(out, "Condition: {}", branch.condition);
        }
        for barrier in &self.barriers {
            let _ = writeln!(out, "Barrier ID: {}", barrier.id);
            let _ = writeln!(out, "Source code line: {}:{}", self.file, barrier.location);
        }
        out.push('\n');
        out
    }
}
