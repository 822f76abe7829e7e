// Recorder layout planner.
//
// Pure functions of the pass-1 counts: recorder array sizes, the comma rule
// for signature/call-site insertions, and every text fragment the
// instrumenter splices into the kernel. No state beyond the two counts.
//
// Preconditions: counts come from a completed analysis pass.
// Postconditions: none (pure computation).
// Failure modes: none.
// Side effects: none.

use std::fmt::Write;

/// Name of the workgroup barrier primitive whose calls are rewritten.
pub const BARRIER_FUNCTION: &str = "barrier";

/// Global (cross-group) branch coverage array, one pair of slots per branch.
pub const GLOBAL_COVERAGE_RECORDER: &str = "ocl_kernel_branch_triggered_recorder";

/// Per-group branch coverage array, folded into the global one at kernel exit.
pub const LOCAL_COVERAGE_RECORDER: &str = "local_ocl_kernel_branch_triggered_recorder";

/// Global barrier divergence flag array, one slot per barrier call.
pub const GLOBAL_DIVERGENCE_RECORDER: &str = "ocl_kernel_barrier_divergence_recorder";

/// Per-group barrier arrival counter array, one slot per barrier call.
pub const LOCAL_BARRIER_COUNTER: &str = "local_ocl_kernel_barrier_counter";

/// The divergence-checking macro barrier calls are rewritten into.
pub const BARRIER_CHECK_MACRO: &str = "OCL_KERNEL_CHECK_BARRIER_DIVERGENCE";

/// Include guard of the barrier support block prepended to rewritten files.
pub const BARRIER_SUPPORT_GUARD: &str = "OCL_KERNEL_BARRIER_CHECK_DEFINED";

/// Array sizes and insertion text, derived from the pass-1 counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderLayout {
    pub branch_count: u32,
    pub barrier_count: u32,
}

impl RecorderLayout {
    pub fn new(branch_count: u32, barrier_count: u32) -> Self {
        RecorderLayout {
            branch_count,
            barrier_count,
        }
    }

    pub fn has_branches(&self) -> bool {
        self.branch_count > 0
    }

    pub fn has_barriers(&self) -> bool {
        self.barrier_count > 0
    }

    /// Coverage array size: a true and a false slot per branch.
    pub fn coverage_slots(&self) -> u32 {
        2 * self.branch_count
    }

    /// Divergence/counter array size: one slot per barrier.
    pub fn barrier_slots(&self) -> u32 {
        self.barrier_count
    }

    pub fn true_slot(branch_id: u32) -> u32 {
        2 * branch_id
    }

    pub fn false_slot(branch_id: u32) -> u32 {
        2 * branch_id + 1
    }

    /// Statement recording one branch outcome. Atomic-or, never a plain
    /// store: many lanes race on the same local slot.
    pub fn record_coverage_stmt(&self, slot: u32) -> String {
        format!("atomic_or(&{LOCAL_COVERAGE_RECORDER}[{slot}], 1);")
    }

    // ── Signature and call-site insertions ──

    /// The comma rule: inserted text is prefixed with ", " iff the list
    /// already declares at least one entry.
    fn join_insertion(existing: u32, pieces: &[String]) -> String {
        if pieces.is_empty() {
            return String::new();
        }
        let joined = pieces.join(", ");
        if existing > 0 {
            format!(", {joined}")
        } else {
            joined
        }
    }

    fn kernel_param_pieces(&self) -> Vec<String> {
        let mut pieces = Vec::new();
        if self.has_branches() {
            pieces.push(format!("__global int* {GLOBAL_COVERAGE_RECORDER}"));
        }
        if self.has_barriers() {
            pieces.push(format!("__global int* {GLOBAL_DIVERGENCE_RECORDER}"));
        }
        pieces
    }

    fn helper_param_pieces(&self) -> Vec<String> {
        let mut pieces = Vec::new();
        if self.has_branches() {
            pieces.push(format!("__local int* {LOCAL_COVERAGE_RECORDER}"));
        }
        if self.has_barriers() {
            pieces.push(format!("__global int* {GLOBAL_DIVERGENCE_RECORDER}"));
            pieces.push(format!("__local int* {LOCAL_BARRIER_COUNTER}"));
        }
        pieces
    }

    fn call_argument_pieces(&self) -> Vec<String> {
        let mut pieces = Vec::new();
        if self.has_branches() {
            pieces.push(LOCAL_COVERAGE_RECORDER.to_string());
        }
        if self.has_barriers() {
            pieces.push(GLOBAL_DIVERGENCE_RECORDER.to_string());
            pieces.push(LOCAL_BARRIER_COUNTER.to_string());
        }
        pieces
    }

    /// Parameter text inserted into a kernel-entry signature.
    pub fn kernel_param_insertion(&self, existing_params: u32) -> String {
        Self::join_insertion(existing_params, &self.kernel_param_pieces())
    }

    /// Parameter text inserted into a helper signature.
    pub fn helper_param_insertion(&self, existing_params: u32) -> String {
        Self::join_insertion(existing_params, &self.helper_param_pieces())
    }

    /// Argument text appended at a helper call site.
    pub fn call_argument_insertion(&self, existing_args: u32) -> String {
        Self::join_insertion(existing_args, &self.call_argument_pieces())
    }

    // ── Kernel body prologue and epilogue ──

    /// Local recorder declarations plus zero-initialization, inserted as the
    /// first statement of every kernel body. Local memory starts undefined on
    /// real hardware, so the recorders are cleared and the group synchronized
    /// before any lane can record.
    pub fn local_declarations(&self) -> String {
        let mut text = String::new();
        let cov = self.coverage_slots();
        let bar = self.barrier_slots();
        if self.has_branches() {
            let _ = writeln!(text, "__local int {LOCAL_COVERAGE_RECORDER}[{cov}];");
        }
        if self.has_barriers() {
            let _ = writeln!(text, "__local int {LOCAL_BARRIER_COUNTER}[{bar}];");
        }
        let bound = cov.max(bar);
        let _ = writeln!(
            text,
            "for (int ocl_kernel_init_i = 0; ocl_kernel_init_i < {bound}; ++ocl_kernel_init_i) {{"
        );
        if self.has_branches() && self.has_barriers() {
            let _ = writeln!(
                text,
                "    if (ocl_kernel_init_i < {cov}) {{ {LOCAL_COVERAGE_RECORDER}[ocl_kernel_init_i] = 0; }}"
            );
            let _ = writeln!(
                text,
                "    if (ocl_kernel_init_i < {bar}) {{ {LOCAL_BARRIER_COUNTER}[ocl_kernel_init_i] = 0; }}"
            );
        } else if self.has_branches() {
            let _ = writeln!(text, "    {LOCAL_COVERAGE_RECORDER}[ocl_kernel_init_i] = 0;");
        } else {
            let _ = writeln!(text, "    {LOCAL_BARRIER_COUNTER}[ocl_kernel_init_i] = 0;");
        }
        let _ = writeln!(text, "}}");
        let _ = write!(text, "barrier(CLK_LOCAL_MEM_FENCE);");
        text
    }

    /// Reduction loop appended at the end of every kernel body: atomically OR
    /// each per-group slot into the matching global slot. Atomic again — the
    /// fold races across lanes of every group.
    pub fn fold_loop(&self) -> String {
        let cov = self.coverage_slots();
        format!(
            "for (int ocl_kernel_fold_i = 0; ocl_kernel_fold_i < {cov}; ++ocl_kernel_fold_i) {{\n    \
             atomic_or(&{GLOBAL_COVERAGE_RECORDER}[ocl_kernel_fold_i], {LOCAL_COVERAGE_RECORDER}[ocl_kernel_fold_i]);\n\
             }}"
        )
    }

    // ── Barrier protocol ──

    /// Replacement text for one barrier call. The scope argument is carried
    /// verbatim from the original call.
    pub fn barrier_rewrite(&self, barrier_id: u32, scope_text: &str) -> String {
        format!("{BARRIER_CHECK_MACRO}({barrier_id}, {scope_text})")
    }

    /// The one-per-file support block: total-group-size helper plus the
    /// divergence-checking macro. Protocol: count arrivals, barrier, compare
    /// against the statically expected group size, flag a mismatch, reset the
    /// counter, and a second barrier so the reset cannot race a late lane.
    pub fn barrier_support_block(&self) -> String {
        format!(
            "#ifndef {BARRIER_SUPPORT_GUARD}\n\
             #define {BARRIER_SUPPORT_GUARD}\n\
             int ocl_kernel_total_local_size() {{\n\
             \x20   int ocl_kernel_size = 1;\n\
             \x20   for (uint ocl_kernel_dim = 0; ocl_kernel_dim < get_work_dim(); ++ocl_kernel_dim) {{\n\
             \x20       ocl_kernel_size *= (int)get_local_size(ocl_kernel_dim);\n\
             \x20   }}\n\
             \x20   return ocl_kernel_size;\n\
             }}\n\
             #define {BARRIER_CHECK_MACRO}(ocl_kernel_barrier_id, ocl_kernel_scope) \\\n\
             \x20   do {{ \\\n\
             \x20       atomic_inc(&{LOCAL_BARRIER_COUNTER}[ocl_kernel_barrier_id]); \\\n\
             \x20       barrier(ocl_kernel_scope); \\\n\
             \x20       if ({LOCAL_BARRIER_COUNTER}[ocl_kernel_barrier_id] != ocl_kernel_total_local_size()) {{ \\\n\
             \x20           {GLOBAL_DIVERGENCE_RECORDER}[ocl_kernel_barrier_id] = 1; \\\n\
             \x20       }} \\\n\
             \x20       {LOCAL_BARRIER_COUNTER}[ocl_kernel_barrier_id] = 0; \\\n\
             \x20       barrier(ocl_kernel_scope); \\\n\
             \x20   }} while (0)\n\
             #endif\n"
        )
    }
}
