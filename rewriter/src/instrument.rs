// Pass 2: coverage and barrier-divergence instrumenter.
//
// Walks the tree in the same pre-order as pass 1, assigning branch and
// barrier ids sequentially from 0, and queues every textual mutation on an
// `EditList`. Nothing here touches the source text; the session materializes
// the edits afterwards.
//
// Branch rules: a compound arm gets a recorder statement as its first
// statement; a single-statement arm is wrapped into a block with the recorder
// statement prepended. A conditional with no else arm gets a synthesized
// `else { <set false-slot> }` so the false outcome is observable at all. A
// chained `else if` is wrapped in a synthetic block with the false-slot
// recorder ahead of the nested conditional.
//
// Preconditions: layout and helper set come from a completed pass 1 over the
//   same tree; the source map covers exactly the parsed text.
// Postconditions: branch ids equal pass 1's count order; metadata locations
//   are corrected for any injected preamble.
// Failure modes: none here; overlap is caught when the edit list is applied.
// Side effects: none.

use std::collections::BTreeSet;

use crate::ast::{CallExpr, FunctionDecl, IfStmt, ParamList, Span, StmtKind, TranslationUnit};
use crate::edit::EditList;
use crate::layout::{RecorderLayout, BARRIER_FUNCTION};
use crate::metadata::{ArmShape, BarrierRecord, BranchRecord, ElseShape, KernelMetadata};
use crate::source_map::SourceMap;
use crate::walk::{self, Visitor};

/// Queued edits plus the metadata records produced alongside them.
#[derive(Debug)]
pub struct Instrumentation {
    pub edits: EditList,
    pub metadata: KernelMetadata,
}

/// Run pass 2 over `unit`. `file` labels metadata records.
pub fn instrument(
    unit: &TranslationUnit,
    source: &str,
    layout: RecorderLayout,
    helpers: &BTreeSet<String>,
    map: &SourceMap,
    file: &str,
) -> Instrumentation {
    let mut pass = Instrumenter {
        source,
        layout,
        helpers,
        map,
        edits: EditList::new(),
        metadata: KernelMetadata::new(file),
        next_branch: 0,
        next_barrier: 0,
    };
    walk::walk_unit(unit, &mut pass);
    Instrumentation {
        edits: pass.edits,
        metadata: pass.metadata,
    }
}

struct Instrumenter<'a> {
    source: &'a str,
    layout: RecorderLayout,
    helpers: &'a BTreeSet<String>,
    map: &'a SourceMap,
    edits: EditList,
    metadata: KernelMetadata,
    next_branch: u32,
    next_barrier: u32,
}

impl Instrumenter<'_> {
    fn text(&self, span: Span) -> &str {
        &self.source[span.start..span.end]
    }

    /// Insert parameter text before the closing `)`, or in place of a lone
    /// `void`.
    fn insert_params(&mut self, params: &ParamList, insertion: String) {
        if insertion.is_empty() {
            return;
        }
        match params.void_span {
            Some(v) => self.edits.replace(v.start, v.end - v.start, insertion),
            None => self.edits.insert_before(params.rparen.start, insertion),
        }
    }
}

impl Visitor for Instrumenter<'_> {
    fn enter_function(&mut self, func: &FunctionDecl) {
        if func.is_kernel_entry() {
            let insertion = self.layout.kernel_param_insertion(func.params.count);
            self.insert_params(&func.params, insertion);
            if let Some(body) = &func.body {
                let prologue = self.layout.local_declarations();
                self.edits
                    .insert_after(body.lbrace.end, format!("\n{prologue}"));
                if self.layout.has_branches() {
                    let fold = self.layout.fold_loop();
                    self.edits
                        .insert_before(body.rbrace.start, format!("{fold}\n"));
                }
            }
        } else {
            let insertion = self.layout.helper_param_insertion(func.params.count);
            self.insert_params(&func.params, insertion);
        }
    }

    fn conditional(&mut self, if_stmt: &IfStmt, _span: Span) {
        let id = self.next_branch;
        self.next_branch += 1;
        let set_true = self
            .layout
            .record_coverage_stmt(RecorderLayout::true_slot(id));
        let set_false = self
            .layout
            .record_coverage_stmt(RecorderLayout::false_slot(id));

        let then = &if_stmt.then_branch;
        let mut else_synthesized = false;
        let then_shape = match &then.kind {
            StmtKind::Block(block) => {
                self.edits
                    .insert_after(block.lbrace.end, format!("\n{set_true}"));
                ArmShape::Compound
            }
            _ => {
                // Wrap the lone statement; the closer is queued after any
                // synthesized else so it applies nearer the statement.
                self.edits
                    .insert_before(then.span.start, format!("{{ {set_true} "));
                if if_stmt.else_branch.is_none() {
                    self.edits
                        .insert_after(then.span.end, format!(" else {{ {set_false} }}"));
                    else_synthesized = true;
                }
                self.edits.insert_after(then.span.end, " }");
                ArmShape::Single
            }
        };

        let else_shape = if else_synthesized {
            ElseShape::None
        } else {
            match &if_stmt.else_branch {
                None => {
                    self.edits
                        .insert_after(then.span.end, format!(" else {{ {set_false} }}"));
                    ElseShape::None
                }
                Some(els) => match &els.kind {
                    StmtKind::Block(block) => {
                        self.edits
                            .insert_after(block.lbrace.end, format!("\n{set_false}"));
                        ElseShape::Compound
                    }
                    StmtKind::If(_) => {
                        self.edits
                            .insert_before(els.span.start, format!("{{ {set_false}\n"));
                        self.edits.insert_after(els.span.end, "\n}");
                        ElseShape::ChainedIf
                    }
                    _ => {
                        self.edits
                            .insert_before(els.span.start, format!("{{ {set_false} "));
                        self.edits.insert_after(els.span.end, " }");
                        ElseShape::Single
                    }
                },
            }
        };

        self.metadata.branches.push(BranchRecord {
            id,
            location: self.map.location(if_stmt.if_span.start),
            condition: self.text(if_stmt.cond.span).trim().to_string(),
            then_shape,
            else_shape,
        });
    }

    fn call(&mut self, call: &CallExpr) {
        if call.callee.name == BARRIER_FUNCTION {
            let id = self.next_barrier;
            self.next_barrier += 1;
            let scope = self
                .text(Span::new(call.lparen.end, call.rparen.start))
                .trim()
                .to_string();
            let rewrite = self.layout.barrier_rewrite(id, &scope);
            self.edits
                .replace(call.span.start, call.span.end - call.span.start, rewrite);
            self.metadata.barriers.push(BarrierRecord {
                id,
                location: self.map.location(call.span.start),
                scope,
            });
        } else if self.helpers.contains(&call.callee.name) {
            let insertion = self
                .layout
                .call_argument_insertion(call.args.len() as u32);
            if !insertion.is_empty() {
                self.edits.insert_before(call.rparen.start, insertion);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze;
    use crate::parser;

    fn rewrite(source: &str) -> (String, KernelMetadata) {
        let result = parser::parse(source);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let analysis = analyze::analyze(&result.unit);
        let layout = RecorderLayout::new(analysis.branch_count, analysis.barrier_count);
        let map = SourceMap::new(source, 0);
        let out = instrument(
            &result.unit,
            source,
            layout,
            &analysis.helper_functions,
            &map,
            "test.cl",
        );
        let text = out.edits.apply(source).unwrap();
        (text, out.metadata)
    }

    #[test]
    fn block_then_arm_gets_recorder_and_synthesized_else() {
        let (text, meta) =
            rewrite("__kernel void k(__global int* a, int x) { if (x > 0) { a[0] = 1; } }");
        assert!(text.contains(
            "if (x > 0) {\natomic_or(&local_ocl_kernel_branch_triggered_recorder[0], 1);"
        ));
        assert!(text.contains(
            "} else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1); }"
        ));
        assert_eq!(meta.branches.len(), 1);
        assert_eq!(meta.branches[0].then_shape, ArmShape::Compound);
        assert_eq!(meta.branches[0].else_shape, ElseShape::None);
        assert_eq!(meta.branches[0].condition, "x > 0");
    }

    #[test]
    fn kernel_signature_prologue_and_fold() {
        let (text, _) = rewrite("__kernel void k(__global int* a) { if (a[0]) { } }");
        assert!(text.contains(
            "__global int* a, __global int* ocl_kernel_branch_triggered_recorder)"
        ));
        assert!(text.contains("__local int local_ocl_kernel_branch_triggered_recorder[2];"));
        assert!(text.contains("barrier(CLK_LOCAL_MEM_FENCE);"));
        assert!(text.contains(
            "atomic_or(&ocl_kernel_branch_triggered_recorder[ocl_kernel_fold_i], \
             local_ocl_kernel_branch_triggered_recorder[ocl_kernel_fold_i]);"
        ));
    }

    #[test]
    fn single_statement_then_arm_is_wrapped() {
        let (text, meta) = rewrite("void f(int x) { if (x) y = x; }");
        assert_eq!(
            text,
            "void f(int x, __local int* local_ocl_kernel_branch_triggered_recorder) \
             { if (x) { atomic_or(&local_ocl_kernel_branch_triggered_recorder[0], 1); y = x; } \
             else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1); } }"
        );
        assert_eq!(meta.branches[0].then_shape, ArmShape::Single);
        assert_eq!(meta.branches[0].else_shape, ElseShape::None);
    }

    #[test]
    fn nested_single_statement_conditionals_nest_their_closers() {
        let (text, _) = rewrite("void f(int a, int b) { if (a) if (b) x = 1; }");
        assert_eq!(
            text,
            "void f(int a, int b, __local int* local_ocl_kernel_branch_triggered_recorder) \
             { if (a) { atomic_or(&local_ocl_kernel_branch_triggered_recorder[0], 1); \
             if (b) { atomic_or(&local_ocl_kernel_branch_triggered_recorder[2], 1); x = 1; } \
             else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[3], 1); } } \
             else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1); } }"
        );
    }

    #[test]
    fn block_else_arm_gets_false_recorder() {
        let (text, meta) = rewrite("void f(int x) { if (x) { a(); } else { b(); } }");
        assert!(text.contains(
            "else {\natomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1);"
        ));
        assert_eq!(meta.branches[0].else_shape, ElseShape::Compound);
    }

    #[test]
    fn single_statement_else_arm_is_wrapped() {
        let (text, meta) = rewrite("void f(int x) { if (x) { a(); } else b(); }");
        assert!(text.contains(
            "else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1); b(); }"
        ));
        assert_eq!(meta.branches[0].else_shape, ElseShape::Single);
    }

    #[test]
    fn chained_else_if_is_wrapped_with_false_recorder() {
        let (text, meta) =
            rewrite("void f(int x) { if (x > 0) { a(); } else if (x < 0) { b(); } }");
        // Outer false-slot recorder opens a synthetic block ahead of the
        // nested conditional; the block closes after the chain's extent.
        assert!(text.contains(
            "else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[1], 1);\nif (x < 0)"
        ));
        // Inner branch (id 1) records into slots 2/3, with its own
        // synthesized else inside the synthetic block.
        assert!(text.contains(
            "else { atomic_or(&local_ocl_kernel_branch_triggered_recorder[3], 1); }\n}"
        ));
        assert_eq!(meta.branches[0].else_shape, ElseShape::ChainedIf);
        assert_eq!(meta.branches[1].else_shape, ElseShape::None);
    }

    #[test]
    fn barrier_call_is_replaced_with_macro() {
        let (text, meta) =
            rewrite("__kernel void k(__global int* a) { barrier(CLK_LOCAL_MEM_FENCE); }");
        assert!(text.contains("OCL_KERNEL_CHECK_BARRIER_DIVERGENCE(0, CLK_LOCAL_MEM_FENCE);"));
        assert!(text.contains(
            "__global int* a, __global int* ocl_kernel_barrier_divergence_recorder)"
        ));
        assert!(text.contains("__local int local_ocl_kernel_barrier_counter[1];"));
        // No branches: no coverage arrays and no fold loop.
        assert!(!text.contains("ocl_kernel_branch_triggered_recorder"));
        assert!(!text.contains("ocl_kernel_fold_i"));
        assert_eq!(meta.barriers.len(), 1);
        assert_eq!(meta.barriers[0].scope, "CLK_LOCAL_MEM_FENCE");
    }

    #[test]
    fn helper_call_site_receives_recorder_argument() {
        let (text, _) = rewrite(
            "void foo(int a) { if (a) { } }\n\
             __kernel void k(int x) { foo(5); }",
        );
        assert!(text.contains("foo(5, local_ocl_kernel_branch_triggered_recorder)"));
        assert!(text.contains(
            "void foo(int a, __local int* local_ocl_kernel_branch_triggered_recorder)"
        ));
    }

    #[test]
    fn helper_prototype_signature_is_also_extended() {
        let (text, _) = rewrite(
            "float scale(float v);\n\
             float scale(float v) { if (v > 0) { return v; } return -v; }",
        );
        assert_eq!(
            text.matches("float scale(float v, __local int* local_ocl_kernel_branch_triggered_recorder)")
                .count(),
            2
        );
    }

    #[test]
    fn void_parameter_list_is_replaced() {
        let (text, _) = rewrite("__kernel void k(void) { if (1) { } }");
        assert!(text.contains(
            "__kernel void k(__global int* ocl_kernel_branch_triggered_recorder)"
        ));
        assert!(!text.contains("(void)"));
    }

    #[test]
    fn ids_are_assigned_in_pre_order_and_match_pass_one() {
        let source = "__kernel void k(__global int* a, int n) {\n\
                      if (n > 0) { a[0] = 1; }\n\
                      barrier(CLK_LOCAL_MEM_FENCE);\n\
                      for (int i = 0; i < n; i++) { if (a[i]) { a[i] = 0; } }\n\
                      barrier(CLK_GLOBAL_MEM_FENCE);\n\
                      }";
        let parsed = parser::parse(source);
        let analysis = analyze::analyze(&parsed.unit);
        let (_, meta) = rewrite(source);
        assert_eq!(meta.branches.len() as u32, analysis.branch_count);
        assert_eq!(meta.barriers.len() as u32, analysis.barrier_count);
        let branch_ids: Vec<u32> = meta.branches.iter().map(|b| b.id).collect();
        assert_eq!(branch_ids, vec![0, 1]);
        let barrier_ids: Vec<u32> = meta.barriers.iter().map(|b| b.id).collect();
        assert_eq!(barrier_ids, vec![0, 1]);
        // Locations are strictly increasing in source order within each kind.
        assert!(meta.branches[0].location.line < meta.branches[1].location.line);
        assert!(meta.barriers[0].location.line < meta.barriers[1].location.line);
    }

    #[test]
    fn barrier_in_single_statement_then_arm() {
        let (text, _) = rewrite("__kernel void k(int x) { if (x) barrier(CLK_LOCAL_MEM_FENCE); }");
        assert!(text.contains(
            "if (x) { atomic_or(&local_ocl_kernel_branch_triggered_recorder[0], 1); \
             OCL_KERNEL_CHECK_BARRIER_DIVERGENCE(0, CLK_LOCAL_MEM_FENCE); }"
        ));
    }

    #[test]
    fn branch_location_is_the_if_keyword() {
        let (_, meta) = rewrite("void f(int x) {\n    if (x) { }\n}");
        assert_eq!(meta.branches[0].location.line, 2);
        assert_eq!(meta.branches[0].location.col, 5);
    }
}
