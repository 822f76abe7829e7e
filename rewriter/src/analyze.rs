// Pass 1: branch/barrier counter and helper-function collection.
//
// A pure read pass over the tree. Counts conditional constructs and barrier
// calls, and records the names of non-entry functions that have a body. Must
// fully complete before any edit is produced — pass 2 derives recorder sizes
// and id ranges from these counts.
//
// Preconditions: a parsed translation unit.
// Postconditions: counts match the number of conditional/call hooks pass 2
//   will observe (both passes run `walk::walk_unit`).
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeSet;

use crate::ast::{CallExpr, FunctionDecl, IfStmt, Span, TranslationUnit};
use crate::layout::BARRIER_FUNCTION;
use crate::walk::{self, Visitor};

/// Result of the counting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub branch_count: u32,
    pub barrier_count: u32,
    /// Names of non-entry functions with a body. A helper known only through
    /// a bodyless prototype is deliberately not recorded; calls to it will
    /// not receive propagated recorder arguments.
    pub helper_functions: BTreeSet<String>,
    /// Number of kernel entry points seen (informational).
    pub kernel_count: u32,
}

impl Analysis {
    /// True when there is nothing to instrument in this file.
    pub fn is_empty(&self) -> bool {
        self.branch_count == 0 && self.barrier_count == 0
    }
}

/// Count branches and barriers and collect helper functions.
pub fn analyze(unit: &TranslationUnit) -> Analysis {
    let mut counter = Counter {
        analysis: Analysis {
            branch_count: 0,
            barrier_count: 0,
            helper_functions: BTreeSet::new(),
            kernel_count: 0,
        },
    };
    walk::walk_unit(unit, &mut counter);
    counter.analysis
}

struct Counter {
    analysis: Analysis,
}

impl Visitor for Counter {
    fn enter_function(&mut self, func: &FunctionDecl) {
        if func.is_kernel_entry() {
            self.analysis.kernel_count += 1;
        } else if func.body.is_some() {
            self.analysis
                .helper_functions
                .insert(func.name.name.clone());
        }
    }

    fn conditional(&mut self, _if_stmt: &IfStmt, _span: Span) {
        self.analysis.branch_count += 1;
    }

    fn call(&mut self, call: &CallExpr) {
        if call.callee.name == BARRIER_FUNCTION {
            self.analysis.barrier_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn analyze_source(source: &str) -> Analysis {
        let result = parser::parse(source);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        analyze(&result.unit)
    }

    #[test]
    fn counts_branches_and_barriers() {
        let analysis = analyze_source(
            "__kernel void k(__global int* a) {\n\
             if (a[0]) { a[1] = 1; }\n\
             barrier(CLK_LOCAL_MEM_FENCE);\n\
             if (a[2]) { } else { }\n\
             barrier(CLK_GLOBAL_MEM_FENCE);\n\
             }",
        );
        assert_eq!(analysis.branch_count, 2);
        assert_eq!(analysis.barrier_count, 2);
        assert_eq!(analysis.kernel_count, 1);
        assert!(analysis.helper_functions.is_empty());
    }

    #[test]
    fn nested_and_chained_conditionals_all_count() {
        let analysis = analyze_source(
            "void f(int x) {\n\
             if (x) { if (x > 1) { } }\n\
             if (x < 0) { } else if (x == 0) { } else { }\n\
             }",
        );
        assert_eq!(analysis.branch_count, 4);
    }

    #[test]
    fn helper_requires_body() {
        let analysis = analyze_source(
            "float bodied(float x) { return x; }\n\
             float forward_only(float x);\n\
             __kernel void k(void) { }",
        );
        assert_eq!(
            analysis.helper_functions,
            ["bodied".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn kernel_entry_is_not_a_helper() {
        let analysis = analyze_source("__kernel void k(int n) { if (n) { } }");
        assert!(analysis.helper_functions.is_empty());
        assert_eq!(analysis.kernel_count, 1);
    }

    #[test]
    fn unqualified_kernel_keyword_counts_as_entry() {
        let analysis = analyze_source("kernel void k(void) { }");
        assert_eq!(analysis.kernel_count, 1);
        assert!(analysis.helper_functions.is_empty());
    }

    #[test]
    fn barrier_inside_helper_counts() {
        let analysis = analyze_source("void sync_all(void) { barrier(CLK_LOCAL_MEM_FENCE); }");
        assert_eq!(analysis.barrier_count, 1);
        assert_eq!(analysis.branch_count, 0);
        assert!(analysis.helper_functions.contains("sync_all"));
    }

    #[test]
    fn kernel_after_struct_returning_definition_is_counted() {
        let analysis = analyze_source(
            "struct Pair make_pair(int a, int b) { struct Pair p; return p; }\n\
             __kernel void k(__global int* a, int n) { if (n > 0) { a[0] = 1; } }",
        );
        assert_eq!(analysis.branch_count, 1);
        assert_eq!(analysis.kernel_count, 1);
    }

    #[test]
    fn empty_analysis_flags_nothing_to_instrument() {
        let analysis = analyze_source("__kernel void k(__global int* a) { a[0] = 1; }");
        assert!(analysis.is_empty());
    }
}
