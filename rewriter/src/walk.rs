// The single deterministic pre-order walker shared by both passes.
//
// Pass 1 (analyze) and pass 2 (instrument) must visit nodes in exactly the
// same order — branch and barrier ids are stable across passes only because
// both passes run this walker. The visitor is a closed trait with a fixed
// hook set; there is no open-ended per-node dispatch.
//
// Order within one `if`: the conditional hook fires first, then calls in the
// condition, then the then-arm, then the else-arm. Calls inside the barrier
// primitive's own arguments are never visited (the parser does not extract
// them — their text is captured verbatim by the barrier rewrite).
//
// Preconditions: a parsed translation unit.
// Postconditions: hook invocation order is a pure function of the tree.
// Failure modes: none.
// Side effects: only through the visitor.

use crate::ast::*;

/// Fixed hook set for both rewriting passes.
pub trait Visitor {
    /// A function declaration (definition or prototype), before its body.
    fn enter_function(&mut self, func: &FunctionDecl);
    /// A conditional construct. `span` covers the whole statement including
    /// any else arm.
    fn conditional(&mut self, if_stmt: &IfStmt, span: Span);
    /// A call expression inside any expression run.
    fn call(&mut self, call: &CallExpr);
}

/// Walk a translation unit in deterministic pre-order.
pub fn walk_unit(unit: &TranslationUnit, visitor: &mut impl Visitor) {
    for item in &unit.items {
        if let Item::Function(func) = item {
            visitor.enter_function(func);
            if let Some(body) = &func.body {
                walk_block(body, visitor);
            }
        }
    }
}

fn walk_block(block: &Block, visitor: &mut impl Visitor) {
    for stmt in &block.stmts {
        walk_stmt(stmt, visitor);
    }
}

fn walk_stmt(stmt: &Stmt, visitor: &mut impl Visitor) {
    match &stmt.kind {
        StmtKind::Block(block) => walk_block(block, visitor),
        StmtKind::If(if_stmt) => {
            visitor.conditional(if_stmt, stmt.span);
            walk_run(&if_stmt.cond, visitor);
            walk_stmt(&if_stmt.then_branch, visitor);
            if let Some(else_branch) = &if_stmt.else_branch {
                walk_stmt(else_branch, visitor);
            }
        }
        StmtKind::While { header, body } | StmtKind::For { header, body }
        | StmtKind::Switch { header, body } => {
            walk_run(header, visitor);
            walk_stmt(body, visitor);
        }
        // Textual order: a do-while body precedes its condition.
        StmtKind::DoWhile { body, header } => {
            walk_stmt(body, visitor);
            walk_run(header, visitor);
        }
        StmtKind::Return(Some(run)) | StmtKind::Expr(run) => walk_run(run, visitor),
        StmtKind::Return(None) | StmtKind::Empty | StmtKind::Other => {}
    }
}

fn walk_run(run: &ExprRun, visitor: &mut impl Visitor) {
    for call in &run.calls {
        visitor.call(call);
    }
}
