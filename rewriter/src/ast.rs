// AST node types for OpenCL-C kernel source.
//
// Statement-level tree: the rewriter needs function boundaries, conditional
// statements, and call expressions. Expression interiors stay opaque token
// runs; call expressions are extracted from them with their argument spans.
// Every node carries a `Span` into the original source text.
//
// Preconditions: produced by the parser from a lexed token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

pub use crate::lexer::Span;

/// The reserved kernel-entry qualifiers. A function whose first leading
/// qualifier token equals one of these is a kernel entry point.
pub const KERNEL_ENTRY_QUALIFIERS: [&str; 2] = ["__kernel", "kernel"];

// ── Root ──

/// A complete parsed kernel file: a sequence of top-level items.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    /// Anything else at file scope (globals, typedefs, struct definitions).
    Other(Span),
}

// ── Function declaration ──

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Leading identifiers before the function name, in source order
    /// (qualifiers and return type, e.g. `__kernel`, `void`).
    pub qualifiers: Vec<Ident>,
    pub name: Ident,
    pub params: ParamList,
    /// `Some` for a definition, `None` for a prototype.
    pub body: Option<Block>,
    pub span: Span,
}

impl FunctionDecl {
    /// Kernel-entry classification: first leading qualifier token equals the
    /// reserved entry qualifier.
    pub fn is_kernel_entry(&self) -> bool {
        self.qualifiers
            .first()
            .is_some_and(|q| KERNEL_ENTRY_QUALIFIERS.contains(&q.name.as_str()))
    }
}

/// A function's parameter list, `(` ... `)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    pub lparen: Span,
    pub rparen: Span,
    /// Number of declared parameters. `()` and `(void)` both count as 0.
    pub count: u32,
    /// Span of the lone `void` token for a `(void)` list.
    pub void_span: Option<Span>,
    pub span: Span,
}

// ── Statements ──

/// A `{ ... }` compound statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub lbrace: Span,
    pub rbrace: Span,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    If(IfStmt),
    While { header: ExprRun, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, header: ExprRun },
    For { header: ExprRun, body: Box<Stmt> },
    Switch { header: ExprRun, body: Box<Stmt> },
    Return(Option<ExprRun>),
    /// Expression or declaration statement, terminated by `;`.
    Expr(ExprRun),
    /// Lone `;`.
    Empty,
    /// Labels, jumps, local type definitions — opaque to the rewriter.
    Other,
}

/// An `if` statement. `span` of the enclosing `Stmt` covers the whole
/// construct including any `else` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// Span of the `if` keyword itself (branch location in metadata).
    pub if_span: Span,
    /// Condition token run between the parentheses.
    pub cond: ExprRun,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

// ── Expression runs and calls ──

/// An opaque run of expression tokens with the call expressions extracted
/// from it, in pre-order (outer call before calls nested in its arguments).
#[derive(Debug, Clone, PartialEq)]
pub struct ExprRun {
    pub span: Span,
    pub calls: Vec<CallExpr>,
}

/// A call expression `callee(args...)` found inside an expression run.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Ident,
    pub lparen: Span,
    pub rparen: Span,
    /// Spans of the top-level comma-separated arguments.
    pub args: Vec<Span>,
    /// Whole call: callee start through closing parenthesis.
    pub span: Span,
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
