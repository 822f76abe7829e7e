// Parser for OpenCL-C kernel source.
//
// Recursive descent over the lexer's token stream, producing the
// statement-level AST in `ast`. The grammar is deliberately shallow: function
// declarations, compound/conditional/loop/switch statements, and opaque
// expression runs with extracted call expressions. Everything the rewriter
// does not touch is consumed as balanced token runs and kept as `Other`
// nodes with spans.
//
// Preconditions: input is the token stream from `lexer::lex()`.
// Postconditions: returns a (possibly partial) AST plus any errors (non-fatal).
// Failure modes: syntax errors produce `ParseError`; parsing continues.
// Side effects: none.

use std::fmt;

use crate::ast::*;
use crate::layout::BARRIER_FUNCTION;
use crate::lexer::{self, Span, Token};

/// A parse error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub unit: TranslationUnit,
    pub errors: Vec<ParseError>,
}

/// Parse an OpenCL-C source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = lexer::lex(source);
    let mut errors: Vec<ParseError> = lex_result
        .errors
        .into_iter()
        .map(|e| ParseError {
            span: e.span,
            message: e.message,
        })
        .collect();

    let mut parser = Parser {
        source,
        tokens: &lex_result.tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let unit = parser.parse_unit();
    errors.extend(parser.errors);

    ParseResult { unit, errors }
}

// ── Parser ──

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [(Token, Span)],
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    // ── Token access ──

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|&(t, _)| t)
    }

    fn peek_at(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).map(|&(t, _)| t)
    }

    fn span(&self) -> Span {
        self.span_at(self.pos)
    }

    fn span_at(&self, idx: usize) -> Span {
        match self.tokens.get(idx) {
            Some(&(_, s)) => s,
            None => {
                let end = self.source.len();
                Span::new(end, end)
            }
        }
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    fn advance(&mut self) -> Span {
        let s = self.span();
        self.pos += 1;
        s
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(ParseError {
            span,
            message: message.into(),
        });
    }

    /// True if the token at `idx` is an `Op` whose text contains `ch`.
    fn op_contains(&self, idx: usize, ch: char) -> bool {
        matches!(self.tokens.get(idx), Some(&(Token::Op, s)) if self.text(s).contains(ch))
    }

    // ── Translation unit ──

    fn parse_unit(&mut self) -> TranslationUnit {
        let unit_start = self.span();
        let mut items = Vec::new();
        while !self.at_end() {
            let before = self.pos;
            items.push(self.parse_item());
            if self.pos == before {
                // Defensive progress guarantee against degenerate input.
                let span = self.advance();
                self.error(span, format!("unexpected token {:?}", self.text(span)));
            }
        }
        let unit_end = self.span_at(self.pos.saturating_sub(1));
        TranslationUnit {
            items,
            span: unit_start.to(unit_end),
        }
    }

    fn parse_item(&mut self) -> Item {
        match self.peek() {
            Some(Token::Semi) => Item::Other(self.advance()),
            Some(Token::Typedef) | Some(Token::Struct) | Some(Token::Union)
            | Some(Token::Enum) => {
                let start = self.span();
                let end = self.consume_to_semi();
                Item::Other(start.to(end))
            }
            _ => self.parse_function_or_other(),
        }
    }

    /// Parse a function declaration, falling back to an opaque item when the
    /// leading tokens do not form `qualifiers name (`.
    fn parse_function_or_other(&mut self) -> Item {
        let start_pos = self.pos;
        let start_span = self.span();
        let mut qualifiers: Vec<Ident> = Vec::new();

        loop {
            match self.peek() {
                Some(Token::Ident) => {
                    let ident_span = self.span();
                    let name = self.text(ident_span);
                    // `__attribute__((...))` between qualifiers — skip it.
                    if name == "__attribute__" && self.peek_at(1) == Some(Token::LParen) {
                        self.advance();
                        self.skip_balanced_parens();
                        continue;
                    }
                    // `name (` after at least one qualifier is the function name.
                    if self.peek_at(1) == Some(Token::LParen) && !qualifiers.is_empty() {
                        let name_ident = Ident {
                            name: name.to_string(),
                            span: ident_span,
                        };
                        self.advance();
                        return self.parse_function_rest(
                            start_pos, start_span, qualifiers, name_ident,
                        );
                    }
                    qualifiers.push(Ident {
                        name: name.to_string(),
                        span: ident_span,
                    });
                    self.advance();
                }
                // Pointer stars and the like between qualifiers.
                Some(Token::Op) => {
                    self.advance();
                }
                _ => {
                    // Not a function declaration — opaque top-level item.
                    self.pos = start_pos;
                    let end = self.consume_to_semi();
                    return Item::Other(start_span.to(end));
                }
            }
        }
    }

    fn parse_function_rest(
        &mut self,
        start_pos: usize,
        start_span: Span,
        qualifiers: Vec<Ident>,
        name: Ident,
    ) -> Item {
        let params = match self.parse_param_list() {
            Some(p) => p,
            None => {
                self.pos = start_pos;
                let end = self.consume_to_semi();
                return Item::Other(start_span.to(end));
            }
        };

        // Tolerate trailing attribute groups between `)` and `{`/`;`.
        loop {
            match self.peek() {
                Some(Token::Ident) => {
                    self.advance();
                }
                Some(Token::LParen) => {
                    self.skip_balanced_parens();
                }
                Some(Token::LBrace) => {
                    let body = self.parse_block();
                    let end = body.span;
                    return Item::Function(FunctionDecl {
                        qualifiers,
                        name,
                        params,
                        body: Some(body),
                        span: start_span.to(end),
                    });
                }
                Some(Token::Semi) => {
                    let end = self.advance();
                    return Item::Function(FunctionDecl {
                        qualifiers,
                        name,
                        params,
                        body: None,
                        span: start_span.to(end),
                    });
                }
                _ => {
                    let span = self.span();
                    self.error(span, "expected function body or ';'");
                    self.pos = start_pos;
                    let end = self.consume_to_semi();
                    return Item::Other(start_span.to(end));
                }
            }
        }
    }

    /// Parse `( ... )`, counting top-level comma-separated parameters.
    fn parse_param_list(&mut self) -> Option<ParamList> {
        if self.peek() != Some(Token::LParen) {
            return None;
        }
        let lparen = self.advance();
        let inner_start = self.pos;
        let mut depth = 0usize;
        let mut commas = 0u32;
        loop {
            match self.peek() {
                None => {
                    self.error(lparen, "unclosed parameter list");
                    return None;
                }
                Some(Token::LParen) | Some(Token::LBracket) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::RBracket) => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                }
                Some(Token::RParen) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(Token::Comma) => {
                    if depth == 0 {
                        commas += 1;
                    }
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let inner_end = self.pos;
        let rparen = self.advance();

        let token_count = inner_end - inner_start;
        let (count, void_span) = if token_count == 0 {
            (0, None)
        } else if token_count == 1 {
            let s = self.span_at(inner_start);
            if self.tokens[inner_start].0 == Token::Ident && self.text(s) == "void" {
                (0, Some(s))
            } else {
                (1, None)
            }
        } else {
            (commas + 1, None)
        };

        Some(ParamList {
            lparen,
            rparen,
            count,
            void_span,
            span: lparen.to(rparen),
        })
    }

    // ── Statements ──

    fn parse_block(&mut self) -> Block {
        let lbrace = self.advance(); // caller guarantees LBrace
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.error(lbrace, "unclosed block");
                    let end = self.span();
                    return Block {
                        lbrace,
                        rbrace: end,
                        stmts,
                        span: lbrace.to(end),
                    };
                }
                Some(Token::RBrace) => {
                    let rbrace = self.advance();
                    return Block {
                        lbrace,
                        rbrace,
                        stmts,
                        span: lbrace.to(rbrace),
                    };
                }
                Some(_) => {
                    let before = self.pos;
                    stmts.push(self.parse_stmt());
                    if self.pos == before {
                        let span = self.advance();
                        self.error(span, format!("unexpected token {:?}", self.text(span)));
                    }
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.peek() {
            Some(Token::LBrace) => {
                let block = self.parse_block();
                let span = block.span;
                Stmt {
                    kind: StmtKind::Block(block),
                    span,
                }
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => {
                let kw = self.advance();
                let header = self.parse_paren_run(kw);
                let body = self.parse_stmt();
                let span = kw.to(body.span);
                Stmt {
                    kind: StmtKind::While {
                        header,
                        body: Box::new(body),
                    },
                    span,
                }
            }
            Some(Token::For) => {
                let kw = self.advance();
                let header = self.parse_paren_run(kw);
                let body = self.parse_stmt();
                let span = kw.to(body.span);
                Stmt {
                    kind: StmtKind::For {
                        header,
                        body: Box::new(body),
                    },
                    span,
                }
            }
            Some(Token::Switch) => {
                let kw = self.advance();
                let header = self.parse_paren_run(kw);
                let body = self.parse_stmt();
                let span = kw.to(body.span);
                Stmt {
                    kind: StmtKind::Switch {
                        header,
                        body: Box::new(body),
                    },
                    span,
                }
            }
            Some(Token::Do) => {
                let kw = self.advance();
                let body = self.parse_stmt();
                if self.peek() == Some(Token::While) {
                    self.advance();
                } else {
                    let span = self.span();
                    self.error(span, "expected 'while' after do-body");
                }
                let header = self.parse_paren_run(kw);
                let mut end = header.span;
                if self.peek() == Some(Token::Semi) {
                    end = self.advance();
                }
                Stmt {
                    kind: StmtKind::DoWhile {
                        body: Box::new(body),
                        header,
                    },
                    span: kw.to(end),
                }
            }
            Some(Token::Return) => {
                let kw = self.advance();
                if self.peek() == Some(Token::Semi) {
                    let end = self.advance();
                    Stmt {
                        kind: StmtKind::Return(None),
                        span: kw.to(end),
                    }
                } else {
                    let run_start = self.pos;
                    let end = self.consume_to_semi();
                    let run = self.make_run(run_start, self.last_non_semi());
                    Stmt {
                        kind: StmtKind::Return(Some(run)),
                        span: kw.to(end),
                    }
                }
            }
            Some(Token::Case) | Some(Token::Default) => {
                // `case <const-expr>:` / `default:` — consume through the colon.
                let start = self.advance();
                let mut end = start;
                while !self.at_end() {
                    if self.op_contains(self.pos, ':') {
                        end = self.advance();
                        break;
                    }
                    if matches!(self.peek(), Some(Token::RBrace) | Some(Token::LBrace)) {
                        break;
                    }
                    end = self.advance();
                }
                Stmt {
                    kind: StmtKind::Other,
                    span: start.to(end),
                }
            }
            Some(Token::Break) | Some(Token::Continue) | Some(Token::Goto) => {
                let start = self.span();
                let end = self.consume_to_semi();
                Stmt {
                    kind: StmtKind::Other,
                    span: start.to(end),
                }
            }
            Some(Token::Typedef) | Some(Token::Struct) | Some(Token::Union)
            | Some(Token::Enum) => {
                let start = self.span();
                let end = self.consume_to_semi();
                Stmt {
                    kind: StmtKind::Other,
                    span: start.to(end),
                }
            }
            Some(Token::Semi) => {
                let span = self.advance();
                Stmt {
                    kind: StmtKind::Empty,
                    span,
                }
            }
            Some(Token::Else) => {
                let span = self.advance();
                self.error(span, "'else' without a matching 'if'");
                Stmt {
                    kind: StmtKind::Other,
                    span,
                }
            }
            _ => {
                // Label (`name:`) followed by a statement — consume the label
                // alone so the labelled statement parses structurally.
                if self.peek() == Some(Token::Ident)
                    && matches!(self.tokens.get(self.pos + 1),
                        Some(&(Token::Op, s)) if self.text(s) == ":")
                {
                    let start = self.advance();
                    let end = self.advance();
                    return Stmt {
                        kind: StmtKind::Other,
                        span: start.to(end),
                    };
                }
                // Expression or declaration statement.
                let start = self.span();
                let run_start = self.pos;
                let end = self.consume_to_semi();
                let run = self.make_run(run_start, self.last_non_semi());
                Stmt {
                    kind: StmtKind::Expr(run),
                    span: start.to(end),
                }
            }
        }
    }

    fn parse_if(&mut self) -> Stmt {
        let if_span = self.advance();
        let cond = self.parse_paren_run(if_span);
        let then_branch = self.parse_stmt();
        let mut span = if_span.to(then_branch.span);
        let else_branch = if self.peek() == Some(Token::Else) {
            self.advance();
            let stmt = self.parse_stmt();
            span = if_span.to(stmt.span);
            Some(Box::new(stmt))
        } else {
            None
        };
        Stmt {
            kind: StmtKind::If(IfStmt {
                if_span,
                cond,
                then_branch: Box::new(then_branch),
                else_branch,
            }),
            span,
        }
    }

    /// Parse a parenthesized header `( ... )` into an expression run covering
    /// the tokens between the parentheses (balanced; `for` headers keep their
    /// inner semicolons).
    fn parse_paren_run(&mut self, context: Span) -> ExprRun {
        if self.peek() != Some(Token::LParen) {
            self.error(context, "expected '('");
            let here = self.span();
            return ExprRun {
                span: Span::new(here.start, here.start),
                calls: Vec::new(),
            };
        }
        let lparen = self.advance();
        let inner_start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    self.error(lparen, "unclosed '('");
                    break;
                }
                Some(Token::LParen) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::RParen) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let inner_end = self.pos.saturating_sub(1);
        if self.peek() == Some(Token::RParen) {
            self.advance();
        }
        if self.pos.saturating_sub(1) < inner_start + 1 {
            // Empty parentheses.
            return ExprRun {
                span: Span::new(lparen.end, lparen.end),
                calls: Vec::new(),
            };
        }
        self.make_run(inner_start, inner_end)
    }

    /// Build an `ExprRun` over tokens `[first..=last]`, extracting calls.
    fn make_run(&mut self, first: usize, last: usize) -> ExprRun {
        if first > last || first >= self.tokens.len() {
            let here = self.span_at(first);
            return ExprRun {
                span: Span::new(here.start, here.start),
                calls: Vec::new(),
            };
        }
        let span = self.span_at(first).to(self.span_at(last));
        let mut calls = Vec::new();
        self.extract_calls(first, last + 1, &mut calls);
        ExprRun { span, calls }
    }

    /// Extract call expressions from tokens `[lo..hi)` in pre-order. Does not
    /// descend into the arguments of the barrier primitive — those are
    /// captured verbatim by the barrier rewrite.
    fn extract_calls(&self, lo: usize, hi: usize, out: &mut Vec<CallExpr>) {
        let mut i = lo;
        while i < hi {
            if self.tokens[i].0 == Token::Ident
                && i + 1 < hi
                && self.tokens[i + 1].0 == Token::LParen
            {
                if let Some(close) = self.matching_rparen(i + 1, hi) {
                    let callee_span = self.span_at(i);
                    let callee = Ident {
                        name: self.text(callee_span).to_string(),
                        span: callee_span,
                    };
                    let is_barrier = callee.name == BARRIER_FUNCTION;
                    let lparen = self.span_at(i + 1);
                    let rparen = self.span_at(close);
                    let args = self.split_args(i + 2, close);
                    out.push(CallExpr {
                        span: callee_span.to(rparen),
                        callee,
                        lparen,
                        rparen,
                        args,
                    });
                    if is_barrier {
                        i = close + 1;
                        continue;
                    }
                    i += 2;
                    continue;
                }
            }
            i += 1;
        }
    }

    /// Index of the `)` matching the `(` at `open`, searching below `hi`.
    fn matching_rparen(&self, open: usize, hi: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (j, &(t, _)) in self.tokens.iter().enumerate().take(hi).skip(open) {
            match t {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Spans of top-level comma-separated arguments in tokens `(lo..hi)`.
    fn split_args(&self, lo: usize, hi: usize) -> Vec<Span> {
        let mut args = Vec::new();
        let mut depth = 0usize;
        let mut arg_start = lo;
        for j in lo..hi {
            match self.tokens[j].0 {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 => {
                    if j > arg_start {
                        args.push(self.span_at(arg_start).to(self.span_at(j - 1)));
                    }
                    arg_start = j + 1;
                }
                _ => {}
            }
        }
        if hi > arg_start {
            args.push(self.span_at(arg_start).to(self.span_at(hi - 1)));
        }
        args
    }

    /// Index of the last consumed token, stepping back over a trailing `;`.
    fn last_non_semi(&self) -> usize {
        let last = self.pos.saturating_sub(1);
        if self.tokens.get(last).map(|&(t, _)| t) == Some(Token::Semi) {
            last.saturating_sub(1)
        } else {
            last
        }
    }

    // ── Recovery helpers ──

    /// Consume tokens through the next `;` at delimiter depth 0, balancing
    /// parentheses, brackets, and braces. Stops before an unmatched `}`.
    /// A balanced top-level `{...}` group also terminates the run — a
    /// definition body carries no trailing `;`, and scanning past it would
    /// swallow the items that follow. Returns the span of the last consumed
    /// token.
    fn consume_to_semi(&mut self) -> Span {
        let mut depth = 0usize;
        let mut last = self.span();
        while let Some(tok) = self.peek() {
            match tok {
                Token::LParen | Token::LBracket | Token::LBrace => {
                    depth += 1;
                    last = self.advance();
                }
                Token::RParen | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    last = self.advance();
                }
                Token::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    last = self.advance();
                    if depth == 0 {
                        break;
                    }
                }
                Token::Semi => {
                    last = self.advance();
                    if depth == 0 {
                        break;
                    }
                }
                _ => {
                    last = self.advance();
                }
            }
        }
        last
    }

    /// Skip a balanced `( ... )` group. Caller guarantees LParen.
    fn skip_balanced_parens(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Token::LParen => {
                    depth += 1;
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> TranslationUnit {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.unit
    }

    fn first_function(unit: &TranslationUnit) -> &FunctionDecl {
        unit.items
            .iter()
            .find_map(|i| match i {
                Item::Function(f) => Some(f),
                Item::Other(_) => None,
            })
            .expect("expected a function declaration")
    }

    #[test]
    fn kernel_function_with_body() {
        let unit = parse_ok("__kernel void add(__global int* a, int n) { a[0] = n; }");
        let f = first_function(&unit);
        assert_eq!(f.name.name, "add");
        assert!(f.is_kernel_entry());
        assert_eq!(f.params.count, 2);
        assert!(f.body.is_some());
    }

    #[test]
    fn helper_function_and_prototype() {
        let unit = parse_ok("float square(float x);\nfloat square(float x) { return x * x; }");
        let funcs: Vec<_> = unit
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Function(f) => Some(f),
                Item::Other(_) => None,
            })
            .collect();
        assert_eq!(funcs.len(), 2);
        assert!(!funcs[0].is_kernel_entry());
        assert!(funcs[0].body.is_none());
        assert!(funcs[1].body.is_some());
    }

    #[test]
    fn void_param_list_counts_zero() {
        let unit = parse_ok("int zero(void) { return 0; }");
        let f = first_function(&unit);
        assert_eq!(f.params.count, 0);
        assert!(f.params.void_span.is_some());

        let unit = parse_ok("int zero() { return 0; }");
        let f = first_function(&unit);
        assert_eq!(f.params.count, 0);
        assert!(f.params.void_span.is_none());
    }

    #[test]
    fn if_else_shapes() {
        let source = "void f(int x) { if (x > 0) { x = 1; } else x = 2; }";
        let unit = parse_ok(source);
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::If(if_stmt) = &body.stmts[0].kind else {
            panic!("expected If, got {:?}", body.stmts[0].kind);
        };
        assert_eq!(
            &source[if_stmt.cond.span.start..if_stmt.cond.span.end],
            "x > 0"
        );
        assert!(matches!(if_stmt.then_branch.kind, StmtKind::Block(_)));
        assert!(matches!(
            if_stmt.else_branch.as_ref().unwrap().kind,
            StmtKind::Expr(_)
        ));
    }

    #[test]
    fn else_if_chain_nests() {
        let unit = parse_ok("void f(int x) { if (x) { } else if (x > 1) { } else { } }");
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::If(outer) = &body.stmts[0].kind else {
            panic!("expected If");
        };
        let else_stmt = outer.else_branch.as_ref().unwrap();
        let StmtKind::If(inner) = &else_stmt.kind else {
            panic!("expected chained If, got {:?}", else_stmt.kind);
        };
        assert!(inner.else_branch.is_some());
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let unit = parse_ok("void f(int x) { if (x) if (x > 1) x = 1; else x = 2; }");
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::If(outer) = &body.stmts[0].kind else {
            panic!("expected If");
        };
        assert!(outer.else_branch.is_none());
        let StmtKind::If(inner) = &outer.then_branch.kind else {
            panic!("expected nested If");
        };
        assert!(inner.else_branch.is_some());
    }

    #[test]
    fn call_extraction_in_expression_statement() {
        let source = "void f(void) { foo(1, bar(2), 3); }";
        let unit = parse_ok(source);
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::Expr(run) = &body.stmts[0].kind else {
            panic!("expected Expr");
        };
        // Pre-order: outer `foo` before nested `bar`.
        assert_eq!(run.calls.len(), 2);
        assert_eq!(run.calls[0].callee.name, "foo");
        assert_eq!(run.calls[0].args.len(), 3);
        assert_eq!(run.calls[1].callee.name, "bar");
        let arg1 = run.calls[0].args[1];
        assert_eq!(&source[arg1.start..arg1.end], "bar(2)");
    }

    #[test]
    fn barrier_arguments_are_not_descended() {
        let unit = parse_ok("void f(void) { barrier(mk_flags()); }");
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::Expr(run) = &body.stmts[0].kind else {
            panic!("expected Expr");
        };
        assert_eq!(run.calls.len(), 1);
        assert_eq!(run.calls[0].callee.name, "barrier");
    }

    #[test]
    fn calls_in_condition_and_for_header() {
        let unit = parse_ok("void f(int x) { if (check(x)) { } for (init(); x < lim(); x++) { } }");
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let StmtKind::If(if_stmt) = &body.stmts[0].kind else {
            panic!("expected If");
        };
        assert_eq!(if_stmt.cond.calls.len(), 1);
        assert_eq!(if_stmt.cond.calls[0].callee.name, "check");
        let StmtKind::For { header, .. } = &body.stmts[1].kind else {
            panic!("expected For");
        };
        let names: Vec<_> = header.calls.iter().map(|c| c.callee.name.as_str()).collect();
        assert_eq!(names, vec!["init", "lim"]);
    }

    #[test]
    fn globals_and_typedefs_are_opaque() {
        let unit = parse_ok("__constant int table[2] = {1, 2};\ntypedef struct { int a; } pair_t;\nvoid f(void) { }");
        let f = first_function(&unit);
        assert_eq!(f.name.name, "f");
        let opaque = unit
            .items
            .iter()
            .filter(|i| matches!(i, Item::Other(_)))
            .count();
        assert_eq!(opaque, unit.items.len() - 1);
    }

    #[test]
    fn struct_returning_definition_does_not_swallow_following_functions() {
        let unit = parse_ok(
            "struct Pair make_pair(int a, int b) { struct Pair p; return p; }\n\
             __kernel void k(__global int* out, int n) { if (n > 0) { out[0] = 1; } }",
        );
        let f = first_function(&unit);
        assert_eq!(f.name.name, "k");
        assert!(f.is_kernel_entry());
        assert!(f.body.is_some());
    }

    #[test]
    fn do_while_and_switch_parse() {
        let unit = parse_ok(
            "void f(int x) { do { x--; } while (x > 0); switch (x) { case 0: break; default: break; } }",
        );
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0].kind, StmtKind::DoWhile { .. }));
        assert!(matches!(body.stmts[1].kind, StmtKind::Switch { .. }));
    }

    #[test]
    fn unclosed_block_reports_error() {
        let result = parse("void f(void) { if (1) { ");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn if_statement_span_includes_else() {
        let source = "void f(int x) { if (x) { } else { x = 1; } }";
        let unit = parse_ok(source);
        let f = first_function(&unit);
        let body = f.body.as_ref().unwrap();
        let stmt = &body.stmts[0];
        assert_eq!(&source[stmt.span.start..stmt.span.end], "if (x) { } else { x = 1; }");
    }
}
