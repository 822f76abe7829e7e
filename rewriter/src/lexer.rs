// Lexer for OpenCL-C kernel source.
//
// Tokenizes source at the granularity the rewriter needs: keywords that
// shape control flow, delimiters, identifiers, literals, and operator runs.
// Uses the `logos` crate for DFA-based lexing. Comments and preprocessor
// lines are lexed as trivia and filtered out, so token spans always index
// into the original text.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// OpenCL-C token types.
///
/// Only control-flow keywords are distinguished; address-space and access
/// qualifiers (`__kernel`, `__global`, ...) lex as plain identifiers and are
/// classified later by the parser. Operators lex as greedy `Op` runs — the
/// rewriter never needs operator structure, only spans.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // ── Control-flow keywords ──
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("return")]
    Return,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("goto")]
    Goto,

    // ── Declaration keywords (opaque to the rewriter) ──
    #[token("typedef")]
    Typedef,
    #[token("struct")]
    Struct,
    #[token("union")]
    Union,
    #[token("enum")]
    Enum,

    // ── Delimiters ──
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    // ── Identifier ──
    //
    // Placed after keywords — logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `if` matches If, not Ident.
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Literals ──
    /// Numeric literal: hex, decimal, or float with exponent and suffixes.
    #[regex(r"0[xX][0-9a-fA-F]+[uUlL]*")]
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?[fFuUlL]*")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?[fF]?")]
    Number,

    /// String literal with backslash escapes.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLit,

    /// Character literal with backslash escapes.
    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLit,

    // ── Operators ──
    /// A greedy run of operator characters. Structure is irrelevant to the
    /// rewriter; only the covered span matters.
    #[regex(r"[-+*/%<>=!&|^~?:.]+", priority = 1)]
    Op,

    // ── Trivia (filtered out by `lex`) ──
    #[regex(r"//[^\n]*", priority = 10)]
    LineComment,
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/", priority = 10)]
    BlockComment,
    /// A preprocessor line, including backslash-newline continuations.
    #[regex(r"#([^\\\n]|\\\r?\n|\\.)*")]
    Preprocessor,
}

impl Token {
    fn is_trivia(self) -> bool {
        matches!(
            self,
            Token::LineComment | Token::BlockComment | Token::Preprocessor
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Do => "do",
            Token::Switch => "switch",
            Token::Return => "return",
            Token::Case => "case",
            Token::Default => "default",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Goto => "goto",
            Token::Typedef => "typedef",
            Token::Struct => "struct",
            Token::Union => "union",
            Token::Enum => "enum",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semi => ";",
            Token::Comma => ",",
            Token::Ident => "<ident>",
            Token::Number => "<number>",
            Token::StringLit => "<string>",
            Token::CharLit => "<char>",
            Token::Op => "<op>",
            Token::LineComment | Token::BlockComment => "<comment>",
            Token::Preprocessor => "<preprocessor>",
        };
        write!(f, "{text}")
    }
}

// ── Public API ──

/// Lex an OpenCL-C source string into tokens.
///
/// Returns all successfully lexed non-trivia tokens together with any errors
/// for unrecognised characters. Lexing is non-fatal: errors are collected
/// and the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) if token.is_trivia() => {}
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_vs_idents() {
        let tokens = lex_ok("if else ifdef elsewhere");
        assert_eq!(
            tokens,
            vec![Token::If, Token::Else, Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn qualifiers_are_idents() {
        let tokens = lex_ok("__kernel void __global int");
        assert_eq!(tokens, vec![Token::Ident; 4]);
    }

    #[test]
    fn statement_tokens() {
        let tokens = lex_ok("x = y + 1;");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Op,
                Token::Ident,
                Token::Op,
                Token::Number,
                Token::Semi
            ]
        );
    }

    #[test]
    fn operator_runs_are_greedy() {
        // `>=` lexes as one Op run; structure is irrelevant downstream.
        let tokens = lex_ok("a >= b");
        assert_eq!(tokens, vec![Token::Ident, Token::Op, Token::Ident]);
    }

    #[test]
    fn comments_are_trivia() {
        let tokens = lex_ok("a // trailing\n/* block\n comment */ b");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn block_comment_with_inner_stars() {
        let tokens = lex_ok("a /** doc **/ b");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn preprocessor_lines_are_trivia() {
        let tokens = lex_ok("#define FOO 1\nint x;\n#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident, Token::Semi]);
    }

    #[test]
    fn preprocessor_continuation() {
        let tokens = lex_ok("#define FOO(a) \\\n  (a + 1)\nint x;");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident, Token::Semi]);
    }

    #[test]
    fn number_forms() {
        let tokens = lex_ok("0x1F 42u 3.5f 1e-4 .25f");
        assert_eq!(tokens, vec![Token::Number; 5]);
    }

    #[test]
    fn number_does_not_eat_operators() {
        // `1+2` must not lex the `+` into the number.
        let tokens = lex_ok("1+2");
        assert_eq!(tokens, vec![Token::Number, Token::Op, Token::Number]);
    }

    #[test]
    fn spans_index_original_text() {
        let source = "if (x) { y(); }";
        let result = lex(source);
        assert!(result.errors.is_empty());
        let (tok, span) = result.tokens[0];
        assert_eq!(tok, Token::If);
        assert_eq!(&source[span.start..span.end], "if");
    }

    #[test]
    fn string_and_char_literals() {
        let tokens = lex_ok(r#"printf("a \"b\" c"); 'x'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::LParen,
                Token::StringLit,
                Token::RParen,
                Token::Semi,
                Token::CharLit
            ]
        );
    }

    #[test]
    fn unexpected_character_is_collected() {
        let result = lex("int a; ` int b;");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains('`'));
        // Lexing continued past the bad character.
        assert_eq!(result.tokens.len(), 6);
    }
}
