// Lexer for textual IR files.
//
// Tokenizes the generic operation syntax (`%v = "dialect.op"(...) {...}`)
// plus the `module` / `func` sugar. Uses the `logos` crate for DFA-based lexing.
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

/// IR token types.
///
/// Sigil-prefixed names (`%v`, `@f`, `#1`) carry their text without the sigil.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("module")]
    Module,
    #[token("func")]
    Func,
    #[token("attributes")]
    Attributes,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("unit")]
    Unit,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token("^")]
    Caret,

    // ── Names ──
    /// SSA value name: `%x`, `%0`, `%arg1`.
    #[regex(r"%[A-Za-z0-9_.]+", strip_sigil)]
    Value(String),

    /// Symbol reference: `@callee`.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_.]*", strip_sigil)]
    Symbol(String),

    /// Result index suffix: `#1` in `%l#1`.
    #[regex(r"#[0-9]+", parse_result_index)]
    ResultIndex(u32),

    // ── Literals ──
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// String literal with `\"`, `\\`, `\n` and `\t` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    /// Bare identifier (attribute keys). Keywords win over this rule.
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Module => write!(f, "module"),
            Token::Func => write!(f, "func"),
            Token::Attributes => write!(f, "attributes"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Unit => write!(f, "unit"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Colon => write!(f, ":"),
            Token::Caret => write!(f, "^"),
            Token::Value(name) => write!(f, "%{name}"),
            Token::Symbol(name) => write!(f, "@{name}"),
            Token::ResultIndex(i) => write!(f, "#{i}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident(name) => write!(f, "{name}"),
        }
    }
}

// ── Callbacks ──

fn strip_sigil(lex: &mut logos::Lexer<'_, Token>) -> String {
    lex.slice()[1..].to_string()
}

fn parse_result_index(lex: &mut logos::Lexer<'_, Token>) -> Option<u32> {
    lex.slice()[1..].parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                't' => result.push('\t'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex an IR source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised input. Lexing is non-fatal: errors are collected and the
/// lexer continues past bad characters.
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
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected input: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
