//! logos-based selector tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `?hover` as State beats `?` + `Ident`)
//! 2. For equal length matches, earlier-defined variants win

use logos::Logos;

/// Selector token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    /// Control state: `?hover`, `?pressed`, `?disabled`.
    #[regex(r"\?[a-zA-Z][a-zA-Z0-9_]*")]
    State,

    /// Identifier: class names, style classes, control names.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*")]
    Ident,

    /// `,`
    #[token(",")]
    Comma,

    /// `.`
    #[token(".")]
    Dot,

    /// `#`
    #[token("#")]
    Hash,

    /// `*`
    #[token("*")]
    Star,

    /// `>`
    #[token(">")]
    GreaterThan,
}

/// A token with its text and byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Tokenize selector text. Characters that fail to lex are reported as
/// `Err(byte offset)`.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, usize> {
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok(Spanned {
                token,
                text: input[span.clone()].to_string(),
                start: span.start,
                end: span.end,
            }),
            Err(()) => Err(span.start),
        })
        .collect()
}
