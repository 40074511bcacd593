//! Recursive descent selector parser.
//!
//! Parses selector lists such as `Dialog > UIButton.warning?pressed, #ok`.
//! Whitespace between compounds is the descendant combinator; whitespace
//! inside a compound is not allowed, so spans decide where compounds end.

use crate::css::model::{Combinator, CompoundSelector, Selector, SelectorComponent, SelectorPart};
use crate::css::tokenizer::{tokenize, Spanned, Token};

/// Errors from selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("unexpected character at byte {0}")]
    BadCharacter(usize),
    #[error("unexpected token at position {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("empty selector")]
    Empty,
}

/// Parse a comma separated selector list.
pub fn parse_selector_list(input: &str) -> Result<Vec<Selector>, SelectorError> {
    let mut parser = Parser::new(input)?;
    if parser.is_eof() {
        return Err(SelectorError::Empty);
    }
    let mut selectors = vec![parser.parse_selector()?];
    while parser.peek().is_some_and(|t| t.token == Token::Comma) {
        parser.advance();
        selectors.push(parser.parse_selector()?);
    }
    parser.expect_eof()?;
    Ok(selectors)
}

/// Parse exactly one selector chain.
pub fn parse_selector(input: &str) -> Result<Selector, SelectorError> {
    let mut parser = Parser::new(input)?;
    if parser.is_eof() {
        return Err(SelectorError::Empty);
    }
    let selector = parser.parse_selector()?;
    parser.expect_eof()?;
    Ok(selector)
}

/// Recursive descent parser state.
struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(input).map_err(SelectorError::BadCharacter)?;
        Ok(Self { tokens, cursor: 0 })
    }

    fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let tok = self.tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(tok)
    }

    fn expect_eof(&self) -> Result<(), SelectorError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(SelectorError::UnexpectedToken {
                position: self.cursor,
                message: format!("unexpected {:?} '{}'", tok.token, tok.text),
            }),
        }
    }

    /// Whether the current token starts right where the previous one ended.
    fn is_adjacent(&self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = &self.tokens[self.cursor - 1];
        self.peek().is_some_and(|curr| curr.start == prev.end)
    }

    fn parse_selector(&mut self) -> Result<Selector, SelectorError> {
        let mut parts = vec![SelectorPart::Compound(self.parse_compound()?)];

        loop {
            match self.peek().map(|t| &t.token) {
                Some(Token::GreaterThan) => {
                    self.advance();
                    parts.push(SelectorPart::Combinator(Combinator::Child));
                    parts.push(SelectorPart::Compound(self.parse_compound()?));
                }
                // A compound start that was not consumed by the previous
                // compound is separated by whitespace.
                Some(Token::Ident | Token::Hash | Token::Dot | Token::Star | Token::State) => {
                    parts.push(SelectorPart::Combinator(Combinator::Descendant));
                    parts.push(SelectorPart::Compound(self.parse_compound()?));
                }
                _ => break,
            }
        }

        Ok(Selector { parts })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::new();

        match self.peek().map(|t| t.token.clone()) {
            Some(Token::Ident) => {
                let name = self.advance().map(|t| t.text.clone()).unwrap_or_default();
                compound.push(SelectorComponent::Type(name));
            }
            Some(Token::Star) => {
                self.advance();
                compound.push(SelectorComponent::Universal);
            }
            Some(Token::Dot | Token::Hash | Token::State) => {
                compound.push(self.parse_suffix()?);
            }
            Some(_) => {
                return Err(SelectorError::UnexpectedToken {
                    position: self.cursor,
                    message: "expected selector part".into(),
                });
            }
            None => return Err(SelectorError::UnexpectedEof("expected selector part".into())),
        }

        while self.is_adjacent()
            && matches!(
                self.peek().map(|t| &t.token),
                Some(Token::Dot | Token::Hash | Token::State)
            )
        {
            compound.push(self.parse_suffix()?);
        }

        Ok(compound)
    }

    /// `.class`, `#name` or `?state`.
    fn parse_suffix(&mut self) -> Result<SelectorComponent, SelectorError> {
        let tok = self
            .advance()
            .cloned()
            .ok_or_else(|| SelectorError::UnexpectedEof("expected selector part".into()))?;
        match tok.token {
            Token::State => Ok(SelectorComponent::State(tok.text[1..].to_string())),
            Token::Dot => self.expect_adjacent_ident("class name").map(SelectorComponent::Class),
            Token::Hash => self.expect_adjacent_ident("name").map(SelectorComponent::Id),
            other => Err(SelectorError::UnexpectedToken {
                position: self.cursor - 1,
                message: format!("unexpected {other:?} '{}'", tok.text),
            }),
        }
    }

    fn expect_adjacent_ident(&mut self, what: &str) -> Result<String, SelectorError> {
        let adjacent = self.is_adjacent();
        let position = self.cursor;
        match self.advance() {
            Some(tok) if tok.token == Token::Ident && adjacent => Ok(tok.text.clone()),
            Some(tok) => Err(SelectorError::UnexpectedToken {
                position,
                message: format!("expected {what}, got {:?} '{}'", tok.token, tok.text),
            }),
            None => Err(SelectorError::UnexpectedEof(format!("expected {what}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_compound(sel: &Selector) -> &[SelectorComponent] {
        match &sel.parts[0] {
            SelectorPart::Compound(c) => &c.components,
            SelectorPart::Combinator(_) => panic!("expected compound"),
        }
    }

    #[test]
    fn parse_compound_selector() {
        let sel = parse_selector("UIButton.warning.big#ok?pressed").unwrap();
        assert_eq!(
            first_compound(&sel),
            &[
                SelectorComponent::Type("UIButton".into()),
                SelectorComponent::Class("warning".into()),
                SelectorComponent::Class("big".into()),
                SelectorComponent::Id("ok".into()),
                SelectorComponent::State("pressed".into()),
            ]
        );
    }

    #[test]
    fn parse_descendant_combinator() {
        let sel = parse_selector("Dialog .warning").unwrap();
        assert_eq!(sel.parts.len(), 3);
        assert_eq!(sel.parts[1], SelectorPart::Combinator(Combinator::Descendant));
    }

    #[test]
    fn parse_child_combinator() {
        let sel = parse_selector("Dialog>UIButton").unwrap();
        assert_eq!(sel.parts[1], SelectorPart::Combinator(Combinator::Child));
        assert_eq!(sel.to_string(), "Dialog > UIButton");
    }

    #[test]
    fn parse_list() {
        let list = parse_selector_list("A, .b ,#c").unwrap();
        let text: Vec<_> = list.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["A", ".b", "#c"]);
    }

    #[test]
    fn whitespace_distinguishes_compound_from_descendant() {
        let compound = parse_selector("A.b").unwrap();
        assert_eq!(compound.parts.len(), 1);
        let descendant = parse_selector("A .b").unwrap();
        assert_eq!(descendant.parts.len(), 3);
    }

    #[test]
    fn state_only_compound() {
        let sel = parse_selector("?hover").unwrap();
        assert_eq!(first_compound(&sel), &[SelectorComponent::State("hover".into())]);
    }

    #[test]
    fn display_round_trips_canonical_text() {
        for text in ["UIControl", "*", ".a.b", "A > B C?hover", "#Dialog > .x#y"] {
            assert_eq!(parse_selector(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn errors() {
        assert_eq!(parse_selector(""), Err(SelectorError::Empty));
        assert!(matches!(parse_selector("A >"), Err(SelectorError::UnexpectedEof(_))));
        assert!(matches!(parse_selector(". a"), Err(SelectorError::UnexpectedToken { .. })));
        assert!(matches!(parse_selector("A, B"), Err(SelectorError::UnexpectedToken { .. })));
        assert_eq!(parse_selector("A{"), Err(SelectorError::BadCharacter(1)));
        assert!(matches!(parse_selector_list("A,"), Err(SelectorError::UnexpectedEof(_))));
    }
}
