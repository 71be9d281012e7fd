use std::ops::{BitOr, Shr};
use std::rc::Rc;

use crate::lexer::Token;

use super::state::{ParseError, ParseResult, ParseState, Parser};

type ParserFn<T> = Rc<dyn Fn(&mut ParseState) -> ParseResult<T>>;

// === Boxed Parser for type erasure ===

pub struct BoxedParser<T> {
    parser: ParserFn<T>,
}

impl<T> Clone for BoxedParser<T> {
    fn clone(&self) -> Self {
        BoxedParser {
            parser: Rc::clone(&self.parser),
        }
    }
}

impl<T: 'static> BoxedParser<T> {
    pub fn new<P: Parser<T> + 'static>(parser: P) -> Self {
        BoxedParser {
            parser: Rc::new(move |state| parser.parse(state)),
        }
    }
}

impl<T> Parser<T> for BoxedParser<T> {
    fn parse(&self, state: &mut ParseState) -> ParseResult<T> {
        (self.parser)(state)
    }
}

// === Combinators as methods ===

impl<T: 'static> BoxedParser<T> {
    /// Map: transform result
    pub fn map<U: 'static, F: Fn(T) -> U + 'static>(self, f: F) -> BoxedParser<U> {
        BoxedParser::new(move |state: &mut ParseState| {
            let a = self.parse(state)?;
            Ok(f(a))
        })
    }

    /// Choice: try self, if fails try other
    pub fn or(self, other: BoxedParser<T>) -> BoxedParser<T> {
        BoxedParser::new(move |state: &mut ParseState| {
            let pos = state.position();
            match self.parse(state) {
                Ok(a) => Ok(a),
                Err(_) => {
                    // Error is already recorded in state by the parser
                    state.restore(pos);
                    other.parse(state)
                }
            }
        })
    }

    /// Add a label to this parser for better error messages
    pub fn label(self, name: &'static str) -> BoxedParser<T> {
        BoxedParser::new(move |state: &mut ParseState| match self.parse(state) {
            Ok(v) => Ok(v),
            Err(mut err) => {
                err.expected = vec![name.to_string()];
                state.record_error(err.clone());
                Err(err)
            }
        })
    }
}

// === Operator Overloading ===

/// `|` for choice: A | B -> A or B
impl<T: 'static> BitOr<BoxedParser<T>> for BoxedParser<T> {
    type Output = BoxedParser<T>;

    fn bitor(self, rhs: BoxedParser<T>) -> Self::Output {
        self.or(rhs)
    }
}

/// `>>` for map: A >> fn -> B
impl<T: 'static, U: 'static, F: Fn(T) -> U + 'static> Shr<F> for BoxedParser<T> {
    type Output = BoxedParser<U>;

    fn shr(self, f: F) -> Self::Output {
        self.map(f)
    }
}

// === Primitive Parsers ===

/// Low-level token parser with custom error - for internal use
fn token_with_error<F: Fn(&Token) -> bool + 'static>(
    predicate: F,
    expected: &'static str,
) -> BoxedParser<Token> {
    BoxedParser::new(move |state: &mut ParseState| {
        let found = match state.peek() {
            Some(tok) if predicate(tok) => None,
            Some(tok) => Some((tok.describe(), tok.pos())),
            None => {
                let err = ParseError::new("unexpected end of input").expected(expected);
                state.record_error(err.clone());
                return Err(err);
            }
        };
        match found {
            None => state
                .advance()
                .ok_or_else(|| ParseError::new("unexpected end of input").expected(expected)),
            Some((description, position)) => {
                let err = ParseError::new("unexpected token")
                    .expected(expected)
                    .found(description)
                    .at(position);
                state.record_error(err.clone());
                Err(err)
            }
        }
    })
}

pub fn expect_lparen() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::LParen(_)), "'('")
}

pub fn expect_rparen() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::RParen(_)), "')'")
}

pub fn expect_lbracket() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::LBracket(_)), "'['")
}

pub fn expect_rbracket() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::RBracket(_)), "']'")
}

pub fn expect_integer() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::Integer(_)), "integer")
}

pub fn expect_string() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::StringLiteral(_)), "string")
}

pub fn expect_symbol() -> BoxedParser<Token> {
    token_with_error(|t| matches!(t, Token::Symbol(_)), "symbol")
}

/// Parse zero or more occurrences
pub fn many<T: 'static>(parser: BoxedParser<T>) -> BoxedParser<Vec<T>> {
    BoxedParser::new(move |state: &mut ParseState| {
        let mut results = Vec::new();
        loop {
            let pos = state.position();
            match parser.parse(state) {
                Ok(item) => results.push(item),
                Err(_) => {
                    state.restore(pos);
                    break;
                }
            }
        }
        Ok(results)
    })
}
