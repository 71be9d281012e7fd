//! Reader grammar
//!
//! ```text
//! program := form*
//! form    := list | vector | atom
//! list    := "(" form* ")"
//! vector  := "[" form* "]"
//! atom    := integer | string | symbol
//! ```

use log::trace;

use crate::ast::{Form, Integer, List, Program, StringLiteral, Symbol, Vector};
use crate::lexer::Token;

use super::combinators::{
    BoxedParser, expect_integer, expect_lbracket, expect_lparen, expect_rbracket, expect_rparen,
    expect_string, expect_symbol, many,
};
use super::state::{ParseError, ParseState, Parser};

/// Parse a whole program. Returns the program (if the token stream was
/// consumed completely) together with the errors encountered.
pub fn parse(state: &mut ParseState) -> (Option<Program>, Vec<ParseError>) {
    let forms = match many(form()).parse(state) {
        Ok(forms) => forms,
        Err(err) => return (None, vec![err]),
    };

    if state.has_next() {
        let err = state
            .furthest_error()
            .cloned()
            .unwrap_or_else(|| ParseError::new("unexpected trailing input"));
        return (None, vec![err]);
    }

    trace!("read {} top-level forms", forms.len());
    (Some(Program { forms }), vec![])
}

/// form := list | vector | atom
pub fn form() -> BoxedParser<Form> {
    BoxedParser::new(|state: &mut ParseState| (list() | vector() | atom()).parse(state))
        .label("form")
}

/// list := "(" form* ")"
fn list() -> BoxedParser<Form> {
    BoxedParser::new(|state: &mut ParseState| {
        let open = expect_lparen().parse(state)?.pos();
        let items = many(form()).parse(state)?;
        let close = expect_rparen().parse(state)?.pos();
        Ok(Form::List(List {
            items,
            position: open.merge(&close),
        }))
    })
}

/// vector := "[" form* "]"
fn vector() -> BoxedParser<Form> {
    BoxedParser::new(|state: &mut ParseState| {
        let open = expect_lbracket().parse(state)?.pos();
        let items = many(form()).parse(state)?;
        let close = expect_rbracket().parse(state)?.pos();
        Ok(Form::Vector(Vector {
            items,
            position: open.merge(&close),
        }))
    })
}

/// atom := integer | string | symbol
fn atom() -> BoxedParser<Form> {
    integer() | string_literal() | symbol()
}

fn integer() -> BoxedParser<Form> {
    BoxedParser::new(|state: &mut ParseState| {
        let Token::Integer(inner) = expect_integer().parse(state)? else {
            unreachable!("expect_integer only yields integer tokens")
        };
        let value = inner.value.parse::<i64>().map_err(|_| {
            let err = ParseError::new("integer literal out of range")
                .found(format!("'{}'", inner.value))
                .at(inner.position.clone());
            state.record_error(err.clone());
            err
        })?;
        Ok(Form::Integer(Integer {
            value,
            position: inner.position,
        }))
    })
}

fn string_literal() -> BoxedParser<Form> {
    expect_string()
        >> (|token: Token| match token {
            Token::StringLiteral(inner) => Form::String(StringLiteral {
                value: unescape(&inner.value),
                position: inner.position,
            }),
            other => unreachable!("expect_string yielded {}", other.describe()),
        })
}

/// Symbols that read as signed integers (`-1`, `+7`) become integer forms.
fn symbol() -> BoxedParser<Form> {
    expect_symbol()
        >> (|token: Token| match token {
            Token::Symbol(inner) => match signed_integer(&inner.value) {
                Some(value) => Form::Integer(Integer {
                    value,
                    position: inner.position,
                }),
                None => Form::Symbol(Symbol {
                    value: inner.value,
                    position: inner.position,
                }),
            },
            other => unreachable!("expect_symbol yielded {}", other.describe()),
        })
}

fn signed_integer(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').or_else(|| text.strip_prefix('+'))?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Strip the surrounding quotes of a string token and resolve escapes.
fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
