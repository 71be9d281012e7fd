mod combinators;
mod grammar;
mod state;

pub use grammar::{form, parse};
pub use state::{ParseError, ParseResult, ParseState, Parser};
