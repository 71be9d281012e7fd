//! Surface AST: the forms produced by the reader.
//!
//! A program is a sequence of top-level forms. No meaning is attached to any
//! symbol at this stage; the [`crate::desugar`] builder decides which forms are
//! definitions, special forms, calls or host interop.

use lachs::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub forms: Vec<Form>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Symbol(Symbol),
    Integer(Integer),
    String(StringLiteral),
    List(List),
    Vector(Vector),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub value: String,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Integer {
    pub value: i64,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub position: Span,
}

/// `( ... )`
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub items: Vec<Form>,
    pub position: Span,
}

/// `[ ... ]`
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub items: Vec<Form>,
    pub position: Span,
}

impl Form {
    pub fn position(&self) -> Span {
        match self {
            Form::Symbol(s) => s.position.clone(),
            Form::Integer(i) => i.position.clone(),
            Form::String(s) => s.position.clone(),
            Form::List(l) => l.position.clone(),
            Form::Vector(v) => v.position.clone(),
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Form::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The head symbol of a list form, e.g. `defn` for `(defn f [x] x)`.
    pub fn head_symbol(&self) -> Option<&str> {
        match self {
            Form::List(list) => list
                .items
                .first()
                .and_then(Form::as_symbol)
                .map(|s| s.value.as_str()),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Form::Symbol(s) => format!("symbol `{}`", s.value),
            Form::Integer(i) => format!("integer `{}`", i.value),
            Form::String(_) => "string literal".to_string(),
            Form::List(_) => match self.head_symbol() {
                Some(head) => format!("`({} ...)` form", head),
                None => "list form".to_string(),
            },
            Form::Vector(_) => "vector literal".to_string(),
        }
    }
}
