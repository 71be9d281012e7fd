//! # Compile Errors
//!
//! Every fatal condition of the compiler is a [`CompileError`]. Errors that
//! refer to source carry a span and render with the offending location:
//!
//! ```text
//! Compile error: unbound symbol `frobnicate`
//!   --> 3:5
//! ```
//!
//! Inference that leaves some slots unknown is not an error; see
//! [`crate::types::infer::InferenceReport`].

use lachs::Span;
use thiserror::Error;

use crate::parser::ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Lex error: {message}")]
    Lex { message: String },

    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A construct no pass knows how to handle.
    #[error("{}", located(.span, "unsupported form: ", .form, ""))]
    UnsupportedForm { form: String, span: Span },

    #[error("{}", located(.span, "unbound symbol `", .name, "`"))]
    UnboundSymbol { name: String, span: Span },

    #[error("Compile error: entry point `{name}` is not defined")]
    MissingEntryPoint { name: String },

    #[error("{}", entry_arity(.name, .expected, .found, .span))]
    InvalidEntryPoint {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    /// A closure ended up capturing itself, or lifting stopped making progress.
    #[error("{}", located(.span, "capture cycle through `", .variable, "`"))]
    CaptureCycle { variable: String, span: Span },

    #[error("{}", located(.span, "name `", .name, "` is already defined"))]
    NameCollision { name: String, span: Span },
}

impl CompileError {
    pub fn unsupported(form: impl Into<String>, span: Span) -> Self {
        CompileError::UnsupportedForm {
            form: form.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            CompileError::Lex { .. } | CompileError::MissingEntryPoint { .. } => None,
            CompileError::Parse(err) => err.position.as_ref(),
            CompileError::UnsupportedForm { span, .. }
            | CompileError::UnboundSymbol { span, .. }
            | CompileError::InvalidEntryPoint { span, .. }
            | CompileError::CaptureCycle { span, .. }
            | CompileError::NameCollision { span, .. } => Some(span),
        }
    }
}

fn located(span: &Span, before: &str, subject: &str, after: &str) -> String {
    let msg = format!("{}{}{}", before, subject, after);
    if span.source.is_empty() {
        format!("Compile error: {}", msg)
    } else {
        span.to_string(&msg)
    }
}

fn entry_arity(name: &str, expected: &usize, found: &usize, span: &Span) -> String {
    let found = format!("` must take {} parameter(s), found {}", expected, found);
    located(span, "entry point `", name, &found)
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanless_errors_get_a_prefix() {
        let err = CompileError::UnboundSymbol {
            name: "x".into(),
            span: Span::default(),
        };
        assert_eq!(err.to_string(), "Compile error: unbound symbol `x`");
    }

    #[test]
    fn missing_entry_point_message() {
        let err = CompileError::MissingEntryPoint {
            name: "-main".into(),
        };
        assert_eq!(
            err.to_string(),
            "Compile error: entry point `-main` is not defined"
        );
    }
}
