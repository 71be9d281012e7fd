//! # Interpreter
//!
//! A tree-walking evaluator for the core AST. It runs a program at any stage
//! of the pipeline, closures included, which makes it the reference for
//! differential tests: a program must behave the same before and after
//! each transformation.
//!
//! Host methods run against a [`HostEnv`] that records every call and
//! collects printed output instead of writing to the terminal.

mod eval;
mod scope;
mod value;

pub use eval::Interpreter;
pub use scope::Scope;
pub use value::{ClosureValue, Value};

use std::collections::HashMap;

use thiserror::Error;

use crate::core::CoreProgram;
use crate::host::{HostKind, HostMethod};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("no function named `{0}`")]
    UnknownFunction(String),

    #[error("cannot call a value of type {0}")]
    NotCallable(&'static str),

    #[error("`{name}` expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{operation}` does not accept {found}")]
    TypeMismatch {
        operation: String,
        found: &'static str,
    },

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("integer overflow in `{0}`")]
    Overflow(String),

    #[error("{method}: {message}")]
    Host { method: String, message: String },

    #[error("call depth exceeded {0}")]
    StackOverflow(usize),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub struct HostCall {
    pub method: HostMethod,
    pub args: Vec<Value>,
}

/// The world host methods act on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEnv {
    pub stdout: String,
    pub stderr: String,
    pub calls: Vec<HostCall>,
    /// Environment variables visible to `System/getenv`
    pub vars: HashMap<String, String>,
    /// What `System/currentTimeMillis` returns
    pub clock: i64,
}

impl HostEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Number of recorded calls of `method`.
    pub fn calls_to(&self, method: &HostMethod) -> usize {
        self.calls.iter().filter(|c| c.method == *method).count()
    }

    pub fn invoke(&mut self, method: &HostMethod, args: Vec<Value>) -> RuntimeResult<Value> {
        self.calls.push(HostCall {
            method: *method,
            args: args.clone(),
        });

        let fail = |message: String| RuntimeError::Host {
            method: method.to_string(),
            message,
        };

        match (method.kind, method.method, args.as_slice()) {
            (HostKind::Field("out"), "println", []) => {
                self.stdout.push('\n');
                Ok(Value::Nil)
            }
            (HostKind::Field("out"), "println", [value]) => {
                self.stdout.push_str(&format!("{}\n", value));
                Ok(Value::Nil)
            }
            (HostKind::Field("out"), "print", [value]) => {
                self.stdout.push_str(&value.to_string());
                Ok(Value::Nil)
            }
            (HostKind::Field("err"), "println", [value]) => {
                self.stderr.push_str(&format!("{}\n", value));
                Ok(Value::Nil)
            }
            (HostKind::Static, "getenv", [Value::Str(name)]) => Ok(self
                .vars
                .get(&**name)
                .map(|v| Value::string(v.as_str()))
                .unwrap_or(Value::Nil)),
            (HostKind::Static, "currentTimeMillis", []) => Ok(Value::Long(self.clock)),
            (HostKind::Static, "parseLong", [Value::Str(s)]) => s
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|_| fail(format!("For input string: \"{}\"", s))),
            (HostKind::Static, "abs", [Value::Long(i)]) => Ok(Value::Long(i.wrapping_abs())),
            (HostKind::Instance, "toUpperCase", [Value::Str(s)]) => {
                Ok(Value::string(s.to_uppercase()))
            }
            (HostKind::Instance, "toLowerCase", [Value::Str(s)]) => {
                Ok(Value::string(s.to_lowercase()))
            }
            (HostKind::Instance, "trim", [Value::Str(s)]) => Ok(Value::string(s.trim())),
            (_, _, [Value::Nil, ..]) => Err(fail("null pointer".to_string())),
            (_, _, args) => Err(fail(format!(
                "unsupported arguments ({})",
                args.iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Result of running a program to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub value: Value,
    pub host: HostEnv,
}

/// Run the entry function of `program` with command line `args`.
pub fn run(program: &CoreProgram, args: &[&str]) -> RuntimeResult<Execution> {
    run_with(program, args, HostEnv::new())
}

pub fn run_with(program: &CoreProgram, args: &[&str], host: HostEnv) -> RuntimeResult<Execution> {
    let mut interpreter = Interpreter::new(program, host)?;
    let value = interpreter.run_entry(args)?;
    Ok(Execution {
        value,
        host: interpreter.into_host(),
    })
}
