use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::core::CoreClosure;

/// A closure that was never lifted, together with the locals it saw.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureValue {
    pub closure: CoreClosure,
    pub env: HashMap<String, Value>,
}

/// Runtime value representation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Long(i64),
    Str(Rc<str>),
    Array(Rc<Vec<Value>>),
    /// A top-level function; `bound` is appended to the arguments of every call
    Function { name: String, bound: Vec<Value> },
    Closure(Rc<ClosureValue>),
}

impl Value {
    pub fn string(value: impl Into<Rc<str>>) -> Self {
        Value::Str(value.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "Boolean",
            Value::Long(_) => "Long",
            Value::Str(_) => "String",
            Value::Array(_) => "array",
            Value::Function { .. } | Value::Closure(_) => "function",
        }
    }

    /// What `(str x)` makes of a value: like [`fmt::Display`], but `nil` is empty.
    pub fn to_str(&self) -> String {
        match self {
            Value::Nil => String::new(),
            other => other.to_string(),
        }
    }
}

/// Host rendering, as `String.valueOf` would print it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(i) => write!(f, "{}", i),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Function { name, .. } => write!(f, "#'{}", name),
            Value::Closure(closure) => write!(f, "fn{}", closure.closure.id),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}
