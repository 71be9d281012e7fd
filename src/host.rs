//! Host methods known at compile time.
//!
//! The registry stands in for reflection on the host platform: it tells the
//! builder which `Class/member` symbols exist, and tells inference and the
//! void-call normalizer what they return.

use std::fmt;

use crate::types::{Type, TypeInfo};

/// How a host method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// `Class.method(args)`, e.g. `Long.parseLong(s)`
    Static,
    /// `Class.field.method(args)`, e.g. `System.out.println(s)`
    Field(&'static str),
    /// `target.method(args)`; the target is passed as the first argument
    Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostMethod {
    pub class: &'static str,
    pub method: &'static str,
    pub kind: HostKind,
    /// Accepted argument counts, receiver included for instance methods
    pub arities: &'static [usize],
    /// Argument types for the longest arity, receiver first
    pub params: &'static [Type],
    /// `None` for `void`
    pub returns: Option<Type>,
}

impl HostMethod {
    pub fn is_void(&self) -> bool {
        self.returns.is_none()
    }

    /// Type of a call expression; a void call evaluates to nil.
    pub fn result_type(&self) -> TypeInfo {
        TypeInfo::Concrete(self.returns.unwrap_or(Type::Nil))
    }

    /// Declared type of argument `index`.
    pub fn param_type(&self, index: usize) -> Type {
        self.params.get(index).copied().unwrap_or(Type::Object)
    }

    pub fn accepts(&self, argc: usize) -> bool {
        self.arities.contains(&argc)
    }

    /// Qualified Java name of the call target, without arguments.
    pub fn java_target(&self) -> String {
        match self.kind {
            HostKind::Static => format!("{}.{}", self.class, self.method),
            HostKind::Field(field) => format!("{}.{}.{}", self.class, field, self.method),
            HostKind::Instance => format!("{}#{}", self.class, self.method),
        }
    }
}

impl fmt::Display for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            HostKind::Static => write!(f, "{}/{}", self.class, self.method),
            HostKind::Field(field) => write!(f, "{}/{}.{}", self.class, field, self.method),
            HostKind::Instance => write!(f, ".{}", self.method),
        }
    }
}

const fn method(
    class: &'static str,
    method: &'static str,
    kind: HostKind,
    arities: &'static [usize],
    params: &'static [Type],
    returns: Option<Type>,
) -> HostMethod {
    HostMethod {
        class,
        method,
        kind,
        arities,
        params,
        returns,
    }
}

static REGISTRY: &[HostMethod] = &[
    method("System", "println", HostKind::Field("out"), &[0, 1], &[Type::Object], None),
    method("System", "print", HostKind::Field("out"), &[1], &[Type::Object], None),
    method("System", "println", HostKind::Field("err"), &[1], &[Type::Object], None),
    method("System", "getenv", HostKind::Static, &[1], &[Type::String], Some(Type::String)),
    method("System", "currentTimeMillis", HostKind::Static, &[0], &[], Some(Type::Long)),
    method("Long", "parseLong", HostKind::Static, &[1], &[Type::String], Some(Type::Long)),
    method("Math", "abs", HostKind::Static, &[1], &[Type::Long], Some(Type::Long)),
    method("String", "toUpperCase", HostKind::Instance, &[1], &[Type::String], Some(Type::String)),
    method("String", "toLowerCase", HostKind::Instance, &[1], &[Type::String], Some(Type::String)),
    method("String", "trim", HostKind::Instance, &[1], &[Type::String], Some(Type::String)),
];

/// Resolve `Class/method`, or `Class/field` plus a method name, e.g.
/// `("System/out", "println")` or `("Long", "parseLong")`.
pub fn lookup_static(target: &str, name: &str) -> Option<HostMethod> {
    let (class, field) = match target.split_once('/') {
        Some((class, field)) => (class, Some(field)),
        None => (target, None),
    };
    REGISTRY
        .iter()
        .find(|m| {
            m.class == class
                && m.method == name
                && match (m.kind, field) {
                    (HostKind::Static, None) => true,
                    (HostKind::Field(f), Some(wanted)) => f == wanted,
                    _ => false,
                }
        })
        .copied()
}

/// Resolve `.method` on an arbitrary target.
pub fn lookup_instance(name: &str) -> Option<HostMethod> {
    REGISTRY
        .iter()
        .find(|m| m.kind == HostKind::Instance && m.method == name)
        .copied()
}

/// `System/out.println`, the target of `println`.
pub fn println() -> Option<HostMethod> {
    lookup_static("System/out", "println")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_methods_need_the_field() {
        let out = lookup_static("System/out", "println").unwrap();
        let err = lookup_static("System/err", "println").unwrap();
        assert_ne!(out, err);
        assert!(out.is_void());
        assert!(lookup_static("System", "println").is_none());
    }

    #[test]
    fn static_methods() {
        let parse = lookup_static("Long", "parseLong").unwrap();
        assert_eq!(parse.result_type(), TypeInfo::Concrete(Type::Long));
        assert!(parse.accepts(1));
        assert!(!parse.accepts(2));
    }

    #[test]
    fn instance_methods_count_the_receiver() {
        let upper = lookup_instance("toUpperCase").unwrap();
        assert!(upper.accepts(1));
        assert!(lookup_instance("parseLong").is_none());
    }

    #[test]
    fn void_calls_evaluate_to_nil() {
        assert_eq!(println().unwrap().result_type(), TypeInfo::nil());
    }
}
