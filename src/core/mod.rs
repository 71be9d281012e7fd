//! # Core AST
//!
//! The core AST is what every compiler pass after the builder works on. It
//! is produced once by [`crate::desugar`] from the surface forms and then
//! transformed by the passes in [`crate::transform`].
//!
//! ## Pipeline Position
//!
//! ```text
//! Reader → Forms → Builder → [CORE AST] → Infer → Lift → Specialize → Normalize → Emit
//! ```
//!
//! ## Expressions
//!
//! | Variant | Source |
//! |---------|--------|
//! | `Literal` | `nil`, `true`, `42`, `"hi"` |
//! | `Var` | a local or global symbol |
//! | `Call` | `(f x)`, `(first xs)`, `(. System/out (println s))` |
//! | `FunctionRef` | a top-level function used as a value (after lifting) |
//! | `Closure` | `(fn [x] ...)`, and the closures `let`/`do` desugar into |
//! | `Conditional` | `(if c a b)` |
//! | `ArrayGet`, `ArraySlice`, `ArrayLength` | produced by the specializer |
//!
//! ## Type Slots
//!
//! Every expression, parameter and function return carries a
//! [`TypeSlot`]. Slots start out unknown and are narrowed in place by
//! [`crate::types::infer`]. They are the only part of the tree that is ever
//! mutated; structural rewrites build new nodes instead.
//!
//! ## Names
//!
//! The builder gives every local binding a name that is unique within its
//! top-level definition, so passes can treat names as identities without
//! worrying about shadowing.

use std::fmt;

use lachs::Span;

use crate::host::HostMethod;
use crate::types::{TypeInfo, TypeSlot};

/// Identity of a closure node, assigned by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureId(pub u32);

impl From<u32> for ClosureId {
    fn from(id: u32) -> Self {
        ClosureId(id)
    }
}

impl fmt::Display for ClosureId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out consecutive closure ids.
#[derive(Debug, Clone, Default)]
pub struct IdSource {
    next_id: u32,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> ClosureId {
        let id = ClosureId::from(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreExpr {
    Literal(CoreLiteral),
    Var(CoreVar),
    Call(CoreCall),
    FunctionRef(CoreFunctionRef),
    Closure(CoreClosure),
    Conditional(CoreConditional),
    ArrayGet(CoreArrayGet),
    ArraySlice(CoreArraySlice),
    ArrayLength(CoreArrayLength),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreLiteral {
    pub value: LiteralValue,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Parameter of the enclosing function or of an enclosing closure
    Local,
    /// Top-level `def`/`defn`
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreVar {
    pub name: String,
    pub binding: Binding,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreCall {
    pub callee: Callee,
    pub args: Vec<CoreExpr>,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A top-level function or closure-valued global
    Named(String),
    Builtin(Builtin),
    Host(HostMethod),
    /// Immediately applied closure, as produced by `let` and `do`
    Closure(Box<CoreClosure>),
    /// Anything else that evaluates to a callable value
    Dynamic(Box<CoreExpr>),
}

/// Builtin operations of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    First,
    Second,
    Rest,
    Next,
    Count,
    Nth,
    Str,
    Add,
    Sub,
    Mul,
    Inc,
    Dec,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Not,
    IsNil,
}

impl Builtin {
    pub fn from_symbol(name: &str) -> Option<Self> {
        let builtin = match name {
            "first" => Builtin::First,
            "second" => Builtin::Second,
            "rest" => Builtin::Rest,
            "next" => Builtin::Next,
            "count" => Builtin::Count,
            "nth" => Builtin::Nth,
            "str" => Builtin::Str,
            "+" => Builtin::Add,
            "-" => Builtin::Sub,
            "*" => Builtin::Mul,
            "inc" => Builtin::Inc,
            "dec" => Builtin::Dec,
            "=" => Builtin::Eq,
            "<" => Builtin::Lt,
            ">" => Builtin::Gt,
            "<=" => Builtin::Le,
            ">=" => Builtin::Ge,
            "not" => Builtin::Not,
            "nil?" => Builtin::IsNil,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Builtin::First => "first",
            Builtin::Second => "second",
            Builtin::Rest => "rest",
            Builtin::Next => "next",
            Builtin::Count => "count",
            Builtin::Nth => "nth",
            Builtin::Str => "str",
            Builtin::Add => "+",
            Builtin::Sub => "-",
            Builtin::Mul => "*",
            Builtin::Inc => "inc",
            Builtin::Dec => "dec",
            Builtin::Eq => "=",
            Builtin::Lt => "<",
            Builtin::Gt => ">",
            Builtin::Le => "<=",
            Builtin::Ge => ">=",
            Builtin::Not => "not",
            Builtin::IsNil => "nil?",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Builtin::First
            | Builtin::Second
            | Builtin::Rest
            | Builtin::Next
            | Builtin::Count
            | Builtin::Inc
            | Builtin::Dec
            | Builtin::Not
            | Builtin::IsNil => (1, Some(1)),
            Builtin::Nth => (2, Some(3)),
            Builtin::Str | Builtin::Add | Builtin::Mul => (0, None),
            Builtin::Sub | Builtin::Eq | Builtin::Lt | Builtin::Gt | Builtin::Le | Builtin::Ge => {
                (1, None)
            }
        }
    }

    /// The generic sequence operations the specializer knows how to rewrite.
    /// The sequence operation this builtin is, if any.
    pub fn sequence_op(&self) -> Option<SequenceOp> {
        match self {
            Builtin::First => Some(SequenceOp::First),
            Builtin::Second => Some(SequenceOp::Second),
            Builtin::Nth => Some(SequenceOp::Nth),
            Builtin::Rest => Some(SequenceOp::Rest),
            Builtin::Next => Some(SequenceOp::Next),
            Builtin::Count => Some(SequenceOp::Count),
            _ => None,
        }
    }
}

/// Builtins that can be specialized on arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    First,
    Second,
    Nth,
    Rest,
    Next,
    Count,
}

/// A top-level function used as a value. `bound` holds captured values that
/// are appended to the arguments whenever the value is called.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreFunctionRef {
    pub name: String,
    pub bound: Vec<CoreExpr>,
    pub position: Span,
    pub info: TypeSlot,
}

/// What a closure was written as; decides the prefix of its lifted name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureOrigin {
    Fn,
    Let,
    Do,
}

impl ClosureOrigin {
    pub fn prefix(&self) -> &'static str {
        match self {
            ClosureOrigin::Fn => "fn",
            ClosureOrigin::Let => "let",
            ClosureOrigin::Do => "do",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreClosure {
    pub id: ClosureId,
    pub origin: ClosureOrigin,
    /// Name of a named `fn`, bound to the closure itself inside its body
    pub self_name: Option<String>,
    pub params: Vec<CoreParam>,
    pub body: Vec<CoreExpr>,
    pub returns: TypeSlot,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreParam {
    pub name: String,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConditional {
    pub test: Box<CoreExpr>,
    pub then_expr: Box<CoreExpr>,
    pub else_expr: Box<CoreExpr>,
    pub position: Span,
    pub info: TypeSlot,
}

/// What a specialized index access yields when the index is out of range.
#[derive(Debug, Clone, PartialEq)]
pub enum Missing {
    Nil,
    Fault,
    Default(Box<CoreExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreArrayGet {
    pub array: Box<CoreExpr>,
    pub index: Box<CoreExpr>,
    pub missing: Missing,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreArraySlice {
    pub array: Box<CoreExpr>,
    pub from: usize,
    /// `next` semantics: an empty result is `nil`
    pub nil_if_empty: bool,
    pub position: Span,
    pub info: TypeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreArrayLength {
    pub array: Box<CoreExpr>,
    pub position: Span,
    pub info: TypeSlot,
}

impl CoreExpr {
    pub fn position(&self) -> Span {
        match self {
            CoreExpr::Literal(l) => l.position.clone(),
            CoreExpr::Var(v) => v.position.clone(),
            CoreExpr::Call(c) => c.position.clone(),
            CoreExpr::FunctionRef(f) => f.position.clone(),
            CoreExpr::Closure(c) => c.position.clone(),
            CoreExpr::Conditional(c) => c.position.clone(),
            CoreExpr::ArrayGet(a) => a.position.clone(),
            CoreExpr::ArraySlice(a) => a.position.clone(),
            CoreExpr::ArrayLength(a) => a.position.clone(),
        }
    }

    pub fn info(&self) -> &TypeSlot {
        match self {
            CoreExpr::Literal(l) => &l.info,
            CoreExpr::Var(v) => &v.info,
            CoreExpr::Call(c) => &c.info,
            CoreExpr::FunctionRef(f) => &f.info,
            CoreExpr::Closure(c) => &c.info,
            CoreExpr::Conditional(c) => &c.info,
            CoreExpr::ArrayGet(a) => &a.info,
            CoreExpr::ArraySlice(a) => &a.info,
            CoreExpr::ArrayLength(a) => &a.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut TypeSlot {
        match self {
            CoreExpr::Literal(l) => &mut l.info,
            CoreExpr::Var(v) => &mut v.info,
            CoreExpr::Call(c) => &mut c.info,
            CoreExpr::FunctionRef(f) => &mut f.info,
            CoreExpr::Closure(c) => &mut c.info,
            CoreExpr::Conditional(c) => &mut c.info,
            CoreExpr::ArrayGet(a) => &mut a.info,
            CoreExpr::ArraySlice(a) => &mut a.info,
            CoreExpr::ArrayLength(a) => &mut a.info,
        }
    }

    /// Shorthand for the inferred type of this expression.
    pub fn ty(&self) -> &TypeInfo {
        self.info().get()
    }

    pub fn nil(position: Span) -> Self {
        CoreExpr::Literal(CoreLiteral {
            value: LiteralValue::Nil,
            position,
            info: TypeSlot::known(TypeInfo::nil()),
        })
    }

    pub fn local(name: impl Into<String>, ty: TypeInfo, position: Span) -> Self {
        CoreExpr::Var(CoreVar {
            name: name.into(),
            binding: Binding::Local,
            position,
            info: TypeSlot::known(ty),
        })
    }

    /// Direct subexpressions, including the body of an immediately applied
    /// closure and the target of a dynamic call.
    pub fn children(&self) -> Vec<&CoreExpr> {
        match self {
            CoreExpr::Literal(_) | CoreExpr::Var(_) => vec![],
            CoreExpr::Call(call) => {
                let mut children: Vec<&CoreExpr> = match &call.callee {
                    Callee::Closure(closure) => closure.body.iter().collect(),
                    Callee::Dynamic(target) => vec![target.as_ref()],
                    Callee::Named(_) | Callee::Builtin(_) | Callee::Host(_) => vec![],
                };
                children.extend(call.args.iter());
                children
            }
            CoreExpr::FunctionRef(f) => f.bound.iter().collect(),
            CoreExpr::Closure(closure) => closure.body.iter().collect(),
            CoreExpr::Conditional(cond) => vec![
                cond.test.as_ref(),
                cond.then_expr.as_ref(),
                cond.else_expr.as_ref(),
            ],
            CoreExpr::ArrayGet(get) => {
                let mut children = vec![get.array.as_ref(), get.index.as_ref()];
                if let Missing::Default(default) = &get.missing {
                    children.push(default.as_ref());
                }
                children
            }
            CoreExpr::ArraySlice(slice) => vec![slice.array.as_ref()],
            CoreExpr::ArrayLength(len) => vec![len.array.as_ref()],
        }
    }

    /// Visit this expression and all nested expressions, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a CoreExpr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Written by the user with `defn` (or `def` of a `fn`)
    Defined,
    /// Produced by the lambda lifter
    Lifted(ClosureOrigin),
    /// Produced by the void-call normalizer
    VoidAdapter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreFunction {
    pub name: String,
    pub params: Vec<CoreParam>,
    /// Implicit `do`: the value of the last expression is returned
    pub body: Vec<CoreExpr>,
    pub returns: TypeSlot,
    pub kind: FunctionKind,
    /// The last parameter collects all remaining arguments (`[& args]`)
    pub variadic: bool,
    pub position: Span,
}

/// A top-level `def` that is not a function.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreValueDef {
    pub name: String,
    pub value: CoreExpr,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreDefinition {
    Function(CoreFunction),
    Value(CoreValueDef),
}

impl CoreDefinition {
    pub fn name(&self) -> &str {
        match self {
            CoreDefinition::Function(f) => &f.name,
            CoreDefinition::Value(v) => &v.name,
        }
    }

    pub fn position(&self) -> Span {
        match self {
            CoreDefinition::Function(f) => f.position.clone(),
            CoreDefinition::Value(v) => v.position.clone(),
        }
    }

    /// Every top-level expression of the definition.
    pub fn exprs(&self) -> Vec<&CoreExpr> {
        match self {
            CoreDefinition::Function(f) => f.body.iter().collect(),
            CoreDefinition::Value(v) => vec![&v.value],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreProgram {
    /// From `(ns ...)`, if present
    pub namespace: Option<String>,
    /// Name of the entry function
    pub entry: String,
    pub definitions: Vec<CoreDefinition>,
}

impl CoreProgram {
    pub fn functions(&self) -> impl Iterator<Item = &CoreFunction> {
        self.definitions.iter().filter_map(|def| match def {
            CoreDefinition::Function(f) => Some(f),
            CoreDefinition::Value(_) => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&CoreFunction> {
        self.functions().find(|f| f.name == name)
    }

    pub fn definition(&self, name: &str) -> Option<&CoreDefinition> {
        self.definitions.iter().find(|d| d.name() == name)
    }

    /// Visit every expression in the program.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a CoreExpr)) {
        for def in &self.definitions {
            for expr in def.exprs() {
                expr.walk(visit);
            }
        }
    }

    /// Number of closure nodes left anywhere in the program.
    pub fn closure_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |expr| match expr {
            CoreExpr::Closure(_) => count += 1,
            CoreExpr::Call(CoreCall {
                callee: Callee::Closure(_),
                ..
            }) => count += 1,
            _ => {}
        });
        count
    }
}
