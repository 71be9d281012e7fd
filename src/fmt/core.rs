//! Pretty printer for the core AST
//!
//! Prints the program back in a Clojure-like notation with every inferred
//! type attached, which is what `RUST_LOG=debug` dumps between passes:
//!
//! ```text
//! (defn say-hello [name: String] -> Nil
//!   (do_void__0 (str "Hello," " " name)))
//! ```
//!
//! Nodes without a source-level spelling get a bracketed pseudo form, e.g.
//! `(aget xs 0 :or-nil)` for a specialized `first`.

use std::fmt::{self, Display};

use crate::core::{
    Callee, CoreArrayGet, CoreCall, CoreClosure, CoreDefinition, CoreExpr, CoreFunction,
    CoreParam, CoreProgram, FunctionKind, LiteralValue, Missing,
};
use crate::types::TypeSlot;

const INDENT: &str = "  ";

struct Formatter {
    buffer: String,
    indent_level: usize,
}

impl Formatter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(INDENT);
        }
    }

    fn write_str(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    fn write_newline(&mut self) {
        self.buffer.push('\n');
    }

    fn finish(self) -> String {
        self.buffer
    }
}

impl Display for CoreProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = Formatter::new();

        if let Some(namespace) = &self.namespace {
            formatter.write_str(&format!("(ns {})", namespace));
            formatter.write_newline();
            formatter.write_newline();
        }

        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                formatter.write_newline();
            }
            match def {
                CoreDefinition::Function(function) => format_function(function, &mut formatter),
                CoreDefinition::Value(value) => {
                    formatter.write_str(&format!("(def {} ", value.name));
                    format_expression(&value.value, &mut formatter);
                    formatter.write_str(")");
                }
            }
            formatter.write_newline();
        }

        write!(f, "{}", formatter.finish())
    }
}

impl Display for CoreExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = Formatter::new();
        format_expression(self, &mut formatter);
        write!(f, "{}", formatter.finish())
    }
}

fn format_function(function: &CoreFunction, fmt: &mut Formatter) {
    let keyword = match function.kind {
        FunctionKind::Defined => "defn",
        FunctionKind::Lifted(_) => "defn-lifted",
        FunctionKind::VoidAdapter => "defn-adapter",
    };
    fmt.write_str(&format!("({} {} ", keyword, function.name));
    format_params(&function.params, function.variadic, fmt);
    fmt.write_str(&format!(" -> {}", function.returns.get()));
    format_body(&function.body, fmt);
    fmt.write_str(")");
}

fn format_params(params: &[CoreParam], variadic: bool, fmt: &mut Formatter) {
    fmt.write_str("[");
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            fmt.write_str(" ");
        }
        if variadic && i + 1 == params.len() {
            fmt.write_str("& ");
        }
        fmt.write_str(&param.name);
        format_type(&param.info, fmt);
    }
    fmt.write_str("]");
}

fn format_type(slot: &TypeSlot, fmt: &mut Formatter) {
    fmt.write_str(&format!(": {}", slot.get()));
}

fn format_body(body: &[CoreExpr], fmt: &mut Formatter) {
    fmt.indent();
    for expr in body {
        fmt.write_newline();
        fmt.write_indent();
        format_expression(expr, fmt);
    }
    fmt.dedent();
}

fn format_args(args: &[CoreExpr], fmt: &mut Formatter) {
    for arg in args {
        fmt.write_str(" ");
        format_expression(arg, fmt);
    }
}

fn format_expression(expr: &CoreExpr, fmt: &mut Formatter) {
    match expr {
        CoreExpr::Literal(literal) => match &literal.value {
            LiteralValue::Nil => fmt.write_str("nil"),
            LiteralValue::Boolean(b) => fmt.write_str(if *b { "true" } else { "false" }),
            LiteralValue::Integer(i) => fmt.write_str(&i.to_string()),
            LiteralValue::String(s) => fmt.write_str(&format!("{:?}", s)),
        },
        CoreExpr::Var(var) => fmt.write_str(&var.name),
        CoreExpr::Call(call) => format_call(call, fmt),
        CoreExpr::FunctionRef(function) => {
            if function.bound.is_empty() {
                fmt.write_str(&format!("#'{}", function.name));
            } else {
                fmt.write_str(&format!("(partial #'{}", function.name));
                format_args(&function.bound, fmt);
                fmt.write_str(")");
            }
        }
        CoreExpr::Closure(closure) => format_closure(closure, fmt),
        CoreExpr::Conditional(cond) => {
            fmt.write_str("(if ");
            format_expression(&cond.test, fmt);
            fmt.write_str(" ");
            format_expression(&cond.then_expr, fmt);
            fmt.write_str(" ");
            format_expression(&cond.else_expr, fmt);
            fmt.write_str(")");
        }
        CoreExpr::ArrayGet(get) => format_array_get(get, fmt),
        CoreExpr::ArraySlice(slice) => {
            let op = if slice.nil_if_empty {
                "aslice-or-nil"
            } else {
                "aslice"
            };
            fmt.write_str(&format!("({} ", op));
            format_expression(&slice.array, fmt);
            fmt.write_str(&format!(" {})", slice.from));
        }
        CoreExpr::ArrayLength(len) => {
            fmt.write_str("(alength ");
            format_expression(&len.array, fmt);
            fmt.write_str(")");
        }
    }
}

fn format_call(call: &CoreCall, fmt: &mut Formatter) {
    fmt.write_str("(");
    match &call.callee {
        Callee::Named(name) => fmt.write_str(name),
        Callee::Builtin(builtin) => fmt.write_str(builtin.symbol()),
        Callee::Host(method) => fmt.write_str(&method.to_string()),
        Callee::Closure(closure) => format_closure(closure, fmt),
        Callee::Dynamic(target) => format_expression(target, fmt),
    }
    format_args(&call.args, fmt);
    fmt.write_str(")");
}

fn format_closure(closure: &CoreClosure, fmt: &mut Formatter) {
    fmt.write_str(&format!("(fn{} ", closure.id));
    if let Some(name) = &closure.self_name {
        fmt.write_str(&format!("{} ", name));
    }
    format_params(&closure.params, false, fmt);
    fmt.write_str(&format!(" -> {}", closure.returns.get()));
    format_body(&closure.body, fmt);
    fmt.write_str(")");
}

fn format_array_get(get: &CoreArrayGet, fmt: &mut Formatter) {
    fmt.write_str("(aget ");
    format_expression(&get.array, fmt);
    fmt.write_str(" ");
    format_expression(&get.index, fmt);
    match &get.missing {
        Missing::Nil => fmt.write_str(" :or-nil"),
        Missing::Fault => {}
        Missing::Default(default) => {
            fmt.write_str(" :or ");
            format_expression(default, fmt);
        }
    }
    fmt.write_str(")");
}

#[cfg(test)]
mod tests {
    use lachs::Span;

    use super::*;
    use crate::core::{Binding, Builtin, CoreLiteral, CoreVar};
    use crate::types::{Type, TypeInfo};

    fn var(name: &str, ty: TypeInfo) -> CoreExpr {
        CoreExpr::Var(CoreVar {
            name: name.into(),
            binding: Binding::Local,
            position: Span::default(),
            info: TypeSlot::known(ty),
        })
    }

    #[test]
    fn prints_functions_with_types() {
        let strings = TypeInfo::array_of(TypeInfo::Concrete(Type::String));
        let program = CoreProgram {
            namespace: Some("hello".into()),
            entry: "-main".into(),
            definitions: vec![CoreDefinition::Function(CoreFunction {
                name: "-main".into(),
                params: vec![CoreParam {
                    name: "args".into(),
                    position: Span::default(),
                    info: TypeSlot::known(strings.clone()),
                }],
                body: vec![CoreExpr::Call(CoreCall {
                    callee: Callee::Builtin(Builtin::Count),
                    args: vec![var("args", strings)],
                    position: Span::default(),
                    info: TypeSlot::known(TypeInfo::Concrete(Type::Long)),
                })],
                returns: TypeSlot::known(TypeInfo::Concrete(Type::Long)),
                kind: FunctionKind::Defined,
                variadic: true,
                position: Span::default(),
            })],
        };

        assert_eq!(
            program.to_string(),
            "(ns hello)\n\n(defn -main [& args: String[]] -> Long\n  (count args))\n"
        );
    }

    #[test]
    fn prints_specialized_nodes() {
        let get = CoreExpr::ArrayGet(CoreArrayGet {
            array: Box::new(var("xs", TypeInfo::Unknown)),
            index: Box::new(CoreExpr::Literal(CoreLiteral {
                value: LiteralValue::Integer(0),
                position: Span::default(),
                info: TypeSlot::unknown(),
            })),
            missing: Missing::Nil,
            position: Span::default(),
            info: TypeSlot::unknown(),
        });
        assert_eq!(get.to_string(), "(aget xs 0 :or-nil)");
    }
}
