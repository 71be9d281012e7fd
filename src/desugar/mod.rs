//! AST builder - analyse reader forms into the core AST
//!
//! This module decides what every form means:
//! - `ns`, `defn` and `def` at the top level become definitions
//! - symbols resolve to locals, globals, builtins or host methods
//! - `let` and multi-expression `do` become immediately applied closures
//! - `println` becomes a call to `System/out.println`
//!
//! ```text
//! (let [x (first args)] (say-hello x))
//!   ⇒  ((fn [x] (say-hello x)) (first args))
//! ```
//!
//! Locals that shadow another local of the same definition are renamed
//! (`x`, `x_1`, ...), so later passes can use names as identities.

use std::collections::{HashMap, HashSet};

use lachs::Span;
use log::debug;

use crate::ast::{Form, List, Program, Symbol, Vector};
use crate::config::CompilerConfig;
use crate::core::*;
use crate::error::{CompileError, CompileResult};
use crate::host::{self, HostKind, HostMethod};
use crate::types::TypeSlot;

/// What a top-level name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Global {
    Function { arity: usize, variadic: bool },
    /// `(def name (fn ...))`
    Closure { arity: usize },
    Value,
}

/// Build the core program, checking the entry point against `config`.
pub fn build_program(program: &Program, config: &CompilerConfig) -> CompileResult<CoreProgram> {
    let mut builder = Builder::new(&config.entry.name);
    let core = builder.program(program)?;
    check_entry(&core, config)?;

    debug!(
        "built {} definitions ({} closures)",
        core.definitions.len(),
        core.closure_count()
    );
    Ok(core)
}

fn check_entry(program: &CoreProgram, config: &CompilerConfig) -> CompileResult<()> {
    let name = &config.entry.name;
    let Some(function) = program.function(name) else {
        return Err(CompileError::MissingEntryPoint { name: name.clone() });
    };

    if function.params.len() != config.entry.params.len() {
        return Err(CompileError::InvalidEntryPoint {
            name: name.clone(),
            expected: config.entry.params.len(),
            found: function.params.len(),
            span: function.position.clone(),
        });
    }
    Ok(())
}

struct Builder {
    entry: String,
    ids: IdSource,
    globals: HashMap<String, Global>,
    /// Source name → unique name, innermost last
    locals: Vec<(String, String)>,
    /// Local names taken in the current definition
    used: HashSet<String>,
}

impl Builder {
    fn new(entry: &str) -> Self {
        Self {
            entry: entry.to_string(),
            ids: IdSource::new(),
            globals: HashMap::new(),
            locals: vec![],
            used: HashSet::new(),
        }
    }

    fn program(&mut self, program: &Program) -> CompileResult<CoreProgram> {
        let mut namespace = None;

        for form in &program.forms {
            match form.head_symbol() {
                Some("ns") => namespace = Some(self.namespace(form)?),
                Some("defn") | Some("def") => self.declare(form)?,
                _ => {}
            }
        }

        let mut definitions = vec![];
        for form in &program.forms {
            match form.head_symbol() {
                Some("ns") => {}
                Some("defn") => definitions.push(self.defn(as_list(form))?),
                Some("def") => definitions.push(self.def(as_list(form))?),
                _ => {
                    return Err(CompileError::unsupported(
                        format!("{} at top level", form.describe()),
                        form.position(),
                    ));
                }
            }
        }

        Ok(CoreProgram {
            namespace,
            entry: self.entry.clone(),
            definitions,
        })
    }

    fn namespace(&self, form: &Form) -> CompileResult<String> {
        let list = as_list(form);
        match list.items.get(1).and_then(Form::as_symbol) {
            Some(name) => Ok(name.value.clone()),
            None => Err(CompileError::unsupported(
                "`ns` without a name",
                list.position.clone(),
            )),
        }
    }

    /// Register a top-level name before any body is built, so definitions
    /// may refer to each other in any order.
    fn declare(&mut self, form: &Form) -> CompileResult<()> {
        let list = as_list(form);
        let name = definition_name(list)?;

        let global = if form.head_symbol() == Some("defn") {
            let params = defn_params(list)?;
            let (names, variadic) = param_names(params)?;
            Global::Function {
                arity: names.len(),
                variadic,
            }
        } else {
            match list.items.get(2).and_then(|f| fn_params(f)) {
                Some(params) => Global::Closure {
                    arity: params.items.len(),
                },
                None => Global::Value,
            }
        };

        if self.globals.insert(name.value.clone(), global).is_some() {
            return Err(CompileError::NameCollision {
                name: name.value.clone(),
                span: name.position.clone(),
            });
        }
        Ok(())
    }

    /// `(defn name doc? [params] body...)`
    fn defn(&mut self, list: &List) -> CompileResult<CoreDefinition> {
        let name = definition_name(list)?;
        let params = defn_params(list)?;
        let (names, variadic) = param_names(params)?;

        if variadic && name.value != self.entry {
            return Err(CompileError::unsupported(
                "variadic parameters outside the entry point",
                params.position.clone(),
            ));
        }

        self.begin_definition();
        let params = self.bind_params(&names);
        let body_start = list
            .items
            .iter()
            .position(|f| matches!(f, Form::Vector(_)))
            .map(|i| i + 1)
            .unwrap_or(list.items.len());
        let body = self.body(&list.items[body_start..])?;
        self.locals.clear();

        Ok(CoreDefinition::Function(CoreFunction {
            name: name.value.clone(),
            params,
            body,
            returns: TypeSlot::unknown(),
            kind: FunctionKind::Defined,
            variadic,
            position: list.position.clone(),
        }))
    }

    /// `(def name expr)`
    fn def(&mut self, list: &List) -> CompileResult<CoreDefinition> {
        let name = definition_name(list)?;
        let Some(value) = list.items.get(2) else {
            return Err(CompileError::unsupported(
                "`def` without a value",
                list.position.clone(),
            ));
        };
        if list.items.len() > 3 {
            return Err(CompileError::unsupported(
                "`def` with more than one value",
                list.position.clone(),
            ));
        }

        self.begin_definition();
        let value = self.expr(value)?;
        Ok(CoreDefinition::Value(CoreValueDef {
            name: name.value.clone(),
            value,
            position: list.position.clone(),
        }))
    }

    fn begin_definition(&mut self) {
        self.locals.clear();
        self.used.clear();
    }

    fn bind(&mut self, name: &str) -> String {
        let mut unique = name.to_string();
        let mut suffix = 1;
        while self.used.contains(&unique) {
            unique = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        self.used.insert(unique.clone());
        self.locals.push((name.to_string(), unique.clone()));
        unique
    }

    fn bind_params(&mut self, names: &[&Symbol]) -> Vec<CoreParam> {
        names
            .iter()
            .map(|symbol| CoreParam {
                name: self.bind(&symbol.value),
                position: symbol.position.clone(),
                info: TypeSlot::unknown(),
            })
            .collect()
    }

    fn local(&self, name: &str) -> Option<&str> {
        self.locals
            .iter()
            .rev()
            .find(|(source, _)| source == name)
            .map(|(_, unique)| unique.as_str())
    }

    fn body(&mut self, forms: &[Form]) -> CompileResult<Vec<CoreExpr>> {
        forms.iter().map(|form| self.expr(form)).collect()
    }

    fn expr(&mut self, form: &Form) -> CompileResult<CoreExpr> {
        match form {
            Form::Integer(integer) => Ok(literal(
                LiteralValue::Integer(integer.value),
                integer.position.clone(),
            )),
            Form::String(string) => Ok(literal(
                LiteralValue::String(string.value.clone()),
                string.position.clone(),
            )),
            Form::Symbol(symbol) => self.symbol(symbol),
            Form::List(list) => self.list(list),
            Form::Vector(vector) => Err(CompileError::unsupported(
                "vector literal",
                vector.position.clone(),
            )),
        }
    }

    /// A symbol in value position.
    fn symbol(&self, symbol: &Symbol) -> CompileResult<CoreExpr> {
        let position = symbol.position.clone();
        match symbol.value.as_str() {
            "nil" => return Ok(literal(LiteralValue::Nil, position)),
            "true" => return Ok(literal(LiteralValue::Boolean(true), position)),
            "false" => return Ok(literal(LiteralValue::Boolean(false), position)),
            _ => {}
        }

        if let Some(unique) = self.local(&symbol.value) {
            return Ok(var(unique, Binding::Local, position));
        }
        if self.globals.contains_key(&symbol.value) {
            return Ok(var(&symbol.value, Binding::Global, position));
        }
        if Builtin::from_symbol(&symbol.value).is_some() || symbol.value == "println" {
            return Err(CompileError::unsupported(
                format!("builtin `{}` used as a value", symbol.value),
                position,
            ));
        }
        Err(CompileError::UnboundSymbol {
            name: symbol.value.clone(),
            span: position,
        })
    }

    fn list(&mut self, list: &List) -> CompileResult<CoreExpr> {
        let Some(head) = list.items.first() else {
            return Err(CompileError::unsupported(
                "empty list",
                list.position.clone(),
            ));
        };
        let args = &list.items[1..];

        let Form::Symbol(symbol) = head else {
            return self.apply(head, args, list.position.clone());
        };

        // Locals shadow special forms, globals and builtins alike.
        if self.local(&symbol.value).is_some() {
            return self.apply(head, args, list.position.clone());
        }

        match symbol.value.as_str() {
            "if" => self.conditional(list),
            "do" => self.do_block(args, list.position.clone()),
            "let" => self.let_block(list),
            "fn" => Ok(CoreExpr::Closure(self.closure(list)?)),
            "." => self.interop(list),
            "def" | "defn" | "ns" | "quote" | "loop" | "recur" => Err(CompileError::unsupported(
                format!("`{}` in expression position", symbol.value),
                list.position.clone(),
            )),
            name => self.named_call(symbol, name, args, list.position.clone()),
        }
    }

    fn named_call(
        &mut self,
        symbol: &Symbol,
        name: &str,
        args: &[Form],
        position: Span,
    ) -> CompileResult<CoreExpr> {
        if let Some(global) = self.globals.get(name).copied() {
            return match global {
                Global::Function {
                    variadic: true, ..
                } => Err(CompileError::unsupported(
                    format!("call to variadic function `{}`", name),
                    position,
                )),
                Global::Function { arity, .. } | Global::Closure { arity } => {
                    if args.len() != arity {
                        return Err(CompileError::unsupported(
                            format!(
                                "wrong number of arguments ({}) passed to `{}`",
                                args.len(),
                                name
                            ),
                            position,
                        ));
                    }
                    let args = self.body(args)?;
                    Ok(call(Callee::Named(name.to_string()), args, position))
                }
                Global::Value => self.apply(&Form::Symbol(symbol.clone()), args, position),
            };
        }

        if name == "println" {
            return self.println(args, position);
        }

        if let Some(builtin) = Builtin::from_symbol(name) {
            let (min, max) = builtin.arity();
            if args.len() < min || max.is_some_and(|max| args.len() > max) {
                return Err(CompileError::unsupported(
                    format!(
                        "wrong number of arguments ({}) passed to `{}`",
                        args.len(),
                        name
                    ),
                    position,
                ));
            }
            let args = self.body(args)?;
            return Ok(call(Callee::Builtin(builtin), args, position));
        }

        if let Some(method) = name.strip_prefix('.').filter(|m| !m.is_empty()) {
            let Some(host) = host::lookup_instance(method) else {
                return Err(CompileError::unsupported(
                    format!("unknown host method `.{}`", method),
                    position,
                ));
            };
            let args = self.body(args)?;
            return host_call(host, args, position);
        }

        let qualified = name
            .split_once('/')
            .filter(|(class, member)| !class.is_empty() && !member.is_empty());
        if let Some((class, member)) = qualified {
            let Some(host) = host::lookup_static(class, member) else {
                return Err(CompileError::unsupported(
                    format!("unknown host method `{}`", name),
                    position,
                ));
            };
            let args = self.body(args)?;
            return host_call(host, args, position);
        }

        Err(CompileError::UnboundSymbol {
            name: name.to_string(),
            span: symbol.position.clone(),
        })
    }

    /// Call of a computed value: a local, a global value or an expression.
    fn apply(&mut self, head: &Form, args: &[Form], position: Span) -> CompileResult<CoreExpr> {
        let callee = match head {
            Form::Symbol(_) | Form::List(_) => self.expr(head)?,
            other => {
                return Err(CompileError::unsupported(
                    format!("cannot call {}", other.describe()),
                    other.position(),
                ));
            }
        };
        let args = self.body(args)?;

        let callee = match callee {
            CoreExpr::Closure(closure) => Callee::Closure(Box::new(closure)),
            other => Callee::Dynamic(Box::new(other)),
        };
        Ok(call(callee, args, position))
    }

    /// `(println)`, `(println x)`, `(println a b ...)` joined with spaces
    fn println(&mut self, args: &[Form], position: Span) -> CompileResult<CoreExpr> {
        let Some(method) = host::println() else {
            return Err(CompileError::unsupported("println", position));
        };

        let mut args = self.body(args)?;
        if args.len() > 1 {
            let mut joined = vec![];
            for (i, arg) in args.into_iter().enumerate() {
                if i > 0 {
                    joined.push(literal(
                        LiteralValue::String(" ".to_string()),
                        position.clone(),
                    ));
                }
                joined.push(arg);
            }
            args = vec![call(Callee::Builtin(Builtin::Str), joined, position.clone())];
        }
        host_call(method, args, position)
    }

    /// `(if test then else?)`
    fn conditional(&mut self, list: &List) -> CompileResult<CoreExpr> {
        let (test, then_expr, else_expr) = match &list.items[1..] {
            [test, then_expr] => (test, then_expr, None),
            [test, then_expr, else_expr] => (test, then_expr, Some(else_expr)),
            _ => {
                return Err(CompileError::unsupported(
                    "`if` needs a test, a then branch and an optional else branch",
                    list.position.clone(),
                ));
            }
        };

        let test = self.expr(test)?;
        let then_expr = self.expr(then_expr)?;
        let else_expr = match else_expr {
            Some(form) => self.expr(form)?,
            None => CoreExpr::nil(list.position.clone()),
        };

        Ok(CoreExpr::Conditional(CoreConditional {
            test: Box::new(test),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            position: list.position.clone(),
            info: TypeSlot::unknown(),
        }))
    }

    /// `(do)` is nil and `(do e)` is `e`; anything longer becomes `((fn [] e...))`.
    fn do_block(&mut self, forms: &[Form], position: Span) -> CompileResult<CoreExpr> {
        match forms {
            [] => Ok(CoreExpr::nil(position)),
            [single] => self.expr(single),
            _ => {
                let body = self.body(forms)?;
                let closure =
                    self.new_closure(ClosureOrigin::Do, None, vec![], body, position.clone());
                Ok(call(Callee::Closure(Box::new(closure)), vec![], position))
            }
        }
    }

    /// `(let [a x b y] body...)` ⇒ `((fn [a] ((fn [b] body...) y)) x)`
    fn let_block(&mut self, list: &List) -> CompileResult<CoreExpr> {
        let Some(Form::Vector(bindings)) = list.items.get(1) else {
            return Err(CompileError::unsupported(
                "`let` without a binding vector",
                list.position.clone(),
            ));
        };
        if bindings.items.len() % 2 != 0 {
            return Err(CompileError::unsupported(
                "`let` with an odd number of binding forms",
                bindings.position.clone(),
            ));
        }

        let depth = self.locals.len();
        let result = self.let_bindings(&bindings.items, &list.items[2..], list.position.clone());
        self.locals.truncate(depth);
        result
    }

    fn let_bindings(
        &mut self,
        bindings: &[Form],
        body: &[Form],
        position: Span,
    ) -> CompileResult<CoreExpr> {
        let [name, init, rest @ ..] = bindings else {
            let body = self.let_body(body, &position)?;
            let closure = self.new_closure(ClosureOrigin::Let, None, vec![], body, position.clone());
            return Ok(call(Callee::Closure(Box::new(closure)), vec![], position));
        };

        let Form::Symbol(symbol) = name else {
            return Err(CompileError::unsupported(
                format!("{} as `let` binding name", name.describe()),
                name.position(),
            ));
        };

        let init = self.expr(init)?;
        let params = self.bind_params(&[symbol]);
        let inner = if rest.is_empty() {
            self.let_body(body, &position)?
        } else {
            vec![self.let_bindings(rest, body, position.clone())?]
        };

        let closure = self.new_closure(ClosureOrigin::Let, None, params, inner, position.clone());
        Ok(call(Callee::Closure(Box::new(closure)), vec![init], position))
    }

    fn let_body(&mut self, body: &[Form], position: &Span) -> CompileResult<Vec<CoreExpr>> {
        let mut body = self.body(body)?;
        if body.is_empty() {
            body.push(CoreExpr::nil(position.clone()));
        }
        Ok(body)
    }

    /// `(fn name? [params] body...)`
    fn closure(&mut self, list: &List) -> CompileResult<CoreClosure> {
        let (self_name, params, body) = match &list.items[1..] {
            [Form::Symbol(name), Form::Vector(params), body @ ..] => (Some(name), params, body),
            [Form::Vector(params), body @ ..] => (None, params, body),
            _ => {
                return Err(CompileError::unsupported(
                    "`fn` without a parameter vector",
                    list.position.clone(),
                ));
            }
        };

        let (names, variadic) = param_names(params)?;
        if variadic {
            return Err(CompileError::unsupported(
                "variadic parameters outside the entry point",
                params.position.clone(),
            ));
        }

        let depth = self.locals.len();
        let self_name = self_name.map(|name| self.bind(&name.value));
        let params = self.bind_params(&names);
        let body = self.body(body);
        self.locals.truncate(depth);

        Ok(self.new_closure(
            ClosureOrigin::Fn,
            self_name,
            params,
            body?,
            list.position.clone(),
        ))
    }

    fn new_closure(
        &mut self,
        origin: ClosureOrigin,
        self_name: Option<String>,
        params: Vec<CoreParam>,
        body: Vec<CoreExpr>,
        position: Span,
    ) -> CoreClosure {
        CoreClosure {
            id: self.ids.next(),
            origin,
            self_name,
            params,
            body,
            returns: TypeSlot::unknown(),
            position,
            info: TypeSlot::unknown(),
        }
    }

    /// `(. Target (method args...))` or `(. Target method args...)`
    fn interop(&mut self, list: &List) -> CompileResult<CoreExpr> {
        let position = list.position.clone();
        let (target, method, args): (&Form, &Symbol, &[Form]) = match &list.items[1..] {
            [target, Form::List(inner)] => match inner.items.split_first() {
                Some((Form::Symbol(method), args)) => (target, method, args),
                _ => {
                    return Err(CompileError::unsupported(
                        "host call without a method name",
                        inner.position.clone(),
                    ));
                }
            },
            [target, Form::Symbol(method), args @ ..] => (target, method, args),
            _ => {
                return Err(CompileError::unsupported(
                    "malformed `.` form",
                    position,
                ));
            }
        };

        if let Form::Symbol(class) = target
            && self.local(&class.value).is_none()
            && !self.globals.contains_key(&class.value)
        {
            let Some(host) = host::lookup_static(&class.value, &method.value) else {
                return Err(CompileError::unsupported(
                    format!("unknown host method `{}/{}`", class.value, method.value),
                    method.position.clone(),
                ));
            };
            let args = self.body(args)?;
            return host_call(host, args, position);
        }

        let Some(host) = host::lookup_instance(&method.value) else {
            return Err(CompileError::unsupported(
                format!("unknown host method `.{}`", method.value),
                method.position.clone(),
            ));
        };
        let mut all = vec![self.expr(target)?];
        all.extend(self.body(args)?);
        host_call(host, all, position)
    }
}

fn as_list(form: &Form) -> &List {
    match form {
        Form::List(list) => list,
        other => unreachable!("{} has no head symbol", other.describe()),
    }
}

fn definition_name(list: &List) -> CompileResult<&Symbol> {
    match list.items.get(1) {
        Some(Form::Symbol(name)) => Ok(name),
        _ => Err(CompileError::unsupported(
            "definition without a name",
            list.position.clone(),
        )),
    }
}

/// The parameter vector of a `defn`, after the optional docstring.
fn defn_params(list: &List) -> CompileResult<&Vector> {
    let params = match list.items.get(2) {
        Some(Form::String(_)) => list.items.get(3),
        other => other,
    };
    match params {
        Some(Form::Vector(params)) => Ok(params),
        _ => Err(CompileError::unsupported(
            "`defn` without a parameter vector",
            list.position.clone(),
        )),
    }
}

/// The parameter vector of a `(fn ...)` form, if `form` is one.
fn fn_params(form: &Form) -> Option<&Vector> {
    if form.head_symbol() != Some("fn") {
        return None;
    }
    let Form::List(list) = form else {
        return None;
    };
    list.items[1..].iter().take(2).find_map(|f| match f {
        Form::Vector(params) => Some(params),
        _ => None,
    })
}

/// Parameter symbols and whether the last one is a `& rest` parameter.
fn param_names(params: &Vector) -> CompileResult<(Vec<&Symbol>, bool)> {
    let mut names = vec![];
    let mut variadic = false;

    for (i, form) in params.items.iter().enumerate() {
        let Form::Symbol(symbol) = form else {
            return Err(CompileError::unsupported(
                format!("{} as parameter", form.describe()),
                form.position(),
            ));
        };
        if symbol.value == "&" {
            if i + 2 != params.items.len() {
                return Err(CompileError::unsupported(
                    "`&` must be followed by exactly one parameter",
                    symbol.position.clone(),
                ));
            }
            variadic = true;
            continue;
        }
        names.push(symbol);
    }

    Ok((names, variadic))
}

fn literal(value: LiteralValue, position: Span) -> CoreExpr {
    CoreExpr::Literal(CoreLiteral {
        value,
        position,
        info: TypeSlot::unknown(),
    })
}

fn var(name: &str, binding: Binding, position: Span) -> CoreExpr {
    CoreExpr::Var(CoreVar {
        name: name.to_string(),
        binding,
        position,
        info: TypeSlot::unknown(),
    })
}

fn call(callee: Callee, args: Vec<CoreExpr>, position: Span) -> CoreExpr {
    CoreExpr::Call(CoreCall {
        callee,
        args,
        position,
        info: TypeSlot::unknown(),
    })
}

fn host_call(method: HostMethod, args: Vec<CoreExpr>, position: Span) -> CompileResult<CoreExpr> {
    if !method.accepts(args.len()) {
        let receiver = if method.kind == HostKind::Instance {
            " (including the target)"
        } else {
            ""
        };
        return Err(CompileError::unsupported(
            format!(
                "wrong number of arguments ({}{}) for host method `{}`",
                args.len(),
                receiver,
                method
            ),
            position,
        ));
    }
    Ok(call(Callee::Host(method), args, position))
}
