//! Lambda Lifting - turn every closure into a top-level function
//!
//! A closure reading variables of its enclosing scope is lifted into a
//! function that takes those variables as extra, trailing parameters. Every
//! place that used the closure passes them explicitly:
//!
//! ```clojure
//! (defn -main [& args]
//!   (let [x (first args)]
//!     (say-hello x)))
//! ```
//!
//! becomes
//!
//! ```clojure
//! (defn let__0 [x] (say-hello x))
//! (defn -main [& args] (let__0 (first args)))
//! ```
//!
//! A closure bound by `let` and only ever called is substituted away: calls
//! through the binding become direct calls to the lifted function. Any other
//! closure in value position becomes a [`CoreFunctionRef`] carrying the
//! captured values. Self references of a named `fn` become direct recursive
//! calls.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use lachs::Span;
use log::debug;

use crate::core::*;
use crate::error::{CompileError, CompileResult};
use crate::types::{Type, TypeInfo, TypeSlot};

use super::NameGenerator;

/// Enclosing-scope locals a closure reads, in order of first reference.
pub type CaptureSet = IndexSet<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct LiftedFunction {
    pub name: String,
    pub origin: ClosureOrigin,
    pub captures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiftReport {
    pub passes: usize,
    pub lifted: Vec<LiftedFunction>,
}

impl LiftReport {
    pub fn get(&self, name: &str) -> Option<&LiftedFunction> {
        self.lifted.iter().find(|f| f.name == name)
    }
}

/// Lift all closures of a program.
pub fn lift_program(
    program: CoreProgram,
    names: &mut NameGenerator,
) -> CompileResult<(CoreProgram, LiftReport)> {
    let mut report = LiftReport::default();
    let mut program = program;
    let mut remaining = program.closure_count();

    loop {
        program = lift_pass(program, names, &mut report)?;
        report.passes += 1;

        let left = program.closure_count();
        if left == 0 {
            break;
        }
        if left >= remaining {
            return Err(stuck(&program));
        }
        remaining = left;
    }

    debug!(
        "lifted {} closures in {} pass(es)",
        report.lifted.len(),
        report.passes
    );
    Ok((program, report))
}

fn lift_pass(
    program: CoreProgram,
    names: &mut NameGenerator,
    report: &mut LiftReport,
) -> CompileResult<CoreProgram> {
    let functions: HashSet<String> = program
        .definitions
        .iter()
        .filter(|def| match def {
            CoreDefinition::Function(_) => true,
            CoreDefinition::Value(value) => matches!(value.value, CoreExpr::Closure(_)),
        })
        .map(|def| def.name().to_string())
        .collect();

    let mut defined = NameGenerator::new();
    let mut definitions = vec![];

    for def in program.definitions {
        let mut lifter = Lifter {
            names: &mut *names,
            functions: &functions,
            types: local_types(&def),
            lifted: vec![],
            report: vec![],
        };

        let def = match def {
            CoreDefinition::Function(function) => {
                let body = lifter.body(function.body, &Subst::new())?;
                CoreDefinition::Function(CoreFunction { body, ..function })
            }
            CoreDefinition::Value(CoreValueDef {
                name,
                value: CoreExpr::Closure(closure),
                position,
            }) => {
                let (global, target) =
                    lifter.lift_function(closure, &Subst::new(), None, Some(name))?;
                if let Some(variable) = target.captures.first() {
                    return Err(CompileError::CaptureCycle {
                        variable: variable.clone(),
                        span: position,
                    });
                }
                CoreDefinition::Function(global)
            }
            CoreDefinition::Value(value) => {
                let expr = lifter.expr(value.value, &Subst::new())?;
                CoreDefinition::Value(CoreValueDef {
                    value: expr,
                    ..value
                })
            }
        };

        let Lifter {
            lifted,
            report: lifted_report,
            ..
        } = lifter;
        report.lifted.extend(lifted_report);

        defined.claim(def.name(), &def.position())?;
        definitions.push(def);
        for function in lifted {
            defined.claim(&function.name, &function.position)?;
            definitions.push(CoreDefinition::Function(function));
        }
    }

    Ok(CoreProgram {
        definitions,
        ..program
    })
}

fn stuck(program: &CoreProgram) -> CompileError {
    let mut first = None;
    program.walk(&mut |expr| {
        if first.is_none()
            && let CoreExpr::Closure(closure) = expr
        {
            first = Some(closure.position.clone());
        }
    });
    CompileError::CaptureCycle {
        variable: "<closure>".to_string(),
        span: first.unwrap_or_default(),
    }
}

/// A local that stands for a lifted function.
#[derive(Debug, Clone)]
struct Target {
    name: String,
    captures: Vec<String>,
}

type Subst = HashMap<String, Target>;

struct Lifter<'a> {
    names: &'a mut NameGenerator,
    /// Top-level functions, including closure-valued globals
    functions: &'a HashSet<String>,
    /// Types of all locals of the definition being lifted
    types: HashMap<String, TypeInfo>,
    lifted: Vec<CoreFunction>,
    report: Vec<LiftedFunction>,
}

impl Lifter<'_> {
    fn body(&mut self, body: Vec<CoreExpr>, subst: &Subst) -> CompileResult<Vec<CoreExpr>> {
        body.into_iter().map(|e| self.expr(e, subst)).collect()
    }

    fn boxed(&mut self, expr: Box<CoreExpr>, subst: &Subst) -> CompileResult<Box<CoreExpr>> {
        Ok(Box::new(self.expr(*expr, subst)?))
    }

    fn expr(&mut self, expr: CoreExpr, subst: &Subst) -> CompileResult<CoreExpr> {
        Ok(match expr {
            CoreExpr::Literal(_) => expr,
            CoreExpr::Var(var) => match var.binding {
                Binding::Local => match subst.get(&var.name) {
                    Some(target) => CoreExpr::FunctionRef(CoreFunctionRef {
                        name: target.name.clone(),
                        bound: self.capture_vars(&target.captures, &var.position),
                        position: var.position,
                        info: var.info,
                    }),
                    None => CoreExpr::Var(var),
                },
                Binding::Global if self.functions.contains(&var.name) => {
                    CoreExpr::FunctionRef(CoreFunctionRef {
                        name: var.name,
                        bound: vec![],
                        position: var.position,
                        info: var.info,
                    })
                }
                Binding::Global => CoreExpr::Var(var),
            },
            CoreExpr::Call(call) => self.call(call, subst)?,
            CoreExpr::FunctionRef(function) => CoreExpr::FunctionRef(CoreFunctionRef {
                bound: self.body(function.bound, subst)?,
                ..function
            }),
            CoreExpr::Closure(closure) => {
                let position = closure.position.clone();
                let info = closure.info.clone();
                let target = self.lift_closure(closure, subst, None)?;
                CoreExpr::FunctionRef(CoreFunctionRef {
                    name: target.name,
                    bound: self.capture_vars(&target.captures, &position),
                    position,
                    info,
                })
            }
            CoreExpr::Conditional(cond) => CoreExpr::Conditional(CoreConditional {
                test: self.boxed(cond.test, subst)?,
                then_expr: self.boxed(cond.then_expr, subst)?,
                else_expr: self.boxed(cond.else_expr, subst)?,
                ..cond
            }),
            CoreExpr::ArrayGet(get) => CoreExpr::ArrayGet(CoreArrayGet {
                array: self.boxed(get.array, subst)?,
                index: self.boxed(get.index, subst)?,
                missing: match get.missing {
                    Missing::Default(default) => Missing::Default(self.boxed(default, subst)?),
                    other => other,
                },
                ..get
            }),
            CoreExpr::ArraySlice(slice) => CoreExpr::ArraySlice(CoreArraySlice {
                array: self.boxed(slice.array, subst)?,
                ..slice
            }),
            CoreExpr::ArrayLength(len) => CoreExpr::ArrayLength(CoreArrayLength {
                array: self.boxed(len.array, subst)?,
                ..len
            }),
        })
    }

    fn call(&mut self, call: CoreCall, subst: &Subst) -> CompileResult<CoreExpr> {
        let CoreCall {
            callee,
            args,
            position,
            info,
        } = call;

        let (callee, args) = match callee {
            Callee::Closure(closure) => {
                return self.applied_closure(*closure, args, position, info, subst);
            }
            Callee::Dynamic(target) => match *target {
                CoreExpr::Var(var)
                    if var.binding == Binding::Local && subst.contains_key(&var.name) =>
                {
                    let target = &subst[&var.name];
                    let mut args = self.body(args, subst)?;
                    args.extend(self.capture_vars(&target.captures, &var.position));
                    (Callee::Named(target.name.clone()), args)
                }
                other => (
                    Callee::Dynamic(Box::new(self.expr(other, subst)?)),
                    self.body(args, subst)?,
                ),
            },
            other => (other, self.body(args, subst)?),
        };

        Ok(CoreExpr::Call(CoreCall {
            callee,
            args,
            position,
            info,
        }))
    }

    /// `((fn [p...] body...) a...)`, the shape `let` and `do` desugar into.
    fn applied_closure(
        &mut self,
        closure: CoreClosure,
        args: Vec<CoreExpr>,
        position: Span,
        info: TypeSlot,
        subst: &Subst,
    ) -> CompileResult<CoreExpr> {
        let mut inner = subst.clone();
        let mut params = vec![];
        let mut kept = vec![];

        if closure.params.len() == args.len() {
            for (param, arg) in closure.params.iter().zip(args) {
                match arg {
                    CoreExpr::Closure(bound) if !used_as_value(&param.name, &closure.body) => {
                        let target = self.lift_closure(bound, subst, Some(&param.name))?;
                        inner.insert(param.name.clone(), target);
                    }
                    other => {
                        params.push(param.clone());
                        kept.push(self.expr(other, subst)?);
                    }
                }
            }
        } else {
            params = closure.params.clone();
            kept = self.body(args, subst)?;
        }

        let closure = CoreClosure { params, ..closure };
        let target = self.lift_closure(closure, &inner, None)?;
        kept.extend(self.capture_vars(&target.captures, &position));

        Ok(CoreExpr::Call(CoreCall {
            callee: Callee::Named(target.name),
            args: kept,
            position,
            info,
        }))
    }

    /// Lift `closure` into a new top-level function and return how to call it.
    ///
    /// `binder` is the local the closure is bound to, if any.
    fn lift_closure(
        &mut self,
        closure: CoreClosure,
        subst: &Subst,
        binder: Option<&str>,
    ) -> CompileResult<Target> {
        let (function, target) = self.lift_function(closure, subst, binder, None)?;
        self.lifted.push(function);
        Ok(target)
    }

    /// Build the function for `closure`; `name` overrides the generated name.
    fn lift_function(
        &mut self,
        closure: CoreClosure,
        subst: &Subst,
        binder: Option<&str>,
        name: Option<String>,
    ) -> CompileResult<(CoreFunction, Target)> {
        // the self name is bound inside the body, the binder is not
        let captures = captures_with(&closure, subst);
        if let Some(variable) = binder
            && captures.contains(variable)
        {
            return Err(CompileError::CaptureCycle {
                variable: variable.to_string(),
                span: closure.position.clone(),
            });
        }

        let name = name.unwrap_or_else(|| self.names.fresh(closure.origin.prefix()));
        let target = Target {
            name: name.clone(),
            captures: captures.into_iter().collect(),
        };

        let mut body_subst = subst.clone();
        if let Some(self_name) = &closure.self_name {
            body_subst.insert(self_name.clone(), target.clone());
        }
        let body = self.body(closure.body, &body_subst)?;

        let mut params = closure.params;
        params.extend(target.captures.iter().map(|capture| CoreParam {
            name: capture.clone(),
            position: closure.position.clone(),
            info: TypeSlot::known(self.type_of(capture)),
        }));

        debug!(
            "lifted {} closure into `{}` capturing [{}]",
            closure.origin.prefix(),
            name,
            target.captures.join(", ")
        );
        self.report.push(LiftedFunction {
            name: name.clone(),
            origin: closure.origin,
            captures: target.captures.clone(),
        });

        let function = CoreFunction {
            name,
            params,
            body,
            returns: closure.returns,
            kind: FunctionKind::Lifted(closure.origin),
            variadic: false,
            position: closure.position,
        };
        Ok((function, target))
    }

    fn type_of(&self, name: &str) -> TypeInfo {
        self.types.get(name).cloned().unwrap_or_default()
    }

    fn capture_vars(&self, captures: &[String], position: &Span) -> Vec<CoreExpr> {
        captures
            .iter()
            .map(|name| CoreExpr::local(name.clone(), self.type_of(name), position.clone()))
            .collect()
    }
}

/// Capture set of a closure that has not been lifted yet.
pub fn capture_set(closure: &CoreClosure) -> CaptureSet {
    captures_with(closure, &Subst::new())
}

/// A reference to a local that stands for an already lifted closure
/// captures that closure's captures instead.
fn captures_with(closure: &CoreClosure, subst: &Subst) -> CaptureSet {
    let mut captures = CaptureSet::new();
    free_vars_closure(closure, subst, &HashSet::new(), &mut captures);
    captures
}

fn free_vars_name(
    name: &str,
    subst: &Subst,
    bound: &HashSet<String>,
    out: &mut CaptureSet,
) {
    if bound.contains(name) {
        return;
    }
    match subst.get(name) {
        Some(target) => out.extend(
            target
                .captures
                .iter()
                .filter(|c| !bound.contains(*c))
                .cloned(),
        ),
        None => {
            out.insert(name.to_string());
        }
    }
}

fn free_vars_expr(
    expr: &CoreExpr,
    subst: &Subst,
    bound: &HashSet<String>,
    out: &mut CaptureSet,
) {
    match expr {
        CoreExpr::Var(var) if var.binding == Binding::Local => {
            free_vars_name(&var.name, subst, bound, out)
        }
        CoreExpr::Closure(closure) => free_vars_closure(closure, subst, bound, out),
        CoreExpr::Call(call) => {
            match &call.callee {
                Callee::Closure(closure) => free_vars_closure(closure, subst, bound, out),
                Callee::Dynamic(target) => free_vars_expr(target, subst, bound, out),
                Callee::Named(_) | Callee::Builtin(_) | Callee::Host(_) => {}
            }
            for arg in &call.args {
                free_vars_expr(arg, subst, bound, out);
            }
        }
        other => {
            for child in other.children() {
                free_vars_expr(child, subst, bound, out);
            }
        }
    }
}

fn free_vars_closure(
    closure: &CoreClosure,
    subst: &Subst,
    bound: &HashSet<String>,
    out: &mut CaptureSet,
) {
    let mut inner = bound.clone();
    inner.extend(closure.params.iter().map(|p| p.name.clone()));
    inner.extend(closure.self_name.clone());
    for expr in &closure.body {
        free_vars_expr(expr, subst, &inner, out);
    }
}

/// Whether `name` is read anywhere other than in callee position.
fn used_as_value(name: &str, body: &[CoreExpr]) -> bool {
    fn check(expr: &CoreExpr, name: &str) -> bool {
        match expr {
            CoreExpr::Var(var) => var.binding == Binding::Local && var.name == name,
            CoreExpr::Call(CoreCall {
                callee: Callee::Dynamic(target),
                args,
                ..
            }) if matches!(target.as_ref(), CoreExpr::Var(var) if var.name == name) => {
                args.iter().any(|arg| check(arg, name))
            }
            other => other.children().into_iter().any(|child| check(child, name)),
        }
    }
    body.iter().any(|expr| check(expr, name))
}

/// Types of every parameter and self name in a definition.
fn local_types(def: &CoreDefinition) -> HashMap<String, TypeInfo> {
    let mut closures: Vec<&CoreClosure> = vec![];
    let mut types = HashMap::new();

    match def {
        CoreDefinition::Function(function) => {
            for param in &function.params {
                types.insert(param.name.clone(), param.info.get().clone());
            }
        }
        CoreDefinition::Value(CoreValueDef {
            value: CoreExpr::Closure(closure),
            ..
        }) => closures.push(closure),
        CoreDefinition::Value(_) => {}
    }

    for expr in def.exprs() {
        expr.walk(&mut |e| match e {
            CoreExpr::Closure(closure) => closures.push(closure),
            CoreExpr::Call(CoreCall {
                callee: Callee::Closure(closure),
                ..
            }) => closures.push(closure.as_ref()),
            _ => {}
        });
    }

    for closure in closures {
        for param in &closure.params {
            types.insert(param.name.clone(), param.info.get().clone());
        }
        if let Some(name) = &closure.self_name {
            types.insert(name.clone(), TypeInfo::Concrete(Type::Object));
        }
    }

    types
}
