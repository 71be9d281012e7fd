//! Lambda dropping
//!
//! Lifting and normalization leave many small helpers behind that are
//! called from a single place. This pass folds lifted functions and void
//! adapters back into their only caller:
//!
//! ```text
//! (defn -main [& args] (let__0 (first args)))
//! (defn let__0 [x] (say-hello x))
//! (defn say-hello [s] (do_void__1 s))
//! (defn do_void__1 [arg0] (. System/out (println arg0)) nil)
//! ```
//!
//! becomes
//!
//! ```text
//! (defn -main [& args] (say-hello (first args)))
//! (defn say-hello [s] (. System/out (println s)) nil)
//! ```
//!
//! A body is spliced into the caller's body when the call is one of the
//! caller's top-level expressions; anywhere else only single-expression
//! bodies are inlined. Arguments replace parameters directly, so an argument
//! with effects is only accepted when its parameter is read exactly once and
//! nothing in the body can have an effect before that read.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::core::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropReport {
    /// Functions folded into their caller, in the order they were dropped
    pub dropped: Vec<String>,
}

pub fn drop_program(program: CoreProgram) -> (CoreProgram, DropReport) {
    let mut report = DropReport::default();
    let mut program = program;
    let mut kept = HashSet::new();

    while let Some(index) = next_candidate(&program, &kept) {
        let callee = match program.definitions.remove(index) {
            CoreDefinition::Function(function) => function,
            other => {
                program.definitions.insert(index, other);
                break;
            }
        };

        let mut inliner = Inliner {
            callee: &callee,
            done: false,
        };
        let mut definitions: Vec<CoreDefinition> = program
            .definitions
            .into_iter()
            .map(|def| inliner.definition(def))
            .collect();

        if inliner.done {
            trace!("dropped `{}` into its caller", callee.name);
            report.dropped.push(callee.name);
        } else {
            trace!("keeping `{}`", callee.name);
            kept.insert(callee.name.clone());
            definitions.insert(index, CoreDefinition::Function(callee));
        }
        program = CoreProgram {
            definitions,
            ..program
        };
    }

    debug!("dropped {} function(s)", report.dropped.len());
    (program, report)
}

/// Index of the next function that is generated, called from exactly one
/// other place and never used as a value.
fn next_candidate(program: &CoreProgram, kept: &HashSet<String>) -> Option<usize> {
    let mut calls: HashMap<&str, usize> = HashMap::new();
    let mut values: HashSet<&str> = HashSet::new();
    let mut recursive: HashSet<&str> = HashSet::new();

    for def in &program.definitions {
        for expr in def.exprs() {
            expr.walk(&mut |e| match e {
                CoreExpr::Call(CoreCall {
                    callee: Callee::Named(name),
                    ..
                }) => {
                    *calls.entry(name.as_str()).or_default() += 1;
                    if name == def.name() {
                        recursive.insert(name.as_str());
                    }
                }
                CoreExpr::FunctionRef(function) => {
                    values.insert(function.name.as_str());
                }
                CoreExpr::Var(var) if var.binding == Binding::Global => {
                    values.insert(var.name.as_str());
                }
                _ => {}
            });
        }
    }

    program.definitions.iter().position(|def| match def {
        CoreDefinition::Function(function) => {
            let name = function.name.as_str();
            matches!(
                function.kind,
                FunctionKind::Lifted(_) | FunctionKind::VoidAdapter
            ) && !function.variadic
                && name != program.entry
                && calls.get(name) == Some(&1)
                && !values.contains(name)
                && !recursive.contains(name)
                && !kept.contains(name)
        }
        CoreDefinition::Value(_) => false,
    })
}

struct Inliner<'a> {
    callee: &'a CoreFunction,
    done: bool,
}

impl Inliner<'_> {
    fn definition(&mut self, def: CoreDefinition) -> CoreDefinition {
        match def {
            CoreDefinition::Function(function) => CoreDefinition::Function(CoreFunction {
                body: self.body(function.body),
                ..function
            }),
            CoreDefinition::Value(value) => CoreDefinition::Value(CoreValueDef {
                value: self.expr(value.value),
                ..value
            }),
        }
    }

    fn body(&mut self, body: Vec<CoreExpr>) -> Vec<CoreExpr> {
        let last = body.len().saturating_sub(1);
        let mut out = Vec::with_capacity(body.len());
        for (i, expr) in body.into_iter().enumerate() {
            match self.splice(expr, i == last) {
                Ok(spliced) => out.extend(spliced),
                Err(expr) => out.push(self.expr(expr)),
            }
        }
        out
    }

    fn calls_callee(&self, call: &CoreCall) -> bool {
        !self.done && matches!(&call.callee, Callee::Named(name) if *name == self.callee.name)
    }

    /// The callee's body in place of a top-level call, or the call back.
    fn splice(&mut self, expr: CoreExpr, tail: bool) -> Result<Vec<CoreExpr>, CoreExpr> {
        let call = match expr {
            CoreExpr::Call(call) if self.calls_callee(&call) => call,
            other => return Err(other),
        };
        let Some(mut body) = inline_body(self.callee, &call.args) else {
            return Err(CoreExpr::Call(call));
        };

        // the value of a statement is thrown away
        if !tail && body.len() > 1 && body.last().is_some_and(is_pure) {
            body.pop();
        }
        self.done = true;
        Ok(body)
    }

    fn exprs(&mut self, exprs: Vec<CoreExpr>) -> Vec<CoreExpr> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: Box<CoreExpr>) -> Box<CoreExpr> {
        Box::new(self.expr(*expr))
    }

    fn expr(&mut self, expr: CoreExpr) -> CoreExpr {
        match expr {
            CoreExpr::Literal(_) | CoreExpr::Var(_) => expr,
            CoreExpr::Call(call) => self.call(call),
            CoreExpr::FunctionRef(function) => CoreExpr::FunctionRef(CoreFunctionRef {
                bound: self.exprs(function.bound),
                ..function
            }),
            CoreExpr::Closure(closure) => CoreExpr::Closure(CoreClosure {
                body: self.body(closure.body),
                ..closure
            }),
            CoreExpr::Conditional(cond) => CoreExpr::Conditional(CoreConditional {
                test: self.boxed(cond.test),
                then_expr: self.boxed(cond.then_expr),
                else_expr: self.boxed(cond.else_expr),
                ..cond
            }),
            CoreExpr::ArrayGet(get) => CoreExpr::ArrayGet(CoreArrayGet {
                array: self.boxed(get.array),
                index: self.boxed(get.index),
                missing: match get.missing {
                    Missing::Default(default) => Missing::Default(self.boxed(default)),
                    other => other,
                },
                ..get
            }),
            CoreExpr::ArraySlice(slice) => CoreExpr::ArraySlice(CoreArraySlice {
                array: self.boxed(slice.array),
                ..slice
            }),
            CoreExpr::ArrayLength(len) => CoreExpr::ArrayLength(CoreArrayLength {
                array: self.boxed(len.array),
                ..len
            }),
        }
    }

    fn call(&mut self, call: CoreCall) -> CoreExpr {
        let CoreCall {
            callee,
            args,
            position,
            info,
        } = call;
        let args = self.exprs(args);
        let callee = match callee {
            Callee::Closure(closure) => {
                let closure = *closure;
                Callee::Closure(Box::new(CoreClosure {
                    body: self.body(closure.body),
                    ..closure
                }))
            }
            Callee::Dynamic(target) => Callee::Dynamic(self.boxed(target)),
            other => other,
        };
        let call = CoreCall {
            callee,
            args,
            position,
            info,
        };

        if self.calls_callee(&call)
            && self.callee.body.len() == 1
            && let Some(mut body) = inline_body(self.callee, &call.args)
            && let Some(expr) = body.pop()
        {
            self.done = true;
            return expr;
        }
        CoreExpr::Call(call)
    }
}

/// The body of `callee` with `args` substituted for its parameters, if that
/// keeps every effect in place.
fn inline_body(callee: &CoreFunction, args: &[CoreExpr]) -> Option<Vec<CoreExpr>> {
    if callee.body.is_empty() || callee.params.len() != args.len() {
        return None;
    }

    let mut effectful = None;
    for (param, arg) in callee.params.iter().zip(args) {
        if is_trivial(arg) {
            continue;
        }
        let uses = count_uses(&param.name, &callee.body);
        if is_pure(arg) {
            if uses > 1 {
                return None;
            }
            continue;
        }
        if effectful.is_some() || uses != 1 {
            return None;
        }
        effectful = Some(param.name.as_str());
    }

    if let Some(name) = effectful
        && leads(&callee.body, name) != Lead::Found
    {
        return None;
    }

    let subst: HashMap<&str, &CoreExpr> = callee
        .params
        .iter()
        .map(|p| p.name.as_str())
        .zip(args)
        .collect();
    Some(
        callee
            .body
            .iter()
            .map(|e| substitute(e.clone(), &subst))
            .collect(),
    )
}

fn is_trivial(expr: &CoreExpr) -> bool {
    matches!(expr, CoreExpr::Literal(_) | CoreExpr::Var(_))
}

/// Evaluating `expr` has no effect and cannot fail.
fn is_pure(expr: &CoreExpr) -> bool {
    match expr {
        CoreExpr::Literal(_) | CoreExpr::Var(_) => true,
        CoreExpr::Call(call) => {
            matches!(
                call.callee,
                Callee::Builtin(Builtin::Str | Builtin::Not | Builtin::IsNil | Builtin::Eq)
            ) && call.args.iter().all(is_pure)
        }
        CoreExpr::FunctionRef(function) => function.bound.iter().all(is_pure),
        CoreExpr::Closure(_) => false,
        CoreExpr::Conditional(cond) => {
            is_pure(&cond.test) && is_pure(&cond.then_expr) && is_pure(&cond.else_expr)
        }
        CoreExpr::ArrayGet(get) => {
            matches!(get.index.as_ref(), CoreExpr::Literal(_))
                && is_pure(&get.array)
                && match &get.missing {
                    Missing::Nil => true,
                    Missing::Default(default) => is_pure(default),
                    Missing::Fault => false,
                }
        }
        CoreExpr::ArraySlice(slice) => is_pure(&slice.array),
        CoreExpr::ArrayLength(len) => is_pure(&len.array),
    }
}

fn count_uses(name: &str, body: &[CoreExpr]) -> usize {
    let mut uses = 0;
    for expr in body {
        expr.walk(&mut |e| {
            if let CoreExpr::Var(var) = e
                && var.binding == Binding::Local
                && var.name == name
            {
                uses += 1;
            }
        });
    }
    uses
}

/// What evaluation meets first: a read of the variable, an effect, or the
/// end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lead {
    Found,
    Clean,
    Blocked,
}

fn leads(exprs: &[CoreExpr], name: &str) -> Lead {
    for expr in exprs {
        match lead(expr, name) {
            Lead::Clean => {}
            other => return other,
        }
    }
    Lead::Clean
}

fn lead(expr: &CoreExpr, name: &str) -> Lead {
    let settled = |expr: &CoreExpr| {
        if is_pure(expr) {
            Lead::Clean
        } else {
            Lead::Blocked
        }
    };

    match expr {
        CoreExpr::Var(var) if var.binding == Binding::Local && var.name == name => Lead::Found,
        CoreExpr::Literal(_) | CoreExpr::Var(_) => Lead::Clean,
        CoreExpr::Call(call) => match call.callee {
            Callee::Closure(_) | Callee::Dynamic(_) => Lead::Blocked,
            _ => match leads(&call.args, name) {
                Lead::Clean => settled(expr),
                other => other,
            },
        },
        CoreExpr::FunctionRef(function) => leads(&function.bound, name),
        CoreExpr::Closure(_) => Lead::Blocked,
        // only the test runs unconditionally
        CoreExpr::Conditional(cond) => match lead(&cond.test, name) {
            Lead::Clean => settled(expr),
            other => other,
        },
        CoreExpr::ArrayGet(get) => match lead(&get.array, name) {
            Lead::Clean => match lead(&get.index, name) {
                Lead::Clean => settled(expr),
                other => other,
            },
            other => other,
        },
        CoreExpr::ArraySlice(slice) => match lead(&slice.array, name) {
            Lead::Clean => settled(expr),
            other => other,
        },
        CoreExpr::ArrayLength(len) => match lead(&len.array, name) {
            Lead::Clean => settled(expr),
            other => other,
        },
    }
}

fn substitute(expr: CoreExpr, subst: &HashMap<&str, &CoreExpr>) -> CoreExpr {
    let boxed = |expr: Box<CoreExpr>| Box::new(substitute(*expr, subst));
    let all = |exprs: Vec<CoreExpr>| -> Vec<CoreExpr> {
        exprs.into_iter().map(|e| substitute(e, subst)).collect()
    };

    match expr {
        CoreExpr::Var(var) if var.binding == Binding::Local => {
            match subst.get(var.name.as_str()) {
                Some(arg) => (*arg).clone(),
                None => CoreExpr::Var(var),
            }
        }
        CoreExpr::Literal(_) | CoreExpr::Var(_) => expr,
        CoreExpr::Call(call) => CoreExpr::Call(CoreCall {
            callee: match call.callee {
                Callee::Closure(closure) => {
                    let closure = *closure;
                    Callee::Closure(Box::new(CoreClosure {
                        body: all(closure.body),
                        ..closure
                    }))
                }
                Callee::Dynamic(target) => Callee::Dynamic(boxed(target)),
                other => other,
            },
            args: all(call.args),
            ..call
        }),
        CoreExpr::FunctionRef(function) => CoreExpr::FunctionRef(CoreFunctionRef {
            bound: all(function.bound),
            ..function
        }),
        CoreExpr::Closure(closure) => CoreExpr::Closure(CoreClosure {
            body: all(closure.body),
            ..closure
        }),
        CoreExpr::Conditional(cond) => CoreExpr::Conditional(CoreConditional {
            test: boxed(cond.test),
            then_expr: boxed(cond.then_expr),
            else_expr: boxed(cond.else_expr),
            ..cond
        }),
        CoreExpr::ArrayGet(get) => CoreExpr::ArrayGet(CoreArrayGet {
            array: boxed(get.array),
            index: boxed(get.index),
            missing: match get.missing {
                Missing::Default(default) => Missing::Default(boxed(default)),
                other => other,
            },
            ..get
        }),
        CoreExpr::ArraySlice(slice) => CoreExpr::ArraySlice(CoreArraySlice {
            array: boxed(slice.array),
            ..slice
        }),
        CoreExpr::ArrayLength(len) => CoreExpr::ArrayLength(CoreArrayLength {
            array: boxed(len.array),
            ..len
        }),
    }
}

#[cfg(test)]
mod tests {
    use lachs::Span;

    use super::*;
    use crate::types::{TypeInfo, TypeSlot};

    fn local(name: &str) -> CoreExpr {
        CoreExpr::local(name, TypeInfo::Unknown, Span::default())
    }

    fn call(callee: Callee, args: Vec<CoreExpr>) -> CoreExpr {
        CoreExpr::Call(CoreCall {
            callee,
            args,
            position: Span::default(),
            info: TypeSlot::unknown(),
        })
    }

    fn lifted(params: &[&str], body: Vec<CoreExpr>) -> CoreFunction {
        CoreFunction {
            name: "let__0".to_string(),
            params: params
                .iter()
                .map(|p| CoreParam {
                    name: p.to_string(),
                    position: Span::default(),
                    info: TypeSlot::unknown(),
                })
                .collect(),
            body,
            returns: TypeSlot::unknown(),
            kind: FunctionKind::Lifted(ClosureOrigin::Let),
            variadic: false,
            position: Span::default(),
        }
    }

    fn program(definitions: Vec<CoreFunction>) -> CoreProgram {
        CoreProgram {
            namespace: None,
            entry: "-main".to_string(),
            definitions: definitions
                .into_iter()
                .map(CoreDefinition::Function)
                .collect(),
        }
    }

    fn main_with(body: Vec<CoreExpr>) -> CoreFunction {
        CoreFunction {
            name: "-main".to_string(),
            kind: FunctionKind::Defined,
            ..lifted(&[], body)
        }
    }

    #[test]
    fn single_use_function_is_dropped() {
        let callee = lifted(&["x"], vec![call(Callee::Builtin(Builtin::Not), vec![local("x")])]);
        let main = main_with(vec![call(
            Callee::Named("let__0".into()),
            vec![CoreExpr::nil(Span::default())],
        )]);
        let (program, report) = drop_program(program(vec![main, callee]));
        assert_eq!(report.dropped, vec!["let__0".to_string()]);
        assert_eq!(program.definitions.len(), 1);
        assert_eq!(
            program.function("-main").unwrap().body,
            vec![call(
                Callee::Builtin(Builtin::Not),
                vec![CoreExpr::nil(Span::default())]
            )]
        );
    }

    #[test]
    fn function_used_as_value_is_kept() {
        let callee = lifted(&["x"], vec![local("x")]);
        let reference = CoreExpr::FunctionRef(CoreFunctionRef {
            name: "let__0".to_string(),
            bound: vec![],
            position: Span::default(),
            info: TypeSlot::unknown(),
        });
        let main = main_with(vec![
            reference,
            call(Callee::Named("let__0".into()), vec![local("args")]),
        ]);
        let (program, report) = drop_program(program(vec![main, callee]));
        assert!(report.dropped.is_empty());
        assert!(program.function("let__0").is_some());
    }

    #[test]
    fn self_recursive_function_is_kept() {
        let callee = lifted(
            &["x"],
            vec![call(Callee::Named("let__0".into()), vec![local("x")])],
        );
        let main = main_with(vec![call(
            Callee::Named("let__0".into()),
            vec![local("args")],
        )]);
        let (_, report) = drop_program(program(vec![main, callee]));
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn effectful_argument_read_first_is_inlined() {
        let callee = lifted(
            &["x"],
            vec![call(Callee::Builtin(Builtin::Str), vec![local("x")])],
        );
        let arg = call(Callee::Named("read".into()), vec![]);
        let body = inline_body(&callee, &[arg.clone()]).unwrap();
        assert_eq!(body, vec![call(Callee::Builtin(Builtin::Str), vec![arg])]);
    }

    #[test]
    fn effectful_argument_after_another_effect_is_not_inlined() {
        let callee = lifted(
            &["x"],
            vec![
                call(Callee::Named("log".into()), vec![]),
                call(Callee::Builtin(Builtin::Str), vec![local("x")]),
            ],
        );
        let arg = call(Callee::Named("read".into()), vec![]);
        assert_eq!(inline_body(&callee, &[arg]), None);
    }

    #[test]
    fn effectful_argument_in_a_branch_is_not_inlined() {
        let callee = lifted(
            &["flag", "x"],
            vec![CoreExpr::Conditional(CoreConditional {
                test: Box::new(local("flag")),
                then_expr: Box::new(local("x")),
                else_expr: Box::new(CoreExpr::nil(Span::default())),
                position: Span::default(),
                info: TypeSlot::unknown(),
            })],
        );
        let arg = call(Callee::Named("read".into()), vec![]);
        assert_eq!(inline_body(&callee, &[local("f"), arg]), None);
    }

    #[test]
    fn unused_effectful_argument_is_not_dropped() {
        let callee = lifted(&["x"], vec![CoreExpr::nil(Span::default())]);
        let arg = call(Callee::Named("read".into()), vec![]);
        assert_eq!(inline_body(&callee, &[arg]), None);
    }

    #[test]
    fn pure_arguments_may_be_moved() {
        let callee = lifted(
            &["a", "b"],
            vec![
                call(Callee::Named("log".into()), vec![]),
                call(Callee::Builtin(Builtin::Str), vec![local("b"), local("a")]),
            ],
        );
        let pure = call(Callee::Builtin(Builtin::Not), vec![local("y")]);
        let body = inline_body(&callee, &[local("z"), pure.clone()]).unwrap();
        assert_eq!(
            body[1],
            call(Callee::Builtin(Builtin::Str), vec![pure, local("z")])
        );
    }
}
