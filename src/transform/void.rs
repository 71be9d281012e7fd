//! Void-call normalization
//!
//! A void host method has no value, so it cannot be used where the language
//! expects one. Every distinct void method (per argument count) gets a
//! single adapter function that performs the call and then yields nil:
//!
//! ```text
//! (. System/out (println s))
//!   ⇒  (do_void__3 s)
//!
//! (defn do_void__3 [arg0] (. System/out (println arg0)) nil)
//! ```
//!
//! Afterwards the adapter bodies hold the only void calls in the program.

use indexmap::IndexMap;
use lachs::Span;
use log::debug;

use crate::core::*;
use crate::host::HostMethod;
use crate::types::{Type, TypeInfo, TypeSlot};

use super::NameGenerator;

#[derive(Debug, Clone, PartialEq)]
pub struct Adapter {
    pub name: String,
    pub method: HostMethod,
    pub params: Vec<TypeInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub adapters: Vec<Adapter>,
    /// Number of call sites routed through an adapter
    pub rewritten: usize,
}

impl NormalizeReport {
    pub fn adapter_for(&self, method: &HostMethod) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.method == *method)
    }
}

type Sites = IndexMap<(HostMethod, usize), Vec<Vec<TypeInfo>>>;

pub fn normalize_program(
    program: CoreProgram,
    names: &mut NameGenerator,
) -> (CoreProgram, NormalizeReport) {
    let mut sites = Sites::new();
    for function in program.functions() {
        if function.kind == FunctionKind::VoidAdapter {
            continue;
        }
        for expr in &function.body {
            expr.walk(&mut |e| record_site(e, &mut sites));
        }
    }
    for def in &program.definitions {
        if let CoreDefinition::Value(value) = def {
            value.value.walk(&mut |e| record_site(e, &mut sites));
        }
    }

    let adapters: IndexMap<(HostMethod, usize), Adapter> = sites
        .into_iter()
        .map(|((method, arity), calls)| {
            let params = (0..arity)
                .map(|i| {
                    let joined = TypeInfo::join_all(calls.iter().map(|args| &args[i]), false)
                        .unwrap_or_default();
                    if joined.is_concrete() {
                        joined
                    } else {
                        TypeInfo::Concrete(Type::Object)
                    }
                })
                .collect();
            let adapter = Adapter {
                name: names.fresh("do_void"),
                method,
                params,
            };
            ((method, arity), adapter)
        })
        .collect();

    let mut report = NormalizeReport::default();
    let mut definitions: Vec<CoreDefinition> = program
        .definitions
        .into_iter()
        .map(|def| match def {
            CoreDefinition::Function(function) if function.kind == FunctionKind::VoidAdapter => {
                CoreDefinition::Function(function)
            }
            CoreDefinition::Function(function) => CoreDefinition::Function(CoreFunction {
                body: rewrite_body(function.body, &adapters, &mut report),
                ..function
            }),
            CoreDefinition::Value(value) => CoreDefinition::Value(CoreValueDef {
                value: rewrite_expr(value.value, &adapters, &mut report),
                ..value
            }),
        })
        .collect();

    for adapter in adapters.into_values() {
        debug!(
            "adapter `{}` for `{}` ({} parameter(s))",
            adapter.name,
            adapter.method,
            adapter.params.len()
        );
        definitions.push(CoreDefinition::Function(build_adapter(&adapter)));
        report.adapters.push(adapter);
    }

    debug!(
        "routed {} void calls through {} adapters",
        report.rewritten,
        report.adapters.len()
    );
    (
        CoreProgram {
            definitions,
            ..program
        },
        report,
    )
}

fn record_site(expr: &CoreExpr, sites: &mut Sites) {
    if let CoreExpr::Call(CoreCall {
        callee: Callee::Host(method),
        args,
        ..
    }) = expr
        && method.is_void()
    {
        sites
            .entry((*method, args.len()))
            .or_default()
            .push(args.iter().map(|a| a.ty().clone()).collect());
    }
}

/// `(defn do_void__N [arg0 ...] (host-call arg0 ...) nil)`
fn build_adapter(adapter: &Adapter) -> CoreFunction {
    let position = Span::default();
    let params: Vec<CoreParam> = adapter
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| CoreParam {
            name: format!("arg{}", i),
            position: position.clone(),
            info: TypeSlot::known(ty.clone()),
        })
        .collect();

    let call = CoreExpr::Call(CoreCall {
        callee: Callee::Host(adapter.method),
        args: params
            .iter()
            .map(|p| CoreExpr::local(p.name.clone(), p.info.get().clone(), position.clone()))
            .collect(),
        position: position.clone(),
        info: TypeSlot::known(TypeInfo::nil()),
    });

    CoreFunction {
        name: adapter.name.clone(),
        params,
        body: vec![call, CoreExpr::nil(position.clone())],
        returns: TypeSlot::known(TypeInfo::nil()),
        kind: FunctionKind::VoidAdapter,
        variadic: false,
        position,
    }
}

type Adapters = IndexMap<(HostMethod, usize), Adapter>;

fn rewrite_body(
    body: Vec<CoreExpr>,
    adapters: &Adapters,
    report: &mut NormalizeReport,
) -> Vec<CoreExpr> {
    body.into_iter()
        .map(|e| rewrite_expr(e, adapters, report))
        .collect()
}

fn rewrite_boxed(
    expr: Box<CoreExpr>,
    adapters: &Adapters,
    report: &mut NormalizeReport,
) -> Box<CoreExpr> {
    Box::new(rewrite_expr(*expr, adapters, report))
}

fn rewrite_expr(expr: CoreExpr, adapters: &Adapters, report: &mut NormalizeReport) -> CoreExpr {
    match expr {
        CoreExpr::Literal(_) | CoreExpr::Var(_) => expr,
        CoreExpr::Call(call) => {
            let args = rewrite_body(call.args, adapters, report);
            let callee = match call.callee {
                Callee::Host(method) => match adapters.get(&(method, args.len())) {
                    Some(adapter) => {
                        report.rewritten += 1;
                        Callee::Named(adapter.name.clone())
                    }
                    None => Callee::Host(method),
                },
                Callee::Closure(closure) => Callee::Closure(Box::new(CoreClosure {
                    body: rewrite_body(closure.body, adapters, report),
                    ..*closure
                })),
                Callee::Dynamic(target) => Callee::Dynamic(rewrite_boxed(target, adapters, report)),
                other => other,
            };
            CoreExpr::Call(CoreCall {
                callee,
                args,
                ..call
            })
        }
        CoreExpr::FunctionRef(function) => CoreExpr::FunctionRef(CoreFunctionRef {
            bound: rewrite_body(function.bound, adapters, report),
            ..function
        }),
        CoreExpr::Closure(closure) => CoreExpr::Closure(CoreClosure {
            body: rewrite_body(closure.body, adapters, report),
            ..closure
        }),
        CoreExpr::Conditional(cond) => CoreExpr::Conditional(CoreConditional {
            test: rewrite_boxed(cond.test, adapters, report),
            then_expr: rewrite_boxed(cond.then_expr, adapters, report),
            else_expr: rewrite_boxed(cond.else_expr, adapters, report),
            ..cond
        }),
        CoreExpr::ArrayGet(get) => CoreExpr::ArrayGet(CoreArrayGet {
            array: rewrite_boxed(get.array, adapters, report),
            index: rewrite_boxed(get.index, adapters, report),
            missing: match get.missing {
                Missing::Default(default) => {
                    Missing::Default(rewrite_boxed(default, adapters, report))
                }
                other => other,
            },
            ..get
        }),
        CoreExpr::ArraySlice(slice) => CoreExpr::ArraySlice(CoreArraySlice {
            array: rewrite_boxed(slice.array, adapters, report),
            ..slice
        }),
        CoreExpr::ArrayLength(len) => CoreExpr::ArrayLength(CoreArrayLength {
            array: rewrite_boxed(len.array, adapters, report),
            ..len
        }),
    }
}
