//! Sequence-operation specialization
//!
//! Generic sequence operations whose receiver is known to be an array are
//! replaced by direct array access:
//!
//! | Call | Rewritten to |
//! |------|--------------|
//! | `(first xs)` | `ArrayGet(xs, 0)`, nil when empty |
//! | `(second xs)` | `ArrayGet(xs, 1)`, nil when too short |
//! | `(nth xs k)` | `ArrayGet(xs, k)`, faults when out of range |
//! | `(nth xs k d)` | `ArrayGet(xs, k)`, `d` when out of range |
//! | `(rest xs)` | `ArraySlice(xs, 1)` |
//! | `(next xs)` | `ArraySlice(xs, 1)`, nil when empty |
//! | `(count xs)` | `ArrayLength(xs)` |
//!
//! Calls on receivers of any other (or unknown) type are left alone.

use lachs::Span;
use log::{debug, trace};

use crate::core::*;
use crate::types::{Type, TypeInfo, TypeSlot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecializeReport {
    pub specialized: usize,
    /// Sequence operations left generic because the receiver is not an array
    pub generic: Vec<Span>,
}

pub fn specialize_program(program: CoreProgram) -> (CoreProgram, SpecializeReport) {
    let mut report = SpecializeReport::default();

    let definitions = program
        .definitions
        .into_iter()
        .map(|def| match def {
            CoreDefinition::Function(function) => CoreDefinition::Function(CoreFunction {
                body: specialize_body(function.body, &mut report),
                ..function
            }),
            CoreDefinition::Value(value) => CoreDefinition::Value(CoreValueDef {
                value: specialize_expr(value.value, &mut report),
                ..value
            }),
        })
        .collect();

    debug!(
        "specialized {} sequence operations, {} left generic",
        report.specialized,
        report.generic.len()
    );
    (
        CoreProgram {
            definitions,
            ..program
        },
        report,
    )
}

fn specialize_body(body: Vec<CoreExpr>, report: &mut SpecializeReport) -> Vec<CoreExpr> {
    body.into_iter()
        .map(|e| specialize_expr(e, report))
        .collect()
}

fn specialize_boxed(expr: Box<CoreExpr>, report: &mut SpecializeReport) -> Box<CoreExpr> {
    Box::new(specialize_expr(*expr, report))
}

pub fn specialize_expr(expr: CoreExpr, report: &mut SpecializeReport) -> CoreExpr {
    match expr {
        CoreExpr::Literal(_) | CoreExpr::Var(_) => expr,
        CoreExpr::Call(call) => specialize_call(call, report),
        CoreExpr::FunctionRef(function) => CoreExpr::FunctionRef(CoreFunctionRef {
            bound: specialize_body(function.bound, report),
            ..function
        }),
        CoreExpr::Closure(closure) => CoreExpr::Closure(specialize_closure(closure, report)),
        CoreExpr::Conditional(cond) => CoreExpr::Conditional(CoreConditional {
            test: specialize_boxed(cond.test, report),
            then_expr: specialize_boxed(cond.then_expr, report),
            else_expr: specialize_boxed(cond.else_expr, report),
            ..cond
        }),
        CoreExpr::ArrayGet(get) => CoreExpr::ArrayGet(CoreArrayGet {
            array: specialize_boxed(get.array, report),
            index: specialize_boxed(get.index, report),
            missing: match get.missing {
                Missing::Default(default) => Missing::Default(specialize_boxed(default, report)),
                other => other,
            },
            ..get
        }),
        CoreExpr::ArraySlice(slice) => CoreExpr::ArraySlice(CoreArraySlice {
            array: specialize_boxed(slice.array, report),
            ..slice
        }),
        CoreExpr::ArrayLength(len) => CoreExpr::ArrayLength(CoreArrayLength {
            array: specialize_boxed(len.array, report),
            ..len
        }),
    }
}

fn specialize_closure(closure: CoreClosure, report: &mut SpecializeReport) -> CoreClosure {
    CoreClosure {
        body: specialize_body(closure.body, report),
        ..closure
    }
}

fn specialize_call(call: CoreCall, report: &mut SpecializeReport) -> CoreExpr {
    let CoreCall {
        callee,
        args,
        position,
        info,
    } = call;
    let args = specialize_body(args, report);

    let callee = match callee {
        Callee::Builtin(builtin) => match builtin.sequence_op() {
            Some(op) => return rewrite(builtin, op, args, position, info, report),
            None => Callee::Builtin(builtin),
        },
        Callee::Closure(closure) => {
            Callee::Closure(Box::new(specialize_closure(*closure, report)))
        }
        Callee::Dynamic(target) => Callee::Dynamic(specialize_boxed(target, report)),
        other => other,
    };

    CoreExpr::Call(CoreCall {
        callee,
        args,
        position,
        info,
    })
}

fn rewrite(
    builtin: Builtin,
    op: SequenceOp,
    args: Vec<CoreExpr>,
    position: Span,
    info: TypeSlot,
    report: &mut SpecializeReport,
) -> CoreExpr {
    let mut args = args.into_iter();
    let array = match args.next() {
        Some(receiver) if matches!(receiver.ty(), TypeInfo::Array(_)) => Box::new(receiver),
        receiver => {
            trace!("leaving `{}` generic", builtin.symbol());
            report.generic.push(position.clone());
            return CoreExpr::Call(CoreCall {
                callee: Callee::Builtin(builtin),
                args: receiver.into_iter().chain(args).collect(),
                position,
                info,
            });
        }
    };
    let (index, default) = (args.next(), args.next());
    report.specialized += 1;

    match op {
        SequenceOp::First | SequenceOp::Second => {
            let offset = if op == SequenceOp::First { 0 } else { 1 };
            CoreExpr::ArrayGet(CoreArrayGet {
                array,
                index: Box::new(long_literal(offset, &position)),
                missing: Missing::Nil,
                position,
                info,
            })
        }
        SequenceOp::Nth => CoreExpr::ArrayGet(CoreArrayGet {
            array,
            index: Box::new(index.unwrap_or_else(|| long_literal(0, &position))),
            missing: match default {
                Some(default) => Missing::Default(Box::new(default)),
                None => Missing::Fault,
            },
            position,
            info,
        }),
        SequenceOp::Rest | SequenceOp::Next => CoreExpr::ArraySlice(CoreArraySlice {
            array,
            from: 1,
            nil_if_empty: op == SequenceOp::Next,
            position,
            info,
        }),
        SequenceOp::Count => CoreExpr::ArrayLength(CoreArrayLength {
            array,
            position,
            info,
        }),
    }
}

fn long_literal(value: i64, position: &Span) -> CoreExpr {
    CoreExpr::Literal(CoreLiteral {
        value: LiteralValue::Integer(value),
        position: position.clone(),
        info: TypeSlot::known(TypeInfo::Concrete(Type::Long)),
    })
}
