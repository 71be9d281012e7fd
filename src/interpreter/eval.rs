use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::core::*;

use super::scope::Scope;
use super::value::{ClosureValue, Value};
use super::{HostEnv, RuntimeError, RuntimeResult};

const MAX_DEPTH: usize = 256;

/// Evaluates a core program.
pub struct Interpreter<'a> {
    program: &'a CoreProgram,
    functions: HashMap<&'a str, &'a CoreFunction>,
    /// Evaluated top-level values, in definition order
    values: HashMap<&'a str, Value>,
    host: HostEnv,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    /// Prepare `program` for evaluation. Top-level values are evaluated
    /// right away, in definition order.
    pub fn new(program: &'a CoreProgram, host: HostEnv) -> RuntimeResult<Self> {
        let mut interpreter = Interpreter {
            program,
            functions: program.functions().map(|f| (f.name.as_str(), f)).collect(),
            values: HashMap::new(),
            host,
            depth: 0,
        };

        for def in &program.definitions {
            if let CoreDefinition::Value(value) = def {
                let result = interpreter.eval(&value.value, &mut Scope::new())?;
                interpreter.values.insert(&value.name, result);
            }
        }
        Ok(interpreter)
    }

    pub fn host(&self) -> &HostEnv {
        &self.host
    }

    pub fn into_host(self) -> HostEnv {
        self.host
    }

    /// Call the entry function with command line arguments. An entry without
    /// parameters ignores them.
    pub fn run_entry(&mut self, args: &[&str]) -> RuntimeResult<Value> {
        let entry = self.program.entry.as_str();
        let Some(function) = self.functions.get(entry) else {
            return Err(RuntimeError::UnknownFunction(entry.to_string()));
        };
        let args = if function.params.is_empty() {
            vec![]
        } else {
            vec![Value::array(args.iter().map(|a| Value::from(*a)).collect())]
        };
        self.call_function(entry, args)
    }

    /// Call a top-level function by name.
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let Some(function) = self.functions.get(name).copied() else {
            return match self.values.get(name).cloned() {
                Some(value) => self.apply(value, args),
                None => Err(RuntimeError::UnknownFunction(name.to_string())),
            };
        };
        if function.params.len() != args.len() {
            return Err(RuntimeError::Arity {
                name: name.to_string(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        trace!("call `{}` with {} argument(s)", name, args.len());

        let mut scope = Scope::new();
        for (param, arg) in function.params.iter().zip(args) {
            scope.add(&param.name, arg);
        }
        self.nested(|this| this.body(&function.body, &mut scope))
    }

    fn nested(
        &mut self,
        run: impl FnOnce(&mut Self) -> RuntimeResult<Value>,
    ) -> RuntimeResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(RuntimeError::StackOverflow(MAX_DEPTH));
        }
        self.depth += 1;
        let result = run(self);
        self.depth -= 1;
        result
    }

    /// Call any callable value.
    pub fn apply(&mut self, callee: Value, mut args: Vec<Value>) -> RuntimeResult<Value> {
        match callee {
            Value::Function { name, bound } => {
                args.extend(bound);
                self.call_function(&name, args)
            }
            Value::Closure(closure) => {
                let mut scope = Scope::with_env(closure.env.clone());
                scope.enter();
                if let Some(name) = &closure.closure.self_name {
                    scope.add(name, Value::Closure(closure.clone()));
                }
                self.bind_params(&closure.closure, args, &mut scope)?;
                self.nested(|this| this.body(&closure.closure.body, &mut scope))
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn bind_params(
        &self,
        closure: &CoreClosure,
        args: Vec<Value>,
        scope: &mut Scope,
    ) -> RuntimeResult<()> {
        if closure.params.len() != args.len() {
            return Err(RuntimeError::Arity {
                name: closure
                    .self_name
                    .clone()
                    .unwrap_or_else(|| format!("fn{}", closure.id)),
                expected: closure.params.len(),
                found: args.len(),
            });
        }
        for (param, arg) in closure.params.iter().zip(args) {
            scope.add(&param.name, arg);
        }
        Ok(())
    }

    fn body(&mut self, body: &[CoreExpr], scope: &mut Scope) -> RuntimeResult<Value> {
        let mut last = Value::Nil;
        for expr in body {
            last = self.eval(expr, scope)?;
        }
        Ok(last)
    }

    fn args(&mut self, args: &[CoreExpr], scope: &mut Scope) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    pub fn eval(&mut self, expr: &CoreExpr, scope: &mut Scope) -> RuntimeResult<Value> {
        match expr {
            CoreExpr::Literal(literal) => Ok(match &literal.value {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Boolean(b) => Value::Bool(*b),
                LiteralValue::Integer(i) => Value::Long(*i),
                LiteralValue::String(s) => Value::string(s.as_str()),
            }),
            CoreExpr::Var(var) => self.var(var, scope),
            CoreExpr::Call(call) => self.call(call, scope),
            CoreExpr::FunctionRef(function) => Ok(Value::Function {
                name: function.name.clone(),
                bound: self.args(&function.bound, scope)?,
            }),
            CoreExpr::Closure(closure) => Ok(Value::Closure(Rc::new(ClosureValue {
                closure: closure.clone(),
                env: scope.capture(),
            }))),
            CoreExpr::Conditional(cond) => {
                if self.eval(&cond.test, scope)?.is_truthy() {
                    self.eval(&cond.then_expr, scope)
                } else {
                    self.eval(&cond.else_expr, scope)
                }
            }
            CoreExpr::ArrayGet(get) => {
                let array = self.eval(&get.array, scope)?;
                let index = self.eval(&get.index, scope)?;
                let default = match &get.missing {
                    Missing::Default(default) => Some(self.eval(default, scope)?),
                    Missing::Nil => Some(Value::Nil),
                    Missing::Fault => None,
                };
                let items = expect_array("aget", &array)?;
                let index = expect_long("aget", &index)?;
                match (element(items, index), default) {
                    (Some(value), _) => Ok(value.clone()),
                    (None, Some(default)) => Ok(default),
                    (None, None) => Err(RuntimeError::IndexOutOfBounds {
                        index,
                        length: items.len(),
                    }),
                }
            }
            CoreExpr::ArraySlice(slice) => {
                let array = self.eval(&slice.array, scope)?;
                let items = expect_array("aslice", &array)?;
                let rest: Vec<Value> = items.iter().skip(slice.from).cloned().collect();
                if rest.is_empty() && slice.nil_if_empty {
                    Ok(Value::Nil)
                } else {
                    Ok(Value::array(rest))
                }
            }
            CoreExpr::ArrayLength(len) => {
                let array = self.eval(&len.array, scope)?;
                Ok(Value::Long(expect_array("alength", &array)?.len() as i64))
            }
        }
    }

    fn var(&self, var: &CoreVar, scope: &Scope) -> RuntimeResult<Value> {
        match var.binding {
            Binding::Local => scope
                .resolve(&var.name)
                .cloned()
                .ok_or_else(|| RuntimeError::UnboundVariable(var.name.clone())),
            Binding::Global => {
                if let Some(value) = self.values.get(var.name.as_str()) {
                    Ok(value.clone())
                } else if self.functions.contains_key(var.name.as_str()) {
                    Ok(Value::Function {
                        name: var.name.clone(),
                        bound: vec![],
                    })
                } else {
                    Err(RuntimeError::UnboundVariable(var.name.clone()))
                }
            }
        }
    }

    fn call(&mut self, call: &CoreCall, scope: &mut Scope) -> RuntimeResult<Value> {
        match &call.callee {
            Callee::Named(name) => {
                let args = self.args(&call.args, scope)?;
                self.call_function(name, args)
            }
            Callee::Builtin(builtin) => {
                let args = self.args(&call.args, scope)?;
                builtin_call(*builtin, args)
            }
            Callee::Host(method) => {
                let args = self.args(&call.args, scope)?;
                self.host.invoke(method, args)
            }
            Callee::Closure(closure) => {
                let args = self.args(&call.args, scope)?;
                scope.enter();
                if let Some(name) = &closure.self_name {
                    let this = Value::Closure(Rc::new(ClosureValue {
                        closure: closure.as_ref().clone(),
                        env: scope.capture(),
                    }));
                    scope.add(name, this);
                }
                let result = match self.bind_params(closure, args, scope) {
                    Ok(()) => self.nested(|this| this.body(&closure.body, scope)),
                    Err(err) => Err(err),
                };
                scope.leave();
                result
            }
            Callee::Dynamic(target) => {
                let callee = self.eval(target, scope)?;
                let args = self.args(&call.args, scope)?;
                self.apply(callee, args)
            }
        }
    }
}

fn element(items: &[Value], index: i64) -> Option<&Value> {
    usize::try_from(index).ok().and_then(|i| items.get(i))
}

fn expect_array<'v>(operation: &str, value: &'v Value) -> RuntimeResult<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        other => Err(mismatch(operation, other)),
    }
}

fn expect_long(operation: &str, value: &Value) -> RuntimeResult<i64> {
    match value {
        Value::Long(i) => Ok(*i),
        other => Err(mismatch(operation, other)),
    }
}

fn mismatch(operation: &str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: operation.to_string(),
        found: found.type_name(),
    }
}

/// Items of anything `first`/`rest`/`count` accept; `None` for nil.
fn sequence(builtin: Builtin, value: &Value) -> RuntimeResult<Option<Vec<Value>>> {
    match value {
        Value::Nil => Ok(None),
        Value::Array(items) => Ok(Some(items.to_vec())),
        Value::Str(s) => Ok(Some(
            s.chars().map(|c| Value::string(c.to_string())).collect(),
        )),
        other => Err(mismatch(builtin.symbol(), other)),
    }
}

fn longs(builtin: Builtin, args: &[Value]) -> RuntimeResult<Vec<i64>> {
    args.iter().map(|a| expect_long(builtin.symbol(), a)).collect()
}

fn checked(
    builtin: Builtin,
    values: Vec<i64>,
    identity: i64,
    op: fn(i64, i64) -> Option<i64>,
) -> RuntimeResult<Value> {
    values
        .into_iter()
        .try_fold(None, |acc: Option<i64>, v| match acc {
            None => Ok(Some(v)),
            Some(acc) => op(acc, v)
                .map(Some)
                .ok_or_else(|| RuntimeError::Overflow(builtin.symbol().to_string())),
        })
        .map(|result| Value::Long(result.unwrap_or(identity)))
}

fn builtin_call(builtin: Builtin, args: Vec<Value>) -> RuntimeResult<Value> {
    let (min, max) = builtin.arity();
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(RuntimeError::Arity {
            name: builtin.symbol().to_string(),
            expected: min,
            found: args.len(),
        });
    }
    let overflow = || RuntimeError::Overflow(builtin.symbol().to_string());

    match builtin {
        Builtin::First | Builtin::Second => {
            let offset = if builtin == Builtin::First { 0 } else { 1 };
            let items = sequence(builtin, &args[0])?.unwrap_or_default();
            Ok(items.into_iter().nth(offset).unwrap_or(Value::Nil))
        }
        Builtin::Rest => {
            let items = sequence(builtin, &args[0])?.unwrap_or_default();
            Ok(Value::array(items.into_iter().skip(1).collect()))
        }
        Builtin::Next => {
            let items = sequence(builtin, &args[0])?.unwrap_or_default();
            let rest: Vec<Value> = items.into_iter().skip(1).collect();
            Ok(if rest.is_empty() {
                Value::Nil
            } else {
                Value::array(rest)
            })
        }
        Builtin::Count => {
            let items = sequence(builtin, &args[0])?.unwrap_or_default();
            Ok(Value::Long(items.len() as i64))
        }
        Builtin::Nth => {
            let items = sequence(builtin, &args[0])?.unwrap_or_default();
            let index = expect_long("nth", &args[1])?;
            match (element(&items, index), args.get(2)) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(RuntimeError::IndexOutOfBounds {
                    index,
                    length: items.len(),
                }),
            }
        }
        Builtin::Str => Ok(Value::string(
            args.iter().map(Value::to_str).collect::<String>(),
        )),
        Builtin::Add => checked(builtin, longs(builtin, &args)?, 0, i64::checked_add),
        Builtin::Mul => checked(builtin, longs(builtin, &args)?, 1, i64::checked_mul),
        Builtin::Sub => {
            let values = longs(builtin, &args)?;
            match values.as_slice() {
                [single] => single.checked_neg().map(Value::Long).ok_or_else(overflow),
                _ => checked(builtin, values, 0, i64::checked_sub),
            }
        }
        Builtin::Inc => expect_long("inc", &args[0])?
            .checked_add(1)
            .map(Value::Long)
            .ok_or_else(overflow),
        Builtin::Dec => expect_long("dec", &args[0])?
            .checked_sub(1)
            .map(Value::Long)
            .ok_or_else(overflow),
        Builtin::Eq => Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1]))),
        Builtin::Lt | Builtin::Gt | Builtin::Le | Builtin::Ge => {
            let values = longs(builtin, &args)?;
            let holds = |a: i64, b: i64| match builtin {
                Builtin::Lt => a < b,
                Builtin::Gt => a > b,
                Builtin::Le => a <= b,
                _ => a >= b,
            };
            Ok(Value::Bool(values.windows(2).all(|w| holds(w[0], w[1]))))
        }
        Builtin::Not => Ok(Value::Bool(!args[0].is_truthy())),
        Builtin::IsNil => Ok(Value::Bool(args[0] == Value::Nil)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Value {
        Value::array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn first_of_empty_or_nil_is_nil() {
        assert_eq!(builtin_call(Builtin::First, vec![strings(&[])]), Ok(Value::Nil));
        assert_eq!(builtin_call(Builtin::First, vec![Value::Nil]), Ok(Value::Nil));
        assert_eq!(
            builtin_call(Builtin::First, vec![strings(&["a", "b"])]),
            Ok(Value::from("a"))
        );
    }

    #[test]
    fn next_and_rest_differ_on_the_last_element() {
        assert_eq!(builtin_call(Builtin::Next, vec![strings(&["a"])]), Ok(Value::Nil));
        assert_eq!(
            builtin_call(Builtin::Rest, vec![strings(&["a"])]),
            Ok(strings(&[]))
        );
    }

    #[test]
    fn nth_faults_without_default() {
        let err = builtin_call(Builtin::Nth, vec![strings(&["a"]), Value::Long(3)]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::IndexOutOfBounds {
                index: 3,
                length: 1
            }
        );
        assert_eq!(
            builtin_call(
                Builtin::Nth,
                vec![strings(&["a"]), Value::Long(3), Value::from("d")]
            ),
            Ok(Value::from("d"))
        );
    }

    #[test]
    fn arithmetic_is_checked() {
        assert_eq!(
            builtin_call(Builtin::Add, vec![Value::Long(1), Value::Long(2)]),
            Ok(Value::Long(3))
        );
        assert_eq!(builtin_call(Builtin::Mul, vec![]), Ok(Value::Long(1)));
        assert_eq!(builtin_call(Builtin::Sub, vec![Value::Long(5)]), Ok(Value::Long(-5)));
        assert_eq!(
            builtin_call(Builtin::Inc, vec![Value::Long(i64::MAX)]),
            Err(RuntimeError::Overflow("inc".into()))
        );
    }

    #[test]
    fn str_skips_nil() {
        assert_eq!(
            builtin_call(
                Builtin::Str,
                vec![Value::from("a"), Value::Nil, Value::Long(1)]
            ),
            Ok(Value::from("a1"))
        );
    }

    #[test]
    fn comparisons_chain() {
        let values = vec![Value::Long(1), Value::Long(2), Value::Long(2)];
        assert_eq!(builtin_call(Builtin::Le, values.clone()), Ok(Value::Bool(true)));
        assert_eq!(builtin_call(Builtin::Lt, values), Ok(Value::Bool(false)));
    }
}
