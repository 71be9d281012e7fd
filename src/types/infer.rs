//! # Fixed-Point Type Inference
//!
//! Types flow from the entry signature into the rest of the program along
//! call edges. Each round:
//!
//! 1. collects every [`CallSite`] with the argument types known so far,
//! 2. narrows the parameters of each function or closure that does not
//!    escape to the join of its incoming argument types,
//! 3. walks all bodies bottom-up and narrows expression and return slots.
//!
//! Rounds repeat until nothing changes. Every slot moves at most once from
//! unknown to concrete (arrays may refine their element type once more), so
//! the loop terminates.
//!
//! ## Escaping
//!
//! A function referenced as a value may be called from places inference
//! cannot see, so its parameters are left alone. The same holds for a
//! closure unless it is bound by `let` and only ever called through that
//! binding.
//!
//! ## Recursion
//!
//! A recursive call whose argument (or result) is still unknown says nothing
//! new about the function: it is skipped when joining call sites and
//! conditional branches, so that `(defn f [xs] (if ... (f (rest xs)) ...))`
//! still picks up the type flowing in from outside.
//!
//! Skipping is a guess. After convergence every call site is checked against
//! the parameter types and every conditional against both of its branches.
//! A guess that turned out wrong is withdrawn and inference starts over from
//! the original program, so a committed slot always fits every value that
//! reaches it.

use std::collections::{HashMap, HashSet};

use lachs::Span;
use log::{debug, trace, warn};

use crate::config::{EntrySignature, InferConfig};
use crate::core::{
    Binding, Builtin, Callee, ClosureId, CoreCall, CoreClosure, CoreDefinition, CoreExpr,
    CoreFunction, CoreProgram, LiteralValue, Missing,
};

use super::ty::{Type, TypeInfo, TypeSlot};

/// What a call site calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// A top-level function or closure-valued global
    Function(String),
    Closure(ClosureId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub target: CallTarget,
    pub args: Vec<TypeInfo>,
    pub position: Span,
    /// The call happens inside the body of its own target
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Parameter(String),
    Return,
    Expression,
}

/// A slot that is still not concrete after the fixed point was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Uninferred {
    /// Top-level definition the slot belongs to
    pub owner: String,
    pub slot: SlotKind,
    pub position: Span,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceReport {
    pub rounds: usize,
    /// Total number of slot narrowings
    pub changes: usize,
    /// Attempts thrown away because an assumption about recursion was wrong
    pub retries: usize,
    pub uninferred: Vec<Uninferred>,
}

impl InferenceReport {
    pub fn is_complete(&self) -> bool {
        self.uninferred.is_empty()
    }
}

/// Infer types for the whole program in place.
///
/// Skipping still-unknown recursive call sites is an assumption about what
/// those sites will turn out to be. Each attempt runs on a copy of the
/// program; once it converges the assumptions are checked against the final
/// types, and the ones that were wrong are withdrawn before the next
/// attempt. Only a consistent attempt is written back.
pub fn infer_program(
    program: &mut CoreProgram,
    entry: &EntrySignature,
    config: &InferConfig,
) -> InferenceReport {
    let mut assumptions = Assumptions::default();
    let mut retries = 0;

    let mut report = loop {
        let mut scratch = program.clone();
        let attempt = fixed_point(&mut scratch, entry, config, &assumptions);
        if attempt.conflicts.is_empty() || assumptions.pessimistic {
            *program = scratch;
            break InferenceReport {
                rounds: attempt.rounds,
                changes: attempt.changes,
                retries,
                uninferred: vec![],
            };
        }

        debug!(
            "inference attempt {} made {} wrong assumptions, retrying",
            retries + 1,
            attempt.conflicts.len()
        );
        if !assumptions.withdraw(&attempt.conflicts) {
            assumptions.pessimistic = true;
        }
        retries += 1;
    };

    report.uninferred = uninferred(program);
    for slot in &report.uninferred {
        let what = match &slot.slot {
            SlotKind::Parameter(name) => format!("parameter `{}`", name),
            SlotKind::Return => "return type".to_string(),
            SlotKind::Expression => "expression".to_string(),
        };
        warn!("could not infer {} in `{}`", what, slot.owner);
    }

    debug!(
        "inference finished after {} rounds ({} retries) with {} changes, {} uninferred",
        report.rounds,
        report.retries,
        report.changes,
        report.uninferred.len()
    );
    report
}

/// A conditional, identified by its definition and its position in walk
/// order.
type BranchKey = (usize, usize);

/// An optimistic assumption that did not hold once inference converged.
#[derive(Debug, Clone, PartialEq)]
enum Conflict {
    /// A call site passes something the parameter type does not admit
    Parameter(CallTarget, usize),
    /// A conditional was typed without one of its branches
    Branch(BranchKey),
    Other,
}

#[derive(Debug, Default)]
struct Assumptions {
    /// Parameters that are no longer narrowed from their call sites
    pinned: HashMap<CallTarget, HashSet<usize>>,
    /// Conditionals that always join both branches
    strict: HashSet<BranchKey>,
    /// Skip nothing at all
    pessimistic: bool,
}

impl Assumptions {
    fn is_pinned(&self, target: &CallTarget, index: usize) -> bool {
        self.pinned
            .get(target)
            .is_some_and(|pinned| pinned.contains(&index))
    }

    /// Returns whether anything was withdrawn that was not before.
    fn withdraw(&mut self, conflicts: &[Conflict]) -> bool {
        let mut progress = false;
        for conflict in conflicts {
            progress |= match conflict {
                Conflict::Parameter(target, index) => self
                    .pinned
                    .entry(target.clone())
                    .or_default()
                    .insert(*index),
                Conflict::Branch(key) => self.strict.insert(*key),
                Conflict::Other => false,
            };
        }
        progress
    }
}

#[derive(Debug, Default)]
struct Attempt {
    rounds: usize,
    changes: usize,
    /// Found in the last round, the one that changed nothing
    conflicts: Vec<Conflict>,
}

fn fixed_point(
    program: &mut CoreProgram,
    entry: &EntrySignature,
    config: &InferConfig,
    assumptions: &Assumptions,
) -> Attempt {
    let mut attempt = Attempt::default();

    loop {
        attempt.rounds += 1;
        let facts = collect(program);
        let narrowing = param_types(&facts, entry, config.object_supertype, assumptions);
        trace!(
            "round {}: {} call sites, {} narrowing targets",
            attempt.rounds,
            facts.sites.len(),
            narrowing.len()
        );

        let mut changes = 0;
        let mut conflicts = vec![];
        for (index, def) in program.definitions.iter_mut().enumerate() {
            let mut walker = Walker {
                facts: &facts,
                narrowing: &narrowing,
                bindings: &facts.bindings[index],
                entry,
                assumptions,
                object_supertype: config.object_supertype,
                current: def.name().to_string(),
                self_names: vec![],
                index,
                branches: 0,
                changes: 0,
                conflicts: vec![],
            };
            walker.definition(def);
            changes += walker.changes;
            conflicts.append(&mut walker.conflicts);
        }

        attempt.changes += changes;
        if changes == 0 {
            conflicts.extend(param_conflicts(
                &facts,
                entry,
                config.object_supertype,
                assumptions,
            ));
            attempt.conflicts = conflicts;
            return attempt;
        }
    }
}

#[derive(Debug, Clone)]
struct Signature {
    params: Vec<TypeInfo>,
    returns: TypeInfo,
    variadic: bool,
}

impl Signature {
    fn of_function(function: &CoreFunction) -> Self {
        Self {
            params: function.params.iter().map(|p| p.info.get().clone()).collect(),
            returns: function.returns.get().clone(),
            variadic: function.variadic,
        }
    }

    fn of_closure(closure: &CoreClosure) -> Self {
        Self {
            params: closure.params.iter().map(|p| p.info.get().clone()).collect(),
            returns: closure.returns.get().clone(),
            variadic: false,
        }
    }
}

/// Read-only snapshot of the program taken at the start of each round.
#[derive(Debug, Default)]
struct Facts {
    sites: Vec<CallSite>,
    functions: HashMap<String, Signature>,
    closures: HashMap<ClosureId, Signature>,
    values: HashMap<String, TypeInfo>,
    /// Closures that are the value of a top-level `def`
    global_closures: HashMap<ClosureId, String>,
    escaping_functions: HashSet<String>,
    escaping_closures: HashSet<ClosureId>,
    /// Per definition: locals that name a `let`-bound (or self-named) closure
    bindings: Vec<HashMap<String, ClosureId>>,
}

impl Facts {
    fn signature(&self, target: &CallTarget) -> Option<&Signature> {
        match target {
            CallTarget::Function(name) => self.functions.get(name),
            CallTarget::Closure(id) => self.closures.get(id),
        }
    }

    /// Number of parameters of `target`, if its parameters may be narrowed
    /// from call sites at all.
    fn narrowable_arity(&self, target: &CallTarget, entry: &EntrySignature) -> Option<usize> {
        let escaping = match target {
            CallTarget::Function(name) => {
                *name == entry.name || self.escaping_functions.contains(name)
            }
            CallTarget::Closure(id) => self.escaping_closures.contains(id),
        };
        if escaping {
            return None;
        }
        self.signature(target)
            .filter(|signature| !signature.variadic)
            .map(|signature| signature.params.len())
    }

    fn target_of(&self, id: ClosureId) -> CallTarget {
        match self.global_closures.get(&id) {
            Some(name) => CallTarget::Function(name.clone()),
            None => CallTarget::Closure(id),
        }
    }
}

fn collect(program: &CoreProgram) -> Facts {
    let mut facts = Facts::default();

    for def in &program.definitions {
        match def {
            CoreDefinition::Function(function) => {
                facts
                    .functions
                    .insert(function.name.clone(), Signature::of_function(function));
            }
            CoreDefinition::Value(value) => match &value.value {
                CoreExpr::Closure(closure) => {
                    facts.global_closures.insert(closure.id, value.name.clone());
                    facts
                        .functions
                        .insert(value.name.clone(), Signature::of_closure(closure));
                }
                other => {
                    facts.values.insert(value.name.clone(), other.ty().clone());
                }
            },
        }
    }

    for def in &program.definitions {
        let mut collector = Collector {
            owners: vec![CallTarget::Function(def.name().to_string())],
            facts: &mut facts,
            bindings: HashMap::new(),
            binders: HashMap::new(),
            value_refs: HashSet::new(),
            value_closures: vec![],
        };
        match def {
            CoreDefinition::Function(function) => {
                function.body.iter().for_each(|e| collector.expr(e));
            }
            CoreDefinition::Value(value) => match &value.value {
                CoreExpr::Closure(closure) => collector.closure_body(closure),
                other => collector.expr(other),
            },
        }
        collector.finish();
    }

    facts
}

struct Collector<'a> {
    facts: &'a mut Facts,
    owners: Vec<CallTarget>,
    bindings: HashMap<String, ClosureId>,
    binders: HashMap<ClosureId, Vec<String>>,
    /// Locals referenced in value position
    value_refs: HashSet<String>,
    value_closures: Vec<ClosureId>,
}

impl Collector<'_> {
    fn expr(&mut self, expr: &CoreExpr) {
        match expr {
            CoreExpr::Literal(_) => {}
            CoreExpr::Var(var) => match var.binding {
                Binding::Local => {
                    self.value_refs.insert(var.name.clone());
                }
                Binding::Global => {
                    if self.facts.functions.contains_key(&var.name) {
                        self.facts.escaping_functions.insert(var.name.clone());
                    }
                }
            },
            CoreExpr::Call(call) => self.call(call),
            CoreExpr::FunctionRef(function) => {
                self.facts.escaping_functions.insert(function.name.clone());
                function.bound.iter().for_each(|e| self.expr(e));
            }
            CoreExpr::Closure(closure) => {
                self.value_closures.push(closure.id);
                self.closure_body(closure);
            }
            CoreExpr::Conditional(cond) => {
                self.expr(&cond.test);
                self.expr(&cond.then_expr);
                self.expr(&cond.else_expr);
            }
            CoreExpr::ArrayGet(get) => {
                self.expr(&get.array);
                self.expr(&get.index);
                if let Missing::Default(default) = &get.missing {
                    self.expr(default);
                }
            }
            CoreExpr::ArraySlice(slice) => self.expr(&slice.array),
            CoreExpr::ArrayLength(len) => self.expr(&len.array),
        }
    }

    fn call(&mut self, call: &CoreCall) {
        call.args.iter().for_each(|e| self.expr(e));

        let target = match &call.callee {
            Callee::Named(name) => Some(CallTarget::Function(name.clone())),
            Callee::Closure(closure) => {
                for (param, arg) in closure.params.iter().zip(&call.args) {
                    if let CoreExpr::Closure(bound) = arg {
                        self.bind(&param.name, bound.id);
                    }
                }
                self.closure_body(closure);
                Some(self.facts.target_of(closure.id))
            }
            Callee::Dynamic(callee) => match callee.as_ref() {
                CoreExpr::Var(var) if var.binding == Binding::Local => self
                    .bindings
                    .get(&var.name)
                    .map(|id| self.facts.target_of(*id)),
                other => {
                    self.expr(other);
                    None
                }
            },
            Callee::Builtin(_) | Callee::Host(_) => None,
        };

        if let Some(target) = target {
            let recursive = self.owners.contains(&target);
            self.facts.sites.push(CallSite {
                target,
                args: call.args.iter().map(|a| a.ty().clone()).collect(),
                position: call.position.clone(),
                recursive,
            });
        }
    }

    fn bind(&mut self, name: &str, id: ClosureId) {
        self.bindings.insert(name.to_string(), id);
        self.binders.entry(id).or_default().push(name.to_string());
    }

    fn closure_body(&mut self, closure: &CoreClosure) {
        self.facts
            .closures
            .insert(closure.id, Signature::of_closure(closure));
        if let Some(name) = &closure.self_name {
            self.bind(name, closure.id);
        }

        self.owners.push(self.facts.target_of(closure.id));
        closure.body.iter().for_each(|e| self.expr(e));
        self.owners.pop();
    }

    fn finish(self) {
        let leaked = |names: Option<&Vec<String>>| match names {
            Some(names) => names.iter().any(|n| self.value_refs.contains(n)),
            None => true,
        };

        for id in &self.value_closures {
            if leaked(self.binders.get(id)) {
                self.facts.escaping_closures.insert(*id);
            }
        }
        for (id, name) in &self.facts.global_closures {
            if let Some(names) = self.binders.get(id)
                && leaked(Some(names))
            {
                self.facts.escaping_functions.insert(name.clone());
            }
        }

        self.facts.bindings.push(self.bindings);
    }
}

/// Narrowed parameter types per call target, for targets that may be
/// narrowed at all.
fn param_types(
    facts: &Facts,
    entry: &EntrySignature,
    object_supertype: bool,
    assumptions: &Assumptions,
) -> HashMap<CallTarget, Vec<TypeInfo>> {
    let mut grouped: HashMap<&CallTarget, Vec<&CallSite>> = HashMap::new();
    for site in &facts.sites {
        grouped.entry(&site.target).or_default().push(site);
    }

    let mut narrowing = HashMap::new();
    for (target, sites) in grouped {
        let Some(arity) = facts.narrowable_arity(target, entry) else {
            continue;
        };

        let types = (0..arity)
            .map(|i| {
                if assumptions.is_pinned(target, i) {
                    return widened(object_supertype);
                }
                let incoming = sites
                    .iter()
                    .filter(|site| site.args.len() == arity)
                    .filter(|site| {
                        assumptions.pessimistic
                            || !(site.recursive && site.args[i].is_unknown())
                    })
                    .map(|site| &site.args[i]);
                TypeInfo::join_all(incoming, object_supertype).unwrap_or_default()
            })
            .collect();
        narrowing.insert(target.clone(), types);
    }

    narrowing
}

/// What a parameter falls back to when its call sites disagree.
fn widened(object_supertype: bool) -> TypeInfo {
    if object_supertype {
        TypeInfo::Concrete(Type::Object)
    } else {
        TypeInfo::Unknown
    }
}

/// Parameters whose type some call site, recursive ones included, does not
/// fit.
fn param_conflicts(
    facts: &Facts,
    entry: &EntrySignature,
    object_supertype: bool,
    assumptions: &Assumptions,
) -> Vec<Conflict> {
    let mut conflicts = vec![];
    for site in &facts.sites {
        let Some(arity) = facts.narrowable_arity(&site.target, entry) else {
            continue;
        };
        let Some(signature) = facts.signature(&site.target) else {
            continue;
        };
        if site.args.len() != arity {
            continue;
        }

        for (index, (param, arg)) in signature.params.iter().zip(&site.args).enumerate() {
            if param.is_unknown() || assumptions.is_pinned(&site.target, index) {
                continue;
            }
            if arg.is_unknown() || param.join(arg, object_supertype) != *param {
                let conflict = Conflict::Parameter(site.target.clone(), index);
                if !conflicts.contains(&conflict) {
                    conflicts.push(conflict);
                }
            }
        }
    }
    conflicts
}

struct Walker<'a> {
    facts: &'a Facts,
    narrowing: &'a HashMap<CallTarget, Vec<TypeInfo>>,
    bindings: &'a HashMap<String, ClosureId>,
    entry: &'a EntrySignature,
    assumptions: &'a Assumptions,
    object_supertype: bool,
    /// Name of the definition being walked
    current: String,
    /// Self names of the named `fn`s enclosing the current expression
    self_names: Vec<String>,
    /// Index of the definition being walked
    index: usize,
    /// Conditionals seen so far in this definition
    branches: usize,
    changes: usize,
    conflicts: Vec<Conflict>,
}

type Env = Vec<(String, TypeInfo)>;

fn lookup(env: &Env, name: &str) -> TypeInfo {
    env.iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, ty)| ty.clone())
        .unwrap_or_default()
}

impl Walker<'_> {
    fn narrow(&mut self, slot: &mut TypeSlot, ty: &TypeInfo) {
        if slot.narrow(ty) {
            self.changes += 1;
        }
    }

    fn definition(&mut self, def: &mut CoreDefinition) {
        match def {
            CoreDefinition::Function(function) => self.function(function),
            CoreDefinition::Value(value) => {
                let mut env = Env::new();
                let ty = match &mut value.value {
                    CoreExpr::Closure(closure) => {
                        self.closure(closure, &mut env);
                        TypeInfo::Concrete(Type::Object)
                    }
                    other => self.expr(other, &mut env),
                };
                self.narrow(value.value.info_mut(), &ty);
            }
        }
    }

    fn function(&mut self, function: &mut CoreFunction) {
        let (entry, narrowing) = (self.entry, self.narrowing);
        let incoming = if function.name == entry.name {
            Some(&entry.params)
        } else {
            narrowing.get(&CallTarget::Function(function.name.clone()))
        };
        if let Some(types) = incoming {
            for (param, ty) in function.params.iter_mut().zip(types) {
                self.narrow(&mut param.info, ty);
            }
        }

        let mut env: Env = function
            .params
            .iter()
            .map(|p| (p.name.clone(), p.info.get().clone()))
            .collect();
        let ty = self.body(&mut function.body, &mut env);
        self.narrow(&mut function.returns, &ty);
    }

    fn closure(&mut self, closure: &mut CoreClosure, env: &mut Env) {
        let narrowing = self.narrowing;
        let target = self.facts.target_of(closure.id);
        if let Some(types) = narrowing.get(&target) {
            for (param, ty) in closure.params.iter_mut().zip(types) {
                self.narrow(&mut param.info, ty);
            }
        }

        let depth = env.len();
        env.extend(
            closure
                .params
                .iter()
                .map(|p| (p.name.clone(), p.info.get().clone())),
        );
        if let Some(name) = &closure.self_name {
            env.push((name.clone(), TypeInfo::Concrete(Type::Object)));
            self.self_names.push(name.clone());
        }

        let ty = self.body(&mut closure.body, env);

        if closure.self_name.is_some() {
            self.self_names.pop();
        }
        env.truncate(depth);
        self.narrow(&mut closure.returns, &ty);
    }

    /// Type of an implicit `do`: its last expression, nil when empty.
    fn body(&mut self, body: &mut [CoreExpr], env: &mut Env) -> TypeInfo {
        let mut last = TypeInfo::nil();
        for expr in body.iter_mut() {
            last = self.expr(expr, env);
        }
        last
    }

    fn expr(&mut self, expr: &mut CoreExpr, env: &mut Env) -> TypeInfo {
        let mut branch = None;
        let ty = match expr {
            CoreExpr::Literal(literal) => literal_type(&literal.value),
            CoreExpr::Var(var) => match var.binding {
                Binding::Local => lookup(env, &var.name),
                Binding::Global => self.global_type(&var.name),
            },
            CoreExpr::Call(call) => self.call(call, env),
            CoreExpr::FunctionRef(function) => {
                for bound in function.bound.iter_mut() {
                    self.expr(bound, env);
                }
                TypeInfo::Concrete(Type::Object)
            }
            CoreExpr::Closure(closure) => {
                self.closure(closure, env);
                TypeInfo::Concrete(Type::Object)
            }
            CoreExpr::Conditional(cond) => {
                let key = (self.index, self.branches);
                self.branches += 1;
                branch = Some(key);

                self.expr(&mut cond.test, env);
                let then_ty = self.expr(&mut cond.then_expr, env);
                let else_ty = self.expr(&mut cond.else_expr, env);
                let optimistic =
                    !self.assumptions.pessimistic && !self.assumptions.strict.contains(&key);
                let guess = if !optimistic {
                    None
                } else if self.is_recursive_unknown(&cond.then_expr) {
                    Some(else_ty.clone())
                } else if self.is_recursive_unknown(&cond.else_expr) {
                    Some(then_ty.clone())
                } else {
                    None
                };
                match guess {
                    Some(ty) => {
                        if !ty.is_unknown() {
                            self.conflicts.push(Conflict::Branch(key));
                        }
                        ty
                    }
                    None => then_ty.join(&else_ty, self.object_supertype),
                }
            }
            CoreExpr::ArrayGet(get) => {
                let array = self.expr(&mut get.array, env);
                self.expr(&mut get.index, env);
                let element = array.element().cloned().unwrap_or_default();
                match &mut get.missing {
                    Missing::Default(default) => {
                        let default = self.expr(default, env);
                        element.join(&default, self.object_supertype)
                    }
                    Missing::Nil | Missing::Fault => element,
                }
            }
            CoreExpr::ArraySlice(slice) => {
                let array = self.expr(&mut slice.array, env);
                match array {
                    TypeInfo::Array(_) if slice.nil_if_empty => TypeInfo::Concrete(Type::Object),
                    TypeInfo::Array(_) => array,
                    _ => TypeInfo::Unknown,
                }
            }
            CoreExpr::ArrayLength(len) => {
                self.expr(&mut len.array, env);
                TypeInfo::Concrete(Type::Long)
            }
        };

        self.narrow(expr.info_mut(), &ty);
        if *expr.ty() != ty {
            self.conflicts.push(match branch {
                Some(key) => Conflict::Branch(key),
                None => Conflict::Other,
            });
        }
        expr.ty().clone()
    }

    fn call(&mut self, call: &mut CoreCall, env: &mut Env) -> TypeInfo {
        let args: Vec<TypeInfo> = call
            .args
            .iter_mut()
            .map(|arg| self.expr(arg, env))
            .collect();

        match &mut call.callee {
            Callee::Named(name) => self
                .facts
                .functions
                .get(name)
                .map(|signature| signature.returns.clone())
                .unwrap_or_default(),
            Callee::Builtin(builtin) => builtin_type(*builtin, &args, self.object_supertype),
            Callee::Host(method) => method.result_type(),
            Callee::Closure(closure) => {
                self.closure(closure, env);
                closure.returns.get().clone()
            }
            Callee::Dynamic(target) => {
                self.expr(target, env);
                match target.as_ref() {
                    CoreExpr::Var(var) if var.binding == Binding::Local => self
                        .bindings
                        .get(&var.name)
                        .and_then(|id| self.facts.closures.get(id))
                        .map(|signature| signature.returns.clone())
                        .unwrap_or_default(),
                    _ => TypeInfo::Unknown,
                }
            }
        }
    }

    fn global_type(&self, name: &str) -> TypeInfo {
        if self.facts.functions.contains_key(name) {
            TypeInfo::Concrete(Type::Object)
        } else {
            self.facts.values.get(name).cloned().unwrap_or_default()
        }
    }

    fn is_recursive_unknown(&self, expr: &CoreExpr) -> bool {
        let CoreExpr::Call(call) = expr else {
            return false;
        };
        if !call.info.get().is_unknown() {
            return false;
        }
        match &call.callee {
            Callee::Named(name) => *name == self.current,
            Callee::Dynamic(target) => match target.as_ref() {
                CoreExpr::Var(var) => self.self_names.contains(&var.name),
                _ => false,
            },
            _ => false,
        }
    }
}

fn literal_type(value: &LiteralValue) -> TypeInfo {
    TypeInfo::Concrete(match value {
        LiteralValue::Nil => Type::Nil,
        LiteralValue::Boolean(_) => Type::Boolean,
        LiteralValue::Integer(_) => Type::Long,
        LiteralValue::String(_) => Type::String,
    })
}

/// Result type of a builtin given its argument types.
pub fn builtin_type(builtin: Builtin, args: &[TypeInfo], object_supertype: bool) -> TypeInfo {
    let receiver = args.first().cloned().unwrap_or_default();
    match builtin {
        Builtin::First | Builtin::Second => receiver.element().cloned().unwrap_or_default(),
        Builtin::Nth => {
            let element = receiver.element().cloned().unwrap_or_default();
            match args.get(2) {
                Some(default) => element.join(default, object_supertype),
                None => element,
            }
        }
        Builtin::Rest => match receiver {
            TypeInfo::Array(_) => receiver,
            _ => TypeInfo::Unknown,
        },
        // nil when empty, and arrays are never nil
        Builtin::Next => match receiver {
            TypeInfo::Array(_) => TypeInfo::Concrete(Type::Object),
            _ => TypeInfo::Unknown,
        },
        Builtin::Count
        | Builtin::Add
        | Builtin::Sub
        | Builtin::Mul
        | Builtin::Inc
        | Builtin::Dec => TypeInfo::Concrete(Type::Long),
        Builtin::Str => TypeInfo::Concrete(Type::String),
        Builtin::Eq
        | Builtin::Lt
        | Builtin::Gt
        | Builtin::Le
        | Builtin::Ge
        | Builtin::Not
        | Builtin::IsNil => TypeInfo::Concrete(Type::Boolean),
    }
}

fn uninferred(program: &CoreProgram) -> Vec<Uninferred> {
    let mut found = vec![];

    for def in &program.definitions {
        let owner = def.name().to_string();
        let mut report = |slot: SlotKind, position: Span| {
            found.push(Uninferred {
                owner: owner.clone(),
                slot,
                position,
            })
        };

        if let CoreDefinition::Function(function) = def {
            for param in &function.params {
                if !param.info.get().is_concrete() {
                    report(SlotKind::Parameter(param.name.clone()), param.position.clone());
                }
            }
            if !function.returns.get().is_concrete() {
                report(SlotKind::Return, function.position.clone());
            }
        }

        for expr in def.exprs() {
            expr.walk(&mut |e| {
                if let CoreExpr::Closure(closure) = e {
                    for param in &closure.params {
                        if !param.info.get().is_concrete() {
                            report(SlotKind::Parameter(param.name.clone()), param.position.clone());
                        }
                    }
                }
                if let CoreExpr::Call(CoreCall {
                    callee: Callee::Closure(closure),
                    ..
                }) = e
                {
                    for param in &closure.params {
                        if !param.info.get().is_concrete() {
                            report(SlotKind::Parameter(param.name.clone()), param.position.clone());
                        }
                    }
                }
                if !e.ty().is_concrete() {
                    report(SlotKind::Expression, e.position());
                }
            });
        }
    }

    found
}
