//! Tests for whole-program type inference

use sclj::config::CompilerConfig;
use sclj::core::*;
use sclj::pipeline::{Compiler, Typed};
use sclj::types::{SlotKind, Type, TypeInfo, infer_program};

fn infer_with(source: &str, config: &CompilerConfig) -> Typed {
    Compiler::parse(source)
        .expect("parsing failed")
        .build(config)
        .expect("building failed")
        .infer()
}

fn infer(source: &str) -> Typed {
    infer_with(source, &CompilerConfig::default())
}

fn param_type<'a>(typed: &'a Typed, function: &str, index: usize) -> &'a TypeInfo {
    typed
        .program
        .function(function)
        .expect("function not found")
        .params[index]
        .info
        .get()
}

fn return_type<'a>(typed: &'a Typed, function: &str) -> &'a TypeInfo {
    typed
        .program
        .function(function)
        .expect("function not found")
        .returns
        .get()
}

fn concrete(ty: Type) -> TypeInfo {
    TypeInfo::Concrete(ty)
}

/// Every closure of the program, in walk order.
fn closures(program: &CoreProgram) -> Vec<&CoreClosure> {
    let mut found = vec![];
    program.walk(&mut |e| match e {
        CoreExpr::Closure(closure) => found.push(closure),
        CoreExpr::Call(CoreCall {
            callee: Callee::Closure(closure),
            ..
        }) => found.push(closure.as_ref()),
        _ => {}
    });
    found
}

const HELLO: &str = r#"
(ns hello)

(defn say-hello [name]
  (println "Hello," name))

(defn -main [& args]
  (say-hello (first args)))
"#;

#[test]
fn entry_parameters_come_from_the_signature() {
    let typed = infer(HELLO);
    assert_eq!(
        param_type(&typed, "-main", 0),
        &TypeInfo::array_of(concrete(Type::String))
    );
}

#[test]
fn parameters_are_narrowed_from_call_sites() {
    let typed = infer(HELLO);
    assert_eq!(param_type(&typed, "say-hello", 0), &concrete(Type::String));
    assert_eq!(return_type(&typed, "say-hello"), &concrete(Type::Nil));
    assert_eq!(return_type(&typed, "-main"), &concrete(Type::Nil));
    assert!(typed.inference.is_complete(), "{:?}", typed.inference.uninferred);
}

#[test]
fn inference_reaches_a_fixed_point() {
    let mut typed = infer(HELLO);
    assert!(typed.inference.rounds >= 2);
    assert!(typed.inference.changes > 0);

    let config = CompilerConfig::default();
    let again = infer_program(&mut typed.program, &config.entry, &config.infer);
    assert_eq!(again.changes, 0);
    assert_eq!(again.rounds, 1);
}

#[test]
fn builtin_results() {
    let typed = infer(
        r#"
        (defn size [xs] (count xs))
        (defn tail [xs] (rest xs))
        (defn label [x] (str "n=" x))
        (defn small? [n] (< n 10))
        (defn -main [& args]
          (println (label (size (tail args))))
          (small? (size args)))
        "#,
    );
    let strings = TypeInfo::array_of(concrete(Type::String));
    assert_eq!(param_type(&typed, "size", 0), &strings);
    assert_eq!(return_type(&typed, "size"), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "tail"), &strings);
    assert_eq!(param_type(&typed, "label", 0), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "label"), &concrete(Type::String));
    assert_eq!(param_type(&typed, "small?", 0), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "-main"), &concrete(Type::Boolean));
}

#[test]
fn host_methods_have_declared_types() {
    let typed = infer(
        r#"
        (defn parse [s] (Long/parseLong s))
        (defn -main [& args] (parse (.trim (first args))))
        "#,
    );
    assert_eq!(param_type(&typed, "parse", 0), &concrete(Type::String));
    assert_eq!(return_type(&typed, "parse"), &concrete(Type::Long));
}

#[test]
fn nil_joins_with_other_types() {
    let typed = infer(
        r#"
        (defn show [x] (str x))
        (defn -main [& args] (show nil) (show "a"))
        "#,
    );
    assert_eq!(param_type(&typed, "show", 0), &concrete(Type::String));
}

#[test]
fn incompatible_call_sites_stay_unknown() {
    let source = r#"
        (defn show [x] (str x))
        (defn -main [& args] (show 1) (show "a"))
        "#;

    let typed = infer(source);
    assert_eq!(param_type(&typed, "show", 0), &TypeInfo::Unknown);
    assert!(typed.inference.uninferred.iter().any(|slot| slot.owner == "show"
        && slot.slot == SlotKind::Parameter("x".to_string())));

    let typed = infer_with(source, &CompilerConfig::new().with_object_supertype(true));
    assert_eq!(param_type(&typed, "show", 0), &concrete(Type::Object));
}

#[test]
fn branches_are_joined() {
    let typed = infer(
        r#"
        (defn pick [flag] (if flag "yes" nil))
        (defn mixed [flag] (if flag "yes" 1))
        (defn -main [& args] (pick (first args)) (mixed (first args)))
        "#,
    );
    assert_eq!(return_type(&typed, "pick"), &concrete(Type::String));
    assert_eq!(return_type(&typed, "mixed"), &TypeInfo::Unknown);
}

#[test]
fn recursive_calls_do_not_block_inference() {
    let typed = infer(
        r#"
        (defn countdown [n]
          (if (< n 1)
            0
            (countdown (dec n))))
        (defn -main [& args] (countdown 3))
        "#,
    );
    assert_eq!(param_type(&typed, "countdown", 0), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "countdown"), &concrete(Type::Long));
    assert!(typed.inference.is_complete(), "{:?}", typed.inference.uninferred);
}

#[test]
fn let_bindings_are_typed() {
    let typed = infer("(defn -main [& args] (let [n (count args)] (inc n)))");
    let closures = closures(&typed.program);
    assert_eq!(closures.len(), 1);
    assert_eq!(closures[0].params[0].info.get(), &concrete(Type::Long));
    assert_eq!(closures[0].returns.get(), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "-main"), &concrete(Type::Long));
}

#[test]
fn let_bound_functions_are_narrowed_from_their_calls() {
    let typed = infer(
        r#"
        (defn -main [& args]
          (let [add (fn [a b] (+ a b))]
            (add 1 (count args))))
        "#,
    );
    let add = closures(&typed.program)
        .into_iter()
        .find(|c| c.origin == ClosureOrigin::Fn)
        .expect("the fn closure");
    assert!(add.params.iter().all(|p| p.info.get() == &concrete(Type::Long)));
    assert_eq!(return_type(&typed, "-main"), &concrete(Type::Long));
}

#[test]
fn escaping_functions_are_not_narrowed() {
    let typed = infer(
        r#"
        (defn twice [x] (* 2 x))
        (defn call-with-one [f] (f 1))
        (defn -main [& args] (call-with-one twice))
        "#,
    );
    assert_eq!(param_type(&typed, "twice", 0), &TypeInfo::Unknown);
    assert_eq!(param_type(&typed, "call-with-one", 0), &concrete(Type::Object));
    assert!(
        typed
            .inference
            .uninferred
            .iter()
            .any(|slot| slot.owner == "twice")
    );
}

#[test]
fn unreached_functions_stay_unknown() {
    let typed = infer(
        r#"
        (defn unused [x] x)
        (defn -main [& args] nil)
        "#,
    );
    assert_eq!(param_type(&typed, "unused", 0), &TypeInfo::Unknown);
    assert!(!typed.inference.is_complete());
}

const SWAPPED: &str = r#"
(defn f [x n]
  (if (= n 0)
    x
    (f n (dec n))))

(defn -main [& args]
  (println (f (first args) 3)))
"#;

#[test]
fn recursive_call_sites_can_widen_parameters() {
    // the recursive call passes the Long `n` as `x`
    let typed = infer(SWAPPED);
    assert_eq!(param_type(&typed, "f", 0), &TypeInfo::Unknown);
    assert_eq!(param_type(&typed, "f", 1), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "f"), &TypeInfo::Unknown);
    assert!(
        typed
            .inference
            .uninferred
            .iter()
            .any(|slot| slot.owner == "f" && slot.slot == SlotKind::Parameter("x".into()))
    );
    assert!(typed.inference.retries > 0);
}

#[test]
fn recursive_call_sites_widen_to_object() {
    let config = CompilerConfig::default().with_object_supertype(true);
    let typed = infer_with(SWAPPED, &config);
    assert_eq!(param_type(&typed, "f", 0), &concrete(Type::Object));
    assert_eq!(param_type(&typed, "f", 1), &concrete(Type::Long));
    assert_eq!(return_type(&typed, "f"), &concrete(Type::Object));
}

#[test]
fn widened_parameters_are_stable() {
    let mut typed = infer(SWAPPED);
    let config = CompilerConfig::default();
    let again = infer_program(&mut typed.program, &config.entry, &config.infer);
    assert_eq!(again.changes, 0);
    assert_eq!(param_type(&typed, "f", 0), &TypeInfo::Unknown);
}

#[test]
fn conditionals_join_recursive_branches_once_known() {
    // the `if` is a statement: its else branch is a Long, not a String
    let typed = infer(
        r#"
        (defn f [n]
          (if (= n 0) "zero" (f (dec n)))
          n)
        (defn -main [& args] (f (count args)))
        "#,
    );
    assert_eq!(return_type(&typed, "f"), &concrete(Type::Long));

    let mut conditionals = vec![];
    typed.program.walk(&mut |e| {
        if let CoreExpr::Conditional(cond) = e {
            conditionals.push(cond.info.get().clone());
        }
    });
    assert_eq!(conditionals, vec![TypeInfo::Unknown]);
}
