//! Tests for sequence-operation specialization

use sclj::config::CompilerConfig;
use sclj::core::*;
use sclj::interpreter::{self, RuntimeError, Value};
use sclj::pipeline::Compiler;
use sclj::transform::specialize::{SpecializeReport, specialize_program};

/// The typed program before and after specialization.
fn specialize(source: &str) -> (CoreProgram, CoreProgram, SpecializeReport) {
    let typed = Compiler::parse(source)
        .expect("parsing failed")
        .build(&CompilerConfig::default())
        .expect("building failed")
        .infer();
    let generic = typed.program.clone();
    let (specialized, report) = specialize_program(typed.program);
    (generic, specialized, report)
}

fn main_body(program: &CoreProgram) -> &CoreExpr {
    &program.function("-main").expect("no entry").body[0]
}

/// Run both programs on every argument list; results must agree.
fn assert_same_behavior(source: &str, inputs: &[&[&str]]) {
    let (generic, specialized, _) = specialize(source);
    for args in inputs {
        let before = interpreter::run(&generic, args);
        let after = interpreter::run(&specialized, args);
        assert_eq!(before, after, "different behavior for {:?}", args);
    }
}

#[test]
fn first_becomes_array_get_or_nil() {
    let (_, specialized, report) = specialize("(defn -main [& args] (first args))");
    assert_eq!(report.specialized, 1);
    assert!(report.generic.is_empty());

    let CoreExpr::ArrayGet(get) = main_body(&specialized) else {
        panic!("expected an array access");
    };
    assert_eq!(get.missing, Missing::Nil);
    assert!(matches!(
        get.index.as_ref(),
        CoreExpr::Literal(CoreLiteral { value: LiteralValue::Integer(0), .. })
    ));

    let empty = interpreter::run(&specialized, &[]).unwrap();
    assert_eq!(empty.value, Value::Nil);
    let one = interpreter::run(&specialized, &["a"]).unwrap();
    assert_eq!(one.value, Value::from("a"));
}

#[test]
fn second_uses_index_one() {
    let (_, specialized, _) = specialize("(defn -main [& args] (second args))");
    let CoreExpr::ArrayGet(get) = main_body(&specialized) else {
        panic!("expected an array access");
    };
    assert!(matches!(
        get.index.as_ref(),
        CoreExpr::Literal(CoreLiteral { value: LiteralValue::Integer(1), .. })
    ));
    assert_same_behavior(
        "(defn -main [& args] (second args))",
        &[&[], &["a"], &["a", "b"]],
    );
}

#[test]
fn count_becomes_array_length() {
    let (_, specialized, _) = specialize("(defn -main [& args] (count args))");
    assert!(matches!(main_body(&specialized), CoreExpr::ArrayLength(_)));
    let execution = interpreter::run(&specialized, &["a", "b", "c"]).unwrap();
    assert_eq!(execution.value, Value::Long(3));
}

#[test]
fn rest_and_next_become_slices() {
    let (_, specialized, _) = specialize("(defn -main [& args] (rest args))");
    let CoreExpr::ArraySlice(slice) = main_body(&specialized) else {
        panic!("expected a slice");
    };
    assert_eq!(slice.from, 1);
    assert!(!slice.nil_if_empty);

    let (_, specialized, _) = specialize("(defn -main [& args] (next args))");
    let CoreExpr::ArraySlice(slice) = main_body(&specialized) else {
        panic!("expected a slice");
    };
    assert!(slice.nil_if_empty);

    let execution = interpreter::run(&specialized, &["only"]).unwrap();
    assert_eq!(execution.value, Value::Nil);
}

#[test]
fn rest_and_next_agree_with_generic_versions() {
    for source in [
        "(defn -main [& args] (rest args))",
        "(defn -main [& args] (next args))",
        "(defn -main [& args] (count (rest (rest args))))",
        "(defn -main [& args] (first (next args)))",
    ] {
        assert_same_behavior(source, &[&[], &["a"], &["a", "b"], &["a", "b", "c"]]);
    }
}

#[test]
fn nth_without_default_faults() {
    let source = "(defn -main [& args] (nth args 2))";
    let (_, specialized, _) = specialize(source);
    let CoreExpr::ArrayGet(get) = main_body(&specialized) else {
        panic!("expected an array access");
    };
    assert_eq!(get.missing, Missing::Fault);

    let err = interpreter::run(&specialized, &["a"]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::IndexOutOfBounds {
            index: 2,
            length: 1
        }
    );
    assert_same_behavior(source, &[&["a"], &["a", "b", "c"]]);
}

#[test]
fn nth_with_default() {
    let source = r#"(defn -main [& args] (nth args 1 "none"))"#;
    let (_, specialized, _) = specialize(source);
    let CoreExpr::ArrayGet(get) = main_body(&specialized) else {
        panic!("expected an array access");
    };
    assert!(matches!(get.missing, Missing::Default(_)));
    assert_same_behavior(source, &[&[], &["a"], &["a", "b"]]);
}

#[test]
fn specialized_results_keep_their_types() {
    let (_, specialized, _) = specialize("(defn -main [& args] (first args))");
    assert_eq!(main_body(&specialized).ty().to_string(), "String");
}

#[test]
fn unknown_receivers_stay_generic() {
    let (_, specialized, report) = specialize(
        r#"
        (defn head [xs] (first xs))
        (defn -main [& args] (head (first args)))
        "#,
    );
    // `head` receives a String, not an array
    assert_eq!(report.specialized, 1);
    assert_eq!(report.generic.len(), 1);

    let head = specialized.function("head").unwrap();
    assert!(matches!(
        &head.body[0],
        CoreExpr::Call(CoreCall { callee: Callee::Builtin(Builtin::First), .. })
    ));
}

#[test]
fn operations_inside_closures_are_specialized() {
    let source = "(defn -main [& args] (let [n (count args)] (str n (first args))))";
    let (_, specialized, report) = specialize(source);
    assert_eq!(report.specialized, 2);
    assert_eq!(specialized.closure_count(), 1);
    assert_same_behavior(source, &[&[], &["a", "b"]]);
}

#[test]
fn next_results_are_not_arrays() {
    let (_, specialized, report) = specialize("(defn -main [& args] (first (next args)))");
    // only `next` is rewritten; its result may be nil
    assert_eq!(report.specialized, 1);
    assert_eq!(report.generic.len(), 1);
    assert!(matches!(
        main_body(&specialized),
        CoreExpr::Call(CoreCall { callee: Callee::Builtin(Builtin::First), .. })
    ));
}
