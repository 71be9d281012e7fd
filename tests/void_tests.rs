//! Tests for routing void host calls through nil-returning adapters

use sclj::config::CompilerConfig;
use sclj::core::*;
use sclj::host::{self, HostMethod};
use sclj::interpreter::{self, Value};
use sclj::pipeline::{Compiler, Normalized, Specialized};
use sclj::types::{Type, TypeInfo};

fn specialize(source: &str) -> Specialized {
    Compiler::parse(source)
        .expect("parsing failed")
        .build(&CompilerConfig::default())
        .expect("building failed")
        .infer()
        .lift()
        .expect("lifting failed")
        .specialize()
}

fn normalize(source: &str) -> Normalized {
    specialize(source).normalize()
}

fn println() -> HostMethod {
    host::println().expect("println is registered")
}

/// Host calls left outside of adapter functions.
fn void_calls_outside_adapters(program: &CoreProgram) -> usize {
    let mut count = 0;
    for function in program.functions() {
        if function.kind == FunctionKind::VoidAdapter {
            continue;
        }
        for expr in &function.body {
            expr.walk(&mut |e| {
                if let CoreExpr::Call(CoreCall {
                    callee: Callee::Host(method),
                    ..
                }) = e
                    && method.is_void()
                {
                    count += 1;
                }
            });
        }
    }
    count
}

const HELLO: &str = r#"
(ns hello)

(defn say-hello [name]
  (println "Hello," name))

(defn -main [& args]
  (say-hello (first args)))
"#;

#[test]
fn println_goes_through_an_adapter() {
    let normalized = normalize(HELLO);
    let report = &normalized.reports.normalization;
    assert_eq!(report.adapters.len(), 1);
    assert_eq!(report.rewritten, 1);

    let adapter = report.adapter_for(&println()).expect("adapter for println");
    assert_eq!(adapter.name, "do_void__0");
    assert_eq!(adapter.params, vec![TypeInfo::Concrete(Type::String)]);

    let function = normalized.program.function("do_void__0").unwrap();
    assert_eq!(function.kind, FunctionKind::VoidAdapter);
    assert_eq!(function.returns.get(), &TypeInfo::nil());
    assert_eq!(function.body.len(), 2);

    assert_eq!(void_calls_outside_adapters(&normalized.program), 0);
}

#[test]
fn adapter_prints_once_and_returns_nil() {
    let normalized = normalize(HELLO);
    let execution = interpreter::run(&normalized.program, &["World"]).unwrap();
    assert_eq!(execution.host.stdout, "Hello, World\n");
    assert_eq!(execution.host.calls_to(&println()), 1);
    assert_eq!(execution.value, Value::Nil);
}

#[test]
fn behavior_is_unchanged() {
    let source = r#"
        (defn log [msg] (println "log:" msg))
        (defn -main [& args]
          (log (first args))
          (str (println "side effect") (count args)))
        "#;
    let specialized = specialize(source);
    let before = interpreter::run(&specialized.program, &["a", "b"]).unwrap();
    let normalized = specialized.normalize();
    let after = interpreter::run(&normalized.program, &["a", "b"]).unwrap();

    assert_eq!(before, after);
    assert_eq!(after.value, Value::from("2"));
    assert_eq!(after.host.stdout, "log: a\nside effect\n");
}

#[test]
fn one_adapter_per_method_and_argument_count() {
    let normalized = normalize(
        r#"
        (defn -main [& args]
          (println "a")
          (println (count args))
          (println)
          (. System/err (println "oops")))
        "#,
    );
    let report = &normalized.reports.normalization;
    assert_eq!(report.rewritten, 4);
    assert_eq!(report.adapters.len(), 3);

    let names: Vec<&str> = report.adapters.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["do_void__0", "do_void__1", "do_void__2"]);

    // "a" and a Long share one adapter taking Object
    assert_eq!(report.adapters[0].params, vec![TypeInfo::Concrete(Type::Object)]);
    assert!(report.adapters[1].params.is_empty());
    assert_eq!(report.adapters[2].method.to_string(), "System/err.println");

    let execution = interpreter::run(&normalized.program, &["x"]).unwrap();
    assert_eq!(execution.host.stdout, "a\n1\n\n");
    assert_eq!(execution.host.stderr, "oops\n");
}

#[test]
fn value_returning_host_calls_are_untouched() {
    let normalized = normalize(
        r#"
        (defn -main [& args]
          (Long/parseLong (.trim (first args))))
        "#,
    );
    let report = &normalized.reports.normalization;
    assert!(report.adapters.is_empty());
    assert_eq!(report.rewritten, 0);

    let execution = interpreter::run(&normalized.program, &[" 42 "]).unwrap();
    assert_eq!(execution.value, Value::Long(42));
}

#[test]
fn adapter_names_follow_lifted_names() {
    let normalized = normalize(
        r#"
        (defn -main [& args]
          (let [x (first args)]
            (println x)))
        "#,
    );
    assert!(normalized.program.function("let__0").is_some());
    let adapter = &normalized.reports.normalization.adapters[0];
    assert_eq!(adapter.name, "do_void__1");
}
