//! Tests for folding single-use generated functions into their caller

use sclj::config::CompilerConfig;
use sclj::interpreter::{self, Execution, HostEnv};
use sclj::pipeline::{Compiler, Normalized};

fn normalized(source: &str, lambda_drop: bool) -> Normalized {
    let config = CompilerConfig::new().with_lambda_drop(lambda_drop);
    let lifted = match Compiler::parse(source)
        .and_then(|parsed| parsed.build(&config))
        .and_then(|built| built.infer().lift())
    {
        Ok(lifted) => lifted,
        Err(err) => panic!("compilation failed: {}", err),
    };
    lifted.specialize().normalize()
}

fn java(source: &str) -> String {
    match normalized(source, true).emit() {
        Ok(compilation) => compilation.java,
        Err(err) => panic!("emitting failed: {}", err),
    }
}

fn execute(normalized: &Normalized, args: &[&str], host: &HostEnv) -> Execution {
    interpreter::run_with(&normalized.program, args, host.clone()).expect("program failed")
}

/// Run `source` compiled with and without lambda dropping and compare.
fn assert_same_behavior(source: &str, host: &HostEnv) {
    let kept = normalized(source, false);
    let dropped = normalized(source, true);
    for args in [&[][..], &["Ann"][..], &["Ann", "Bob", "Cy"][..]] {
        let before = execute(&kept, args, host);
        let after = execute(&dropped, args, host);
        assert_eq!(before, after, "behavior differs for {:?}", args);
    }
}

fn assert_contains(java: &str, expected: &str) {
    assert!(
        java.contains(expected),
        "expected to find\n  {}\nin\n{}",
        expected,
        java
    );
}

const LAMBDALIFT: &str = r#"
(ns lambdalift)

(defn say-hello [s]
  (. System/out (println s)))

(defn -main [& args]
  (let [x (first args)]
    (say-hello x)))
"#;

#[test]
fn dropping_is_off_by_default() {
    let normalized = normalized(LAMBDALIFT, false);
    assert!(normalized.reports.dropping.dropped.is_empty());
    assert!(normalized.program.function("let__0").is_some());
    assert!(normalized.program.function("do_void__1").is_some());
}

#[test]
fn lifted_let_and_adapter_are_dropped() {
    let normalized = normalized(LAMBDALIFT, true);
    let mut dropped = normalized.reports.dropping.dropped.clone();
    dropped.sort();
    assert_eq!(dropped, vec!["do_void__1", "let__0"]);
    assert!(normalized.program.function("let__0").is_none());
    assert!(normalized.program.function("do_void__1").is_none());
    assert_same_behavior(LAMBDALIFT, &HostEnv::new());
}

#[test]
fn dropped_program_emits_direct_calls() {
    let java = java(LAMBDALIFT);
    assert_contains(&java, "return say_hello((args.length > 0 ? args[0] : null));");
    assert_contains(
        &java,
        "static Object say_hello(String s) {\n        System.out.println(s);\n        return null;\n    }",
    );
    assert!(!java.contains("let__0"), "{}", java);
    assert!(!java.contains("do_void"), "{}", java);
}

#[test]
fn shared_adapters_are_kept() {
    let source = r#"
        (defn -main [& args]
          (println "a")
          (println (count args)))
        "#;
    let normalized = normalized(source, true);
    assert!(normalized.reports.dropping.dropped.is_empty());
    assert_eq!(normalized.reports.normalization.adapters.len(), 1);
    assert_same_behavior(source, &HostEnv::new());
}

#[test]
fn effects_keep_their_order() {
    // the lookup would move behind the first println
    let source = r#"
        (defn -main [& args]
          (let [user (System/getenv "USER")]
            (println "user:")
            (println user)))
        "#;
    let normalized = normalized(source, true);
    assert!(
        !normalized
            .reports
            .dropping
            .dropped
            .contains(&"let__0".to_string())
    );
    assert!(normalized.program.function("let__0").is_some());

    let host = HostEnv::new().with_var("USER", "ann");
    assert_same_behavior(source, &host);
    let execution = execute(&normalized, &[], &host);
    assert_eq!(execution.host.stdout, "user:\nann\n");
}

#[test]
fn dropping_preserves_behavior() {
    let sources = [
        r#"
        (ns hello)
        (defn say-hello [name]
          (println "Hello," name))
        (defn -main [& args]
          (say-hello (first args)))
        "#,
        r#"
        (defn -main [& args]
          (let [greeting (if (next args) "Hi all" "Hi")
                greet (fn [who] (str greeting ", " who))]
            (do
              (println (greet (first args)))
              (count args))))
        "#,
        r#"
        (defn -main [& args]
          (let [a (first args) b (second args)]
            (str (nth args 2 "-") a b (count (rest args)))))
        "#,
        r#"
        (defn sum [xs]
          (if (= (count xs) 0)
            0
            (+ 1 (sum (rest xs)))))
        (defn -main [& args]
          (let [total (sum args)]
            (println "total:" total)
            total))
        "#,
    ];
    for source in sources {
        assert_same_behavior(source, &HostEnv::new());
    }
}
