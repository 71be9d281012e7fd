//! Integration tests for lambda lifting
//!
//! Every program here is run by the interpreter before and after lifting;
//! lifting must not change what a program prints or returns.

use sclj::config::CompilerConfig;
use sclj::core::*;
use sclj::interpreter::{self, Execution, Value};
use sclj::pipeline::{Compiler, Lifted};

/// Parse, build, infer and lift; also returns the program before lifting.
fn lift(source: &str) -> (CoreProgram, Lifted) {
    let typed = Compiler::parse(source)
        .expect("parsing failed")
        .build(&CompilerConfig::default())
        .expect("building failed")
        .infer();
    let unlifted = typed.program.clone();
    let lifted = typed.lift().expect("lifting failed");
    (unlifted, lifted)
}

/// Run both programs and check they behave the same.
fn run_both(source: &str, args: &[&str]) -> (Lifted, Execution) {
    let (unlifted, lifted) = lift(source);
    let before = interpreter::run(&unlifted, args).expect("unlifted program failed");
    let after = interpreter::run(&lifted.program, args).expect("lifted program failed");
    assert_eq!(before, after, "lifting changed the behavior of the program");
    (lifted, after)
}

fn param_names(program: &CoreProgram, function: &str) -> Vec<String> {
    program
        .function(function)
        .expect("function not found")
        .params
        .iter()
        .map(|p| p.name.clone())
        .collect()
}

#[test]
fn program_without_closures_is_unchanged() {
    let source = r#"
        (defn say-hello [name] (println "Hello," name))
        (defn -main [& args] (say-hello (first args)))
        "#;
    let (unlifted, lifted) = lift(source);
    assert_eq!(lifted.program, unlifted);
    assert!(lifted.lifting.lifted.is_empty());
    assert_eq!(lifted.lifting.passes, 1);
}

#[test]
fn let_without_captures() {
    let (lifted, execution) = run_both(
        "(defn -main [& args] (let [x (first args)] (println x)))",
        &["World"],
    );
    assert_eq!(lifted.program.closure_count(), 0);
    assert_eq!(execution.host.stdout, "World\n");

    let let_fn = lifted.lifting.get("let__0").expect("lifted let");
    assert_eq!(let_fn.origin, ClosureOrigin::Let);
    assert!(let_fn.captures.is_empty());
    assert_eq!(param_names(&lifted.program, "let__0"), vec!["x"]);

    let function = lifted.program.function("let__0").unwrap();
    assert_eq!(function.kind, FunctionKind::Lifted(ClosureOrigin::Let));

    let main = lifted.program.function("-main").unwrap();
    assert!(matches!(
        &main.body[0],
        CoreExpr::Call(CoreCall { callee: Callee::Named(name), args, .. })
            if name == "let__0" && args.len() == 1
    ));
}

#[test]
fn captured_variables_become_trailing_parameters() {
    let (lifted, execution) = run_both(
        r#"
        (defn -main [& args]
          (let [a (first args)]
            (let [b (second args)]
              (str a b))))
        "#,
        &["x", "y"],
    );
    assert_eq!(execution.value, Value::from("xy"));

    let outer = lifted.lifting.get("let__0").unwrap();
    assert_eq!(outer.captures, vec!["args"]);
    assert_eq!(param_names(&lifted.program, "let__0"), vec!["a", "args"]);

    let inner = lifted.lifting.get("let__1").unwrap();
    assert_eq!(inner.captures, vec!["a"]);
    assert_eq!(param_names(&lifted.program, "let__1"), vec!["b", "a"]);

    // every call passes one argument per parameter
    for function in lifted.program.functions() {
        for expr in &function.body {
            expr.walk(&mut |e| {
                if let CoreExpr::Call(CoreCall {
                    callee: Callee::Named(name),
                    args,
                    ..
                }) = e
                {
                    let target = lifted.program.function(name).unwrap();
                    assert_eq!(args.len(), target.params.len(), "call of {}", name);
                }
            });
        }
    }
}

#[test]
fn capture_parameters_keep_their_types() {
    let (lifted, _) = run_both(
        "(defn -main [& args] (let [n (count args)] (let [m (inc n)] (+ n m))))",
        &[],
    );
    let inner = lifted.program.function("let__1").unwrap();
    let types: Vec<String> = inner.params.iter().map(|p| p.info.get().to_string()).collect();
    assert_eq!(types, vec!["Long", "Long"]);
}

#[test]
fn do_blocks_are_lifted() {
    let (lifted, execution) = run_both(
        r#"
        (defn -main [& args]
          (do (println "a") (println "b") (count args)))
        "#,
        &["x", "y"],
    );
    assert_eq!(execution.host.stdout, "a\nb\n");
    assert_eq!(execution.value, Value::Long(2));

    let lifted_do = &lifted.lifting.lifted[0];
    assert_eq!(lifted_do.origin, ClosureOrigin::Do);
    assert!(lifted_do.name.starts_with("do__"));
    assert_eq!(lifted_do.captures, vec!["args"]);
}

#[test]
fn let_bound_functions_are_called_directly() {
    let (lifted, execution) = run_both(
        r#"
        (defn -main [& args]
          (let [suffix "!"
                shout (fn [s] (str (.toUpperCase s) suffix))]
            (println (shout (first args)))))
        "#,
        &["hey"],
    );
    assert_eq!(execution.host.stdout, "HEY!\n");
    assert_eq!(lifted.program.closure_count(), 0);

    let shout = lifted
        .lifting
        .lifted
        .iter()
        .find(|f| f.origin == ClosureOrigin::Fn)
        .expect("lifted fn");
    assert_eq!(shout.captures, vec!["suffix"]);

    let mut refs = 0;
    lifted.program.walk(&mut |e| {
        if matches!(e, CoreExpr::FunctionRef(_)) {
            refs += 1;
        }
    });
    assert_eq!(refs, 0, "a let-bound function only used as callee needs no value");
}

#[test]
fn closures_used_as_values_become_function_refs() {
    let (lifted, execution) = run_both(
        r#"
        (defn apply-to [f x] (f x))
        (defn -main [& args]
          (let [greeting (first args)]
            (apply-to (fn [name] (str greeting ", " name)) "World")))
        "#,
        &["Hello"],
    );
    assert_eq!(execution.value, Value::from("Hello, World"));

    let mut bound = vec![];
    lifted.program.walk(&mut |e| {
        if let CoreExpr::FunctionRef(function) = e {
            bound.push((function.name.clone(), function.bound.len()));
        }
    });
    assert_eq!(bound.len(), 1);
    assert!(bound[0].0.starts_with("fn__"));
    assert_eq!(bound[0].1, 1);
}

#[test]
fn named_fn_recursion_becomes_direct_calls() {
    let (lifted, execution) = run_both(
        r#"
        (defn -main [& args]
          (let [sum (fn sum-to [n] (if (< n 1) 0 (+ n (sum-to (dec n)))))]
            (sum (count args))))
        "#,
        &["a", "b", "c", "d"],
    );
    assert_eq!(execution.value, Value::Long(10));

    let sum = lifted
        .lifting
        .lifted
        .iter()
        .find(|f| f.origin == ClosureOrigin::Fn)
        .expect("lifted fn");
    let function = lifted.program.function(&sum.name).unwrap();
    let mut recursive = false;
    for expr in &function.body {
        expr.walk(&mut |e| {
            if let CoreExpr::Call(CoreCall {
                callee: Callee::Named(name),
                ..
            }) = e
                && *name == sum.name
            {
                recursive = true;
            }
        });
    }
    assert!(recursive);
}

#[test]
fn closure_valued_definitions_become_functions() {
    let (lifted, execution) = run_both(
        r#"
        (def shout (fn [s] (.toUpperCase s)))
        (defn -main [& args] (shout (first args)))
        "#,
        &["quiet"],
    );
    assert_eq!(execution.value, Value::from("QUIET"));

    let shout = lifted.program.function("shout").expect("shout is a function");
    assert_eq!(shout.params.len(), 1);
    assert!(
        lifted
            .program
            .definitions
            .iter()
            .all(|d| matches!(d, CoreDefinition::Function(_)))
    );
}

#[test]
fn global_functions_as_values() {
    let (_, execution) = run_both(
        r#"
        (defn twice [x] (* 2 x))
        (defn apply-to [f x] (f x))
        (defn -main [& args] (apply-to twice (count args)))
        "#,
        &["a", "b"],
    );
    assert_eq!(execution.value, Value::Long(4));
}

#[test]
fn generated_names_avoid_user_names() {
    let (lifted, _) = run_both(
        r#"
        (defn let__0 [] 1)
        (defn -main [& args] (let [x (let__0)] x))
        "#,
        &[],
    );
    let lifted_let = &lifted.lifting.lifted[0];
    assert_ne!(lifted_let.name, "let__0");
    assert_eq!(
        lifted
            .program
            .definitions
            .iter()
            .filter(|d| d.name() == "let__0")
            .count(),
        1
    );
}

mod capture_cycles {
    use lachs::Span;
    use sclj::CompileError;
    use sclj::core::*;
    use sclj::transform::NameGenerator;
    use sclj::transform::lift::lift_program;
    use sclj::types::{TypeInfo, TypeSlot};

    fn at(line: usize, column: usize) -> Span {
        Span {
            start: (line, column),
            end: (line, column + 1),
            source: String::new(),
        }
    }

    fn local(name: &str) -> CoreExpr {
        CoreExpr::local(name, TypeInfo::Unknown, Span::default())
    }

    fn param(name: &str) -> CoreParam {
        CoreParam {
            name: name.to_string(),
            position: Span::default(),
            info: TypeSlot::unknown(),
        }
    }

    fn closure(id: u32, params: &[&str], body: Vec<CoreExpr>, position: Span) -> CoreClosure {
        CoreClosure {
            id: ClosureId(id),
            origin: ClosureOrigin::Fn,
            self_name: None,
            params: params.iter().map(|p| param(p)).collect(),
            body,
            returns: TypeSlot::unknown(),
            position,
            info: TypeSlot::unknown(),
        }
    }

    fn call(callee: Callee, args: Vec<CoreExpr>) -> CoreExpr {
        CoreExpr::Call(CoreCall {
            callee,
            args,
            position: Span::default(),
            info: TypeSlot::unknown(),
        })
    }

    fn main_with(body: Vec<CoreExpr>) -> CoreDefinition {
        CoreDefinition::Function(CoreFunction {
            name: "-main".to_string(),
            params: vec![param("args")],
            body,
            returns: TypeSlot::unknown(),
            kind: FunctionKind::Defined,
            variadic: true,
            position: Span::default(),
        })
    }

    fn program(definitions: Vec<CoreDefinition>) -> CoreProgram {
        CoreProgram {
            namespace: None,
            entry: "-main".to_string(),
            definitions,
        }
    }

    fn lift_error(program: CoreProgram) -> CompileError {
        let mut names = NameGenerator::seeded(&program);
        lift_program(program, &mut names).expect_err("lifting should fail")
    }

    #[test]
    fn closure_capturing_its_own_binder() {
        // ((fn [g] (g 1)) (fn [x] (g x)))
        let bound = closure(
            1,
            &["x"],
            vec![call(Callee::Dynamic(Box::new(local("g"))), vec![local("x")])],
            at(3, 9),
        );
        let applied = closure(
            0,
            &["g"],
            vec![call(
                Callee::Dynamic(Box::new(local("g"))),
                vec![CoreExpr::Literal(CoreLiteral {
                    value: LiteralValue::Integer(1),
                    position: Span::default(),
                    info: TypeSlot::unknown(),
                })],
            )],
            Span::default(),
        );
        let program = program(vec![main_with(vec![call(
            Callee::Closure(Box::new(applied)),
            vec![CoreExpr::Closure(bound)],
        )])]);

        match lift_error(program) {
            CompileError::CaptureCycle { variable, span } => {
                assert_eq!(variable, "g");
                assert_eq!((span.start, span.end), ((3, 9), (3, 10)));
            }
            other => panic!("expected a capture cycle, got {:?}", other),
        }
    }

    #[test]
    fn global_closure_with_captures() {
        // (def g (fn [] y)) with `y` free
        let program = program(vec![
            CoreDefinition::Value(CoreValueDef {
                name: "g".to_string(),
                value: CoreExpr::Closure(closure(0, &[], vec![local("y")], Span::default())),
                position: at(1, 0),
            }),
            main_with(vec![call(Callee::Named("g".to_string()), vec![])]),
        ]);

        match lift_error(program) {
            CompileError::CaptureCycle { variable, span } => {
                assert_eq!(variable, "y");
                assert_eq!(span.start, (1, 0));
            }
            other => panic!("expected a capture cycle, got {:?}", other),
        }
    }
}
