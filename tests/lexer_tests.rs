use sclj::lexer::{Token, strip_comments};

fn lex(source: &str) -> Vec<Token> {
    Token::lex(&strip_comments(source)).expect("lexing failed")
}

fn symbols(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Symbol(s) => Some(s.value.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn delimiters_and_atoms() {
    let tokens = lex(r#"(defn f [x] (str "a" 42))"#);
    assert_eq!(tokens.len(), 12);
    assert!(matches!(tokens[0], Token::LParen(_)));
    assert!(matches!(tokens[3], Token::LBracket(_)));
    assert!(matches!(tokens[5], Token::RBracket(_)));
    assert!(matches!(tokens[8], Token::StringLiteral(_)));
    assert!(matches!(tokens[9], Token::Integer(_)));
}

#[test]
fn clojure_symbol_characters() {
    let tokens = lex("(-main say-hello nil? System/out .toUpperCase & <= x')");
    assert_eq!(
        symbols(&tokens),
        vec![
            "-main",
            "say-hello",
            "nil?",
            "System/out",
            ".toUpperCase",
            "&",
            "<=",
            "x'"
        ]
    );
}

#[test]
fn comments_produce_no_tokens() {
    let tokens = lex(
        r#"
        ; greeting
        (println "hi") ; trailing comment
        "#,
    );
    let names = symbols(&tokens);
    assert_eq!(names, vec!["println"]);
}

#[test]
fn string_with_escapes_is_one_token() {
    let tokens = lex(r#"(println "say \"hi\"; ok")"#);
    assert_eq!(tokens.len(), 4);
    let Token::StringLiteral(s) = &tokens[2] else {
        panic!("expected a string literal");
    };
    assert_eq!(s.value, r#""say \"hi\"; ok""#);
}

#[test]
fn commas_separate_like_whitespace() {
    let tokens = lex("[a, b,c]");
    assert_eq!(symbols(&tokens), vec!["a", "b", "c"]);
}
