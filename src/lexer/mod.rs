use lachs::Span;

#[lachs::token]
pub enum Token {
    #[terminal("(")]
    LParen,
    #[terminal(")")]
    RParen,
    #[terminal("[")]
    LBracket,
    #[terminal("]")]
    RBracket,
    #[literal("[0-9]+")]
    Integer,
    #[literal(r#""([^"\\]|\\.)*""#)]
    StringLiteral,
    #[literal(r"[a-zA-Z_+\-*/<>=!?&.$%:][a-zA-Z0-9_+\-*/<>=!?&.$%:']*")]
    Symbol,
}

impl Token {
    pub fn pos(&self) -> Span {
        match self {
            Token::LParen(inner) => inner.position.clone(),
            Token::RParen(inner) => inner.position.clone(),
            Token::LBracket(inner) => inner.position.clone(),
            Token::RBracket(inner) => inner.position.clone(),
            Token::Integer(inner) => inner.position.clone(),
            Token::StringLiteral(inner) => inner.position.clone(),
            Token::Symbol(inner) => inner.position.clone(),
        }
    }

    /// Returns a human-readable description of the token
    pub fn describe(&self) -> String {
        match self {
            Token::LParen(_) => "'('".to_string(),
            Token::RParen(_) => "')'".to_string(),
            Token::LBracket(_) => "'['".to_string(),
            Token::RBracket(_) => "']'".to_string(),
            Token::Integer(inner) => format!("integer '{}'", inner.value),
            Token::StringLiteral(inner) => format!("string {}", inner.value),
            Token::Symbol(inner) => format!("symbol '{}'", inner.value),
        }
    }
}

/// Blank out `;` line comments and commas outside of string literals.
///
/// Removed characters are replaced by spaces so that spans reported by the
/// lexer still point at the original columns.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for c in source.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push('\n');
            } else {
                out.push(' ');
            }
            continue;
        }

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ';' => {
                in_comment = true;
                out.push(' ');
            }
            ',' => out.push(' '),
            _ => out.push(c),
        }
    }

    out
}
