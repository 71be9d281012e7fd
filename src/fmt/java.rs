//! # Java Emitter
//!
//! Prints a fully transformed program as a single Java class:
//!
//! ```java
//! public class Hello {
//!     public static void main(String[] args) {
//!         _main(args);
//!     }
//!
//!     static Object say_hello(String name) {
//!         return do_void__0($str("Hello,", " ", name));
//!     }
//!     ...
//! }
//! ```
//!
//! The emitter expects lifted, specialized and normalized input. Whatever is
//! left of the generic runtime (closures, function values, dynamic calls,
//! sequence operations on non-arrays) is rejected with
//! [`CompileError::UnsupportedForm`].
//!
//! ## Values
//!
//! All values are boxed (`Long`, `Boolean`, `String`, arrays, `Object`), so
//! `nil` is always `null` and ternaries never unbox by accident. Arithmetic
//! goes through `Math.*Exact` to keep Clojure's overflow checks.
//!
//! ## Helpers
//!
//! Small static helpers (`$truthy`, `$str`, `$get`, ...) are added to the
//! class only when some expression needs them. `$` cannot appear in a
//! munged name, so helpers never collide with user definitions.

use std::collections::{BTreeSet, HashMap, HashSet};

use lachs::Span;
use log::debug;

use crate::core::*;
use crate::error::{CompileError, CompileResult};
use crate::host::{HostKind, HostMethod};
use crate::types::{Type, TypeInfo};

const INDENT: &str = "    ";

const JAVA_KEYWORDS: &[&str] = &[
    "_", "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "false", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "null", "package", "private", "protected", "public",
    "record", "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
    "throw", "throws", "transient", "true", "try", "var", "void", "volatile", "while", "yield",
];

/// Translate a Clojure symbol into a Java identifier, the way Clojure does
/// for its own class files (`say-hello` → `say_hello`, `nil?` → `nil_QMARK_`).
pub fn munge(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '-' | '.' => out.push('_'),
            ':' => out.push_str("_COLON_"),
            '+' => out.push_str("_PLUS_"),
            '>' => out.push_str("_GT_"),
            '<' => out.push_str("_LT_"),
            '=' => out.push_str("_EQ_"),
            '~' => out.push_str("_TILDE_"),
            '!' => out.push_str("_BANG_"),
            '@' => out.push_str("_CIRCA_"),
            '#' => out.push_str("_SHARP_"),
            '\'' => out.push_str("_SINGLEQUOTE_"),
            '%' => out.push_str("_PERCENT_"),
            '^' => out.push_str("_CARET_"),
            '&' => out.push_str("_AMPERSAND_"),
            '*' => out.push_str("_STAR_"),
            '|' => out.push_str("_BAR_"),
            '/' => out.push_str("_SLASH_"),
            '\\' => out.push_str("_BSLASH_"),
            '?' => out.push_str("_QMARK_"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            c => out.push_str(&format!("_u{:04X}_", c as u32)),
        }
    }
    if JAVA_KEYWORDS.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// Class name: the explicit override, else the munged namespace, else `Main`.
pub fn class_name(namespace: Option<&str>, class_override: Option<&str>) -> String {
    match (class_override, namespace) {
        (Some(name), _) => munge(name),
        (None, Some(namespace)) => munge(namespace),
        (None, None) => "Main".to_string(),
    }
}

pub fn java_type(ty: &TypeInfo) -> String {
    match ty {
        TypeInfo::Concrete(Type::Boolean) => "Boolean".to_string(),
        TypeInfo::Concrete(Type::Long) => "Long".to_string(),
        TypeInfo::Concrete(Type::String) => "String".to_string(),
        TypeInfo::Concrete(Type::Nil | Type::Object) | TypeInfo::Unknown => "Object".to_string(),
        TypeInfo::Array(element) => format!("{}[]", java_type(element)),
    }
}

fn string_literal(value: &str) -> String {
    let mut out = String::from("\"");
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    Truthy,
    Str,
    Eq,
    Compare(Builtin),
    Get,
    Nth,
    Rest,
    Next,
}

impl Helper {
    fn name(&self) -> &'static str {
        match self {
            Helper::Truthy => "$truthy",
            Helper::Str => "$str",
            Helper::Eq => "$eq",
            Helper::Compare(Builtin::Lt) => "$lt",
            Helper::Compare(Builtin::Gt) => "$gt",
            Helper::Compare(Builtin::Le) => "$le",
            Helper::Compare(_) => "$ge",
            Helper::Get => "$get",
            Helper::Nth => "$nth",
            Helper::Rest => "$rest",
            Helper::Next => "$next",
        }
    }

    fn source(&self) -> String {
        match self {
            Helper::Truthy => "static boolean $truthy(Object value) {\n\
                 \x20   return value != null && !Boolean.FALSE.equals(value);\n\
                 }"
            .to_string(),
            Helper::Str => "static String $str(Object... parts) {\n\
                 \x20   StringBuilder out = new StringBuilder();\n\
                 \x20   for (Object part : parts) {\n\
                 \x20       if (part != null) {\n\
                 \x20           out.append(part);\n\
                 \x20       }\n\
                 \x20   }\n\
                 \x20   return out.toString();\n\
                 }"
            .to_string(),
            Helper::Eq => "static boolean $eq(Object... values) {\n\
                 \x20   for (int i = 1; i < values.length; i++) {\n\
                 \x20       if (!java.util.Objects.equals(values[0], values[i])) {\n\
                 \x20           return false;\n\
                 \x20       }\n\
                 \x20   }\n\
                 \x20   return true;\n\
                 }"
            .to_string(),
            Helper::Compare(op) => format!(
                "static boolean {}(long... values) {{\n\
                 \x20   for (int i = 1; i < values.length; i++) {{\n\
                 \x20       if (!(values[i - 1] {} values[i])) {{\n\
                 \x20           return false;\n\
                 \x20       }}\n\
                 \x20   }}\n\
                 \x20   return true;\n\
                 }}",
                self.name(),
                op.symbol()
            ),
            Helper::Get => "static <T> T $get(T[] array, long index, T missing) {\n\
                 \x20   return index >= 0 && index < array.length ? array[(int) index] : missing;\n\
                 }"
            .to_string(),
            Helper::Nth => "static <T> T $nth(T[] array, long index) {\n\
                 \x20   if (index < 0 || index >= array.length) {\n\
                 \x20       throw new IndexOutOfBoundsException(\"Index \" + index + \" out of bounds for length \" + array.length);\n\
                 \x20   }\n\
                 \x20   return array[(int) index];\n\
                 }"
            .to_string(),
            Helper::Rest => "static <T> T[] $rest(T[] array, int from) {\n\
                 \x20   return java.util.Arrays.copyOfRange(array, Math.min(from, array.length), array.length);\n\
                 }"
            .to_string(),
            Helper::Next => "static <T> T[] $next(T[] array, int from) {\n\
                 \x20   return array.length > from ? java.util.Arrays.copyOfRange(array, from, array.length) : null;\n\
                 }"
            .to_string(),
        }
    }
}

struct JavaWriter {
    buffer: String,
    indent_level: usize,
}

impl JavaWriter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn line(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent_level {
                self.buffer.push_str(INDENT);
            }
            self.buffer.push_str(line);
        }
        self.buffer.push('\n');
    }

    /// A multi-line block, each line at the current indentation.
    fn block(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    fn finish(self) -> String {
        self.buffer
    }
}

/// Emit `program` as a Java class named `class_name`.
pub fn emit_program(program: &CoreProgram, class_name: &str) -> CompileResult<String> {
    let mut emitter = Emitter::new(program)?;

    let mut members = vec![];
    for def in &program.definitions {
        members.push(match def {
            CoreDefinition::Function(function) => emitter.function(function)?,
            CoreDefinition::Value(value) => emitter.value(value)?,
        });
    }
    let main = emitter.main(program)?;

    let mut out = JavaWriter::new();
    out.line(&format!("public class {} {{", class_name));
    out.indent();
    out.block(&main);
    for member in &members {
        out.line("");
        out.block(member);
    }
    for helper in &emitter.helpers {
        out.line("");
        out.block(&helper.source());
    }
    out.dedent();
    out.line("}");

    debug!(
        "emitted class `{}` with {} definitions and {} helpers",
        class_name,
        members.len(),
        emitter.helpers.len()
    );
    Ok(out.finish())
}

struct Emitter<'a> {
    functions: HashMap<&'a str, &'a CoreFunction>,
    values: HashSet<&'a str>,
    /// Java name of every top-level definition
    names: HashMap<&'a str, String>,
    helpers: BTreeSet<Helper>,
    temps: usize,
}

impl<'a> Emitter<'a> {
    fn new(program: &'a CoreProgram) -> CompileResult<Self> {
        let mut emitter = Emitter {
            functions: HashMap::new(),
            values: HashSet::new(),
            names: HashMap::new(),
            helpers: BTreeSet::new(),
            temps: 0,
        };

        let mut taken: HashSet<String> = HashSet::from(["main".to_string()]);
        for def in &program.definitions {
            let java = munge(def.name());
            if !taken.insert(java.clone()) {
                return Err(CompileError::NameCollision {
                    name: java,
                    span: def.position(),
                });
            }
            emitter.names.insert(def.name(), java);
            match def {
                CoreDefinition::Function(function) => {
                    emitter.functions.insert(&function.name, function);
                }
                CoreDefinition::Value(value) => {
                    emitter.values.insert(&value.name);
                }
            }
        }

        Ok(emitter)
    }

    fn global_name(&self, name: &str) -> String {
        self.names
            .get(name)
            .cloned()
            .unwrap_or_else(|| munge(name))
    }

    fn use_helper(&mut self, helper: Helper) -> &'static str {
        self.helpers.insert(helper);
        helper.name()
    }

    /// `public static void main(String[] args)`, delegating to the entry.
    fn main(&self, program: &CoreProgram) -> CompileResult<String> {
        let Some(entry) = self.functions.get(program.entry.as_str()) else {
            return Err(CompileError::MissingEntryPoint {
                name: program.entry.clone(),
            });
        };
        let args = match entry.params.as_slice() {
            [] => "",
            [param] if java_type(param.info.get()) == "String[]" => "args",
            _ => {
                return Err(CompileError::unsupported(
                    format!("entry signature of `{}`", entry.name),
                    entry.position.clone(),
                ));
            }
        };

        let mut out = JavaWriter::new();
        out.line("public static void main(String[] args) {");
        out.indent();
        out.line(&format!("{}({});", self.global_name(&entry.name), args));
        out.dedent();
        out.line("}");
        Ok(out.finish())
    }

    fn value(&mut self, value: &CoreValueDef) -> CompileResult<String> {
        let expr = self.expr(&value.value)?;
        Ok(format!(
            "static final {} {} = {};",
            java_type(value.value.ty()),
            self.global_name(&value.name),
            expr
        ))
    }

    fn function(&mut self, function: &CoreFunction) -> CompileResult<String> {
        self.temps = 0;

        let mut locals = HashSet::new();
        let mut params = vec![];
        for param in &function.params {
            let name = munge(&param.name);
            if !locals.insert(name.clone()) {
                return Err(CompileError::NameCollision {
                    name,
                    span: param.position.clone(),
                });
            }
            params.push(format!("{} {}", java_type(param.info.get()), name));
        }

        let returns = function.returns.get();
        let mut out = JavaWriter::new();
        out.line(&format!(
            "static {} {}({}) {{",
            java_type(returns),
            self.global_name(&function.name),
            params.join(", ")
        ));
        out.indent();

        match function.body.split_last() {
            None => out.line("return null;"),
            Some((tail, statements)) => {
                for statement in statements {
                    let line = self.statement(statement)?;
                    out.line(&line);
                }
                if self.is_void_call(tail) {
                    let line = self.statement(tail)?;
                    out.line(&line);
                    out.line("return null;");
                } else {
                    let value = self.expr(tail)?;
                    out.line(&format!("return {};", coerce(value, tail.ty(), returns)));
                }
            }
        }

        out.dedent();
        out.line("}");
        Ok(out.finish())
    }

    fn is_void_call(&self, expr: &CoreExpr) -> bool {
        matches!(expr, CoreExpr::Call(CoreCall { callee: Callee::Host(method), .. }) if method.is_void())
    }

    /// An expression evaluated for its effect only.
    fn statement(&mut self, expr: &CoreExpr) -> CompileResult<String> {
        match expr {
            CoreExpr::Call(CoreCall {
                callee: Callee::Host(method),
                args,
                position,
                ..
            }) => Ok(format!("{};", self.host_call(method, args, position, true)?)),
            CoreExpr::Call(CoreCall {
                callee: Callee::Named(_),
                ..
            }) => Ok(format!("{};", self.expr(expr)?)),
            _ => {
                let temp = format!("tmp${}", self.temps);
                self.temps += 1;
                Ok(format!(
                    "{} {} = {};",
                    java_type(expr.ty()),
                    temp,
                    self.expr(expr)?
                ))
            }
        }
    }

    fn expr(&mut self, expr: &CoreExpr) -> CompileResult<String> {
        match expr {
            CoreExpr::Literal(literal) => Ok(match &literal.value {
                LiteralValue::Nil => "null".to_string(),
                LiteralValue::Boolean(true) => "Boolean.TRUE".to_string(),
                LiteralValue::Boolean(false) => "Boolean.FALSE".to_string(),
                LiteralValue::Integer(i) => format!("Long.valueOf({}L)", i),
                LiteralValue::String(s) => string_literal(s),
            }),
            CoreExpr::Var(var) => self.var(var),
            CoreExpr::Call(call) => self.call(call),
            CoreExpr::FunctionRef(function) => Err(CompileError::unsupported(
                format!("function value `{}`", function.name),
                function.position.clone(),
            )),
            CoreExpr::Closure(closure) => Err(CompileError::unsupported(
                "closure",
                closure.position.clone(),
            )),
            CoreExpr::Conditional(cond) => {
                let test = self.truthy(&cond.test)?;
                let then_expr = self.expr(&cond.then_expr)?;
                let else_expr = self.expr(&cond.else_expr)?;
                Ok(format!("({} ? {} : {})", test, then_expr, else_expr))
            }
            CoreExpr::ArrayGet(get) => self.array_get(get),
            CoreExpr::ArraySlice(slice) => {
                let helper = self.use_helper(if slice.nil_if_empty {
                    Helper::Next
                } else {
                    Helper::Rest
                });
                let array = self.expr(&slice.array)?;
                Ok(format!("{}({}, {})", helper, array, slice.from))
            }
            CoreExpr::ArrayLength(len) => {
                let array = self.expr(&len.array)?;
                Ok(format!("Long.valueOf({}.length)", array))
            }
        }
    }

    fn var(&self, var: &CoreVar) -> CompileResult<String> {
        match var.binding {
            Binding::Local => Ok(munge(&var.name)),
            Binding::Global if self.values.contains(var.name.as_str()) => {
                Ok(self.global_name(&var.name))
            }
            Binding::Global => Err(CompileError::unsupported(
                format!("function value `{}`", var.name),
                var.position.clone(),
            )),
        }
    }

    fn truthy(&mut self, expr: &CoreExpr) -> CompileResult<String> {
        let value = self.expr(expr)?;
        Ok(format!("{}({})", self.use_helper(Helper::Truthy), value))
    }

    fn args(&mut self, args: &[CoreExpr]) -> CompileResult<Vec<String>> {
        args.iter().map(|arg| self.expr(arg)).collect()
    }

    fn call(&mut self, call: &CoreCall) -> CompileResult<String> {
        match &call.callee {
            Callee::Named(name) => self.named_call(name, &call.args, &call.position),
            Callee::Builtin(builtin) => self.builtin(*builtin, &call.args, &call.position),
            Callee::Host(method) => self.host_call(method, &call.args, &call.position, false),
            Callee::Closure(closure) => Err(CompileError::unsupported(
                "closure",
                closure.position.clone(),
            )),
            Callee::Dynamic(_) => Err(CompileError::unsupported(
                "call of a computed function",
                call.position.clone(),
            )),
        }
    }

    fn named_call(&mut self, name: &str, args: &[CoreExpr], position: &Span) -> CompileResult<String> {
        let Some(function) = self.functions.get(name).copied() else {
            return Err(CompileError::unsupported(
                format!("call through value `{}`", name),
                position.clone(),
            ));
        };
        if function.params.len() != args.len() {
            return Err(CompileError::unsupported(
                format!(
                    "call of `{}` with {} argument(s), expected {}",
                    name,
                    args.len(),
                    function.params.len()
                ),
                position.clone(),
            ));
        }

        let mut emitted = vec![];
        for (arg, param) in args.iter().zip(&function.params) {
            let value = self.expr(arg)?;
            emitted.push(coerce(value, arg.ty(), param.info.get()));
        }
        Ok(format!("{}({})", self.global_name(name), emitted.join(", ")))
    }

    fn host_call(
        &mut self,
        method: &HostMethod,
        args: &[CoreExpr],
        position: &Span,
        statement: bool,
    ) -> CompileResult<String> {
        if method.is_void() && !statement {
            return Err(CompileError::unsupported(
                format!("void call `{}` in value position", method),
                position.clone(),
            ));
        }

        let mut emitted = vec![];
        for (i, arg) in args.iter().enumerate() {
            let value = self.expr(arg)?;
            let expected = TypeInfo::Concrete(method.param_type(i));
            emitted.push(coerce(value, arg.ty(), &expected));
        }

        let call = match method.kind {
            HostKind::Static | HostKind::Field(_) => {
                format!("{}({})", method.java_target(), emitted.join(", "))
            }
            HostKind::Instance => {
                let Some((receiver, rest)) = emitted.split_first() else {
                    return Err(CompileError::unsupported(
                        format!("`{}` without a target", method),
                        position.clone(),
                    ));
                };
                format!("{}.{}({})", receiver, method.method, rest.join(", "))
            }
        };

        Ok(match method.returns {
            Some(Type::Long) => format!("Long.valueOf({})", call),
            Some(Type::Boolean) => format!("Boolean.valueOf({})", call),
            _ => call,
        })
    }

    fn long_operands(
        &mut self,
        builtin: Builtin,
        args: &[CoreExpr],
        position: &Span,
    ) -> CompileResult<Vec<String>> {
        if let Some(arg) = args
            .iter()
            .find(|arg| arg.ty() != &TypeInfo::Concrete(Type::Long))
        {
            return Err(CompileError::unsupported(
                format!("`{}` on {} operand", builtin.symbol(), arg.ty()),
                position.clone(),
            ));
        }
        self.args(args)
    }

    fn builtin(
        &mut self,
        builtin: Builtin,
        args: &[CoreExpr],
        position: &Span,
    ) -> CompileResult<String> {
        match builtin {
            Builtin::Add | Builtin::Mul => {
                let operands = self.long_operands(builtin, args, position)?;
                let (exact, identity) = if builtin == Builtin::Add {
                    ("Math.addExact", "0L")
                } else {
                    ("Math.multiplyExact", "1L")
                };
                Ok(format!("Long.valueOf({})", fold_exact(exact, identity, operands)))
            }
            Builtin::Sub => {
                let operands = self.long_operands(builtin, args, position)?;
                match operands.as_slice() {
                    [single] => Ok(format!("Long.valueOf(Math.negateExact({}))", single)),
                    _ => Ok(format!(
                        "Long.valueOf({})",
                        fold_exact("Math.subtractExact", "0L", operands)
                    )),
                }
            }
            Builtin::Inc | Builtin::Dec => {
                let operands = self.long_operands(builtin, args, position)?;
                let exact = if builtin == Builtin::Inc {
                    "Math.incrementExact"
                } else {
                    "Math.decrementExact"
                };
                Ok(format!("Long.valueOf({}({}))", exact, operands.join(", ")))
            }
            Builtin::Lt | Builtin::Gt | Builtin::Le | Builtin::Ge => {
                let operands = self.long_operands(builtin, args, position)?;
                match operands.as_slice() {
                    [a, b] => Ok(format!("Boolean.valueOf({} {} {})", a, builtin.symbol(), b)),
                    _ => {
                        let helper = self.use_helper(Helper::Compare(builtin));
                        Ok(format!("Boolean.valueOf({}({}))", helper, operands.join(", ")))
                    }
                }
            }
            Builtin::Eq => {
                let operands = self.varargs(args)?;
                let helper = self.use_helper(Helper::Eq);
                Ok(format!("Boolean.valueOf({}({}))", helper, operands.join(", ")))
            }
            Builtin::Str => {
                if args.is_empty() {
                    return Ok("\"\"".to_string());
                }
                let operands = self.varargs(args)?;
                let helper = self.use_helper(Helper::Str);
                Ok(format!("{}({})", helper, operands.join(", ")))
            }
            Builtin::Not => {
                let [arg] = args else {
                    return Err(CompileError::unsupported("`not` arity", position.clone()));
                };
                Ok(format!("Boolean.valueOf(!{})", self.truthy(arg)?))
            }
            Builtin::IsNil => {
                let [arg] = args else {
                    return Err(CompileError::unsupported("`nil?` arity", position.clone()));
                };
                Ok(format!("Boolean.valueOf({} == null)", self.expr(arg)?))
            }
            Builtin::First
            | Builtin::Second
            | Builtin::Rest
            | Builtin::Next
            | Builtin::Count
            | Builtin::Nth => {
                let receiver = args.first().map(|a| a.ty().clone()).unwrap_or_default();
                Err(CompileError::unsupported(
                    format!("generic `{}` on {}", builtin.symbol(), receiver),
                    position.clone(),
                ))
            }
        }
    }

    /// Arguments for an `Object...` helper; a lone array must not be spread.
    fn varargs(&mut self, args: &[CoreExpr]) -> CompileResult<Vec<String>> {
        let mut emitted = vec![];
        for arg in args {
            let value = self.expr(arg)?;
            emitted.push(if matches!(arg.ty(), TypeInfo::Array(_)) {
                format!("(Object) {}", value)
            } else {
                value
            });
        }
        Ok(emitted)
    }

    fn array_get(&mut self, get: &CoreArrayGet) -> CompileResult<String> {
        let inline_index = match (get.array.as_ref(), get.index.as_ref()) {
            (
                CoreExpr::Var(_),
                CoreExpr::Literal(CoreLiteral {
                    value: LiteralValue::Integer(index),
                    ..
                }),
            ) => i32::try_from(*index).ok().filter(|index| *index >= 0),
            _ => None,
        };
        let array = self.expr(&get.array)?;

        if let Some(index) = inline_index {
            match &get.missing {
                Missing::Fault => return Ok(format!("{}[{}]", array, index)),
                Missing::Nil => {
                    return Ok(format!(
                        "({}.length > {} ? {}[{}] : null)",
                        array, index, array, index
                    ));
                }
                Missing::Default(default)
                    if matches!(default.as_ref(), CoreExpr::Literal(_) | CoreExpr::Var(_)) =>
                {
                    let default = self.expr(default)?;
                    return Ok(format!(
                        "({}.length > {} ? {}[{}] : {})",
                        array, index, array, index, default
                    ));
                }
                Missing::Default(_) => {}
            }
        }

        let index = self.expr(&get.index)?;
        match &get.missing {
            Missing::Fault => {
                let helper = self.use_helper(Helper::Nth);
                Ok(format!("{}({}, {})", helper, array, index))
            }
            Missing::Nil => {
                let helper = self.use_helper(Helper::Get);
                Ok(format!("{}({}, {}, null)", helper, array, index))
            }
            Missing::Default(default) => {
                let default = self.expr(default)?;
                let helper = self.use_helper(Helper::Get);
                Ok(format!("{}({}, {}, {})", helper, array, index, default))
            }
        }
    }
}

/// `exact(exact(a, b), c)`, or `identity` when there are no operands.
fn fold_exact(exact: &str, identity: &str, operands: Vec<String>) -> String {
    let mut operands = operands.into_iter();
    let Some(first) = operands.next() else {
        return identity.to_string();
    };
    operands.fold(first, |acc, operand| format!("{}({}, {})", exact, acc, operand))
}

/// Downcast an `Object`-typed value where a narrower Java type is expected.
fn coerce(value: String, from: &TypeInfo, to: &TypeInfo) -> String {
    let target = java_type(to);
    if target != "Object" && java_type(from) == "Object" && value != "null" {
        format!("(({}) {})", target, value)
    } else {
        value
    }
}
