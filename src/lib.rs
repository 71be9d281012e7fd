//! # sclj - a static Clojure subset compiled to Java
//!
//! `sclj` compiles a small, statically typeable subset of Clojure into a
//! single Java class. There is no runtime library: types are inferred for
//! the whole program, every closure is lambda lifted into a static method,
//! and generic sequence operations are specialized to plain array access.
//!
//! ## Architecture Overview
//!
//! 1. **Lexer** (`lexer`) - Tokenizes source code using the `lachs` library
//! 2. **Parser** (`parser`) - Reads tokens into forms with parser combinators
//! 3. **Builder** (`desugar`) - Turns forms into the core AST; `let` and `do`
//!    become immediately applied closures
//! 4. **Type Inference** (`types`) - Fixed-point inference from the entry
//!    signature along call edges
//! 5. **Lambda Lifting** (`transform::lift`) - Closures become top-level
//!    functions taking their captured variables as extra parameters
//! 6. **Specialization** (`transform::specialize`) - `first`, `nth`,
//!    `count`, ... on arrays become array accesses
//! 7. **Void Normalization** (`transform::void`) - Void host calls go through
//!    adapters that return nil
//! 8. **Lambda Dropping** (`transform::drop`, optional) - Single-use lifted
//!    functions and adapters are folded back into their caller
//! 9. **Emitter** (`fmt::java`) - Prints the program as Java source
//!
//! ## Pipeline Flow
//!
//! ```text
//! Source Code (String)
//!     ↓
//! [Lexer] → Token Stream
//!     ↓
//! [Parser] → Forms (ast::Program)
//!     ↓
//! [Builder] → Core AST (core::CoreProgram)
//!     ↓
//! [Inference] → every TypeSlot narrowed as far as possible
//!     ↓
//! [Lift] → [Specialize] → [Normalize] → [Drop]?
//!     ↓
//! [Emitter] → Java class
//! ```
//!
//! The stages are chained through the typestate structs of [`pipeline`].
//! The [`interpreter`] can run the core program after any of them.
//!
//! ## Example Program
//!
//! ```clojure
//! (ns hello)
//!
//! (defn say-hello [name]
//!   (println "Hello," name))
//!
//! (defn -main [& args]
//!   (say-hello (first args)))
//! ```
//!
//! `say-hello` is only called with `(first args)`, so its parameter is a
//! `String`, the `first` becomes `(args.length > 0 ? args[0] : null)` and
//! the `println` is wrapped in a `do_void__N` adapter.
//!
//! ## Getting Started
//!
//! ```no_run
//! use sclj::{compile, config::CompilerConfig};
//!
//! let source = std::fs::read_to_string("hello.clj").unwrap();
//! let compilation = compile(&source, &CompilerConfig::default()).unwrap();
//! println!("{}", compilation.java);
//! ```

pub mod ast;
pub mod config;
pub mod core;
pub mod desugar;
pub mod error;
pub mod fmt;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod transform;
pub mod types;

pub use error::{CompileError, CompileResult};
pub use pipeline::{Compilation, Compiler, compile};
