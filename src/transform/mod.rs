//! Whole-program transformations on the typed core AST.
//!
//! The passes run in a fixed order, each consuming the program produced by
//! the previous one:
//!
//! 1. [`lift`] turns every closure into a top-level function
//! 2. [`specialize`] rewrites sequence operations on arrays
//! 3. [`void`] routes void host calls through adapters that return nil
//! 4. [`drop`] folds single-use generated functions back into their caller,
//!    when enabled

pub mod drop;
pub mod lift;
pub mod specialize;
pub mod void;

use std::collections::HashSet;

use lachs::Span;

use crate::core::CoreProgram;
use crate::error::{CompileError, CompileResult};

/// Fresh top-level names of the form `prefix__N`.
///
/// The counter is shared by all prefixes, so generated names stay unique
/// even across passes.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    taken: HashSet<String>,
    counter: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that avoids every name already defined in `program`.
    pub fn seeded(program: &CoreProgram) -> Self {
        let mut names = Self::new();
        for def in &program.definitions {
            names.taken.insert(def.name().to_string());
        }
        names
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{}__{}", prefix, self.counter);
            self.counter += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Reserve a name chosen elsewhere.
    pub fn claim(&mut self, name: &str, span: &Span) -> CompileResult<()> {
        if self.taken.insert(name.to_string()) {
            Ok(())
        } else {
            Err(CompileError::NameCollision {
                name: name.to_string(),
                span: span.clone(),
            })
        }
    }
}
