//! # Typestate Compiler Pipeline
//!
//! Each struct is one stage of the compilation. Methods consume `self` and
//! return the next stage, so the passes can only run once and only in
//! order:
//!
//! ```text
//! Compiler::parse(source)?          -> Parsed
//!   .build(&config)?                -> Built
//!   .infer()                        -> Typed
//!   .lift()?                        -> Lifted
//!   .specialize()                   -> Specialized
//!   .normalize()                    -> Normalized (lambda dropping, if enabled)
//!   .emit()?                        -> Compilation
//! ```
//!
//! Every stage after `build` exposes its [`CoreProgram`], which the
//! interpreter can run to check that a pass preserved behavior.

use log::debug;

use crate::ast::Program;
use crate::config::CompilerConfig;
use crate::core::CoreProgram;
use crate::desugar::build_program;
use crate::error::{CompileError, CompileResult};
use crate::fmt;
use crate::lexer::{Token, strip_comments};
use crate::parser::{ParseState, parse};
use crate::transform::NameGenerator;
use crate::transform::drop::{DropReport, drop_program};
use crate::transform::lift::{LiftReport, lift_program};
use crate::transform::specialize::{SpecializeReport, specialize_program};
use crate::transform::void::{NormalizeReport, normalize_program};
use crate::types::{InferenceReport, infer_program};

/// Entry point for the compiler. Use `Compiler::parse()` to start the pipeline.
pub struct Compiler;

impl Compiler {
    pub fn parse(source: &str) -> CompileResult<Parsed> {
        let tokens = Token::lex(&strip_comments(source)).map_err(|e| CompileError::Lex {
            message: e.to_string(),
        })?;
        let mut state = ParseState::new(tokens);
        match parse(&mut state) {
            (Some(program), _) => Ok(Parsed { program }),
            (None, errors) => Err(errors
                .into_iter()
                .next()
                .map(CompileError::Parse)
                .unwrap_or_else(|| CompileError::Lex {
                    message: "no input".to_string(),
                })),
        }
    }
}

/// Source has been read into forms
#[derive(Debug)]
pub struct Parsed {
    pub program: Program,
}

impl Parsed {
    /// Build the core AST and check the entry point.
    pub fn build(self, config: &CompilerConfig) -> CompileResult<Built> {
        let program = build_program(&self.program, config)?;
        Ok(Built {
            program,
            config: config.clone(),
        })
    }
}

/// The core AST exists; nothing is typed yet
#[derive(Debug)]
pub struct Built {
    pub program: CoreProgram,
    pub config: CompilerConfig,
}

impl Built {
    pub fn infer(mut self) -> Typed {
        let report = infer_program(&mut self.program, &self.config.entry, &self.config.infer);
        debug!(
            "inferred types in {} rounds:\n{}",
            report.rounds, self.program
        );
        Typed {
            program: self.program,
            config: self.config,
            inference: report,
        }
    }
}

/// Every slot inference could reach is narrowed
#[derive(Debug)]
pub struct Typed {
    pub program: CoreProgram,
    pub config: CompilerConfig,
    pub inference: InferenceReport,
}

impl Typed {
    pub fn lift(self) -> CompileResult<Lifted> {
        let mut names = NameGenerator::seeded(&self.program);
        let (program, lifting) = lift_program(self.program, &mut names)?;
        debug!("lifted program:\n{}", program);
        Ok(Lifted {
            program,
            config: self.config,
            names,
            inference: self.inference,
            lifting,
        })
    }
}

/// No closure is left
#[derive(Debug)]
pub struct Lifted {
    pub program: CoreProgram,
    pub config: CompilerConfig,
    names: NameGenerator,
    pub inference: InferenceReport,
    pub lifting: LiftReport,
}

impl Lifted {
    pub fn specialize(self) -> Specialized {
        let (program, specialization) = specialize_program(self.program);
        Specialized {
            program,
            config: self.config,
            names: self.names,
            inference: self.inference,
            lifting: self.lifting,
            specialization,
        }
    }
}

/// Sequence operations on arrays are direct array accesses
#[derive(Debug)]
pub struct Specialized {
    pub program: CoreProgram,
    pub config: CompilerConfig,
    names: NameGenerator,
    pub inference: InferenceReport,
    pub lifting: LiftReport,
    pub specialization: SpecializeReport,
}

impl Specialized {
    pub fn normalize(mut self) -> Normalized {
        let (program, normalization) = normalize_program(self.program, &mut self.names);
        debug!("normalized program:\n{}", program);
        let (program, dropping) = if self.config.lambda_drop {
            let (program, dropping) = drop_program(program);
            debug!("dropped {:?}:\n{}", dropping.dropped, program);
            (program, dropping)
        } else {
            (program, DropReport::default())
        };
        Normalized {
            program,
            config: self.config,
            reports: Reports {
                inference: self.inference,
                lifting: self.lifting,
                specialization: self.specialization,
                normalization,
                dropping,
            },
        }
    }
}

/// What each pass did, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Reports {
    pub inference: InferenceReport,
    pub lifting: LiftReport,
    pub specialization: SpecializeReport,
    pub normalization: NormalizeReport,
    /// Empty unless lambda dropping is enabled
    pub dropping: DropReport,
}

/// Void host calls only happen as statements
#[derive(Debug)]
pub struct Normalized {
    pub program: CoreProgram,
    pub config: CompilerConfig,
    pub reports: Reports,
}

impl Normalized {
    pub fn class_name(&self) -> String {
        fmt::class_name(
            self.program.namespace.as_deref(),
            self.config.class_name.as_deref(),
        )
    }

    pub fn emit(self) -> CompileResult<Compilation> {
        let class_name = self.class_name();
        let java = fmt::emit_program(&self.program, &class_name)?;
        Ok(Compilation {
            class_name,
            java,
            program: self.program,
            reports: self.reports,
        })
    }
}

/// The finished compilation.
#[derive(Debug)]
pub struct Compilation {
    pub class_name: String,
    /// Source of the Java class
    pub java: String,
    /// The program the Java source was emitted from
    pub program: CoreProgram,
    pub reports: Reports,
}

/// Run the whole pipeline on `source`.
pub fn compile(source: &str, config: &CompilerConfig) -> CompileResult<Compilation> {
    Compiler::parse(source)?
        .build(config)?
        .infer()
        .lift()?
        .specialize()
        .normalize()
        .emit()
}
