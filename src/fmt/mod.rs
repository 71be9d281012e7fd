//! Printers for the core AST.
//!
//! [`core`] renders a program for humans (and debug logs), [`java`] renders
//! it as the compiler's output.

pub mod core;
pub mod java;

pub use java::{class_name, emit_program, munge};
