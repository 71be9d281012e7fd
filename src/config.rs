//! Compiler configuration.

use crate::types::{Type, TypeInfo};

/// Name and parameter types of the program's entry function. Its parameters
/// are never narrowed from call sites; they are fixed by this signature.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignature {
    pub name: String,
    pub params: Vec<TypeInfo>,
}

impl Default for EntrySignature {
    fn default() -> Self {
        Self {
            name: "-main".to_string(),
            params: vec![TypeInfo::array_of(TypeInfo::Concrete(Type::String))],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferConfig {
    /// Join incompatible types to `Object` instead of leaving them unknown.
    pub object_supertype: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerConfig {
    pub entry: EntrySignature,
    pub infer: InferConfig,
    /// Overrides the Java class name derived from the namespace.
    pub class_name: Option<String>,
    /// Fold single-use generated functions into their caller.
    pub lambda_drop: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, name: impl Into<String>, params: Vec<TypeInfo>) -> Self {
        self.entry = EntrySignature {
            name: name.into(),
            params,
        };
        self
    }

    pub fn with_object_supertype(mut self, enabled: bool) -> Self {
        self.infer.object_supertype = enabled;
        self
    }

    pub fn with_lambda_drop(mut self, enabled: bool) -> Self {
        self.lambda_drop = enabled;
        self
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = Some(name.into());
        self
    }
}
