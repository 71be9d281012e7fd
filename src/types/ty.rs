//! The type lattice used by inference.
//!
//! ```text
//!            Concrete(..)   Array(Concrete(..))
//!                  \            /
//!                   \    Array(Unknown)
//!                    \      /
//!                    Unknown
//! ```
//!
//! Inference only ever moves a [`TypeSlot`] upwards. Once a slot is concrete
//! it keeps its type for the rest of the compilation.

use std::fmt;

/// Concrete (named) types known to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// The type of `nil`; joins with any non-array type.
    Nil,
    Boolean,
    Long,
    String,
    /// Supertype of everything, used for function values and (optionally)
    /// for joining incompatible branches.
    Object,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Nil => "Nil",
            Type::Boolean => "Boolean",
            Type::Long => "Long",
            Type::String => "String",
            Type::Object => "Object",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeInfo {
    #[default]
    Unknown,
    Concrete(Type),
    Array(Box<TypeInfo>),
}

impl TypeInfo {
    pub fn array_of(element: TypeInfo) -> Self {
        TypeInfo::Array(Box::new(element))
    }

    pub fn nil() -> Self {
        TypeInfo::Concrete(Type::Nil)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeInfo::Unknown)
    }

    /// Fully known: no `Unknown` anywhere inside.
    pub fn is_concrete(&self) -> bool {
        match self {
            TypeInfo::Unknown => false,
            TypeInfo::Concrete(_) => true,
            TypeInfo::Array(element) => element.is_concrete(),
        }
    }

    /// Element type if this is an array type.
    pub fn element(&self) -> Option<&TypeInfo> {
        match self {
            TypeInfo::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Whether `other` carries strictly more information than `self`
    /// without contradicting it.
    pub fn is_refined_by(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Unknown, TypeInfo::Unknown) => false,
            (TypeInfo::Unknown, _) => true,
            (TypeInfo::Array(a), TypeInfo::Array(b)) => a.is_refined_by(b),
            _ => false,
        }
    }

    /// Least common type of two branches (or two call-site arguments).
    ///
    /// `Unknown` absorbs everything so that a join only becomes concrete once
    /// all of its inputs are; this keeps the result monotone.
    pub fn join(&self, other: &TypeInfo, object_supertype: bool) -> TypeInfo {
        let fallback = || {
            if object_supertype {
                TypeInfo::Concrete(Type::Object)
            } else {
                TypeInfo::Unknown
            }
        };

        match (self, other) {
            (TypeInfo::Unknown, _) | (_, TypeInfo::Unknown) => TypeInfo::Unknown,
            (a, b) if a == b => a.clone(),
            (TypeInfo::Concrete(Type::Nil), TypeInfo::Concrete(t))
            | (TypeInfo::Concrete(t), TypeInfo::Concrete(Type::Nil)) => TypeInfo::Concrete(*t),
            (TypeInfo::Array(a), TypeInfo::Array(b)) => match a.join(b, false) {
                TypeInfo::Unknown => fallback(),
                element => TypeInfo::array_of(element),
            },
            _ => fallback(),
        }
    }

    /// Join over a list of types; `None` for an empty list.
    pub fn join_all<'a>(
        mut types: impl Iterator<Item = &'a TypeInfo>,
        object_supertype: bool,
    ) -> Option<TypeInfo> {
        let first = types.next()?.clone();
        Some(types.fold(first, |acc, ty| acc.join(ty, object_supertype)))
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeInfo::Unknown => f.write_str("?"),
            TypeInfo::Concrete(t) => write!(f, "{}", t),
            TypeInfo::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// A mutable, monotone type slot attached to AST nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeSlot(TypeInfo);

impl TypeSlot {
    pub fn unknown() -> Self {
        TypeSlot(TypeInfo::Unknown)
    }

    pub fn known(ty: TypeInfo) -> Self {
        TypeSlot(ty)
    }

    pub fn get(&self) -> &TypeInfo {
        &self.0
    }

    /// Narrow the slot towards `ty`. Returns whether the slot changed.
    ///
    /// A slot never moves back down the lattice: if `ty` is less precise
    /// than, or contradicts, the current type the slot is left as is.
    pub fn narrow(&mut self, ty: &TypeInfo) -> bool {
        if self.0.is_refined_by(ty) {
            self.0 = ty.clone();
            true
        } else {
            false
        }
    }
}

impl From<TypeInfo> for TypeSlot {
    fn from(ty: TypeInfo) -> Self {
        TypeSlot(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> TypeInfo {
        TypeInfo::Concrete(Type::String)
    }

    fn long() -> TypeInfo {
        TypeInfo::Concrete(Type::Long)
    }

    #[test]
    fn narrow_is_monotone() {
        let mut slot = TypeSlot::unknown();
        assert!(slot.narrow(&string()));
        assert!(!slot.narrow(&TypeInfo::Unknown));
        assert!(!slot.narrow(&long()));
        assert_eq!(slot.get(), &string());
    }

    #[test]
    fn narrow_refines_array_elements() {
        let mut slot = TypeSlot::known(TypeInfo::array_of(TypeInfo::Unknown));
        assert!(slot.narrow(&TypeInfo::array_of(string())));
        assert!(!slot.narrow(&TypeInfo::array_of(long())));
        assert_eq!(slot.get(), &TypeInfo::array_of(string()));
    }

    #[test]
    fn join_with_unknown_is_unknown() {
        assert_eq!(TypeInfo::Unknown.join(&string(), false), TypeInfo::Unknown);
        assert_eq!(string().join(&TypeInfo::Unknown, true), TypeInfo::Unknown);
    }

    #[test]
    fn nil_joins_with_scalars_but_not_arrays() {
        assert_eq!(TypeInfo::nil().join(&string(), false), string());
        assert_eq!(long().join(&TypeInfo::nil(), false), long());
        assert_eq!(
            TypeInfo::nil().join(&TypeInfo::array_of(string()), false),
            TypeInfo::Unknown
        );
    }

    #[test]
    fn incompatible_types_fall_back() {
        assert_eq!(string().join(&long(), false), TypeInfo::Unknown);
        assert_eq!(
            string().join(&long(), true),
            TypeInfo::Concrete(Type::Object)
        );
        assert_eq!(
            TypeInfo::array_of(string()).join(&string(), false),
            TypeInfo::Unknown
        );
    }

    #[test]
    fn arrays_join_elementwise() {
        let strings = TypeInfo::array_of(string());
        assert_eq!(strings.join(&strings, false), strings);
        assert_eq!(
            strings.join(&TypeInfo::array_of(long()), false),
            TypeInfo::Unknown
        );
    }

    #[test]
    fn display() {
        assert_eq!(TypeInfo::array_of(string()).to_string(), "String[]");
        assert_eq!(TypeInfo::Unknown.to_string(), "?");
    }
}
