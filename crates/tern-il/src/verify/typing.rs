//! Operand typing

use crate::opcode::TypeCategory;
use crate::types::Type;
use std::fmt;

/// Static type of an operand as seen by the verifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum OperandTy {
    /// Fully typed value
    Known(Type),
    /// Integer literal, typed by its consumer
    IntLiteral(i64),
    /// Already reported (undefined value, unknown global, bad string id)
    Unknown,
}

impl OperandTy {
    /// Whether this operand can fill a slot of `category`
    pub(crate) fn fits(self, category: TypeCategory) -> bool {
        match (self, category) {
            (OperandTy::Unknown, _) => true,
            (_, TypeCategory::Dynamic) | (_, TypeCategory::InstrType) => true,
            (OperandTy::Known(ty), category) => category.admits(ty),
            (OperandTy::IntLiteral(v), TypeCategory::Exact(ty)) => ty.accepts_int_literal(v),
            (OperandTy::IntLiteral(v), TypeCategory::NarrowInt) => Type::I32.accepts_int_literal(v),
            (OperandTy::IntLiteral(_), TypeCategory::Any) => true,
        }
    }

    /// Whether this operand can be used where `ty` is expected
    pub(crate) fn fits_type(self, ty: Type) -> bool {
        self.fits(TypeCategory::Exact(ty))
    }
}

impl fmt::Display for OperandTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandTy::Known(ty) => write!(f, "{}", ty),
            OperandTy::IntLiteral(v) => write!(f, "integer literal {}", v),
            OperandTy::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_fits_by_range() {
        assert!(OperandTy::IntLiteral(1).fits_type(Type::I1));
        assert!(!OperandTy::IntLiteral(2).fits_type(Type::I1));
        assert!(OperandTy::IntLiteral(70000).fits_type(Type::I32));
        assert!(!OperandTy::IntLiteral(70000).fits_type(Type::I16));
        assert!(!OperandTy::IntLiteral(0).fits_type(Type::F64));
        assert!(!OperandTy::IntLiteral(0).fits_type(Type::Ptr));
    }

    #[test]
    fn test_known_and_unknown() {
        assert!(OperandTy::Known(Type::F64).fits_type(Type::F64));
        assert!(!OperandTy::Known(Type::F64).fits_type(Type::I64));
        assert!(OperandTy::Unknown.fits_type(Type::Str));
        assert!(OperandTy::Known(Type::I32).fits(TypeCategory::NarrowInt));
    }
}
