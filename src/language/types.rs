use crate::language::compiler::error::CodegenError;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The closed set of value types a lowered expression can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    F32,
    F64,
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr32,
    Ptr64,
}

/// Top-level dispatch key for coercions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Void,
    Integer,
    Float32,
    Float64,
    Pointer,
}

impl ValueType {
    pub const ALL: [ValueType; 10] = [
        ValueType::Void,
        ValueType::F32,
        ValueType::F64,
        ValueType::I1,
        ValueType::I8,
        ValueType::I16,
        ValueType::I32,
        ValueType::I64,
        ValueType::Ptr32,
        ValueType::Ptr64,
    ];

    pub const INTEGERS: [ValueType; 5] = [
        ValueType::I1,
        ValueType::I8,
        ValueType::I16,
        ValueType::I32,
        ValueType::I64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Void => "void",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::I1 => "i1",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::Ptr32 => "ptr32",
            ValueType::Ptr64 => "ptr64",
        }
    }

    /// Width in bits of the numeric types. `Void` and pointers have none.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            ValueType::I1 => Some(1),
            ValueType::I8 => Some(8),
            ValueType::I16 => Some(16),
            ValueType::F32 | ValueType::I32 => Some(32),
            ValueType::F64 | ValueType::I64 => Some(64),
            ValueType::Void | ValueType::Ptr32 | ValueType::Ptr64 => None,
        }
    }

    /// Like [`ValueType::bit_width`], for call sites where a width-less type
    /// means an earlier pass let something through.
    pub fn expect_bit_width(self) -> Result<u32, CodegenError> {
        self.bit_width().ok_or(CodegenError::NoBitWidth { ty: self })
    }

    pub fn category(self) -> Category {
        match self {
            ValueType::Void => Category::Void,
            ValueType::F32 => Category::Float32,
            ValueType::F64 => Category::Float64,
            ValueType::I1 | ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64 => {
                Category::Integer
            }
            ValueType::Ptr32 | ValueType::Ptr64 => Category::Pointer,
        }
    }

    pub fn is_integer(self) -> bool {
        self.category() == Category::Integer
    }

    pub fn is_float(self) -> bool {
        matches!(self.category(), Category::Float32 | Category::Float64)
    }

    /// Address width of a pointer type; an integer coerced to a pointer lands
    /// in an integer of this width.
    pub fn native_pointer_width(self) -> Option<u32> {
        match self {
            ValueType::Ptr32 => Some(32),
            ValueType::Ptr64 => Some(64),
            _ => None,
        }
    }

    pub fn integer_of_width(bits: u32) -> Option<ValueType> {
        match bits {
            1 => Some(ValueType::I1),
            8 => Some(ValueType::I8),
            16 => Some(ValueType::I16),
            32 => Some(ValueType::I32),
            64 => Some(ValueType::I64),
            _ => None,
        }
    }

    /// Integer type with the same width as this float, used for reinterpret.
    pub fn same_width_integer(self) -> Option<ValueType> {
        match self {
            ValueType::F32 => Some(ValueType::I32),
            ValueType::F64 => Some(ValueType::I64),
            _ => None,
        }
    }
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Void => "void",
            Category::Integer => "integer",
            Category::Float32 => "float",
            Category::Float64 => "double",
            Category::Pointer => "pointer",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown value type `{0}`")]
pub struct UnknownType(pub String);

impl FromStr for ValueType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}
