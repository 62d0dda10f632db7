use super::{CodegenError, CodegenResult, FloatPredicate, IntPredicate, IrBuilder};
use crate::language::types::ValueType;

/// Reduces any numeric value to an I1 usable as a branch condition.
///
/// Floats compare not-equal against zero with the unordered predicate, so NaN
/// is truthy and only `0.0`/`-0.0` are falsy.
pub fn to_boolean<B: IrBuilder>(builder: &mut B, value: B::Value) -> CodegenResult<B::Value> {
    let ty = builder.value_type(value)?;
    match ty {
        ValueType::I1 => Ok(value),
        ValueType::F32 | ValueType::F64 => {
            let zero = builder.const_zero(ty)?;
            builder.build_float_compare(FloatPredicate::Une, value, zero)
        }
        ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64 => {
            let zero = builder.const_zero(ty)?;
            builder.build_int_compare(IntPredicate::Ne, value, zero)
        }
        ValueType::Void | ValueType::Ptr32 | ValueType::Ptr64 => {
            Err(CodegenError::NoBitWidth { ty })
        }
    }
}
