use crate::language::types::ValueType;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Evaluation errors of the reference interpreter. Traps are not errors; these
/// cover inputs whose behavior the target IR leaves undefined.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Division by zero reached the evaluator in `{function}`")]
    DivisionByZero { function: String },
    #[error("Signed division overflow reached the evaluator in `{function}`")]
    Overflow { function: String },
    #[error("Float value {value} cannot be represented as {ty}")]
    InvalidConversion { value: f64, ty: ValueType },
    #[error("Shift count {count} out of range for {ty}")]
    ShiftOutOfRange { count: u64, ty: ValueType },
    #[error("Value `%{index}` used before it was defined")]
    UndefinedValue { index: usize },
    #[error("Function `{name}` ended without a return")]
    MissingReturn { name: String },
    #[error("Unknown function `{name}`")]
    UnknownFunction { name: String },
}
