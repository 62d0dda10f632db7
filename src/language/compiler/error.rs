use crate::language::{
    operation::Operation,
    types::{Category, ValueType},
};
use miette::Diagnostic;
use thiserror::Error;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Internal compiler errors. Each one means an earlier pass let an invalid
/// combination through, so the driver aborts the script instead of emitting
/// code that may be wrong.
#[derive(Clone, Debug, PartialEq, Error, Diagnostic)]
pub enum CodegenError {
    #[error("cannot coerce {from} to {to}")]
    #[diagnostic(code(wasp::internal::coercion))]
    UnsupportedCoercion { from: Category, to: Category },
    #[error("type `{ty}` has no bit width")]
    #[diagnostic(code(wasp::internal::width))]
    NoBitWidth { ty: ValueType },
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    #[diagnostic(code(wasp::internal::type_mismatch))]
    TypeMismatch {
        context: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("no {op} instruction for `{ty}`")]
    #[diagnostic(code(wasp::internal::operation))]
    UnsupportedOperation { op: Operation, ty: ValueType },
    #[error("{context} expects a float operand, found `{found}`")]
    #[diagnostic(code(wasp::internal::expected_float))]
    ExpectedFloat { context: String, found: ValueType },
    #[error("instruction emitted outside of a function")]
    #[diagnostic(code(wasp::internal::no_function))]
    NoActiveFunction,
    #[error("value {0} does not belong to the current function")]
    #[diagnostic(code(wasp::internal::unknown_value))]
    UnknownValue(String),
    #[error("target IR builder failed: {0}")]
    #[diagnostic(code(wasp::internal::backend))]
    Backend(String),
}
