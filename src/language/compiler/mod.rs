use crate::language::{
    assert::{Assertion, AssertionNames, Check},
    ast::{DirectiveKind, Script},
    types::ValueType,
};
use std::fmt;
use tracing::debug;

pub mod coerce;
pub mod condition;
mod emit;
pub mod error;
#[cfg(feature = "llvm")]
pub mod llvm;

pub use coerce::{coerce, plan, CoercionPlan, CoercionStep};
pub use condition::to_boolean;
pub use emit::{DIVIDE_BY_ZERO, INTEGER_OVERFLOW, INVALID_CONVERSION};
pub use error::{CodegenError, CodegenResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Float comparison predicates. The `O*` forms are false when either operand
/// is NaN; `Une` and `Uno` are true.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
    Une,
    Uno,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntBinary {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatBinary {
    Add,
    Sub,
    Mul,
    Div,
}

/// Target-IR capability the coercion and assertion code emits into.
///
/// Every `build_*` method appends exactly one instruction to the current
/// function and returns its result. Constants are not instructions.
pub trait IrBuilder {
    type Value: Copy + fmt::Debug;

    /// Physical type of a value as the builder sees it.
    fn value_type(&self, value: Self::Value) -> CodegenResult<ValueType>;

    fn const_int(&mut self, ty: ValueType, bits: u64) -> CodegenResult<Self::Value>;
    fn const_f32(&mut self, value: f32) -> CodegenResult<Self::Value>;
    fn const_f64(&mut self, value: f64) -> CodegenResult<Self::Value>;

    fn const_zero(&mut self, ty: ValueType) -> CodegenResult<Self::Value> {
        match ty {
            ValueType::F32 => self.const_f32(0.0),
            ValueType::F64 => self.const_f64(0.0),
            ValueType::I1 | ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64 => {
                self.const_int(ty, 0)
            }
            ValueType::Void | ValueType::Ptr32 | ValueType::Ptr64 => {
                Err(CodegenError::NoBitWidth { ty })
            }
        }
    }

    fn build_int_extend(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value>;
    fn build_int_truncate(&mut self, value: Self::Value, dest: ValueType)
        -> CodegenResult<Self::Value>;
    fn build_float_to_int(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value>;
    fn build_int_to_float(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value>;
    fn build_float_extend(&mut self, value: Self::Value, dest: ValueType)
        -> CodegenResult<Self::Value>;
    fn build_float_truncate(
        &mut self,
        value: Self::Value,
        dest: ValueType,
    ) -> CodegenResult<Self::Value>;
    fn build_bitcast(&mut self, value: Self::Value, dest: ValueType) -> CodegenResult<Self::Value>;

    fn build_int_compare(
        &mut self,
        predicate: IntPredicate,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value>;
    fn build_float_compare(
        &mut self,
        predicate: FloatPredicate,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value>;
    fn build_int_binary(
        &mut self,
        op: IntBinary,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value>;
    fn build_float_binary(
        &mut self,
        op: FloatBinary,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value>;
    fn build_select(
        &mut self,
        condition: Self::Value,
        then: Self::Value,
        otherwise: Self::Value,
    ) -> CodegenResult<Self::Value>;

    /// Aborts evaluation with `message` when the I1 `condition` holds.
    fn build_trap_if(&mut self, condition: Self::Value, message: &str) -> CodegenResult<()>;

    fn begin_function(&mut self, name: &str, ret: ValueType) -> CodegenResult<()>;
    fn build_return(&mut self, value: Option<Self::Value>) -> CodegenResult<()>;
}

/// Something that can lower itself into an [`IrBuilder`].
pub trait Expression {
    fn value_type(&self) -> ValueType;
    fn generate<B: IrBuilder>(&self, builder: &mut B) -> CodegenResult<B::Value>;
    fn dump(&self, indent: usize, out: &mut String);
}

pub(crate) fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Drives one compilation: owns the assertion name counter and generates
/// every assertion into a single builder.
#[derive(Debug, Default)]
pub struct Compiler {
    names: AssertionNames,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&mut self) -> &mut AssertionNames {
        &mut self.names
    }

    pub fn build_assertions(&mut self, script: Script) -> Vec<Assertion> {
        script
            .directives
            .into_iter()
            .map(|directive| {
                let span = directive.span;
                let assertion = match directive.kind {
                    DirectiveKind::AssertReturn { expr, expected } => {
                        Assertion::assert_return(&mut self.names, expr, expected)
                    }
                    DirectiveKind::AssertReturnNan { expr } => {
                        Assertion::assert_return_nan(&mut self.names, expr)
                    }
                    DirectiveKind::AssertTrap { expr, message } => {
                        Assertion::assert_trap(&mut self.names, expr, message)
                    }
                };
                assertion.with_span(span)
            })
            .collect()
    }

    pub fn compile<B: IrBuilder>(
        &self,
        assertions: &[Assertion],
        builder: &mut B,
    ) -> CodegenResult<Vec<Check>> {
        let checks = assertions
            .iter()
            .map(|assertion| assertion.generate(builder))
            .collect::<CodegenResult<Vec<_>>>()?;
        debug!(count = checks.len(), "generated assertion checks");
        Ok(checks)
    }
}

#[cfg(test)]
mod tests;
