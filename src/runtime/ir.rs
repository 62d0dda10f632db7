//! In-memory SSA form used by the reference backend.

use crate::{
    language::{
        compiler::{
            CodegenError, CodegenResult, FloatBinary, FloatPredicate, IntBinary, IntPredicate,
            IrBuilder,
        },
        types::ValueType,
    },
    runtime::value::Scalar,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

impl ValueId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Extend {
        value: ValueId,
        to: ValueType,
        signed: bool,
    },
    Truncate {
        value: ValueId,
        to: ValueType,
    },
    FloatToInt {
        value: ValueId,
        to: ValueType,
        signed: bool,
    },
    IntToFloat {
        value: ValueId,
        to: ValueType,
        signed: bool,
    },
    FloatExtend {
        value: ValueId,
        to: ValueType,
    },
    FloatTruncate {
        value: ValueId,
        to: ValueType,
    },
    Bitcast {
        value: ValueId,
        to: ValueType,
    },
    IntCompare {
        predicate: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    FloatCompare {
        predicate: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    IntBinary {
        op: IntBinary,
        lhs: ValueId,
        rhs: ValueId,
    },
    FloatBinary {
        op: FloatBinary,
        lhs: ValueId,
        rhs: ValueId,
    },
    Select {
        condition: ValueId,
        then: ValueId,
        otherwise: ValueId,
    },
    TrapIf {
        condition: ValueId,
        message: String,
    },
    Return(Option<ValueId>),
}

impl Instruction {
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Extend { signed: true, .. } => "sext",
            Instruction::Extend { signed: false, .. } => "zext",
            Instruction::Truncate { .. } => "trunc",
            Instruction::FloatToInt { signed: true, .. } => "fptosi",
            Instruction::FloatToInt { signed: false, .. } => "fptoui",
            Instruction::IntToFloat { signed: true, .. } => "sitofp",
            Instruction::IntToFloat { signed: false, .. } => "uitofp",
            Instruction::FloatExtend { .. } => "fpext",
            Instruction::FloatTruncate { .. } => "fptrunc",
            Instruction::Bitcast { .. } => "bitcast",
            Instruction::IntCompare { .. } => "icmp",
            Instruction::FloatCompare { .. } => "fcmp",
            Instruction::IntBinary { .. } => "ibin",
            Instruction::FloatBinary { .. } => "fbin",
            Instruction::Select { .. } => "select",
            Instruction::TrapIf { .. } => "trap_if",
            Instruction::Return(_) => "ret",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueDef {
    Constant(Scalar),
    /// Result of the instruction at this position in the body.
    Instruction(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueSlot {
    pub ty: ValueType,
    pub def: ValueDef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub result: Option<ValueId>,
    pub instruction: Instruction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: ValueType,
    values: Vec<ValueSlot>,
    body: Vec<Statement>,
}

impl Function {
    fn new(name: &str, ret: ValueType) -> Self {
        Self {
            name: name.to_string(),
            ret,
            values: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn values(&self) -> &[ValueSlot] {
        &self.values
    }

    pub fn body(&self) -> &[Statement] {
        &self.body
    }

    pub fn instruction_count(&self) -> usize {
        self.body.len()
    }

    pub fn value(&self, id: ValueId) -> Option<&ValueSlot> {
        self.values.get(id.0)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(
            self.body.last(),
            Some(Statement {
                instruction: Instruction::Return(_),
                ..
            })
        )
    }

    fn operand(&self, id: ValueId) -> String {
        match self.values.get(id.0) {
            Some(ValueSlot {
                def: ValueDef::Constant(scalar),
                ..
            }) => scalar.to_string(),
            Some(slot) => format!("{} {id}", slot.ty),
            None => format!("<undefined {id}>"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "define {} @{}() {{", self.ret, self.name)?;
        for statement in &self.body {
            f.write_str("  ")?;
            if let Some(result) = statement.result {
                write!(f, "{result} = ")?;
            }
            let instruction = &statement.instruction;
            let opcode = instruction.opcode();
            match instruction {
                Instruction::Extend { value, to, .. }
                | Instruction::Truncate { value, to }
                | Instruction::FloatToInt { value, to, .. }
                | Instruction::IntToFloat { value, to, .. }
                | Instruction::FloatExtend { value, to }
                | Instruction::FloatTruncate { value, to }
                | Instruction::Bitcast { value, to } => {
                    write!(f, "{opcode} {} to {to}", self.operand(*value))?
                }
                Instruction::IntCompare {
                    predicate,
                    lhs,
                    rhs,
                } => write!(
                    f,
                    "{opcode} {predicate:?} {}, {}",
                    self.operand(*lhs),
                    self.operand(*rhs)
                )?,
                Instruction::FloatCompare {
                    predicate,
                    lhs,
                    rhs,
                } => write!(
                    f,
                    "{opcode} {predicate:?} {}, {}",
                    self.operand(*lhs),
                    self.operand(*rhs)
                )?,
                Instruction::IntBinary { op, lhs, rhs } => write!(
                    f,
                    "{op:?} {}, {}",
                    self.operand(*lhs),
                    self.operand(*rhs)
                )?,
                Instruction::FloatBinary { op, lhs, rhs } => write!(
                    f,
                    "f{op:?} {}, {}",
                    self.operand(*lhs),
                    self.operand(*rhs)
                )?,
                Instruction::Select {
                    condition,
                    then,
                    otherwise,
                } => write!(
                    f,
                    "{opcode} {}, {}, {}",
                    self.operand(*condition),
                    self.operand(*then),
                    self.operand(*otherwise)
                )?,
                Instruction::TrapIf { condition, message } => {
                    write!(f, "{opcode} {}, {message:?}", self.operand(*condition))?
                }
                Instruction::Return(Some(value)) => {
                    write!(f, "{opcode} {}", self.operand(*value))?
                }
                Instruction::Return(None) => f.write_str("ret void")?,
            }
            f.write_str("\n")?;
        }
        f.write_str("}\n")
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    functions: Vec<Function>,
}

impl Module {
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

/// [`IrBuilder`] over [`Module`]. Operand types are checked on every
/// instruction, so a wrong coercion surfaces as a [`CodegenError`] here
/// rather than as a bad result at evaluation time.
#[derive(Debug, Default)]
pub struct ReferenceBuilder {
    module: Module,
    current: Option<usize>,
}

impl ReferenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    pub fn current_function(&self) -> Option<&Function> {
        self.current
            .and_then(|index| self.module.functions.get(index))
    }

    fn function(&self) -> CodegenResult<&Function> {
        self.current_function()
            .ok_or(CodegenError::NoActiveFunction)
    }

    fn function_mut(&mut self) -> CodegenResult<&mut Function> {
        let index = self.current.ok_or(CodegenError::NoActiveFunction)?;
        self.module
            .functions
            .get_mut(index)
            .ok_or(CodegenError::NoActiveFunction)
    }

    fn define(&mut self, ty: ValueType, def: ValueDef) -> CodegenResult<ValueId> {
        let function = self.function_mut()?;
        let id = ValueId(function.values.len());
        function.values.push(ValueSlot { ty, def });
        Ok(id)
    }

    fn constant(&mut self, scalar: Scalar) -> CodegenResult<ValueId> {
        self.define(scalar.ty(), ValueDef::Constant(scalar))
    }

    fn emit(&mut self, ty: ValueType, instruction: Instruction) -> CodegenResult<ValueId> {
        let position = self.function()?.body.len();
        let id = self.define(ty, ValueDef::Instruction(position))?;
        self.function_mut()?.body.push(Statement {
            result: Some(id),
            instruction,
        });
        Ok(id)
    }

    fn emit_void(&mut self, instruction: Instruction) -> CodegenResult<()> {
        self.function_mut()?.body.push(Statement {
            result: None,
            instruction,
        });
        Ok(())
    }

    fn require(
        &self,
        value: ValueId,
        context: &str,
        expected: ValueType,
        accept: impl Fn(ValueType) -> bool,
    ) -> CodegenResult<ValueType> {
        let found = self.value_type(value)?;
        if accept(found) {
            Ok(found)
        } else {
            Err(mismatch(context, expected, found))
        }
    }

    fn require_same(&self, lhs: ValueId, rhs: ValueId, context: &str) -> CodegenResult<ValueType> {
        let ty = self.value_type(lhs)?;
        self.require(rhs, context, ty, |found| found == ty)
    }
}

fn mismatch(context: &str, expected: ValueType, found: ValueType) -> CodegenError {
    CodegenError::TypeMismatch {
        context: context.to_string(),
        expected,
        found,
    }
}

fn int_width(ty: ValueType) -> u32 {
    ty.bit_width().unwrap_or(0)
}

impl IrBuilder for ReferenceBuilder {
    type Value = ValueId;

    fn value_type(&self, value: ValueId) -> CodegenResult<ValueType> {
        self.function()?
            .value(value)
            .map(|slot| slot.ty)
            .ok_or_else(|| CodegenError::UnknownValue(value.to_string()))
    }

    fn const_int(&mut self, ty: ValueType, bits: u64) -> CodegenResult<ValueId> {
        if !(ty.is_integer() || ty.native_pointer_width().is_some()) {
            return Err(mismatch("integer constant", ValueType::I64, ty));
        }
        self.constant(Scalar::int(ty, bits))
    }

    fn const_f32(&mut self, value: f32) -> CodegenResult<ValueId> {
        self.constant(Scalar::f32(value))
    }

    fn const_f64(&mut self, value: f64) -> CodegenResult<ValueId> {
        self.constant(Scalar::f64(value))
    }

    fn build_int_extend(
        &mut self,
        value: ValueId,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<ValueId> {
        let context = if signed { "sext" } else { "zext" };
        self.require(value, context, dest, |ty| {
            ty.is_integer() && dest.is_integer() && int_width(ty) < int_width(dest)
        })?;
        self.emit(
            dest,
            Instruction::Extend {
                value,
                to: dest,
                signed,
            },
        )
    }

    fn build_int_truncate(&mut self, value: ValueId, dest: ValueType) -> CodegenResult<ValueId> {
        self.require(value, "trunc", dest, |ty| {
            ty.is_integer() && dest.is_integer() && int_width(ty) > int_width(dest)
        })?;
        self.emit(dest, Instruction::Truncate { value, to: dest })
    }

    fn build_float_to_int(
        &mut self,
        value: ValueId,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<ValueId> {
        let context = if signed { "fptosi" } else { "fptoui" };
        self.require(value, context, ValueType::F64, |ty| {
            ty.is_float() && dest.is_integer()
        })?;
        self.emit(
            dest,
            Instruction::FloatToInt {
                value,
                to: dest,
                signed,
            },
        )
    }

    fn build_int_to_float(
        &mut self,
        value: ValueId,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<ValueId> {
        let context = if signed { "sitofp" } else { "uitofp" };
        self.require(value, context, ValueType::I64, |ty| {
            ty.is_integer() && dest.is_float()
        })?;
        self.emit(
            dest,
            Instruction::IntToFloat {
                value,
                to: dest,
                signed,
            },
        )
    }

    fn build_float_extend(&mut self, value: ValueId, dest: ValueType) -> CodegenResult<ValueId> {
        self.require(value, "fpext", ValueType::F32, |ty| {
            ty == ValueType::F32 && dest == ValueType::F64
        })?;
        self.emit(dest, Instruction::FloatExtend { value, to: dest })
    }

    fn build_float_truncate(&mut self, value: ValueId, dest: ValueType) -> CodegenResult<ValueId> {
        self.require(value, "fptrunc", ValueType::F64, |ty| {
            ty == ValueType::F64 && dest == ValueType::F32
        })?;
        self.emit(dest, Instruction::FloatTruncate { value, to: dest })
    }

    fn build_bitcast(&mut self, value: ValueId, dest: ValueType) -> CodegenResult<ValueId> {
        self.require(value, "bitcast", dest, |ty| {
            ty.bit_width().is_some() && ty.bit_width() == dest.bit_width()
        })?;
        self.emit(dest, Instruction::Bitcast { value, to: dest })
    }

    fn build_int_compare(
        &mut self,
        predicate: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> CodegenResult<ValueId> {
        let ty = self.require_same(lhs, rhs, "icmp")?;
        if !ty.is_integer() {
            return Err(mismatch("icmp", ValueType::I32, ty));
        }
        self.emit(
            ValueType::I1,
            Instruction::IntCompare {
                predicate,
                lhs,
                rhs,
            },
        )
    }

    fn build_float_compare(
        &mut self,
        predicate: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> CodegenResult<ValueId> {
        let ty = self.require_same(lhs, rhs, "fcmp")?;
        if !ty.is_float() {
            return Err(mismatch("fcmp", ValueType::F64, ty));
        }
        self.emit(
            ValueType::I1,
            Instruction::FloatCompare {
                predicate,
                lhs,
                rhs,
            },
        )
    }

    fn build_int_binary(
        &mut self,
        op: IntBinary,
        lhs: ValueId,
        rhs: ValueId,
    ) -> CodegenResult<ValueId> {
        let ty = self.require_same(lhs, rhs, "integer binary")?;
        if !ty.is_integer() {
            return Err(mismatch("integer binary", ValueType::I32, ty));
        }
        self.emit(ty, Instruction::IntBinary { op, lhs, rhs })
    }

    fn build_float_binary(
        &mut self,
        op: FloatBinary,
        lhs: ValueId,
        rhs: ValueId,
    ) -> CodegenResult<ValueId> {
        let ty = self.require_same(lhs, rhs, "float binary")?;
        if !ty.is_float() {
            return Err(mismatch("float binary", ValueType::F64, ty));
        }
        self.emit(ty, Instruction::FloatBinary { op, lhs, rhs })
    }

    fn build_select(
        &mut self,
        condition: ValueId,
        then: ValueId,
        otherwise: ValueId,
    ) -> CodegenResult<ValueId> {
        self.require(condition, "select", ValueType::I1, |ty| ty == ValueType::I1)?;
        let ty = self.require_same(then, otherwise, "select")?;
        self.emit(
            ty,
            Instruction::Select {
                condition,
                then,
                otherwise,
            },
        )
    }

    fn build_trap_if(&mut self, condition: ValueId, message: &str) -> CodegenResult<()> {
        self.require(condition, "trap", ValueType::I1, |ty| ty == ValueType::I1)?;
        self.emit_void(Instruction::TrapIf {
            condition,
            message: message.to_string(),
        })
    }

    fn begin_function(&mut self, name: &str, ret: ValueType) -> CodegenResult<()> {
        if self.module.function(name).is_some() {
            return Err(CodegenError::Backend(format!(
                "function `{name}` is already defined"
            )));
        }
        self.module.functions.push(Function::new(name, ret));
        self.current = Some(self.module.functions.len() - 1);
        Ok(())
    }

    fn build_return(&mut self, value: Option<ValueId>) -> CodegenResult<()> {
        let ret = self.function()?.ret;
        match value {
            Some(value) => {
                self.require(value, "ret", ret, |ty| ty == ret)?;
            }
            None if ret != ValueType::Void => {
                return Err(mismatch("ret", ret, ValueType::Void));
            }
            None => {}
        }
        self.emit_void(Instruction::Return(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_values_not_instructions() {
        let mut builder = ReferenceBuilder::new();
        builder.begin_function("f", ValueType::I32).expect("begin");
        let one = builder.const_int(ValueType::I32, 1).expect("const");
        assert_eq!(builder.value_type(one), Ok(ValueType::I32));
        assert_eq!(builder.current_function().map(Function::instruction_count), Some(0));
        builder.build_return(Some(one)).expect("ret");
        assert!(builder.module().function("f").is_some_and(Function::is_terminated));
    }

    #[test]
    fn rejects_instructions_outside_a_function() {
        let mut builder = ReferenceBuilder::new();
        assert_eq!(
            builder.const_f32(1.0),
            Err(CodegenError::NoActiveFunction)
        );
    }

    #[test]
    fn checks_operand_types() {
        let mut builder = ReferenceBuilder::new();
        builder.begin_function("f", ValueType::Void).expect("begin");
        let wide = builder.const_int(ValueType::I64, 1).expect("const");
        let narrow = builder.const_int(ValueType::I32, 1).expect("const");
        assert!(matches!(
            builder.build_int_extend(wide, ValueType::I32, true),
            Err(CodegenError::TypeMismatch { .. })
        ));
        assert!(matches!(
            builder.build_int_binary(IntBinary::Add, wide, narrow),
            Err(CodegenError::TypeMismatch { .. })
        ));
        assert!(matches!(
            builder.build_return(Some(narrow)),
            Err(CodegenError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn prints_functions() {
        let mut builder = ReferenceBuilder::new();
        builder.begin_function("widen", ValueType::I64).expect("begin");
        let value = builder.const_int(ValueType::I32, u64::MAX).expect("const");
        let wide = builder
            .build_int_extend(value, ValueType::I64, true)
            .expect("sext");
        builder.build_return(Some(wide)).expect("ret");
        assert_eq!(
            builder.finish().to_string(),
            "define i64 @widen() {\n  %1 = sext i32 -1 to i64\n  ret i64 %1\n}\n"
        );
    }

    #[test]
    fn duplicate_functions_are_rejected() {
        let mut builder = ReferenceBuilder::new();
        builder.begin_function("f", ValueType::Void).expect("begin");
        assert!(matches!(
            builder.begin_function("f", ValueType::Void),
            Err(CodegenError::Backend(_))
        ));
    }
}
