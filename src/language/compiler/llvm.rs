//! [`IrBuilder`] over inkwell. Only built with the `llvm` feature.

use crate::{
    language::{
        compiler::{
            CodegenError, CodegenResult, FloatBinary, FloatPredicate, IntBinary, IntPredicate,
            IrBuilder,
        },
        types::ValueType,
    },
    project::WaspManifest,
    target::BuildTarget,
};
use inkwell::{
    builder::Builder,
    context::Context,
    module::Module,
    targets::TargetTriple,
    types::{BasicType, BasicTypeEnum, FloatType, IntType},
    values::{BasicValueEnum, FloatValue, FunctionValue, IntValue},
    AddressSpace,
};
use std::{fmt, path::Path};
use tracing::debug;

fn backend(err: impl fmt::Display) -> CodegenError {
    CodegenError::Backend(err.to_string())
}

pub struct LlvmBuilder<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    function: Option<FunctionValue<'ctx>>,
    trap_handler: String,
    pointer: ValueType,
}

impl<'ctx> LlvmBuilder<'ctx> {
    pub fn new(
        context: &'ctx Context,
        manifest: &WaspManifest,
        target: &BuildTarget,
    ) -> Self {
        let module = context.create_module(&manifest.build.module);
        if let Some(triple) = target.triple() {
            module.set_triple(&TargetTriple::create(triple));
        }
        Self {
            context,
            module,
            builder: context.create_builder(),
            function: None,
            trap_handler: manifest.runtime.trap_handler.clone(),
            pointer: target.pointer_type(),
        }
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    pub fn verify(&self) -> CodegenResult<()> {
        self.module.verify().map_err(backend)
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    pub fn write_ir(&self, path: &Path) -> CodegenResult<()> {
        self.module.print_to_file(path).map_err(backend)
    }

    fn active(&self) -> CodegenResult<FunctionValue<'ctx>> {
        self.function.ok_or(CodegenError::NoActiveFunction)
    }

    fn int_type(&self, ty: ValueType) -> CodegenResult<IntType<'ctx>> {
        let bits = ty
            .bit_width()
            .or_else(|| ty.native_pointer_width())
            .filter(|_| !ty.is_float())
            .ok_or(CodegenError::NoBitWidth { ty })?;
        Ok(self.context.custom_width_int_type(bits))
    }

    fn float_type(&self, ty: ValueType) -> CodegenResult<FloatType<'ctx>> {
        match ty {
            ValueType::F32 => Ok(self.context.f32_type()),
            ValueType::F64 => Ok(self.context.f64_type()),
            other => Err(CodegenError::ExpectedFloat {
                context: "float type".into(),
                found: other,
            }),
        }
    }

    fn basic_type(&self, ty: ValueType) -> CodegenResult<BasicTypeEnum<'ctx>> {
        if ty.is_float() {
            Ok(self.float_type(ty)?.as_basic_type_enum())
        } else {
            Ok(self.int_type(ty)?.as_basic_type_enum())
        }
    }

    fn int(&self, value: BasicValueEnum<'ctx>, context: &str) -> CodegenResult<IntValue<'ctx>> {
        match value {
            BasicValueEnum::IntValue(value) => Ok(value),
            other => Err(self.mismatch(context, ValueType::I64, other)),
        }
    }

    fn float(&self, value: BasicValueEnum<'ctx>, context: &str) -> CodegenResult<FloatValue<'ctx>> {
        match value {
            BasicValueEnum::FloatValue(value) => Ok(value),
            other => Err(self.mismatch(context, ValueType::F64, other)),
        }
    }

    fn mismatch(&self, context: &str, expected: ValueType, found: BasicValueEnum<'ctx>) -> CodegenError {
        match self.value_type(found) {
            Ok(found) => CodegenError::TypeMismatch {
                context: context.to_string(),
                expected,
                found,
            },
            Err(err) => err,
        }
    }

    fn trap_function(&self) -> FunctionValue<'ctx> {
        self.module
            .get_function(&self.trap_handler)
            .unwrap_or_else(|| {
                let message = self.context.i8_type().ptr_type(AddressSpace::default());
                let ty = self.context.void_type().fn_type(&[message.into()], false);
                self.module.add_function(&self.trap_handler, ty, None)
            })
    }
}

impl<'ctx> IrBuilder for LlvmBuilder<'ctx> {
    type Value = BasicValueEnum<'ctx>;

    fn value_type(&self, value: Self::Value) -> CodegenResult<ValueType> {
        match value {
            BasicValueEnum::IntValue(value) => {
                let bits = value.get_type().get_bit_width();
                ValueType::integer_of_width(bits)
                    .ok_or_else(|| backend(format!("unsupported integer width i{bits}")))
            }
            BasicValueEnum::FloatValue(value) if value.get_type() == self.context.f32_type() => {
                Ok(ValueType::F32)
            }
            BasicValueEnum::FloatValue(_) => Ok(ValueType::F64),
            BasicValueEnum::PointerValue(_) => Ok(self.pointer),
            other => Err(backend(format!("unsupported value {other:?}"))),
        }
    }

    fn const_int(&mut self, ty: ValueType, bits: u64) -> CodegenResult<Self::Value> {
        Ok(self.int_type(ty)?.const_int(bits, false).into())
    }

    fn const_f32(&mut self, value: f32) -> CodegenResult<Self::Value> {
        Ok(self.context.f32_type().const_float(f64::from(value)).into())
    }

    fn const_f64(&mut self, value: f64) -> CodegenResult<Self::Value> {
        Ok(self.context.f64_type().const_float(value).into())
    }

    fn build_int_extend(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value> {
        let value = self.int(value, "extend")?;
        let ty = self.int_type(dest)?;
        let result = if signed {
            self.builder.build_int_s_extend(value, ty, "sext")
        } else {
            self.builder.build_int_z_extend(value, ty, "zext")
        };
        Ok(result.map_err(backend)?.into())
    }

    fn build_int_truncate(
        &mut self,
        value: Self::Value,
        dest: ValueType,
    ) -> CodegenResult<Self::Value> {
        let value = self.int(value, "truncate")?;
        let ty = self.int_type(dest)?;
        Ok(self
            .builder
            .build_int_truncate(value, ty, "trunc")
            .map_err(backend)?
            .into())
    }

    fn build_float_to_int(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value> {
        let value = self.float(value, "float to int")?;
        let ty = self.int_type(dest)?;
        let result = if signed {
            self.builder.build_float_to_signed_int(value, ty, "fptosi")
        } else {
            self.builder.build_float_to_unsigned_int(value, ty, "fptoui")
        };
        Ok(result.map_err(backend)?.into())
    }

    fn build_int_to_float(
        &mut self,
        value: Self::Value,
        dest: ValueType,
        signed: bool,
    ) -> CodegenResult<Self::Value> {
        let value = self.int(value, "int to float")?;
        let ty = self.float_type(dest)?;
        let result = if signed {
            self.builder.build_signed_int_to_float(value, ty, "sitofp")
        } else {
            self.builder.build_unsigned_int_to_float(value, ty, "uitofp")
        };
        Ok(result.map_err(backend)?.into())
    }

    fn build_float_extend(
        &mut self,
        value: Self::Value,
        dest: ValueType,
    ) -> CodegenResult<Self::Value> {
        let value = self.float(value, "fpext")?;
        let ty = self.float_type(dest)?;
        Ok(self
            .builder
            .build_float_ext(value, ty, "fpext")
            .map_err(backend)?
            .into())
    }

    fn build_float_truncate(
        &mut self,
        value: Self::Value,
        dest: ValueType,
    ) -> CodegenResult<Self::Value> {
        let value = self.float(value, "fptrunc")?;
        let ty = self.float_type(dest)?;
        Ok(self
            .builder
            .build_float_trunc(value, ty, "fptrunc")
            .map_err(backend)?
            .into())
    }

    fn build_bitcast(&mut self, value: Self::Value, dest: ValueType) -> CodegenResult<Self::Value> {
        let ty = self.basic_type(dest)?;
        self.builder
            .build_bitcast(value, ty, "bitcast")
            .map_err(backend)
    }

    fn build_int_compare(
        &mut self,
        predicate: IntPredicate,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value> {
        let lhs = self.int(lhs, "icmp")?;
        let rhs = self.int(rhs, "icmp")?;
        let predicate = match predicate {
            IntPredicate::Eq => inkwell::IntPredicate::EQ,
            IntPredicate::Ne => inkwell::IntPredicate::NE,
            IntPredicate::Slt => inkwell::IntPredicate::SLT,
            IntPredicate::Sle => inkwell::IntPredicate::SLE,
            IntPredicate::Sgt => inkwell::IntPredicate::SGT,
            IntPredicate::Sge => inkwell::IntPredicate::SGE,
            IntPredicate::Ult => inkwell::IntPredicate::ULT,
            IntPredicate::Ule => inkwell::IntPredicate::ULE,
            IntPredicate::Ugt => inkwell::IntPredicate::UGT,
            IntPredicate::Uge => inkwell::IntPredicate::UGE,
        };
        Ok(self
            .builder
            .build_int_compare(predicate, lhs, rhs, "icmp")
            .map_err(backend)?
            .into())
    }

    fn build_float_compare(
        &mut self,
        predicate: FloatPredicate,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value> {
        let lhs = self.float(lhs, "fcmp")?;
        let rhs = self.float(rhs, "fcmp")?;
        let predicate = match predicate {
            FloatPredicate::Oeq => inkwell::FloatPredicate::OEQ,
            FloatPredicate::One => inkwell::FloatPredicate::ONE,
            FloatPredicate::Olt => inkwell::FloatPredicate::OLT,
            FloatPredicate::Ole => inkwell::FloatPredicate::OLE,
            FloatPredicate::Ogt => inkwell::FloatPredicate::OGT,
            FloatPredicate::Oge => inkwell::FloatPredicate::OGE,
            FloatPredicate::Une => inkwell::FloatPredicate::UNE,
            FloatPredicate::Uno => inkwell::FloatPredicate::UNO,
        };
        Ok(self
            .builder
            .build_float_compare(predicate, lhs, rhs, "fcmp")
            .map_err(backend)?
            .into())
    }

    fn build_int_binary(
        &mut self,
        op: IntBinary,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value> {
        let lhs = self.int(lhs, "integer op")?;
        let rhs = self.int(rhs, "integer op")?;
        let builder = &self.builder;
        let result = match op {
            IntBinary::Add => builder.build_int_add(lhs, rhs, "add"),
            IntBinary::Sub => builder.build_int_sub(lhs, rhs, "sub"),
            IntBinary::Mul => builder.build_int_mul(lhs, rhs, "mul"),
            IntBinary::SDiv => builder.build_int_signed_div(lhs, rhs, "sdiv"),
            IntBinary::UDiv => builder.build_int_unsigned_div(lhs, rhs, "udiv"),
            IntBinary::SRem => builder.build_int_signed_rem(lhs, rhs, "srem"),
            IntBinary::URem => builder.build_int_unsigned_rem(lhs, rhs, "urem"),
            IntBinary::And => builder.build_and(lhs, rhs, "and"),
            IntBinary::Or => builder.build_or(lhs, rhs, "or"),
            IntBinary::Xor => builder.build_xor(lhs, rhs, "xor"),
            IntBinary::Shl => builder.build_left_shift(lhs, rhs, "shl"),
            IntBinary::LShr => builder.build_right_shift(lhs, rhs, false, "lshr"),
            IntBinary::AShr => builder.build_right_shift(lhs, rhs, true, "ashr"),
        };
        Ok(result.map_err(backend)?.into())
    }

    fn build_float_binary(
        &mut self,
        op: FloatBinary,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> CodegenResult<Self::Value> {
        let lhs = self.float(lhs, "float op")?;
        let rhs = self.float(rhs, "float op")?;
        let builder = &self.builder;
        let result = match op {
            FloatBinary::Add => builder.build_float_add(lhs, rhs, "fadd"),
            FloatBinary::Sub => builder.build_float_sub(lhs, rhs, "fsub"),
            FloatBinary::Mul => builder.build_float_mul(lhs, rhs, "fmul"),
            FloatBinary::Div => builder.build_float_div(lhs, rhs, "fdiv"),
        };
        Ok(result.map_err(backend)?.into())
    }

    fn build_select(
        &mut self,
        condition: Self::Value,
        then: Self::Value,
        otherwise: Self::Value,
    ) -> CodegenResult<Self::Value> {
        let condition = self.int(condition, "select")?;
        self.builder
            .build_select(condition, then, otherwise, "select")
            .map_err(backend)
    }

    fn build_trap_if(&mut self, condition: Self::Value, message: &str) -> CodegenResult<()> {
        let function = self.active()?;
        let condition = self.int(condition, "trap condition")?;
        let trap_block = self.context.append_basic_block(function, "trap");
        let continue_block = self.context.append_basic_block(function, "cont");
        self.builder
            .build_conditional_branch(condition, trap_block, continue_block)
            .map_err(backend)?;

        self.builder.position_at_end(trap_block);
        let handler = self.trap_function();
        let text = self
            .builder
            .build_global_string_ptr(message, "trap_msg")
            .map_err(backend)?;
        self.builder
            .build_call(handler, &[text.as_pointer_value().into()], "")
            .map_err(backend)?;
        self.builder.build_unreachable().map_err(backend)?;

        self.builder.position_at_end(continue_block);
        Ok(())
    }

    fn begin_function(&mut self, name: &str, ret: ValueType) -> CodegenResult<()> {
        if self.module.get_function(name).is_some() {
            return Err(backend(format!("function `{name}` is already defined")));
        }
        let ty = if ret == ValueType::Void {
            self.context.void_type().fn_type(&[], false)
        } else {
            self.basic_type(ret)?.fn_type(&[], false)
        };
        let function = self.module.add_function(name, ty, None);
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.function = Some(function);
        debug!(name, ret = ret.name(), "started LLVM function");
        Ok(())
    }

    fn build_return(&mut self, value: Option<Self::Value>) -> CodegenResult<()> {
        self.active()?;
        match value {
            Some(value) => self.builder.build_return(Some(&value)),
            None => self.builder.build_return(None),
        }
        .map_err(backend)?;
        self.function = None;
        Ok(())
    }
}
