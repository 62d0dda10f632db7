use super::{
    coerce::coerce, condition::to_boolean, indent, CodegenError, CodegenResult, Expression,
    FloatBinary, FloatPredicate, IntBinary, IntPredicate, IrBuilder,
};
use crate::{
    language::{
        ast::{Expr, Opcode},
        literal::Literal,
        operation::Operation,
        types::ValueType,
    },
    runtime::value::mask,
};

pub const DIVIDE_BY_ZERO: &str = "integer divide by zero";
pub const INTEGER_OVERFLOW: &str = "integer overflow";
pub const INVALID_CONVERSION: &str = "invalid conversion to integer";

impl Expression for Expr {
    fn value_type(&self) -> ValueType {
        self.result_type()
    }

    fn generate<B: IrBuilder>(&self, builder: &mut B) -> CodegenResult<B::Value> {
        match self {
            Expr::Const { value, .. } => emit_literal(builder, *value),
            Expr::Eqz { ty, operand, .. } => {
                let value = generate_operand(builder, operand, *ty, "eqz")?;
                let zero = builder.const_zero(*ty)?;
                let flag = builder.build_int_compare(IntPredicate::Eq, value, zero)?;
                coerce(builder, flag, ValueType::I1, ValueType::I32, false)
            }
            Expr::Binary {
                opcode, lhs, rhs, ..
            } => {
                let context = opcode.mnemonic();
                let lhs = generate_operand(builder, lhs, opcode.ty, &context)?;
                let rhs = generate_operand(builder, rhs, opcode.ty, &context)?;
                if opcode.ty.is_integer() {
                    emit_int_binary(builder, *opcode, lhs, rhs)
                } else {
                    emit_float_binary(builder, *opcode, lhs, rhs)
                }
            }
            Expr::Convert {
                opcode,
                from,
                operand,
                ..
            } => {
                let value = generate_operand(builder, operand, *from, &opcode.mnemonic())?;
                emit_conversion(builder, *opcode, *from, value)
            }
            Expr::Select {
                then,
                otherwise,
                condition,
                ..
            } => {
                let ty = then.value_type();
                let then = then.generate(builder)?;
                let otherwise = generate_operand(builder, otherwise, ty, "select")?;
                let condition = generate_operand(builder, condition, ValueType::I32, "select")?;
                let flag = to_boolean(builder, condition)?;
                builder.build_select(flag, then, otherwise)
            }
        }
    }

    fn dump(&self, level: usize, out: &mut String) {
        indent(out, level);
        let children: Vec<&Expr> = match self {
            Expr::Const { .. } => {
                out.push_str(&format!("({})\n", self.head()));
                return;
            }
            Expr::Eqz { operand, .. } | Expr::Convert { operand, .. } => vec![&**operand],
            Expr::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            Expr::Select {
                then,
                otherwise,
                condition,
                ..
            } => vec![&**then, &**otherwise, &**condition],
        };
        out.push('(');
        out.push_str(&self.head());
        out.push('\n');
        for child in children {
            child.dump(level + 1, out);
        }
        indent(out, level);
        out.push_str(")\n");
    }
}

fn generate_operand<B: IrBuilder>(
    builder: &mut B,
    expr: &Expr,
    expected: ValueType,
    context: &str,
) -> CodegenResult<B::Value> {
    let found = expr.value_type();
    if found != expected {
        return Err(CodegenError::TypeMismatch {
            context: context.to_string(),
            expected,
            found,
        });
    }
    expr.generate(builder)
}

fn emit_literal<B: IrBuilder>(
    builder: &mut B,
    literal: Literal,
) -> CodegenResult<B::Value> {
    match literal {
        Literal::I32(bits) => builder.const_int(ValueType::I32, u64::from(bits)),
        Literal::I64(bits) => builder.const_int(ValueType::I64, bits),
        Literal::F32(value) => builder.const_f32(value),
        Literal::F64(value) => builder.const_f64(value),
    }
}

/// Traps with `message` when `condition` is truthy.
fn trap_when<B: IrBuilder>(
    builder: &mut B,
    condition: B::Value,
    message: &str,
) -> CodegenResult<()> {
    let flag = to_boolean(builder, condition)?;
    builder.build_trap_if(flag, message)
}

fn int_predicate(op: Operation, signed: bool) -> Option<IntPredicate> {
    let predicate = match (op, signed) {
        (Operation::Eq, _) => IntPredicate::Eq,
        (Operation::Ne, _) => IntPredicate::Ne,
        (Operation::Lt, true) => IntPredicate::Slt,
        (Operation::Lt, false) => IntPredicate::Ult,
        (Operation::Le, true) => IntPredicate::Sle,
        (Operation::Le, false) => IntPredicate::Ule,
        (Operation::Gt, true) => IntPredicate::Sgt,
        (Operation::Gt, false) => IntPredicate::Ugt,
        (Operation::Ge, true) => IntPredicate::Sge,
        (Operation::Ge, false) => IntPredicate::Uge,
        _ => return None,
    };
    Some(predicate)
}

fn float_predicate(op: Operation) -> Option<FloatPredicate> {
    let predicate = match op {
        Operation::Eq => FloatPredicate::Oeq,
        // NaN != x holds.
        Operation::Ne => FloatPredicate::Une,
        Operation::Lt => FloatPredicate::Olt,
        Operation::Le => FloatPredicate::Ole,
        Operation::Gt => FloatPredicate::Ogt,
        Operation::Ge => FloatPredicate::Oge,
        _ => return None,
    };
    Some(predicate)
}

fn emit_int_binary<B: IrBuilder>(
    builder: &mut B,
    opcode: Opcode,
    lhs: B::Value,
    rhs: B::Value,
) -> CodegenResult<B::Value> {
    let ty = opcode.ty;
    let signed = opcode.sign.is_signed();
    let op = match opcode.op {
        Operation::Add => IntBinary::Add,
        Operation::Sub => IntBinary::Sub,
        Operation::Mul => IntBinary::Mul,
        Operation::And => IntBinary::And,
        Operation::Or => IntBinary::Or,
        Operation::Xor => IntBinary::Xor,
        Operation::Shl => return emit_shift(builder, IntBinary::Shl, ty, lhs, rhs),
        Operation::Shr => {
            let op = if signed {
                IntBinary::AShr
            } else {
                IntBinary::LShr
            };
            return emit_shift(builder, op, ty, lhs, rhs);
        }
        Operation::Div => return emit_division(builder, ty, signed, lhs, rhs),
        Operation::Rem => return emit_remainder(builder, ty, signed, lhs, rhs),
        op => {
            let predicate =
                int_predicate(op, signed).ok_or(CodegenError::UnsupportedOperation { op, ty })?;
            let flag = builder.build_int_compare(predicate, lhs, rhs)?;
            return coerce(builder, flag, ValueType::I1, ValueType::I32, false);
        }
    };
    builder.build_int_binary(op, lhs, rhs)
}

fn emit_float_binary<B: IrBuilder>(
    builder: &mut B,
    opcode: Opcode,
    lhs: B::Value,
    rhs: B::Value,
) -> CodegenResult<B::Value> {
    let op = match opcode.op {
        Operation::Add => FloatBinary::Add,
        Operation::Sub => FloatBinary::Sub,
        Operation::Mul => FloatBinary::Mul,
        Operation::Div => FloatBinary::Div,
        op => {
            let predicate = float_predicate(op)
                .ok_or(CodegenError::UnsupportedOperation { op, ty: opcode.ty })?;
            let flag = builder.build_float_compare(predicate, lhs, rhs)?;
            return coerce(builder, flag, ValueType::I1, ValueType::I32, false);
        }
    };
    builder.build_float_binary(op, lhs, rhs)
}

/// Shift counts are taken modulo the operand width.
fn emit_shift<B: IrBuilder>(
    builder: &mut B,
    op: IntBinary,
    ty: ValueType,
    lhs: B::Value,
    rhs: B::Value,
) -> CodegenResult<B::Value> {
    let bits = ty.expect_bit_width()?;
    let width_mask = builder.const_int(ty, u64::from(bits - 1))?;
    let count = builder.build_int_binary(IntBinary::And, rhs, width_mask)?;
    builder.build_int_binary(op, lhs, count)
}

fn trap_on_zero_divisor<B: IrBuilder>(
    builder: &mut B,
    ty: ValueType,
    rhs: B::Value,
) -> CodegenResult<()> {
    let zero = builder.const_zero(ty)?;
    let is_zero = builder.build_int_compare(IntPredicate::Eq, rhs, zero)?;
    trap_when(builder, is_zero, DIVIDE_BY_ZERO)
}

fn minus_one<B: IrBuilder>(builder: &mut B, ty: ValueType) -> CodegenResult<B::Value> {
    let bits = ty.expect_bit_width()?;
    builder.const_int(ty, mask(bits))
}

fn emit_division<B: IrBuilder>(
    builder: &mut B,
    ty: ValueType,
    signed: bool,
    lhs: B::Value,
    rhs: B::Value,
) -> CodegenResult<B::Value> {
    trap_on_zero_divisor(builder, ty, rhs)?;
    if !signed {
        return builder.build_int_binary(IntBinary::UDiv, lhs, rhs);
    }

    let bits = ty.expect_bit_width()?;
    let min = builder.const_int(ty, 1u64 << (bits - 1))?;
    let minus_one = minus_one(builder, ty)?;
    let lhs_is_min = builder.build_int_compare(IntPredicate::Eq, lhs, min)?;
    let rhs_is_minus_one = builder.build_int_compare(IntPredicate::Eq, rhs, minus_one)?;
    let overflow = builder.build_int_binary(IntBinary::And, lhs_is_min, rhs_is_minus_one)?;
    trap_when(builder, overflow, INTEGER_OVERFLOW)?;
    builder.build_int_binary(IntBinary::SDiv, lhs, rhs)
}

fn emit_remainder<B: IrBuilder>(
    builder: &mut B,
    ty: ValueType,
    signed: bool,
    lhs: B::Value,
    rhs: B::Value,
) -> CodegenResult<B::Value> {
    trap_on_zero_divisor(builder, ty, rhs)?;
    if !signed {
        return builder.build_int_binary(IntBinary::URem, lhs, rhs);
    }

    // Any value rem -1 is 0, and MIN srem -1 is undefined in the target IR,
    // so divide by 1 instead.
    let minus_one = minus_one(builder, ty)?;
    let one = builder.const_int(ty, 1)?;
    let rhs_is_minus_one = builder.build_int_compare(IntPredicate::Eq, rhs, minus_one)?;
    let divisor = builder.build_select(rhs_is_minus_one, one, rhs)?;
    builder.build_int_binary(IntBinary::SRem, lhs, divisor)
}

fn emit_conversion<B: IrBuilder>(
    builder: &mut B,
    opcode: Opcode,
    from: ValueType,
    value: B::Value,
) -> CodegenResult<B::Value> {
    let to = opcode.ty;
    let signed = opcode.sign.is_signed();
    match opcode.op {
        Operation::Reinterpret => builder.build_bitcast(value, to),
        Operation::Trunc => emit_checked_truncation(builder, value, from, to, signed),
        Operation::Wrap
        | Operation::Extend
        | Operation::Convert
        | Operation::Promote
        | Operation::Demote => coerce(builder, value, from, to, signed),
        op => Err(CodegenError::UnsupportedOperation { op, ty: to }),
    }
}

/// Exclusive upper bound and lower bound (with inclusivity) of the float
/// values that truncate into `to` without overflowing.
fn truncation_bounds(to: ValueType, signed: bool) -> CodegenResult<(f64, bool, f64)> {
    let bounds = match (to, signed) {
        (ValueType::I32, true) => (-2_147_483_649.0, false, 2_147_483_648.0),
        (ValueType::I32, false) => (-1.0, false, 4_294_967_296.0),
        (ValueType::I64, true) => (-9_223_372_036_854_775_808.0, true, 9_223_372_036_854_775_808.0),
        (ValueType::I64, false) => (-1.0, false, 18_446_744_073_709_551_616.0),
        (ty, _) => {
            return Err(CodegenError::UnsupportedOperation {
                op: Operation::Trunc,
                ty,
            })
        }
    };
    Ok(bounds)
}

/// Float to integer truncation that traps instead of producing an undefined
/// result. The range check runs in f64, which holds every f32 exactly.
fn emit_checked_truncation<B: IrBuilder>(
    builder: &mut B,
    value: B::Value,
    from: ValueType,
    to: ValueType,
    signed: bool,
) -> CodegenResult<B::Value> {
    let (lower, lower_inclusive, upper) = truncation_bounds(to, signed)?;
    let wide = coerce(builder, value, from, ValueType::F64, signed)?;

    let is_nan = builder.build_float_compare(FloatPredicate::Uno, wide, wide)?;
    trap_when(builder, is_nan, INVALID_CONVERSION)?;

    let lower = builder.const_f64(lower)?;
    let upper = builder.const_f64(upper)?;
    let lower_predicate = if lower_inclusive {
        FloatPredicate::Oge
    } else {
        FloatPredicate::Ogt
    };
    let above_lower = builder.build_float_compare(lower_predicate, wide, lower)?;
    let below_upper = builder.build_float_compare(FloatPredicate::Olt, wide, upper)?;
    let in_range = builder.build_int_binary(IntBinary::And, above_lower, below_upper)?;
    let truth = builder.const_int(ValueType::I1, 1)?;
    let out_of_range = builder.build_int_binary(IntBinary::Xor, in_range, truth)?;
    trap_when(builder, out_of_range, INTEGER_OVERFLOW)?;

    coerce(builder, wide, ValueType::F64, to, signed)
}
