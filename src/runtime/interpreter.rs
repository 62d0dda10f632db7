use crate::{
    language::{
        compiler::{FloatBinary, FloatPredicate, IntBinary, IntPredicate},
        types::ValueType,
    },
    runtime::{
        error::{RuntimeError, RuntimeResult},
        ir::{Function, Instruction, Module, ValueDef, ValueId},
        value::{mask, storage_width, Scalar},
    },
};
use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Returned(Option<Scalar>),
    Trapped(String),
}

/// Evaluates functions of a reference [`Module`].
pub struct Interpreter<'m> {
    module: &'m Module,
}

struct Frame<'f> {
    function: &'f Function,
    values: Vec<Option<Scalar>>,
}

impl<'f> Frame<'f> {
    fn new(function: &'f Function) -> Self {
        let values = function
            .values()
            .iter()
            .map(|slot| match slot.def {
                ValueDef::Constant(scalar) => Some(scalar),
                ValueDef::Instruction(_) => None,
            })
            .collect();
        Self { function, values }
    }

    fn get(&self, id: ValueId) -> RuntimeResult<Scalar> {
        self.values
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(RuntimeError::UndefinedValue { index: id.index() })
    }

    fn set(&mut self, id: ValueId, value: Scalar) {
        if let Some(slot) = self.values.get_mut(id.index()) {
            *slot = Some(value);
        }
    }
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    pub fn call(&self, name: &str) -> RuntimeResult<Outcome> {
        let function = self
            .module
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;
        let mut frame = Frame::new(function);

        for statement in function.body() {
            match &statement.instruction {
                Instruction::Return(value) => {
                    let value = value.map(|id| frame.get(id)).transpose()?;
                    return Ok(Outcome::Returned(value));
                }
                Instruction::TrapIf { condition, message } => {
                    if frame.get(*condition)?.is_true() {
                        trace!(function = name, message = message.as_str(), "trapped");
                        return Ok(Outcome::Trapped(message.clone()));
                    }
                }
                instruction => {
                    if let (Some(result), Some(value)) =
                        (statement.result, evaluate(&frame, instruction)?)
                    {
                        frame.set(result, value);
                    }
                }
            }
        }

        Err(RuntimeError::MissingReturn {
            name: name.to_string(),
        })
    }
}

/// Value produced by a non-control instruction.
fn evaluate(frame: &Frame<'_>, instruction: &Instruction) -> RuntimeResult<Option<Scalar>> {
    let value = match instruction {
        Instruction::Extend { value, to, signed } => {
            let value = frame.get(*value)?;
            let bits = if *signed {
                value.as_signed() as u64
            } else {
                value.as_unsigned()
            };
            Scalar::int(*to, bits)
        }
        Instruction::Truncate { value, to } => Scalar::int(*to, frame.get(*value)?.bits()),
        Instruction::FloatToInt { value, to, signed } => {
            float_to_int(frame.get(*value)?.float_value(), *to, *signed)?
        }
        Instruction::IntToFloat { value, to, signed } => {
            let value = frame.get(*value)?;
            match (to, signed) {
                (ValueType::F32, true) => Scalar::f32(value.as_signed() as f32),
                (ValueType::F32, false) => Scalar::f32(value.as_unsigned() as f32),
                (_, true) => Scalar::f64(value.as_signed() as f64),
                (_, false) => Scalar::f64(value.as_unsigned() as f64),
            }
        }
        Instruction::FloatExtend { value, .. } => Scalar::f64(f64::from(frame.get(*value)?.as_f32())),
        Instruction::FloatTruncate { value, .. } => Scalar::f32(frame.get(*value)?.as_f64() as f32),
        Instruction::Bitcast { value, to } => frame.get(*value)?.with_type(*to),
        Instruction::IntCompare {
            predicate,
            lhs,
            rhs,
        } => Scalar::bool(int_compare(*predicate, frame.get(*lhs)?, frame.get(*rhs)?)),
        Instruction::FloatCompare {
            predicate,
            lhs,
            rhs,
        } => {
            let lhs = frame.get(*lhs)?.float_value();
            let rhs = frame.get(*rhs)?.float_value();
            Scalar::bool(float_compare(*predicate, lhs, rhs))
        }
        Instruction::IntBinary { op, lhs, rhs } => int_binary(
            &frame.function.name,
            *op,
            frame.get(*lhs)?,
            frame.get(*rhs)?,
        )?,
        Instruction::FloatBinary { op, lhs, rhs } => {
            float_binary(*op, frame.get(*lhs)?, frame.get(*rhs)?)
        }
        Instruction::Select {
            condition,
            then,
            otherwise,
        } => {
            if frame.get(*condition)?.is_true() {
                frame.get(*then)?
            } else {
                frame.get(*otherwise)?
            }
        }
        Instruction::TrapIf { .. } | Instruction::Return(_) => return Ok(None),
    };
    Ok(Some(value))
}

fn float_to_int(value: f64, to: ValueType, signed: bool) -> RuntimeResult<Scalar> {
    let width = storage_width(to);
    let truncated = value.trunc();
    let (lower, upper) = if signed {
        let half = 2f64.powi(width as i32 - 1);
        (-half, half)
    } else {
        (0.0, 2f64.powi(width as i32))
    };
    if value.is_nan() || truncated < lower || truncated >= upper {
        return Err(RuntimeError::InvalidConversion { value, ty: to });
    }
    let bits = if signed {
        truncated as i64 as u64
    } else {
        truncated as u64
    };
    Ok(Scalar::int(to, bits))
}

fn int_compare(predicate: IntPredicate, lhs: Scalar, rhs: Scalar) -> bool {
    let (su, sv) = (lhs.as_signed(), rhs.as_signed());
    let (uu, uv) = (lhs.as_unsigned(), rhs.as_unsigned());
    match predicate {
        IntPredicate::Eq => uu == uv,
        IntPredicate::Ne => uu != uv,
        IntPredicate::Slt => su < sv,
        IntPredicate::Sle => su <= sv,
        IntPredicate::Sgt => su > sv,
        IntPredicate::Sge => su >= sv,
        IntPredicate::Ult => uu < uv,
        IntPredicate::Ule => uu <= uv,
        IntPredicate::Ugt => uu > uv,
        IntPredicate::Uge => uu >= uv,
    }
}

fn float_compare(predicate: FloatPredicate, lhs: f64, rhs: f64) -> bool {
    match predicate {
        FloatPredicate::Oeq => lhs == rhs,
        FloatPredicate::One => !lhs.is_nan() && !rhs.is_nan() && lhs != rhs,
        FloatPredicate::Olt => lhs < rhs,
        FloatPredicate::Ole => lhs <= rhs,
        FloatPredicate::Ogt => lhs > rhs,
        FloatPredicate::Oge => lhs >= rhs,
        FloatPredicate::Une => lhs != rhs,
        FloatPredicate::Uno => lhs.is_nan() || rhs.is_nan(),
    }
}

fn int_binary(function: &str, op: IntBinary, lhs: Scalar, rhs: Scalar) -> RuntimeResult<Scalar> {
    let ty = lhs.ty();
    let width = storage_width(ty);
    let (a, b) = (lhs.as_unsigned(), rhs.as_unsigned());
    let signed_overflow = a == 1u64 << (width - 1) && b == mask(width);
    let division_by_zero = || RuntimeError::DivisionByZero {
        function: function.to_string(),
    };
    let overflow = || RuntimeError::Overflow {
        function: function.to_string(),
    };
    let shift_count = || {
        if b >= u64::from(width) {
            Err(RuntimeError::ShiftOutOfRange { count: b, ty })
        } else {
            Ok(b as u32)
        }
    };

    let bits = match op {
        IntBinary::Add => a.wrapping_add(b),
        IntBinary::Sub => a.wrapping_sub(b),
        IntBinary::Mul => a.wrapping_mul(b),
        IntBinary::UDiv => a.checked_div(b).ok_or_else(division_by_zero)?,
        IntBinary::URem => a.checked_rem(b).ok_or_else(division_by_zero)?,
        IntBinary::SDiv | IntBinary::SRem if b == 0 => return Err(division_by_zero()),
        IntBinary::SDiv | IntBinary::SRem if signed_overflow => return Err(overflow()),
        IntBinary::SDiv => lhs.as_signed().wrapping_div(rhs.as_signed()) as u64,
        IntBinary::SRem => lhs.as_signed().wrapping_rem(rhs.as_signed()) as u64,
        IntBinary::And => a & b,
        IntBinary::Or => a | b,
        IntBinary::Xor => a ^ b,
        IntBinary::Shl => a << shift_count()?,
        IntBinary::LShr => a >> shift_count()?,
        IntBinary::AShr => (lhs.as_signed() >> shift_count()?) as u64,
    };
    Ok(Scalar::int(ty, bits))
}

fn float_binary(op: FloatBinary, lhs: Scalar, rhs: Scalar) -> Scalar {
    if lhs.ty() == ValueType::F32 {
        let (a, b) = (lhs.as_f32(), rhs.as_f32());
        Scalar::f32(match op {
            FloatBinary::Add => a + b,
            FloatBinary::Sub => a - b,
            FloatBinary::Mul => a * b,
            FloatBinary::Div => a / b,
        })
    } else {
        let (a, b) = (lhs.as_f64(), rhs.as_f64());
        Scalar::f64(match op {
            FloatBinary::Add => a + b,
            FloatBinary::Sub => a - b,
            FloatBinary::Mul => a * b,
            FloatBinary::Div => a / b,
        })
    }
}
