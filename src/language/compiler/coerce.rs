//! Moving a value from one numeric type to another.
//!
//! [`plan`] is the whole conversion graph as one table; [`coerce`] runs a plan
//! against a builder.

use super::{CodegenError, CodegenResult, IrBuilder};
use crate::language::{
    operation::Operation,
    types::{Category, ValueType},
};
use std::{cmp::Ordering, fmt};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoercionStep {
    Extend { to: ValueType, signed: bool },
    Truncate { to: ValueType },
    FloatToInt { to: ValueType, signed: bool },
    IntToFloat { to: ValueType, signed: bool },
    FloatExtend { to: ValueType },
    FloatTruncate { to: ValueType },
}

impl CoercionStep {
    pub fn operation(self) -> Operation {
        match self {
            CoercionStep::Extend { .. } => Operation::Extend,
            CoercionStep::Truncate { .. } => Operation::Wrap,
            CoercionStep::FloatToInt { .. } => Operation::Trunc,
            CoercionStep::IntToFloat { .. } => Operation::Convert,
            CoercionStep::FloatExtend { .. } => Operation::Promote,
            CoercionStep::FloatTruncate { .. } => Operation::Demote,
        }
    }

    pub fn result_type(self) -> ValueType {
        match self {
            CoercionStep::Extend { to, .. }
            | CoercionStep::Truncate { to }
            | CoercionStep::FloatToInt { to, .. }
            | CoercionStep::IntToFloat { to, .. }
            | CoercionStep::FloatExtend { to }
            | CoercionStep::FloatTruncate { to } => to,
        }
    }

    fn emit<B: IrBuilder>(self, builder: &mut B, value: B::Value) -> CodegenResult<B::Value> {
        match self {
            CoercionStep::Extend { to, signed } => builder.build_int_extend(value, to, signed),
            CoercionStep::Truncate { to } => builder.build_int_truncate(value, to),
            CoercionStep::FloatToInt { to, signed } => builder.build_float_to_int(value, to, signed),
            CoercionStep::IntToFloat { to, signed } => builder.build_int_to_float(value, to, signed),
            CoercionStep::FloatExtend { to } => builder.build_float_extend(value, to),
            CoercionStep::FloatTruncate { to } => builder.build_float_truncate(value, to),
        }
    }
}

impl fmt::Display for CoercionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self {
            CoercionStep::Extend { signed, .. }
            | CoercionStep::FloatToInt { signed, .. }
            | CoercionStep::IntToFloat { signed, .. } => {
                if *signed {
                    "_s"
                } else {
                    "_u"
                }
            }
            _ => "",
        };
        write!(
            f,
            "{}{} {}",
            self.operation().mnemonic(),
            suffix,
            self.result_type()
        )
    }
}

/// Ordered instruction steps for one coercion. Empty means identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoercionPlan {
    pub steps: Vec<CoercionStep>,
}

impl CoercionPlan {
    fn new(steps: impl IntoIterator<Item = CoercionStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply<B: IrBuilder>(&self, builder: &mut B, value: B::Value) -> CodegenResult<B::Value> {
        self.steps
            .iter()
            .try_fold(value, |value, step| step.emit(builder, value))
    }
}

impl fmt::Display for CoercionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("identity");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Integer to integer. Truncation keeps the low bits and ignores `signed`.
pub fn width_adjust(
    dest: ValueType,
    src_bits: u32,
    dest_bits: u32,
    signed: bool,
) -> Option<CoercionStep> {
    match src_bits.cmp(&dest_bits) {
        Ordering::Less => Some(CoercionStep::Extend { to: dest, signed }),
        Ordering::Equal => None,
        Ordering::Greater => Some(CoercionStep::Truncate { to: dest }),
    }
}

/// Decides the instruction sequence that takes a `source` value to `dest`.
pub fn plan(source: ValueType, dest: ValueType, signed: bool) -> CodegenResult<CoercionPlan> {
    if source == dest {
        return Ok(CoercionPlan::default());
    }
    let unsupported = || CodegenError::UnsupportedCoercion {
        from: source.category(),
        to: dest.category(),
    };

    let plan = match (source.category(), dest.category()) {
        // Pointers pass through whatever the destination.
        (Category::Pointer, _) => CoercionPlan::default(),
        (Category::Integer, Category::Integer) => CoercionPlan::new(width_adjust(
            dest,
            source.expect_bit_width()?,
            dest.expect_bit_width()?,
            signed,
        )),
        (Category::Integer, Category::Pointer) => {
            let bits = dest.native_pointer_width().ok_or_else(unsupported)?;
            let address = ValueType::integer_of_width(bits).ok_or_else(unsupported)?;
            CoercionPlan::new(width_adjust(
                address,
                source.expect_bit_width()?,
                bits,
                signed,
            ))
        }
        (Category::Integer, Category::Float32) if source.expect_bit_width()? != 32 => {
            CoercionPlan::new([
                CoercionStep::IntToFloat {
                    to: ValueType::F64,
                    signed,
                },
                CoercionStep::FloatTruncate { to: ValueType::F32 },
            ])
        }
        (Category::Integer, Category::Float32 | Category::Float64) => {
            CoercionPlan::new([CoercionStep::IntToFloat { to: dest, signed }])
        }
        (Category::Float32, Category::Integer) => CoercionPlan::new(
            std::iter::once(CoercionStep::FloatToInt {
                to: ValueType::I32,
                signed,
            })
            .chain(width_adjust(dest, 32, dest.expect_bit_width()?, signed)),
        ),
        (Category::Float32, Category::Float64) => {
            CoercionPlan::new([CoercionStep::FloatExtend { to: ValueType::F64 }])
        }
        (Category::Float64, Category::Integer) => CoercionPlan::new(
            std::iter::once(CoercionStep::FloatToInt {
                to: ValueType::I64,
                signed,
            })
            .chain(width_adjust(dest, 64, dest.expect_bit_width()?, signed)),
        ),
        (Category::Float64, Category::Float32) => {
            CoercionPlan::new([CoercionStep::FloatTruncate { to: ValueType::F32 }])
        }
        _ => return Err(unsupported()),
    };
    Ok(plan)
}

/// Coerces `value`, typed `source`, to `dest`.
///
/// Equal types emit nothing, unless the builder reports a physical integer
/// width that disagrees with `source`; that value is width-adjusted first.
pub fn coerce<B: IrBuilder>(
    builder: &mut B,
    value: B::Value,
    source: ValueType,
    dest: ValueType,
    signed: bool,
) -> CodegenResult<B::Value> {
    if source == dest {
        let physical = builder.value_type(value)?;
        if source.is_integer() && physical.is_integer() && physical != source {
            let step = width_adjust(
                source,
                physical.expect_bit_width()?,
                source.expect_bit_width()?,
                signed,
            );
            trace!(%physical, %source, "re-deriving integer width");
            return CoercionPlan::new(step).apply(builder, value);
        }
        return Ok(value);
    }

    let plan = plan(source, dest, signed)?;
    trace!(%source, %dest, signed, %plan, "coerce");
    plan.apply(builder, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(source: ValueType, dest: ValueType, signed: bool) -> Vec<CoercionStep> {
        plan(source, dest, signed).expect("plan").steps
    }

    #[test]
    fn integer_pairs_follow_width_order() {
        for source in ValueType::INTEGERS {
            for dest in ValueType::INTEGERS {
                let s = source.bit_width().unwrap_or_default();
                let d = dest.bit_width().unwrap_or_default();
                for signed in [true, false] {
                    let got = steps(source, dest, signed);
                    let expected = match s.cmp(&d) {
                        Ordering::Less => vec![CoercionStep::Extend { to: dest, signed }],
                        Ordering::Equal => vec![],
                        Ordering::Greater => vec![CoercionStep::Truncate { to: dest }],
                    };
                    assert_eq!(got, expected, "{source} -> {dest} signed={signed}");
                }
            }
        }
    }

    #[test]
    fn narrow_integers_reach_f32_through_f64() {
        assert_eq!(
            steps(ValueType::I64, ValueType::F32, true),
            vec![
                CoercionStep::IntToFloat {
                    to: ValueType::F64,
                    signed: true
                },
                CoercionStep::FloatTruncate { to: ValueType::F32 },
            ]
        );
        assert_eq!(
            steps(ValueType::I32, ValueType::F32, false),
            vec![CoercionStep::IntToFloat {
                to: ValueType::F32,
                signed: false
            }]
        );
        assert_eq!(
            steps(ValueType::I16, ValueType::F64, true),
            vec![CoercionStep::IntToFloat {
                to: ValueType::F64,
                signed: true
            }]
        );
    }

    #[test]
    fn floats_land_in_their_own_width_first() {
        assert_eq!(
            steps(ValueType::F32, ValueType::I64, true),
            vec![
                CoercionStep::FloatToInt {
                    to: ValueType::I32,
                    signed: true
                },
                CoercionStep::Extend {
                    to: ValueType::I64,
                    signed: true
                },
            ]
        );
        assert_eq!(
            steps(ValueType::F64, ValueType::I8, false),
            vec![
                CoercionStep::FloatToInt {
                    to: ValueType::I64,
                    signed: false
                },
                CoercionStep::Truncate { to: ValueType::I8 },
            ]
        );
        assert_eq!(
            steps(ValueType::F32, ValueType::F64, true),
            vec![CoercionStep::FloatExtend { to: ValueType::F64 }]
        );
        assert_eq!(
            steps(ValueType::F64, ValueType::F32, true),
            vec![CoercionStep::FloatTruncate { to: ValueType::F32 }]
        );
    }

    #[test]
    fn pointers_pass_through_and_integers_reach_address_width() {
        for dest in ValueType::ALL {
            assert!(plan(ValueType::Ptr64, dest, true).expect("plan").is_identity());
        }
        assert_eq!(
            steps(ValueType::I32, ValueType::Ptr64, false),
            vec![CoercionStep::Extend {
                to: ValueType::I64,
                signed: false
            }]
        );
        assert!(steps(ValueType::I32, ValueType::Ptr32, true).is_empty());
    }

    #[test]
    fn unsupported_pairs_name_both_categories() {
        for (source, dest) in [
            (ValueType::Void, ValueType::I32),
            (ValueType::I32, ValueType::Void),
            (ValueType::F32, ValueType::Ptr32),
            (ValueType::F64, ValueType::Void),
        ] {
            assert_eq!(
                plan(source, dest, true),
                Err(CodegenError::UnsupportedCoercion {
                    from: source.category(),
                    to: dest.category(),
                })
            );
        }
        let err = plan(ValueType::Void, ValueType::F64, false).unwrap_err();
        assert_eq!(err.to_string(), "cannot coerce void to double");
    }

    #[test]
    fn plans_describe_themselves() {
        let plan = plan(ValueType::F32, ValueType::I64, false).expect("plan");
        assert_eq!(plan.to_string(), "trunc_u i32 -> extend_u i64");
        assert_eq!(plan.steps[0].operation(), Operation::Trunc);
        assert_eq!(
            super::plan(ValueType::I8, ValueType::I8, true)
                .expect("plan")
                .to_string(),
            "identity"
        );
    }
}
