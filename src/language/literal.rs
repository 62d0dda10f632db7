//! Numeric literal grammar for `*.const` instructions.

use crate::{language::types::ValueType, runtime::value::mask};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, hex_digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    I32(u32),
    I64(u64),
    F32(f32),
    F64(f64),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::I32(_) => ValueType::I32,
            Literal::I64(_) => ValueType::I64,
            Literal::F32(_) => ValueType::F32,
            Literal::F64(_) => ValueType::F64,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I32(bits) => write!(f, "{}", *bits as i32),
            Literal::I64(bits) => write!(f, "{}", *bits as i64),
            Literal::F32(value) => {
                let bits = value.to_bits();
                write_float(f, value.is_nan(), bits >> 31 == 1, u64::from(bits & 0x7f_ffff), 0x40_0000, || {
                    value.to_string()
                })
            }
            Literal::F64(value) => {
                let bits = value.to_bits();
                write_float(
                    f,
                    value.is_nan(),
                    bits >> 63 == 1,
                    bits & 0xf_ffff_ffff_ffff,
                    0x8_0000_0000_0000,
                    || value.to_string(),
                )
            }
        }
    }
}

fn write_float(
    f: &mut fmt::Formatter<'_>,
    is_nan: bool,
    negative: bool,
    payload: u64,
    canonical: u64,
    finite: impl FnOnce() -> String,
) -> fmt::Result {
    if !is_nan {
        let text = finite();
        return f.write_str(&text);
    }
    let sign = if negative { "-" } else { "" };
    if payload == canonical {
        write!(f, "{sign}nan")
    } else {
        write!(f, "{sign}nan:0x{payload:x}")
    }
}

#[derive(Clone, Debug, PartialEq)]
enum FloatBody<'a> {
    Finite(&'a str),
    Infinity,
    Nan,
    NanPayload(u64),
}

fn negative(input: &str) -> IResult<&str, bool> {
    map(opt(one_of("+-")), |sign| sign == Some('-'))(input)
}

fn hex_u64(input: &str) -> IResult<&str, u64> {
    preceded(
        tag("0x"),
        map_res(hex_digit1, |digits| u64::from_str_radix(digits, 16)),
    )(input)
}

fn dec_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>)(input)
}

fn integer(input: &str) -> IResult<&str, (bool, u64)> {
    pair(negative, alt((hex_u64, dec_u64)))(input)
}

fn decimal_float(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn float_body(input: &str) -> IResult<&str, FloatBody<'_>> {
    alt((
        map(tag("inf"), |_| FloatBody::Infinity),
        map(preceded(tag("nan:"), hex_u64), FloatBody::NanPayload),
        map(tag("nan"), |_| FloatBody::Nan),
        map(decimal_float, FloatBody::Finite),
    ))(input)
}

fn float(input: &str) -> IResult<&str, (bool, FloatBody<'_>)> {
    pair(negative, float_body)(input)
}

/// Parses the text of a `*.const` operand for the given type.
pub fn parse_literal(ty: ValueType, text: &str) -> Result<Literal, String> {
    match ty {
        ValueType::I32 => parse_integer(text, 32).map(|bits| Literal::I32(bits as u32)),
        ValueType::I64 => parse_integer(text, 64).map(Literal::I64),
        ValueType::F32 => parse_f32(text).map(Literal::F32),
        ValueType::F64 => parse_f64(text).map(Literal::F64),
        other => Err(format!("`{other}` has no literal syntax")),
    }
}

fn parse_integer(text: &str, width: u32) -> Result<u64, String> {
    let (_, (neg, magnitude)) = all_consuming(integer)(text)
        .map_err(|_| format!("malformed integer literal `{text}`"))?;
    let limit = if neg { 1u64 << (width - 1) } else { mask(width) };
    if magnitude > limit {
        return Err(format!("integer constant `{text}` out of range for i{width}"));
    }
    let bits = if neg {
        magnitude.wrapping_neg()
    } else {
        magnitude
    };
    Ok(bits & mask(width))
}

fn parse_f32(text: &str) -> Result<f32, String> {
    let (_, (neg, body)) =
        all_consuming(float)(text).map_err(|_| format!("malformed float literal `{text}`"))?;
    let magnitude = match body {
        FloatBody::Finite(digits) => digits
            .parse::<f32>()
            .map_err(|_| format!("malformed float literal `{text}`"))?,
        FloatBody::Infinity => f32::INFINITY,
        FloatBody::Nan => f32::from_bits(0x7fc0_0000),
        FloatBody::NanPayload(payload) => {
            if payload == 0 || payload > 0x7f_ffff {
                return Err(format!("NaN payload out of range in `{text}`"));
            }
            f32::from_bits(0x7f80_0000 | payload as u32)
        }
    };
    Ok(if neg {
        f32::from_bits(magnitude.to_bits() | 0x8000_0000)
    } else {
        magnitude
    })
}

fn parse_f64(text: &str) -> Result<f64, String> {
    let (_, (neg, body)) =
        all_consuming(float)(text).map_err(|_| format!("malformed float literal `{text}`"))?;
    let magnitude = match body {
        FloatBody::Finite(digits) => digits
            .parse::<f64>()
            .map_err(|_| format!("malformed float literal `{text}`"))?,
        FloatBody::Infinity => f64::INFINITY,
        FloatBody::Nan => f64::from_bits(0x7ff8_0000_0000_0000),
        FloatBody::NanPayload(payload) => {
            if payload == 0 || payload > 0xf_ffff_ffff_ffff {
                return Err(format!("NaN payload out of range in `{text}`"));
            }
            f64::from_bits(0x7ff0_0000_0000_0000 | payload)
        }
    };
    Ok(if neg {
        f64::from_bits(magnitude.to_bits() | (1 << 63))
    } else {
        magnitude
    })
}
