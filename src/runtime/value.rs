use crate::language::types::ValueType;
use std::fmt;

/// All-ones mask of the low `bits` bits.
pub fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

pub fn sign_extend(bits: u64, width: u32) -> i64 {
    match width {
        0 => 0,
        w if w >= 64 => bits as i64,
        _ => {
            let shift = 64 - width;
            ((bits << shift) as i64) >> shift
        }
    }
}

/// Width a value of `ty` occupies in the reference machine.
pub fn storage_width(ty: ValueType) -> u32 {
    ty.bit_width()
        .or_else(|| ty.native_pointer_width())
        .unwrap_or(0)
}

/// A typed bit pattern. Floats keep their exact bits, so NaN payloads and
/// the sign of zero survive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Scalar {
    ty: ValueType,
    bits: u64,
}

impl Scalar {
    /// Integer (or pointer) scalar; `bits` is masked to the type width.
    pub fn int(ty: ValueType, bits: u64) -> Self {
        Self {
            ty,
            bits: bits & mask(storage_width(ty)),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::int(ValueType::I1, u64::from(value))
    }

    pub fn f32(value: f32) -> Self {
        Self {
            ty: ValueType::F32,
            bits: u64::from(value.to_bits()),
        }
    }

    pub fn f64(value: f64) -> Self {
        Self {
            ty: ValueType::F64,
            bits: value.to_bits(),
        }
    }

    /// Same bits viewed as another type of equal width.
    pub fn with_type(self, ty: ValueType) -> Self {
        Self { ty, bits: self.bits }
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn as_unsigned(&self) -> u64 {
        self.bits
    }

    pub fn as_signed(&self) -> i64 {
        sign_extend(self.bits, storage_width(self.ty))
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.bits as u32)
    }

    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.bits)
    }

    /// Float value widened to f64; exact for both float types.
    pub fn float_value(&self) -> f64 {
        match self.ty {
            ValueType::F32 => f64::from(self.as_f32()),
            _ => self.as_f64(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.bits != 0
    }

    pub fn is_nan(&self) -> bool {
        match self.ty {
            ValueType::F32 => self.as_f32().is_nan(),
            ValueType::F64 => self.as_f64().is_nan(),
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            ValueType::F32 => write!(f, "f32 {}", self.as_f32()),
            ValueType::F64 => write!(f, "f64 {}", self.as_f64()),
            ValueType::I1 => write!(f, "i1 {}", self.is_true()),
            ValueType::Void => f.write_str("void"),
            ty => write!(f, "{ty} {}", self.as_signed()),
        }
    }
}
