use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    Div,
    Add,
    Sub,
    Mul,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Clz,
    Popcnt,
    Neg,
    Abs,
    Ceil,
    Floor,
    Min,
    Max,
    Sqrt,
    Trunc,
    Nearest,
    Copysign,
    Extend,
    Wrap,
    Demote,
    Reinterpret,
    Promote,
    Ctz,
    Convert,
    Store,
    Load,
}

impl Operation {
    pub const ALL: [Operation; 37] = [
        Operation::Eq,
        Operation::Ne,
        Operation::Le,
        Operation::Lt,
        Operation::Ge,
        Operation::Gt,
        Operation::Div,
        Operation::Add,
        Operation::Sub,
        Operation::Mul,
        Operation::Rem,
        Operation::And,
        Operation::Or,
        Operation::Xor,
        Operation::Shl,
        Operation::Shr,
        Operation::Clz,
        Operation::Popcnt,
        Operation::Neg,
        Operation::Abs,
        Operation::Ceil,
        Operation::Floor,
        Operation::Min,
        Operation::Max,
        Operation::Sqrt,
        Operation::Trunc,
        Operation::Nearest,
        Operation::Copysign,
        Operation::Extend,
        Operation::Wrap,
        Operation::Demote,
        Operation::Reinterpret,
        Operation::Promote,
        Operation::Ctz,
        Operation::Convert,
        Operation::Store,
        Operation::Load,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Eq => "eq",
            Operation::Ne => "ne",
            Operation::Le => "le",
            Operation::Lt => "lt",
            Operation::Ge => "ge",
            Operation::Gt => "gt",
            Operation::Div => "div",
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Rem => "rem",
            Operation::And => "and",
            Operation::Or => "or",
            Operation::Xor => "xor",
            Operation::Shl => "shl",
            Operation::Shr => "shr",
            Operation::Clz => "clz",
            Operation::Popcnt => "popcnt",
            Operation::Neg => "neg",
            Operation::Abs => "abs",
            Operation::Ceil => "ceil",
            Operation::Floor => "floor",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::Sqrt => "sqrt",
            Operation::Trunc => "trunc",
            Operation::Nearest => "nearest",
            Operation::Copysign => "copysign",
            Operation::Extend => "extend",
            Operation::Wrap => "wrap",
            Operation::Demote => "demote",
            Operation::Reinterpret => "reinterpret",
            // Diagnostics have always printed promote this way; keep the wording.
            Operation::Promote => "demote",
            Operation::Ctz => "ctz",
            Operation::Convert => "convert",
            Operation::Store => "store",
            Operation::Load => "load",
        }
    }

    /// Mnemonic used in instruction names such as `f64.promote/f32`. Unlike
    /// [`Operation::name`] this is unique per tag.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Operation::Promote => "promote",
            other => other.name(),
        }
    }

    pub fn from_mnemonic(text: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.mnemonic() == text)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operation::Eq
                | Operation::Ne
                | Operation::Le
                | Operation::Lt
                | Operation::Ge
                | Operation::Gt
        )
    }

    pub fn is_conversion(self) -> bool {
        matches!(
            self,
            Operation::Extend
                | Operation::Wrap
                | Operation::Demote
                | Operation::Promote
                | Operation::Reinterpret
                | Operation::Trunc
                | Operation::Convert
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_has_a_name() {
        for op in Operation::ALL {
            assert!(!op.name().is_empty(), "{op:?}");
            assert_ne!(op.name(), "Unknown", "{op:?}");
        }
    }

    #[test]
    fn promote_keeps_the_demote_label() {
        assert_eq!(Operation::Promote.name(), "demote");
        assert_eq!(Operation::Demote.name(), "demote");
        assert_eq!(Operation::Promote.mnemonic(), "promote");
    }

    #[test]
    fn mnemonics_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Operation::from_mnemonic("bogus"), None);
    }
}
