use crate::language::{
    literal::Literal, operation::Operation, span::Span, types::ValueType,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signedness {
    Signed,
    Unsigned,
    Unspecified,
}

impl Signedness {
    pub fn suffix(self) -> &'static str {
        match self {
            Signedness::Signed => "_s",
            Signedness::Unsigned => "_u",
            Signedness::Unspecified => "",
        }
    }

    /// Sign flag handed to the coercion dispatcher. Instructions without a
    /// signedness suffix are treated as signed.
    pub fn is_signed(self) -> bool {
        !matches!(self, Signedness::Unsigned)
    }
}

/// A typed instruction name such as `i32.div_s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub ty: ValueType,
    pub op: Operation,
    pub sign: Signedness,
}

impl Opcode {
    pub fn new(ty: ValueType, op: Operation, sign: Signedness) -> Self {
        Self { ty, op, sign }
    }

    pub fn mnemonic(&self) -> String {
        format!("{}.{}{}", self.ty, self.op.mnemonic(), self.sign.suffix())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const {
        value: Literal,
        span: Span,
    },
    Eqz {
        ty: ValueType,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        opcode: Opcode,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Convert {
        opcode: Opcode,
        from: ValueType,
        operand: Box<Expr>,
        span: Span,
    },
    Select {
        then: Box<Expr>,
        otherwise: Box<Expr>,
        condition: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn constant(value: Literal) -> Self {
        Expr::Const {
            value,
            span: Span::default(),
        }
    }

    pub fn binary(opcode: Opcode, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            opcode,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: Span::default(),
        }
    }

    pub fn convert(opcode: Opcode, from: ValueType, operand: Expr) -> Self {
        Expr::Convert {
            opcode,
            from,
            operand: Box::new(operand),
            span: Span::default(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Const { span, .. }
            | Expr::Eqz { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Convert { span, .. }
            | Expr::Select { span, .. } => *span,
        }
    }

    /// Type of the value this expression leaves behind. Comparisons produce
    /// an `i32` truth value.
    pub fn result_type(&self) -> ValueType {
        match self {
            Expr::Const { value, .. } => value.value_type(),
            Expr::Eqz { .. } => ValueType::I32,
            Expr::Binary { opcode, .. } if opcode.op.is_comparison() => ValueType::I32,
            Expr::Binary { opcode, .. } => opcode.ty,
            Expr::Convert { opcode, .. } => opcode.ty,
            Expr::Select { then, .. } => then.result_type(),
        }
    }

    pub fn head(&self) -> String {
        match self {
            Expr::Const { value, .. } => format!("{}.const {}", value.value_type(), value),
            Expr::Eqz { ty, .. } => format!("{ty}.eqz"),
            Expr::Binary { opcode, .. } => opcode.mnemonic(),
            Expr::Convert { opcode, from, .. } => format!("{}/{}", opcode.mnemonic(), from),
            Expr::Select { .. } => "select".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DirectiveKind {
    AssertReturn {
        expr: Expr,
        expected: Option<Expr>,
    },
    AssertReturnNan {
        expr: Expr,
    },
    AssertTrap {
        expr: Expr,
        message: String,
    },
}

/// One top-level test directive of a script.
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub span: Span,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Script {
    pub directives: Vec<Directive>,
}
