//! Test assertions and the check functions they lower to.
//!
//! Every assertion becomes one exported function named after its id. Return
//! checks produce an `i32` that is `1` on success; trap checks return nothing
//! and are expected to trap with a matching message.

use crate::language::{
    ast::Expr,
    compiler::{
        coerce, indent, CodegenError, CodegenResult, Expression, FloatPredicate, IntPredicate,
        IrBuilder,
    },
    span::Span,
    types::ValueType,
};
use tracing::debug;

/// Name of one assertion, unique within a compilation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssertionId {
    index: usize,
    name: String,
    mangled: String,
}

impl AssertionId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Export-safe symbol of the generated check function.
    pub fn mangled(&self) -> &str {
        &self.mangled
    }
}

/// Sequential id source shared by every assertion kind.
#[derive(Debug, Default)]
pub struct AssertionNames {
    next: usize,
}

impl AssertionNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> AssertionId {
        let index = self.next;
        self.next += 1;
        let name = format!("wasm_assert_{index}");
        AssertionId {
            index,
            mangled: format!("wp_{name}"),
            name,
        }
    }

    pub fn issued(&self) -> usize {
        self.next
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssertionKind<E = Expr> {
    Return { expr: E, expected: Option<E> },
    ReturnNan { expr: E },
    Trap { expr: E, message: String },
}

impl<E> AssertionKind<E> {
    pub fn label(&self) -> &'static str {
        match self {
            AssertionKind::Return { .. } => "AssertReturn",
            AssertionKind::ReturnNan { .. } => "AssertReturnNan",
            AssertionKind::Trap { .. } => "AssertTrap",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assertion<E = Expr> {
    id: AssertionId,
    kind: AssertionKind<E>,
    span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// The check function returns `i32 1`.
    ReturnsOne,
    /// Evaluation traps with a message containing this text.
    Trap(String),
}

/// A generated check: what to call and what it must do.
#[derive(Clone, Debug, PartialEq)]
pub struct Check {
    pub name: String,
    pub function: String,
    pub expectation: Expectation,
    pub span: Span,
}

impl<E: Expression> Assertion<E> {
    fn new(names: &mut AssertionNames, kind: AssertionKind<E>) -> Self {
        Self {
            id: names.next_id(),
            kind,
            span: Span::default(),
        }
    }

    pub fn assert_return(names: &mut AssertionNames, expr: E, expected: Option<E>) -> Self {
        Self::new(names, AssertionKind::Return { expr, expected })
    }

    pub fn assert_return_nan(names: &mut AssertionNames, expr: E) -> Self {
        Self::new(names, AssertionKind::ReturnNan { expr })
    }

    pub fn assert_trap(names: &mut AssertionNames, expr: E, message: impl Into<String>) -> Self {
        Self::new(
            names,
            AssertionKind::Trap {
                expr,
                message: message.into(),
            },
        )
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn id(&self) -> &AssertionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn mangled_name(&self) -> &str {
        self.id.mangled()
    }

    pub fn kind(&self) -> &AssertionKind<E> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn expr(&self) -> &E {
        match &self.kind {
            AssertionKind::Return { expr, .. }
            | AssertionKind::ReturnNan { expr }
            | AssertionKind::Trap { expr, .. } => expr,
        }
    }

    pub fn dump(&self, level: usize) -> String {
        let mut out = String::new();
        indent(&mut out, level);
        out.push('(');
        out.push_str(self.kind.label());
        out.push(' ');
        out.push_str(self.name());
        if let AssertionKind::Trap { message, .. } = &self.kind {
            out.push_str(&format!(" {message:?}"));
        }
        out.push('\n');
        self.expr().dump(level + 1, &mut out);
        if let AssertionKind::Return {
            expected: Some(expected),
            ..
        } = &self.kind
        {
            expected.dump(level + 1, &mut out);
        }
        indent(&mut out, level);
        out.push_str(")\n");
        out
    }

    pub fn generate<B: IrBuilder>(&self, builder: &mut B) -> CodegenResult<Check> {
        debug!(name = self.name(), kind = self.kind.label(), "generating assertion");
        let expectation = match &self.kind {
            AssertionKind::Return { expr, expected } => {
                builder.begin_function(self.mangled_name(), ValueType::I32)?;
                let actual = expr.generate(builder)?;
                let result = match expected {
                    Some(expected) => {
                        let ty = expected.value_type();
                        let actual = coerce(builder, actual, expr.value_type(), ty, true)?;
                        let expected = expected.generate(builder)?;
                        let equal = if ty.is_float() {
                            builder.build_float_compare(FloatPredicate::Oeq, actual, expected)?
                        } else {
                            builder.build_int_compare(IntPredicate::Eq, actual, expected)?
                        };
                        coerce(builder, equal, ValueType::I1, ValueType::I32, false)?
                    }
                    None => builder.const_int(ValueType::I32, 1)?,
                };
                builder.build_return(Some(result))?;
                Expectation::ReturnsOne
            }
            AssertionKind::ReturnNan { expr } => {
                let found = expr.value_type();
                if !found.is_float() {
                    return Err(CodegenError::ExpectedFloat {
                        context: format!("assert_return_nan {}", self.name()),
                        found,
                    });
                }
                builder.begin_function(self.mangled_name(), ValueType::I32)?;
                let value = expr.generate(builder)?;
                // Unordered with itself holds for every NaN bit pattern.
                let is_nan = builder.build_float_compare(FloatPredicate::Uno, value, value)?;
                let result = coerce(builder, is_nan, ValueType::I1, ValueType::I32, false)?;
                builder.build_return(Some(result))?;
                Expectation::ReturnsOne
            }
            AssertionKind::Trap { expr, message } => {
                builder.begin_function(self.mangled_name(), ValueType::Void)?;
                expr.generate(builder)?;
                builder.build_return(None)?;
                Expectation::Trap(message.clone())
            }
        };

        Ok(Check {
            name: self.name().to_string(),
            function: self.mangled_name().to_string(),
            expectation,
            span: self.span,
        })
    }
}
