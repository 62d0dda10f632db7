use crate::language::{
    ast::{Directive, DirectiveKind, Expr, Opcode, Script, Signedness},
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    literal::parse_literal,
    operation::Operation,
    span::Span,
    token::{Token, TokenKind},
    types::ValueType,
};

pub fn parse_script(source: &str) -> Result<Script, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Instruction {
    Const(ValueType),
    Eqz(ValueType),
    Binary(Opcode),
    Convert(Opcode, ValueType),
    Select,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Script, SyntaxErrors> {
        let mut directives = Vec::new();
        while !self.is_eof() {
            let start = self.pos;
            match self.parse_directive() {
                Ok(directive) => directives.push(directive),
                Err(err) => {
                    self.report(err);
                    self.pos = start;
                    self.skip_balanced();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Script { directives })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_directive(&mut self) -> Result<Directive, SyntaxError> {
        let open = self.expect(TokenKind::LParen, "Expected `(` to open a directive")?;
        let (keyword, keyword_span) = self.expect_atom("Expected a directive name")?;
        let kind = match keyword.as_str() {
            "assert_return" => {
                let expr = self.parse_expr()?;
                let expected = if self.check(&TokenKind::LParen) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                DirectiveKind::AssertReturn { expr, expected }
            }
            "assert_return_nan" => DirectiveKind::AssertReturnNan {
                expr: self.parse_expr()?,
            },
            "assert_trap" => {
                let expr = self.parse_expr()?;
                let message = self.expect_string("Expected the trap message")?;
                DirectiveKind::AssertTrap { expr, message }
            }
            other => {
                return Err(
                    SyntaxError::new(format!("Unknown directive `{other}`"), keyword_span)
                        .with_label("unknown directive")
                        .with_help("expected assert_return, assert_return_nan or assert_trap"),
                );
            }
        };
        let close = self.expect(TokenKind::RParen, "Expected `)` to close the directive")?;
        Ok(Directive {
            kind,
            span: open.join(close),
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let open = self.expect(TokenKind::LParen, "Expected an instruction")?;
        let (name, name_span) = self.expect_atom("Expected an instruction name")?;
        let instruction = decode_instruction(&name).ok_or_else(|| {
            SyntaxError::new(format!("Unsupported instruction `{name}`"), name_span)
                .with_label("not supported by this backend")
        })?;

        let expr = match instruction {
            Instruction::Const(ty) => {
                let (text, span) = self.expect_atom("Expected a literal")?;
                let value = parse_literal(ty, &text).map_err(|message| {
                    SyntaxError::new(message, span).with_label("invalid literal")
                })?;
                let close = self.expect_close(&name)?;
                return Ok(Expr::Const {
                    value,
                    span: open.join(close),
                });
            }
            Instruction::Eqz(ty) => {
                let operand = self.parse_expr()?;
                PendingExpr::Eqz(ty, operand)
            }
            Instruction::Binary(opcode) => {
                let lhs = self.parse_expr()?;
                let rhs = self.parse_expr()?;
                PendingExpr::Binary(opcode, lhs, rhs)
            }
            Instruction::Convert(opcode, from) => {
                let operand = self.parse_expr()?;
                PendingExpr::Convert(opcode, from, operand)
            }
            Instruction::Select => {
                let then = self.parse_expr()?;
                let otherwise = self.parse_expr()?;
                let condition = self.parse_expr()?;
                PendingExpr::Select(then, otherwise, condition)
            }
        };
        let close = self.expect_close(&name)?;
        Ok(expr.finish(open.join(close)))
    }

    fn expect_close(&mut self, instruction: &str) -> Result<Span, SyntaxError> {
        self.expect(
            TokenKind::RParen,
            &format!("Expected `)` after the operands of `{instruction}`"),
        )
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Span, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_atom(&mut self, message: &str) -> Result<(String, Span), SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Atom(text)) => {
                let span = self.advance().span;
                Ok((text, span))
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn expect_string(&mut self, message: &str) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::String(text)) => {
                self.advance();
                Ok(text)
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        matches!(self.peek_kind(), Some(ref tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .cloned()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                span: Span::default(),
            });
        self.pos = (self.pos + 1).min(self.tokens.len());
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let (span, found) = match self.tokens.get(self.pos) {
            Some(token) => (token.span, token.kind.describe()),
            None => (Span::default(), TokenKind::Eof.describe()),
        };
        SyntaxError::new(message, span).with_label(format!("found {found}"))
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skips one balanced S-expression (or a single stray token) so parsing
    /// can resume at the next directive.
    fn skip_balanced(&mut self) {
        if !self.check(&TokenKind::LParen) {
            self.advance();
            return;
        }
        let mut depth = 0usize;
        while !self.is_eof() {
            match self.advance().kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

enum PendingExpr {
    Eqz(ValueType, Expr),
    Binary(Opcode, Expr, Expr),
    Convert(Opcode, ValueType, Expr),
    Select(Expr, Expr, Expr),
}

impl PendingExpr {
    fn finish(self, span: Span) -> Expr {
        match self {
            PendingExpr::Eqz(ty, operand) => Expr::Eqz {
                ty,
                operand: Box::new(operand),
                span,
            },
            PendingExpr::Binary(opcode, lhs, rhs) => Expr::Binary {
                opcode,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            },
            PendingExpr::Convert(opcode, from, operand) => Expr::Convert {
                opcode,
                from,
                operand: Box::new(operand),
                span,
            },
            PendingExpr::Select(then, otherwise, condition) => Expr::Select {
                then: Box::new(then),
                otherwise: Box::new(otherwise),
                condition: Box::new(condition),
                span,
            },
        }
    }
}

fn script_value_type(name: &str) -> Option<ValueType> {
    match name {
        "i32" => Some(ValueType::I32),
        "i64" => Some(ValueType::I64),
        "f32" => Some(ValueType::F32),
        "f64" => Some(ValueType::F64),
        _ => None,
    }
}

fn decode_instruction(name: &str) -> Option<Instruction> {
    if name == "select" {
        return Some(Instruction::Select);
    }
    let (head, from) = match name.split_once('/') {
        Some((head, from)) => (head, Some(from)),
        None => (name, None),
    };
    let (ty, rest) = head.split_once('.')?;
    let ty = script_value_type(ty)?;
    match (rest, from) {
        ("const", None) => return Some(Instruction::Const(ty)),
        ("eqz", None) if ty.is_integer() => return Some(Instruction::Eqz(ty)),
        _ => {}
    }

    let (base, sign) = if let Some(base) = rest.strip_suffix("_s") {
        (base, Signedness::Signed)
    } else if let Some(base) = rest.strip_suffix("_u") {
        (base, Signedness::Unsigned)
    } else {
        (rest, Signedness::Unspecified)
    };
    let opcode = Opcode::new(ty, Operation::from_mnemonic(base)?, sign);
    match from {
        Some(from) => {
            let from = script_value_type(from)?;
            conversion_is_supported(opcode, from).then_some(Instruction::Convert(opcode, from))
        }
        None => binary_is_supported(opcode).then_some(Instruction::Binary(opcode)),
    }
}

fn binary_is_supported(opcode: Opcode) -> bool {
    let unsigned_suffix = opcode.sign == Signedness::Unspecified;
    if opcode.ty.is_integer() {
        match opcode.op {
            Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::And
            | Operation::Or
            | Operation::Xor
            | Operation::Shl
            | Operation::Eq
            | Operation::Ne => unsigned_suffix,
            Operation::Div
            | Operation::Rem
            | Operation::Shr
            | Operation::Lt
            | Operation::Le
            | Operation::Gt
            | Operation::Ge => !unsigned_suffix,
            _ => false,
        }
    } else {
        unsigned_suffix
            && matches!(
                opcode.op,
                Operation::Add
                    | Operation::Sub
                    | Operation::Mul
                    | Operation::Div
                    | Operation::Eq
                    | Operation::Ne
                    | Operation::Lt
                    | Operation::Le
                    | Operation::Gt
                    | Operation::Ge
            )
    }
}

fn conversion_is_supported(opcode: Opcode, from: ValueType) -> bool {
    let has_sign = opcode.sign != Signedness::Unspecified;
    let to = opcode.ty;
    match opcode.op {
        Operation::Wrap => to == ValueType::I32 && from == ValueType::I64 && !has_sign,
        Operation::Extend => to == ValueType::I64 && from == ValueType::I32 && has_sign,
        Operation::Trunc => to.is_integer() && from.is_float() && has_sign,
        Operation::Convert => to.is_float() && from.is_integer() && has_sign,
        Operation::Promote => to == ValueType::F64 && from == ValueType::F32 && !has_sign,
        Operation::Demote => to == ValueType::F32 && from == ValueType::F64 && !has_sign,
        Operation::Reinterpret => {
            !has_sign
                && (from.same_width_integer() == Some(to) || to.same_width_integer() == Some(from))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::literal::Literal;

    fn parse_ok(source: &str) -> Script {
        parse_script(source).unwrap_or_else(|errors| panic!("parse failed: {errors:?}"))
    }

    #[test]
    fn parses_each_directive_kind() {
        let script = parse_ok(
            r#"
            (assert_return (i64.extend_s/i32 (i32.const -1)) (i64.const -1))
            (assert_return_nan (f32.div (f32.const 0) (f32.const 0)))
            (assert_trap (i32.div_u (i32.const 1) (i32.const 0)) "integer divide by zero")
            "#,
        );
        assert_eq!(script.directives.len(), 3);
        match &script.directives[0].kind {
            DirectiveKind::AssertReturn {
                expr: Expr::Convert { opcode, from, .. },
                expected: Some(Expr::Const { value, .. }),
            } => {
                assert_eq!(opcode.mnemonic(), "i64.extend_s");
                assert_eq!(*from, ValueType::I32);
                assert_eq!(*value, Literal::I64(u64::MAX));
            }
            other => panic!("unexpected directive {other:?}"),
        }
        assert!(matches!(
            script.directives[1].kind,
            DirectiveKind::AssertReturnNan { .. }
        ));
        match &script.directives[2].kind {
            DirectiveKind::AssertTrap { message, expr } => {
                assert_eq!(message, "integer divide by zero");
                assert_eq!(expr.result_type(), ValueType::I32);
            }
            other => panic!("unexpected directive {other:?}"),
        }
    }

    #[test]
    fn assert_return_without_expected_value() {
        let script = parse_ok("(assert_return (i32.add (i32.const 1) (i32.const 2)))");
        assert!(matches!(
            script.directives[0].kind,
            DirectiveKind::AssertReturn { expected: None, .. }
        ));
    }

    #[test]
    fn directive_span_covers_the_whole_form() {
        let source = "  (assert_return_nan (f64.const nan))";
        let script = parse_ok(source);
        assert_eq!(script.directives[0].span, Span::new(2, source.len()));
    }

    #[test]
    fn decodes_instruction_names() {
        assert_eq!(
            decode_instruction("f32.convert_u/i64"),
            Some(Instruction::Convert(
                Opcode::new(ValueType::F32, Operation::Convert, Signedness::Unsigned),
                ValueType::I64
            ))
        );
        assert_eq!(
            decode_instruction("f64.promote/f32"),
            Some(Instruction::Convert(
                Opcode::new(ValueType::F64, Operation::Promote, Signedness::Unspecified),
                ValueType::F32
            ))
        );
        assert_eq!(
            decode_instruction("i64.shr_u"),
            Some(Instruction::Binary(Opcode::new(
                ValueType::I64,
                Operation::Shr,
                Signedness::Unsigned
            )))
        );
        assert_eq!(decode_instruction("i32.eqz"), Some(Instruction::Eqz(ValueType::I32)));
        assert_eq!(decode_instruction("i32.clz"), None);
        assert_eq!(decode_instruction("i32.add_s"), None);
        assert_eq!(decode_instruction("i32.extend_s/i64"), None);
        assert_eq!(decode_instruction("f32.reinterpret/i64"), None);
        assert_eq!(decode_instruction("f64.lt_s"), None);
    }

    #[test]
    fn reports_errors_and_keeps_going() {
        let errors = parse_script(
            r#"
            (assert_bogus (i32.const 1))
            (assert_return (i32.const 1) (i32.const 1))
            (assert_return (i32.popcnt (i32.const 1)))
            (assert_return (i32.const 99999999999))
            "#,
        )
        .expect_err("should fail");
        let messages: Vec<_> = errors.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Unknown directive `assert_bogus`",
                "Unsupported instruction `i32.popcnt`",
                "integer constant `99999999999` out of range for i32",
            ]
        );
    }

    #[test]
    fn missing_trap_message_is_an_error() {
        let errors = parse_script("(assert_trap (i32.const 1))").expect_err("should fail");
        assert_eq!(errors.errors[0].message, "Expected the trap message");
        assert_eq!(errors.errors[0].label, "found `)`");
    }
}
