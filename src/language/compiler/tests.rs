use super::*;
use crate::{
    language::{
        assert::{Assertion, AssertionNames, Check, Expectation},
        ast::{Expr, Opcode, Signedness},
        literal::Literal,
        operation::Operation,
        parser::parse_script,
        types::Category,
    },
    runtime::{
        ir::Instruction,
        value::Scalar,
        Interpreter, Outcome, ReferenceBuilder,
    },
};

fn builder_for(ret: ValueType) -> ReferenceBuilder {
    let mut builder = ReferenceBuilder::new();
    builder.begin_function("t", ret).expect("begin");
    builder
}

fn instruction_count(builder: &ReferenceBuilder) -> usize {
    builder
        .current_function()
        .map(|function| function.instruction_count())
        .unwrap_or_default()
}

fn last_instruction(builder: &ReferenceBuilder) -> Instruction {
    builder
        .current_function()
        .and_then(|function| function.body().last())
        .map(|statement| statement.instruction.clone())
        .expect("an instruction")
}

fn opcodes(builder: &ReferenceBuilder) -> Vec<&'static str> {
    builder
        .current_function()
        .map(|function| {
            function
                .body()
                .iter()
                .map(|statement| statement.instruction.opcode())
                .collect()
        })
        .unwrap_or_default()
}

fn returned(mut builder: ReferenceBuilder, value: <ReferenceBuilder as IrBuilder>::Value) -> Scalar {
    builder.build_return(Some(value)).expect("ret");
    let module = builder.finish();
    match Interpreter::new(&module).call("t").expect("evaluate") {
        Outcome::Returned(Some(value)) => value,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn run_checks(source: &str) -> Vec<(Check, Outcome)> {
    let script = parse_script(source).expect("parse");
    let mut compiler = Compiler::new();
    let assertions = compiler.build_assertions(script);
    let mut builder = ReferenceBuilder::new();
    let checks = compiler.compile(&assertions, &mut builder).expect("compile");
    let module = builder.finish();
    let interpreter = Interpreter::new(&module);
    checks
        .into_iter()
        .map(|check| {
            let outcome = interpreter.call(&check.function).expect("evaluate");
            (check, outcome)
        })
        .collect()
}

fn one() -> Outcome {
    Outcome::Returned(Some(Scalar::int(ValueType::I32, 1)))
}

fn zero() -> Outcome {
    Outcome::Returned(Some(Scalar::int(ValueType::I32, 0)))
}

#[test]
fn equal_types_emit_nothing_and_return_the_same_value() {
    for ty in ValueType::INTEGERS {
        for signed in [true, false] {
            let mut builder = builder_for(ty);
            let value = builder.const_int(ty, 1).expect("const");
            let coerced = coerce(&mut builder, value, ty, ty, signed).expect("coerce");
            assert_eq!(coerced, value, "{ty}");
            assert_eq!(instruction_count(&builder), 0, "{ty}");
        }
    }
    let mut builder = builder_for(ValueType::F64);
    let value = builder.const_f64(2.5).expect("const");
    assert_eq!(
        coerce(&mut builder, value, ValueType::F64, ValueType::F64, true),
        Ok(value)
    );
    assert_eq!(instruction_count(&builder), 0);
}

#[test]
fn mislabelled_integer_width_is_rederived() {
    let mut builder = builder_for(ValueType::I64);
    let narrow = builder.const_int(ValueType::I16, 0xffff).expect("const");
    let value = coerce(&mut builder, narrow, ValueType::I64, ValueType::I64, true).expect("coerce");
    assert_eq!(builder.value_type(value), Ok(ValueType::I64));
    assert_eq!(opcodes(&builder), vec!["sext"]);
    assert_eq!(returned(builder, value).as_signed(), -1);
}

#[test]
fn widening_extends_according_to_the_sign_flag() {
    for source in ValueType::INTEGERS {
        for dest in ValueType::INTEGERS {
            if source.bit_width() >= dest.bit_width() {
                continue;
            }
            for signed in [true, false] {
                let mut builder = builder_for(dest);
                let value = builder.const_int(source, 1).expect("const");
                let widened = coerce(&mut builder, value, source, dest, signed).expect("coerce");
                assert_eq!(builder.value_type(widened), Ok(dest));
                assert_eq!(instruction_count(&builder), 1);
                assert_eq!(
                    last_instruction(&builder),
                    Instruction::Extend {
                        value,
                        to: dest,
                        signed
                    }
                );
            }
        }
    }
}

#[test]
fn narrowing_truncates_regardless_of_the_sign_flag() {
    for source in ValueType::INTEGERS {
        for dest in ValueType::INTEGERS {
            if source.bit_width() <= dest.bit_width() {
                continue;
            }
            for signed in [true, false] {
                let mut builder = builder_for(dest);
                let value = builder.const_int(source, 0x1234).expect("const");
                let narrowed = coerce(&mut builder, value, source, dest, signed).expect("coerce");
                assert_eq!(builder.value_type(narrowed), Ok(dest));
                assert_eq!(
                    last_instruction(&builder),
                    Instruction::Truncate { value, to: dest }
                );
            }
        }
    }
}

#[test]
fn minus_one_widens_by_sign_or_by_zero() {
    let mut builder = builder_for(ValueType::I64);
    let value = builder.const_int(ValueType::I32, u64::from(u32::MAX)).expect("const");
    let widened = coerce(&mut builder, value, ValueType::I32, ValueType::I64, true).expect("coerce");
    assert_eq!(returned(builder, widened).as_signed(), -1);

    let mut builder = builder_for(ValueType::I64);
    let value = builder.const_int(ValueType::I32, u64::from(u32::MAX)).expect("const");
    let widened =
        coerce(&mut builder, value, ValueType::I32, ValueType::I64, false).expect("coerce");
    assert_eq!(returned(builder, widened).as_unsigned(), 4_294_967_295);
}

#[test]
fn small_integers_survive_f32_to_i64_and_back() {
    for input in [0.0f32, 1.0, -1.0, 1000.0] {
        let mut builder = builder_for(ValueType::F32);
        let value = builder.const_f32(input).expect("const");
        let int = coerce(&mut builder, value, ValueType::F32, ValueType::I64, true).expect("to int");
        assert_eq!(builder.value_type(int), Ok(ValueType::I64));
        let back = coerce(&mut builder, int, ValueType::I64, ValueType::F32, true).expect("to float");
        assert_eq!(returned(builder, back).as_f32(), input);
    }
}

#[test]
fn wide_integers_reach_f32_through_f64() {
    let mut builder = builder_for(ValueType::F32);
    let value = builder.const_int(ValueType::I64, 16_777_217).expect("const");
    let float = coerce(&mut builder, value, ValueType::I64, ValueType::F32, true).expect("coerce");
    assert_eq!(opcodes(&builder), vec!["sitofp", "fptrunc"]);
    assert_eq!(returned(builder, float).as_f32(), 16_777_216.0);
}

#[test]
fn pointers_pass_through_untouched() {
    let mut builder = builder_for(ValueType::Ptr64);
    let pointer = builder.const_int(ValueType::Ptr64, 0x1000).expect("const");
    for dest in [ValueType::I32, ValueType::F32, ValueType::Ptr32] {
        let same = coerce(&mut builder, pointer, ValueType::Ptr64, dest, false).expect("coerce");
        assert_eq!(same, pointer);
    }
    assert_eq!(instruction_count(&builder), 0);
}

#[test]
fn unsupported_coercions_are_internal_errors() {
    let mut builder = builder_for(ValueType::Void);
    let value = builder.const_f32(1.0).expect("const");
    assert_eq!(
        coerce(&mut builder, value, ValueType::F32, ValueType::Ptr32, true),
        Err(CodegenError::UnsupportedCoercion {
            from: Category::Float32,
            to: Category::Pointer,
        })
    );
    assert_eq!(
        coerce(&mut builder, value, ValueType::Void, ValueType::F32, true),
        Err(CodegenError::UnsupportedCoercion {
            from: Category::Void,
            to: Category::Float32,
        })
    );
}

#[test]
fn to_boolean_treats_only_zero_as_false() {
    let cases: [(f64, bool); 6] = [
        (0.0, false),
        (-0.0, false),
        (1.5, true),
        (f64::INFINITY, true),
        (f64::NAN, true),
        (-f64::NAN, true),
    ];
    for (input, expected) in cases {
        let mut builder = builder_for(ValueType::I1);
        let value = builder.const_f64(input).expect("const");
        let flag = to_boolean(&mut builder, value).expect("to_boolean");
        assert_eq!(builder.value_type(flag), Ok(ValueType::I1));
        assert_eq!(returned(builder, flag).is_true(), expected, "f64 {input}");

        let mut builder = builder_for(ValueType::I1);
        let value = builder.const_f32(input as f32).expect("const");
        let flag = to_boolean(&mut builder, value).expect("to_boolean");
        assert_eq!(returned(builder, flag).is_true(), expected, "f32 {input}");
    }

    for (bits, expected) in [(0u64, false), (7, true), (u64::MAX, true)] {
        let mut builder = builder_for(ValueType::I1);
        let value = builder.const_int(ValueType::I16, bits).expect("const");
        let flag = to_boolean(&mut builder, value).expect("to_boolean");
        assert_eq!(returned(builder, flag).is_true(), expected);
    }
}

#[test]
fn to_boolean_keeps_existing_booleans_and_rejects_pointers() {
    let mut builder = builder_for(ValueType::I1);
    let flag = builder.const_int(ValueType::I1, 1).expect("const");
    assert_eq!(to_boolean(&mut builder, flag), Ok(flag));
    assert_eq!(instruction_count(&builder), 0);

    let pointer = builder.const_int(ValueType::Ptr32, 4).expect("const");
    assert_eq!(
        to_boolean(&mut builder, pointer),
        Err(CodegenError::NoBitWidth {
            ty: ValueType::Ptr32
        })
    );
}

#[test]
fn assertion_ids_never_repeat_across_kinds() {
    let mut names = AssertionNames::new();
    let constant = || Expr::constant(Literal::F32(f32::NAN));
    let assertions: Vec<Assertion> = vec![
        Assertion::assert_return(&mut names, constant(), None),
        Assertion::assert_return_nan(&mut names, constant()),
        Assertion::assert_trap(&mut names, constant(), "trap"),
        Assertion::assert_return(&mut names, constant(), None),
    ];
    let mut seen: Vec<&str> = assertions.iter().map(|a| a.mangled_name()).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), assertions.len());
    assert_eq!(assertions[3].name(), "wasm_assert_3");
}

#[test]
fn return_nan_accepts_any_nan_and_rejects_zero() {
    let mut names = AssertionNames::new();
    let assertions: Vec<Assertion> = vec![
        Assertion::assert_return_nan(&mut names, Expr::constant(Literal::F32(f32::NAN))),
        Assertion::assert_return_nan(
            &mut names,
            Expr::constant(Literal::F32(f32::from_bits(0xffc0_0000))),
        ),
        Assertion::assert_return_nan(
            &mut names,
            Expr::constant(Literal::F64(f64::from_bits(0x7ff0_0000_0000_0001))),
        ),
        Assertion::assert_return_nan(&mut names, Expr::constant(Literal::F32(0.0))),
    ];
    let compiler = Compiler::new();
    let mut builder = ReferenceBuilder::new();
    let checks = compiler.compile(&assertions, &mut builder).expect("compile");
    let module = builder.finish();
    let interpreter = Interpreter::new(&module);
    let outcomes: Vec<Outcome> = checks
        .iter()
        .map(|check| interpreter.call(&check.function).expect("evaluate"))
        .collect();
    assert_eq!(outcomes, vec![one(), one(), one(), zero()]);
}

#[test]
fn return_nan_requires_a_float() {
    let mut names = AssertionNames::new();
    let assertion: Assertion =
        Assertion::assert_return_nan(&mut names, Expr::constant(Literal::I32(0)));
    let mut builder = ReferenceBuilder::new();
    assert!(matches!(
        assertion.generate(&mut builder),
        Err(CodegenError::ExpectedFloat {
            found: ValueType::I32,
            ..
        })
    ));
    assert!(builder.module().functions().is_empty());
}

#[test]
fn return_aligns_the_result_with_the_expected_type() {
    let mut names = AssertionNames::new();
    let assertion: Assertion = Assertion::assert_return(
        &mut names,
        Expr::constant(Literal::I32(u32::MAX)),
        Some(Expr::constant(Literal::I64(u64::MAX))),
    );
    let mut builder = ReferenceBuilder::new();
    let check = assertion.generate(&mut builder).expect("generate");
    assert_eq!(check.expectation, Expectation::ReturnsOne);
    let module = builder.finish();
    assert_eq!(Interpreter::new(&module).call(&check.function), Ok(one()));
}

#[test]
fn conversions_and_comparisons_evaluate() {
    let results = run_checks(
        r#"
        (assert_return (i64.extend_s/i32 (i32.const -1)) (i64.const -1))
        (assert_return (i64.extend_u/i32 (i32.const -1)) (i64.const 4294967295))
        (assert_return (i32.wrap/i64 (i64.const 0x100000005)) (i32.const 5))
        (assert_return (f32.convert_s/i64 (i64.const 16777217)) (f32.const 16777216))
        (assert_return (f64.convert_u/i32 (i32.const -1)) (f64.const 4294967295))
        (assert_return (f32.demote/f64 (f64.const 0.5)) (f32.const 0.5))
        (assert_return (f64.promote/f32 (f32.const -inf)) (f64.const -inf))
        (assert_return (i32.reinterpret/f32 (f32.const -0)) (i32.const 0x80000000))
        (assert_return (i32.trunc_s/f32 (f32.const -2147483648)) (i32.const -2147483648))
        (assert_return (i64.trunc_u/f64 (f64.const 1e19)) (i64.const 10000000000000000000))
        (assert_return (i32.trunc_u/f64 (f64.const -0.9)) (i32.const 0))
        (assert_return (i32.lt_s (i32.const -1) (i32.const 0)) (i32.const 1))
        (assert_return (i32.lt_u (i32.const -1) (i32.const 0)) (i32.const 0))
        (assert_return (f64.ne (f64.const nan) (f64.const nan)) (i32.const 1))
        (assert_return (f32.eq (f32.const nan) (f32.const nan)) (i32.const 0))
        (assert_return (i32.eqz (i32.const 0)) (i32.const 1))
        (assert_return (i32.shl (i32.const 1) (i32.const 33)) (i32.const 2))
        (assert_return (i64.shr_s (i64.const -8) (i64.const 1)) (i64.const -4))
        (assert_return (i32.rem_s (i32.const -2147483648) (i32.const -1)) (i32.const 0))
        (assert_return (select (f32.const 1) (f32.const 2) (i32.const 0)) (f32.const 2))
        (assert_return_nan (f32.div (f32.const 0) (f32.const 0)))
        "#,
    );
    for (check, outcome) in results {
        assert_eq!(outcome, one(), "{}", check.name);
    }
}

#[test]
fn traps_carry_their_message() {
    let results = run_checks(
        r#"
        (assert_trap (i32.div_s (i32.const 1) (i32.const 0)) "integer divide by zero")
        (assert_trap (i64.rem_u (i64.const 1) (i64.const 0)) "integer divide by zero")
        (assert_trap (i32.div_s (i32.const -2147483648) (i32.const -1)) "integer overflow")
        (assert_trap (i32.trunc_s/f32 (f32.const nan)) "invalid conversion to integer")
        (assert_trap (i32.trunc_u/f64 (f64.const -1)) "integer overflow")
        (assert_trap (i64.trunc_s/f32 (f32.const 1e19)) "integer overflow")
        (assert_trap (i32.trunc_s/f64 (f64.const 2147483648)) "integer overflow")
        "#,
    );
    let messages = [
        DIVIDE_BY_ZERO,
        DIVIDE_BY_ZERO,
        INTEGER_OVERFLOW,
        INVALID_CONVERSION,
        INTEGER_OVERFLOW,
        INTEGER_OVERFLOW,
        INTEGER_OVERFLOW,
    ];
    for ((check, outcome), message) in results.into_iter().zip(messages) {
        assert_eq!(check.expectation, Expectation::Trap(message.to_string()));
        assert_eq!(outcome, Outcome::Trapped(message.to_string()), "{}", check.name);
    }
}

#[test]
fn operand_types_are_checked() {
    let expr = Expr::binary(
        Opcode::new(ValueType::I32, Operation::Add, Signedness::Unspecified),
        Expr::constant(Literal::I32(1)),
        Expr::constant(Literal::I64(1)),
    );
    let mut builder = builder_for(ValueType::I32);
    assert_eq!(
        expr.generate(&mut builder),
        Err(CodegenError::TypeMismatch {
            context: "i32.add".into(),
            expected: ValueType::I32,
            found: ValueType::I64,
        })
    );
}

#[test]
fn compiler_assigns_names_and_spans_in_order() {
    let source = "(assert_return (i32.const 1))\n(assert_trap (i32.const 1) \"x\")";
    let script = parse_script(source).expect("parse");
    let mut compiler = Compiler::new();
    let assertions = compiler.build_assertions(script);
    assert_eq!(compiler.names().issued(), 2);
    assert_eq!(assertions[0].name(), "wasm_assert_0");
    assert_eq!(assertions[1].mangled_name(), "wp_wasm_assert_1");
    assert_eq!(assertions[1].span().start, source.find("(assert_trap").unwrap_or(0));
}

#[test]
fn expression_dump_nests_operands() {
    let expr = Expr::convert(
        Opcode::new(ValueType::I64, Operation::Extend, Signedness::Signed),
        ValueType::I32,
        Expr::constant(Literal::I32(u32::MAX)),
    );
    let mut out = String::new();
    expr.dump(1, &mut out);
    assert_eq!(out, "  (i64.extend_s/i32\n    (i32.const -1)\n  )\n");
}
