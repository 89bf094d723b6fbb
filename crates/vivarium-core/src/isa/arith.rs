// SPDX-License-Identifier: Apache-2.0
//! Arithmetic family.
//!
//! Binary ops carry R/I/S variants; unary ops carry R/S. Stack variants pop
//! `op1` from the top and `op2` beneath it and compute `op2 OP op1` — the
//! direction the test suite freezes for SUB/DIV/MOD. `ADD`/`SUB` are
//! polymorphic: two vector operands combine component-wise.

use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{Family, OpcodeInfo, TableBuilder, Variant, REG, REG_IMM, REG_REG, STACK1, STACK2};
use crate::molecule;
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const ADD: u8 = 0;
    pub const SUB: u8 = 1;
    pub const MUL: u8 = 2;
    pub const DIV: u8 = 3;
    pub const MOD: u8 = 4;
    pub const MIN: u8 = 5;
    pub const MAX: u8 = 6;
    pub const NEG: u8 = 7;
    pub const ABS: u8 = 8;
    pub const INC: u8 = 9;
    pub const DEC: u8 = 10;
    pub const SGN: u8 = 11;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Arithmetic;
    for (r, i, s, opc) in [
        ("ADDR", "ADDI", "ADDS", op::ADD),
        ("SUBR", "SUBI", "SUBS", op::SUB),
        ("MULR", "MULI", "MULS", op::MUL),
        ("DIVR", "DIVI", "DIVS", op::DIV),
        ("MODR", "MODI", "MODS", op::MOD),
        ("MINR", "MINI", "MINS", op::MIN),
        ("MAXR", "MAXI", "MAXS", op::MAX),
    ] {
        b.add(r, f, opc, Variant::Rr, REG_REG, 0, dispatch);
        b.add(i, f, opc, Variant::Ri, REG_IMM, 0, dispatch);
        b.add(s, f, opc, Variant::S, STACK2, 0, dispatch);
    }
    for (r, s, opc) in [
        ("NEG", "NEGS", op::NEG),
        ("ABS", "ABSS", op::ABS),
        ("INC", "INCS", op::INC),
        ("DEC", "DECS", op::DEC),
        ("SGN", "SGNS", op::SGN),
    ] {
        b.add(r, f, opc, Variant::R, REG, 0, dispatch);
        b.add(s, f, opc, Variant::S, STACK1, 0, dispatch);
    }
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::ADD => binary(ctx, info, args, true, |a, b| Ok(a.wrapping_add(b))),
        op::SUB => binary(ctx, info, args, true, |a, b| Ok(a.wrapping_sub(b))),
        op::MUL => binary(ctx, info, args, false, |a, b| Ok(a.wrapping_mul(b))),
        op::DIV => binary(ctx, info, args, false, |a, b| {
            a.checked_div(b).ok_or(FailureReason::DivisionByZero)
        }),
        op::MOD => binary(ctx, info, args, false, |a, b| {
            a.checked_rem(b).ok_or(FailureReason::DivisionByZero)
        }),
        op::MIN => binary(ctx, info, args, false, |a, b| Ok(a.min(b))),
        op::MAX => binary(ctx, info, args, false, |a, b| Ok(a.max(b))),
        op::NEG => unary(ctx, args, |v| -v),
        op::ABS => unary(ctx, args, i64::abs),
        op::INC => unary(ctx, args, |v| v + 1),
        op::DEC => unary(ctx, args, |v| v - 1),
        op::SGN => unary(ctx, args, i64::signum),
        _ => Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
}

/// Shared binary scaffold: fetch, orient, compute, write back through the
/// first operand.
fn binary(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
    vectors: bool,
    f: fn(i64, i64) -> Result<i64, FailureReason>,
) -> Result<Outcome, FailureReason> {
    let first = ctx.fetch(&args[0])?;
    let second = ctx.fetch(&args[1])?;
    // Stack variants: first fetch popped op1 (top), second popped op2.
    let (lhs, rhs) = if info.variant == Variant::S {
        (second, first)
    } else {
        (first, second)
    };
    let result = match (&lhs, &rhs) {
        (RegisterValue::Scalar(a), RegisterValue::Scalar(b)) => {
            let r = f(
                i64::from(molecule::to_scalar(*a)),
                i64::from(molecule::to_scalar(*b)),
            )?;
            RegisterValue::Scalar(molecule::data_clamped(r))
        }
        (RegisterValue::Vector(a), RegisterValue::Vector(b))
            if vectors && a.len() == b.len() =>
        {
            let mut out = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b.iter()) {
                out.push(narrow(f(i64::from(*x), i64::from(*y))?));
            }
            RegisterValue::Vector(out)
        }
        _ => {
            return Err(FailureReason::TypeGuard {
                expected: "matching operand shapes",
            })
        }
    };
    ctx.store(&args[0], result)?;
    Ok(Outcome::ok())
}

fn unary(
    ctx: &mut ExecCtx<'_>,
    args: &[RawOperand],
    f: fn(i64) -> i64,
) -> Result<Outcome, FailureReason> {
    let v = i64::from(ctx.fetch_scalar(&args[0])?);
    ctx.store(&args[0], RegisterValue::Scalar(molecule::data_clamped(f(v))))?;
    Ok(Outcome::ok())
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(v: i64) -> i32 {
    v as i32
}
