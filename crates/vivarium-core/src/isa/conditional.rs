// SPDX-License-Identifier: Apache-2.0
//! Conditional family.
//!
//! Every predicate either lets the next instruction execute (condition holds)
//! or advances the IP past it (skip). `IF*` execute on truth, `IN*` are the
//! negation. Comparisons orient like arithmetic: stack variants test
//! `op2 CMP op1`.
//!
//! Ownership predicates (`IFM*` mine / `IFF*` foreign / `IFV*` vacant) take a
//! unit-vector offset from the active data pointer.

use crate::coords;
use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{
    Family, OpcodeInfo, TableBuilder, Variant, REG, REG_IMM, REG_REG, STACK1, STACK2, VEC,
};
use crate::molecule;
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const IF: u8 = 0;
    pub const IN: u8 = 1;
    pub const IFT: u8 = 2;
    pub const LT: u8 = 3;
    pub const GT: u8 = 4;
    pub const LET: u8 = 5;
    pub const GET: u8 = 6;
    pub const IFM: u8 = 7;
    pub const IFF: u8 = 8;
    pub const IFV: u8 = 9;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Conditional;
    for (r, i, s, opc) in [
        ("IFR", "IFI", "IFS", op::IF),
        ("INR", "INI", "INS", op::IN),
        ("IFTR", "IFTI", "IFTS", op::IFT),
        ("LTR", "LTI", "LTS", op::LT),
        ("GTR", "GTI", "GTS", op::GT),
        ("LETR", "LETI", "LETS", op::LET),
        ("GETR", "GETI", "GETS", op::GET),
    ] {
        b.add(r, f, opc, Variant::Rr, REG_REG, 0, dispatch);
        b.add(i, f, opc, Variant::Ri, REG_IMM, 0, dispatch);
        b.add(s, f, opc, Variant::S, STACK2, 0, dispatch);
    }
    for (r, i, s, opc) in [
        ("IFMR", "IFMI", "IFMS", op::IFM),
        ("IFFR", "IFFI", "IFFS", op::IFF),
        ("IFVR", "IFVI", "IFVS", op::IFV),
    ] {
        b.add(r, f, opc, Variant::R, REG, 0, dispatch);
        b.add(i, f, opc, Variant::V, VEC, 0, dispatch);
        b.add(s, f, opc, Variant::S, STACK1, 0, dispatch);
    }
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    let holds = match info.op {
        op::IF => equal(ctx, info, args)?,
        op::IN => !equal(ctx, info, args)?,
        op::IFT => same_type(ctx, args)?,
        op::LT => compare(ctx, info, args, |a, b| a < b)?,
        op::GT => compare(ctx, info, args, |a, b| a > b)?,
        op::LET => compare(ctx, info, args, |a, b| a <= b)?,
        op::GET => compare(ctx, info, args, |a, b| a >= b)?,
        op::IFM | op::IFF | op::IFV => ownership(ctx, info, args)?,
        _ => return Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    };
    Ok(Outcome::skip(!holds))
}

/// Molecule equality ignores the marker field; vectors compare component-wise;
/// mixed shapes are never equal.
fn equal(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<bool, FailureReason> {
    let (lhs, rhs) = operands(ctx, info, args)?;
    Ok(match (&lhs, &rhs) {
        (RegisterValue::Scalar(a), RegisterValue::Scalar(b)) => {
            molecule::kind_of(*a) == molecule::kind_of(*b)
                && molecule::raw_value(*a) == molecule::raw_value(*b)
        }
        (RegisterValue::Vector(a), RegisterValue::Vector(b)) => a == b,
        _ => false,
    })
}

/// Type equality: scalar kinds compare by kind; two vectors always agree;
/// scalar vs vector never does.
fn same_type(ctx: &mut ExecCtx<'_>, args: &[RawOperand]) -> Result<bool, FailureReason> {
    let lhs = ctx.fetch(&args[0])?;
    let rhs = ctx.fetch(&args[1])?;
    Ok(match (&lhs, &rhs) {
        (RegisterValue::Scalar(a), RegisterValue::Scalar(b)) => {
            molecule::kind_of(*a) == molecule::kind_of(*b)
        }
        (RegisterValue::Vector(_), RegisterValue::Vector(_)) => true,
        _ => false,
    })
}

fn compare(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
    cmp: fn(i32, i32) -> bool,
) -> Result<bool, FailureReason> {
    let (lhs, rhs) = operands(ctx, info, args)?;
    let a = lhs
        .as_scalar()
        .ok_or(FailureReason::TypeGuard { expected: "scalar" })?;
    let b = rhs
        .as_scalar()
        .ok_or(FailureReason::TypeGuard { expected: "scalar" })?;
    Ok(cmp(molecule::to_scalar(a), molecule::to_scalar(b)))
}

fn ownership(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<bool, FailureReason> {
    let offset = ctx.fetch_vector(&args[0])?;
    if !coords::is_unit(&offset) {
        return Err(FailureReason::NotUnitVector);
    }
    let target = ctx.target_cell(&offset)?;
    let owner = ctx.env.owner_at(&target)?;
    Ok(match info.op {
        op::IFM => owner == ctx.org.id,
        op::IFF => owner != 0 && owner != ctx.org.id,
        _ => owner == 0,
    })
}

fn operands(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<(RegisterValue, RegisterValue), FailureReason> {
    let first = ctx.fetch(&args[0])?;
    let second = ctx.fetch(&args[1])?;
    Ok(if info.variant == Variant::S {
        (second, first)
    } else {
        (first, second)
    })
}
