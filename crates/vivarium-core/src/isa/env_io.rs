// SPDX-License-Identifier: Apache-2.0
//! Environment I/O family: grid reads and writes relative to the active DP.
//!
//! - `PEEK` consumes: the cell is cleared (and its ownership with it).
//! - `SCAN` is the non-destructive read.
//! - `POKE` attaches the organism's marker register, claims ownership of the
//!   target, and dissipates entropy by the written molecule's scalar value.
//! - `PPK` is the composite atomic cell↔register swap (a PEEK and a POKE in
//!   one step; it declares two touched cells to the cost policy).
//!
//! Stack variants pop the value first (top), then the offset.

use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{
    Family, OpcodeInfo, TableBuilder, Variant, REG_REG, REG_VEC, STACK1, STACK2,
};
use crate::molecule::{self, EMPTY_WORD};
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const PEEK: u8 = 0;
    pub const POKE: u8 = 1;
    pub const SCAN: u8 = 2;
    pub const PPK: u8 = 3;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Environment;
    b.add("PEEK", f, op::PEEK, Variant::Rr, REG_REG, 1, dispatch);
    b.add("PEKI", f, op::PEEK, Variant::V, REG_VEC, 1, dispatch);
    b.add("PEKS", f, op::PEEK, Variant::S, STACK1, 1, dispatch);
    b.add("POKE", f, op::POKE, Variant::Rr, REG_REG, 1, dispatch);
    b.add("POKI", f, op::POKE, Variant::V, REG_VEC, 1, dispatch);
    b.add("POKS", f, op::POKE, Variant::S, STACK2, 1, dispatch);
    b.add("SCAN", f, op::SCAN, Variant::Rr, REG_REG, 1, dispatch);
    b.add("SCNI", f, op::SCAN, Variant::V, REG_VEC, 1, dispatch);
    b.add("SCNS", f, op::SCAN, Variant::S, STACK1, 1, dispatch);
    b.add("PPKR", f, op::PPK, Variant::Rr, REG_REG, 2, dispatch);
    b.add("PPKI", f, op::PPK, Variant::V, REG_VEC, 2, dispatch);
    b.add("PPKS", f, op::PPK, Variant::S, STACK2, 2, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::PEEK | op::SCAN => read_cell(ctx, info, args),
        op::POKE => poke(ctx, args),
        op::PPK => swap_cell(ctx, args),
        _ => Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
}

/// PEEK/SCAN share the read path; PEEK additionally clears the cell.
fn read_cell(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    // Single-operand stack form: the popped offset doubles as the result slot.
    let (dst, offset_arg) = if args.len() == 1 {
        (&args[0], &args[0])
    } else {
        (&args[0], &args[1])
    };
    let offset = ctx.fetch_vector(offset_arg)?;
    let target = ctx.target_cell(&offset)?;
    let word = ctx.env.molecule_at(&target)?;
    if info.op == op::PEEK {
        ctx.env.set_molecule(EMPTY_WORD, &target)?;
    }
    ctx.store(dst, RegisterValue::Scalar(word))?;
    Ok(Outcome::ok())
}

fn poke(ctx: &mut ExecCtx<'_>, args: &[RawOperand]) -> Result<Outcome, FailureReason> {
    let word = ctx.fetch_word(&args[0])?;
    let offset = ctx.fetch_vector(&args[1])?;
    let target = ctx.target_cell(&offset)?;
    let tagged = molecule::with_marker(word, ctx.org.mr);
    ctx.env
        .set_molecule_with_owner(tagged, ctx.org.id, &target)?;
    // Dissipation: entropy drops by the written molecule's scalar value.
    Ok(Outcome::dissipate(-i64::from(molecule::to_scalar(word))))
}

fn swap_cell(ctx: &mut ExecCtx<'_>, args: &[RawOperand]) -> Result<Outcome, FailureReason> {
    let word = ctx.fetch_word(&args[0])?;
    let offset = ctx.fetch_vector(&args[1])?;
    let target = ctx.target_cell(&offset)?;
    let old = ctx.env.molecule_at(&target)?;
    let tagged = molecule::with_marker(word, ctx.org.mr);
    ctx.env
        .set_molecule_with_owner(tagged, ctx.org.id, &target)?;
    ctx.store(&args[0], RegisterValue::Scalar(old))?;
    Ok(Outcome::dissipate(-i64::from(molecule::to_scalar(word))))
}
