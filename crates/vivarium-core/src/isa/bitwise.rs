// SPDX-License-Identifier: Apache-2.0
//! Bitwise family: logical operations on the raw 19-bit value field.
//!
//! Shift amounts are masked to 0..=31; results are masked back to the value
//! field. Stack variants follow the arithmetic direction: `op2 OP op1`.

use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{Family, OpcodeInfo, TableBuilder, Variant, REG, REG_IMM, REG_REG, STACK1, STACK2};
use crate::molecule::{self, MoleculeKind, VALUE_MASK};
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const AND: u8 = 0;
    pub const OR: u8 = 1;
    pub const XOR: u8 = 2;
    pub const NOT: u8 = 3;
    pub const SHL: u8 = 4;
    pub const SHR: u8 = 5;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Bitwise;
    for (r, i, s, opc) in [
        ("ANDR", "ANDI", "ANDS", op::AND),
        ("ORR", "ORI", "ORS", op::OR),
        ("XORR", "XORI", "XORS", op::XOR),
        ("SHLR", "SHLI", "SHLS", op::SHL),
        ("SHRR", "SHRI", "SHRS", op::SHR),
    ] {
        b.add(r, f, opc, Variant::Rr, REG_REG, 0, dispatch);
        b.add(i, f, opc, Variant::Ri, REG_IMM, 0, dispatch);
        b.add(s, f, opc, Variant::S, STACK2, 0, dispatch);
    }
    b.add("NOT", f, op::NOT, Variant::R, REG, 0, dispatch);
    b.add("NOTS", f, op::NOT, Variant::S, STACK1, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    if info.op == op::NOT {
        let raw = molecule::raw_value(ctx.fetch_word(&args[0])?);
        return store_raw(ctx, &args[0], !raw & VALUE_MASK);
    }

    let first = molecule::raw_value(ctx.fetch_word(&args[0])?);
    let second = molecule::raw_value(ctx.fetch_word(&args[1])?);
    let (lhs, rhs) = if info.variant == Variant::S {
        (second, first)
    } else {
        (first, second)
    };
    let result = match info.op {
        op::AND => lhs & rhs,
        op::OR => lhs | rhs,
        op::XOR => lhs ^ rhs,
        op::SHL => (lhs << (rhs & 31)) & VALUE_MASK,
        op::SHR => (lhs & VALUE_MASK) >> (rhs & 31),
        _ => return Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    };
    store_raw(ctx, &args[0], result & VALUE_MASK)
}

#[allow(clippy::cast_possible_wrap)]
fn store_raw(
    ctx: &mut ExecCtx<'_>,
    target: &RawOperand,
    raw: u32,
) -> Result<Outcome, FailureReason> {
    let word = molecule::pack(MoleculeKind::Data, raw as i32, 0);
    ctx.store(target, RegisterValue::Scalar(word))?;
    Ok(Outcome::ok())
}
