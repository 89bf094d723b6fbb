// SPDX-License-Identifier: Apache-2.0
//! Stack family: data-stack and location-stack manipulation.
//!
//! `PUSHR`/`POPR` move register *references* across the stack: `PUSHR` pushes
//! a `REGISTER` molecule naming a register; `POPR` pops such a reference and
//! dereferences it into its target register. Plain `PUSH`/`POP` move values.

use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{Family, OpcodeInfo, TableBuilder, Variant, IMM, NO_OPERANDS, REG, VEC};
use crate::molecule::{self, MoleculeKind};
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const PUSH: u8 = 0;
    pub const POP: u8 = 1;
    pub const PUSHR: u8 = 2;
    pub const POPR: u8 = 3;
    pub const DUP: u8 = 4;
    pub const SWAP: u8 = 5;
    pub const DROP: u8 = 6;
    pub const ROT: u8 = 7;
    pub const PSHL: u8 = 8;
    pub const POPL: u8 = 9;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Stack;
    b.add("PUSH", f, op::PUSH, Variant::R, REG, 0, dispatch);
    b.add("PUSI", f, op::PUSH, Variant::I, IMM, 0, dispatch);
    b.add("PUSV", f, op::PUSH, Variant::V, VEC, 0, dispatch);
    b.add("POP", f, op::POP, Variant::R, REG, 0, dispatch);
    b.add("PUSHR", f, op::PUSHR, Variant::R, REG, 0, dispatch);
    b.add("POPR", f, op::POPR, Variant::R, REG, 0, dispatch);
    b.add("DUP", f, op::DUP, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("SWAP", f, op::SWAP, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("DROP", f, op::DROP, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("ROT", f, op::ROT, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("PSHL", f, op::PSHL, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("POPL", f, op::POPL, Variant::None, NO_OPERANDS, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::PUSH => {
            let value = ctx.fetch(&args[0])?;
            ctx.push_value(value)?;
        }
        op::POP => {
            let value = ctx.pop_value()?;
            ctx.store(&args[0], value)?;
        }
        op::PUSHR => {
            let RawOperand::Reg(id) = args[0] else {
                return Err(FailureReason::TypeGuard { expected: "register id" });
            };
            // Range-check the reference before publishing it.
            let _ = ctx.org.read_reg(id)?;
            let word = molecule::pack(MoleculeKind::Register, reg_scalar(id), 0);
            ctx.push_value(RegisterValue::Scalar(word))?;
        }
        op::POPR => {
            let word = ctx
                .pop_value()?
                .as_scalar()
                .ok_or(FailureReason::TypeGuard { expected: "REGISTER" })?;
            if molecule::kind_of(word) != Some(MoleculeKind::Register) {
                return Err(FailureReason::TypeGuard { expected: "REGISTER" });
            }
            let value = ctx.org.read_reg(molecule::raw_value(word))?;
            ctx.store(&args[0], value)?;
        }
        op::DUP => {
            let top = ctx
                .org
                .data_stack
                .last()
                .cloned()
                .ok_or(FailureReason::StackUnderflow)?;
            ctx.push_value(top)?;
        }
        op::SWAP => {
            let len = ctx.org.data_stack.len();
            if len < 2 {
                return Err(FailureReason::StackUnderflow);
            }
            ctx.org.data_stack.swap(len - 1, len - 2);
        }
        op::DROP => {
            let _ = ctx.pop_value()?;
        }
        op::ROT => {
            // ( x1 x2 x3 -- x2 x3 x1 )
            let len = ctx.org.data_stack.len();
            if len < 3 {
                return Err(FailureReason::StackUnderflow);
            }
            ctx.org.data_stack[len - 3..].rotate_left(1);
        }
        op::PSHL => {
            if ctx.org.location_stack.len() >= ctx.config.max_location_stack {
                return Err(FailureReason::StackOverflow);
            }
            let dp = ctx.org.active_dp_coord().to_vec();
            ctx.org.location_stack.push(dp);
        }
        op::POPL => {
            let coord = ctx
                .org
                .location_stack
                .pop()
                .ok_or(FailureReason::LocationStackUnderflow)?;
            let slot = ctx.org.active_dp;
            ctx.org.dps[slot] = coord;
        }
        _ => return Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
    Ok(Outcome::ok())
}

#[allow(clippy::cast_possible_wrap)]
fn reg_scalar(id: u32) -> i32 {
    id as i32
}
