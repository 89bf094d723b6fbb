// SPDX-License-Identifier: Apache-2.0
//! Control family: jumps, procedure calls, and scheduling.
//!
//! Call convention: before `CALL`, the caller pushes `REGISTER` molecules
//! naming the actual registers to bind, innermost (FPR0) last. `CALL` pops
//! those references (at most the FPR bank size), snapshots PRs/FPRs/DV/the
//! active-DP index into an activation record, and copies the referenced
//! registers into the formal-parameter bank. `RET` writes the formal values
//! back through the recorded bindings (by-reference out-params), restores the
//! snapshot, and resumes past the call site.
//!
//! A popped jump target may be a vector (IP-relative) or a scalar label hash
//! resolved through the lineage's label index.

use crate::coords;
use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{Family, OpcodeInfo, TableBuilder, Variant, LABEL, NO_OPERANDS, REG, STACK1};
use crate::molecule::{self, MoleculeKind};
use crate::organism::{ActivationRecord, RegisterValue};

pub(crate) mod op {
    pub const JMP: u8 = 0;
    pub const CALL: u8 = 1;
    pub const RET: u8 = 2;
    pub const BRK: u8 = 3;
    pub const NOP: u8 = 4;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Control;
    b.add("JMPI", f, op::JMP, Variant::I, LABEL, 0, dispatch);
    b.add("JMPR", f, op::JMP, Variant::R, REG, 0, dispatch);
    b.add("JMPS", f, op::JMP, Variant::S, STACK1, 0, dispatch);
    b.add("CALL", f, op::CALL, Variant::I, LABEL, 0, dispatch);
    b.add("CALS", f, op::CALL, Variant::S, STACK1, 0, dispatch);
    b.add("RET", f, op::RET, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("BRK", f, op::BRK, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("NOP", f, op::NOP, Variant::None, NO_OPERANDS, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::JMP => Ok(Outcome::jump(jump_target(ctx, &args[0])?)),
        op::CALL => call(ctx, &args[0]),
        op::RET => ret(ctx),
        // One instruction per tick makes "end the tick early" a scheduling
        // no-op; BRK is kept as a debugger anchor.
        op::BRK | op::NOP => Ok(Outcome::ok()),
        _ => Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
}

/// Resolves a jump operand: label hash, register vector, or popped value.
fn jump_target(ctx: &mut ExecCtx<'_>, arg: &RawOperand) -> Result<Vec<i32>, FailureReason> {
    match arg {
        RawOperand::Label(hash) => ctx.resolve_label(*hash),
        _ => match ctx.fetch(arg)? {
            RegisterValue::Vector(delta) => ctx
                .env
                .wrap(&coords::add(&ctx.org.ip, &delta))
                .ok_or(FailureReason::OutOfBounds),
            RegisterValue::Scalar(word) => ctx.resolve_label(molecule::raw_value(word)),
        },
    }
}

fn call(ctx: &mut ExecCtx<'_>, target_arg: &RawOperand) -> Result<Outcome, FailureReason> {
    if ctx.org.call_stack.len() >= ctx.config.max_call_stack {
        return Err(FailureReason::StackOverflow);
    }
    let target = jump_target(ctx, target_arg)?;

    // Collect pending REGISTER references from the stack top without popping,
    // validating each before any state changes.
    let num_fpr = ctx.org.fprs.len();
    let mut bindings = Vec::new();
    for value in ctx.org.data_stack.iter().rev() {
        if bindings.len() == num_fpr {
            break;
        }
        match value {
            RegisterValue::Scalar(word)
                if molecule::kind_of(*word) == Some(MoleculeKind::Register) =>
            {
                bindings.push(molecule::raw_value(*word));
            }
            _ => break,
        }
    }
    let mut actuals = Vec::with_capacity(bindings.len());
    for &rid in &bindings {
        actuals.push(ctx.org.read_reg(rid)?);
    }

    // Commit: pop the references, snapshot, bind.
    let keep = ctx.org.data_stack.len() - bindings.len();
    ctx.org.data_stack.truncate(keep);
    let record = ActivationRecord {
        return_ip: ctx.next_ip.clone(),
        saved_dv: ctx.org.dv.clone(),
        saved_prs: ctx.org.prs.clone(),
        saved_fprs: ctx.org.fprs.clone(),
        saved_active_dp: ctx.org.active_dp,
        bindings: bindings.clone(),
    };
    for (slot, actual) in actuals.into_iter().enumerate() {
        ctx.org.fprs[slot] = actual;
    }
    ctx.org.call_stack.push(record);
    Ok(Outcome::jump(target))
}

fn ret(ctx: &mut ExecCtx<'_>) -> Result<Outcome, FailureReason> {
    let frame = ctx
        .org
        .call_stack
        .pop()
        .ok_or(FailureReason::CallStackUnderflow)?;
    // Out-params: formal values flow back through the recorded bindings.
    for (slot, &rid) in frame.bindings.iter().enumerate() {
        let value = ctx.org.fprs[slot].clone();
        ctx.org.write_reg(rid, value)?;
    }
    ctx.org.prs = frame.saved_prs;
    ctx.org.fprs = frame.saved_fprs;
    ctx.org.dv = frame.saved_dv;
    ctx.org.active_dp = frame.saved_active_dp;
    Ok(Outcome::jump(frame.return_ip))
}
