// SPDX-License-Identifier: Apache-2.0
//! Special family: reproduction.
//!
//! `FORK delta energy child_dv` debits the endowment from the parent, spawns
//! a child at `IP + delta` facing `child_dv`, and re-owns every parental cell
//! whose marker matches the parent's MR to the child (markers reset to 0).
//! The child joins the scheduler — and becomes eligible for post-birth
//! plugins — at the end of the tick. Stack variants pop delta, then energy,
//! then the child DV.

use crate::coords;
use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{Family, OpcodeInfo, TableBuilder, Variant, REG_REG_REG, STACK3, VEC_IMM_VEC};
use crate::organism::Organism;

pub(crate) mod op {
    pub const FORK: u8 = 0;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Special;
    b.add("FORK", f, op::FORK, Variant::R, REG_REG_REG, 0, dispatch);
    b.add("FRKI", f, op::FORK, Variant::V, VEC_IMM_VEC, 0, dispatch);
    b.add("FRKS", f, op::FORK, Variant::S, STACK3, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    if info.op != op::FORK {
        return Err(FailureReason::UnknownOpcode(u32::from(info.id)));
    }
    let delta = ctx.fetch_vector(&args[0])?;
    let endowment = i64::from(ctx.fetch_scalar(&args[1])?);
    let child_dv = ctx.fetch_vector(&args[2])?;

    if endowment <= 0 {
        return Err(FailureReason::TypeGuard {
            expected: "positive energy endowment",
        });
    }
    if !coords::is_unit(&child_dv) {
        return Err(FailureReason::NotUnitVector);
    }
    let pos = ctx
        .env
        .wrap(&coords::add(&ctx.org.ip, &delta))
        .ok_or(FailureReason::OutOfBounds)?;
    if ctx.org.er < endowment {
        return Err(FailureReason::InsufficientEnergy {
            needed: endowment,
            available: ctx.org.er,
        });
    }

    ctx.org.er -= endowment;
    let id = *ctx.next_id;
    *ctx.next_id += 1;
    let child = Organism::create(
        id,
        Some(ctx.org.id),
        pos,
        child_dv,
        endowment,
        ctx.tick,
        ctx.config,
    );
    // Marker-tagged inheritance: matching cells move to the child, markers reset.
    let _ = ctx.env.transfer_ownership(ctx.org.id, id, ctx.org.mr);
    ctx.births.push(child);
    Ok(Outcome::ok())
}
