// SPDX-License-Identifier: Apache-2.0
//! State family: DV and DP manipulation, marker register, energy/entropy
//! reads, and location registers.

use crate::coords;
use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{
    Family, OpcodeInfo, TableBuilder, Variant, IMM, LOC, NO_OPERANDS, REG, STACK1, VEC,
};
use crate::molecule::{self, MoleculeKind};
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const TURN: u8 = 0;
    pub const SYNC: u8 = 1;
    pub const NRG: u8 = 2;
    pub const NTR: u8 = 3;
    pub const POS: u8 = 4;
    pub const DIFF: u8 = 5;
    pub const SEEK: u8 = 6;
    pub const GDV: u8 = 7;
    pub const ADP: u8 = 8;
    pub const SMR: u8 = 9;
    pub const GMR: u8 = 10;
    pub const CMR: u8 = 11;
    pub const SLR: u8 = 12;
    pub const RLR: u8 = 13;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::State;
    b.add("TURN", f, op::TURN, Variant::R, REG, 0, dispatch);
    b.add("TRNI", f, op::TURN, Variant::V, VEC, 0, dispatch);
    b.add("TRNS", f, op::TURN, Variant::S, STACK1, 0, dispatch);
    b.add("SYNC", f, op::SYNC, Variant::None, NO_OPERANDS, 0, dispatch);
    b.add("NRG", f, op::NRG, Variant::R, REG, 0, dispatch);
    b.add("NRGS", f, op::NRG, Variant::S, STACK1, 0, dispatch);
    b.add("NTR", f, op::NTR, Variant::R, REG, 0, dispatch);
    b.add("NTRS", f, op::NTR, Variant::S, STACK1, 0, dispatch);
    b.add("POS", f, op::POS, Variant::R, REG, 0, dispatch);
    b.add("POSS", f, op::POS, Variant::S, STACK1, 0, dispatch);
    b.add("DIFF", f, op::DIFF, Variant::R, REG, 0, dispatch);
    b.add("DIFS", f, op::DIFF, Variant::S, STACK1, 0, dispatch);
    b.add("SEEK", f, op::SEEK, Variant::R, REG, 0, dispatch);
    b.add("SEKI", f, op::SEEK, Variant::V, VEC, 0, dispatch);
    b.add("SEKS", f, op::SEEK, Variant::S, STACK1, 0, dispatch);
    b.add("GDVR", f, op::GDV, Variant::R, REG, 0, dispatch);
    b.add("GDVS", f, op::GDV, Variant::S, STACK1, 0, dispatch);
    b.add("ADPR", f, op::ADP, Variant::R, REG, 0, dispatch);
    b.add("ADPI", f, op::ADP, Variant::I, IMM, 0, dispatch);
    b.add("ADPS", f, op::ADP, Variant::S, STACK1, 0, dispatch);
    b.add("SMR", f, op::SMR, Variant::R, REG, 0, dispatch);
    b.add("SMRI", f, op::SMR, Variant::I, IMM, 0, dispatch);
    b.add("SMRS", f, op::SMR, Variant::S, STACK1, 0, dispatch);
    b.add("GMR", f, op::GMR, Variant::R, REG, 0, dispatch);
    b.add("GMRS", f, op::GMR, Variant::S, STACK1, 0, dispatch);
    b.add("CMR", f, op::CMR, Variant::R, REG, 0, dispatch);
    b.add("CMRI", f, op::CMR, Variant::I, IMM, 0, dispatch);
    b.add("CMRS", f, op::CMR, Variant::S, STACK1, 0, dispatch);
    b.add("SLR", f, op::SLR, Variant::Lr, LOC, 0, dispatch);
    b.add("RLR", f, op::RLR, Variant::Lr, LOC, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::TURN => {
            let v = ctx.fetch_vector(&args[0])?;
            if !coords::is_unit(&v) {
                return Err(FailureReason::NotUnitVector);
            }
            ctx.org.dv = v;
        }
        op::SYNC => {
            let ip = ctx.org.ip.clone();
            let slot = ctx.org.active_dp;
            ctx.org.dps[slot] = ip;
        }
        op::NRG => {
            let word = molecule::data_clamped(ctx.org.er);
            ctx.store(&args[0], RegisterValue::Scalar(word))?;
        }
        op::NTR => {
            let word = molecule::data_clamped(ctx.org.sr);
            ctx.store(&args[0], RegisterValue::Scalar(word))?;
        }
        op::POS => {
            let ip = ctx.org.ip.clone();
            ctx.store(&args[0], RegisterValue::Vector(ip))?;
        }
        op::DIFF => {
            let diff = coords::sub(ctx.org.active_dp_coord(), &ctx.org.ip);
            ctx.store(&args[0], RegisterValue::Vector(diff))?;
        }
        op::SEEK => {
            let v = ctx.fetch_vector(&args[0])?;
            let moved = ctx
                .env
                .wrap(&coords::add(ctx.org.active_dp_coord(), &v))
                .ok_or(FailureReason::OutOfBounds)?;
            let slot = ctx.org.active_dp;
            ctx.org.dps[slot] = moved;
        }
        op::GDV => {
            let dv = ctx.org.dv.clone();
            ctx.store(&args[0], RegisterValue::Vector(dv))?;
        }
        op::ADP => {
            let idx = ctx.fetch_scalar(&args[0])?;
            let idx_u = u32::try_from(idx)
                .map_err(|_| FailureReason::DataPointerRange(u32::MAX))?;
            if idx_u as usize >= ctx.org.dps.len() {
                return Err(FailureReason::DataPointerRange(idx_u));
            }
            ctx.org.active_dp = idx_u as usize;
        }
        op::SMR => {
            let word = ctx.fetch_word(&args[0])?;
            if molecule::kind_of(word) != Some(MoleculeKind::Data) {
                return Err(FailureReason::TypeGuard { expected: "DATA" });
            }
            ctx.org.mr = low_nibble(molecule::raw_value(word));
        }
        op::GMR => {
            let word = molecule::data(i32::from(ctx.org.mr));
            ctx.store(&args[0], RegisterValue::Scalar(word))?;
        }
        op::CMR => {
            let word = ctx.fetch_word(&args[0])?;
            if molecule::kind_of(word) != Some(MoleculeKind::Data) {
                return Err(FailureReason::TypeGuard { expected: "DATA" });
            }
            let marker = low_nibble(molecule::raw_value(word));
            let _ = ctx.env.orphan_marked(ctx.org.id, marker);
        }
        op::SLR => {
            let RawOperand::Loc(idx) = args[0] else {
                return Err(FailureReason::TypeGuard { expected: "location register" });
            };
            let dp = ctx.org.active_dp_coord().to_vec();
            let slot = ctx
                .org
                .lrs
                .get_mut(idx as usize)
                .ok_or(FailureReason::LocationRange(idx))?;
            *slot = dp;
        }
        op::RLR => {
            let RawOperand::Loc(idx) = args[0] else {
                return Err(FailureReason::TypeGuard { expected: "location register" });
            };
            let coord = ctx
                .org
                .lrs
                .get(idx as usize)
                .cloned()
                .ok_or(FailureReason::LocationRange(idx))?;
            let slot = ctx.org.active_dp;
            ctx.org.dps[slot] = coord;
        }
        _ => return Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
    Ok(Outcome::ok())
}

#[allow(clippy::cast_possible_truncation)]
fn low_nibble(raw: u32) -> u8 {
    (raw & 0xF) as u8
}
