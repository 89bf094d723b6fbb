// SPDX-License-Identifier: Apache-2.0
//! Vector family: products and component access.
//!
//! `CRS` is the 2-D scalar cross product `x1*y2 - y1*x2` and is
//! anti-commutative, so stack variants orient as `op2 × op1` like the other
//! non-commutative ops. Stack variants of `VGT`/`VST` expect the vector on
//! top.

use crate::error::FailureReason;
use crate::exec::{ExecCtx, Outcome, RawOperand};
use crate::isa::{
    Family, OpcodeInfo, TableBuilder, Variant, REG_IMM, REG_IMM_IMM, REG_REG, REG_REG_REG,
    REG_VEC, STACK2, STACK3,
};
use crate::molecule;
use crate::organism::RegisterValue;

pub(crate) mod op {
    pub const DOT: u8 = 0;
    pub const CRS: u8 = 1;
    pub const VGT: u8 = 2;
    pub const VST: u8 = 3;
}

pub(crate) fn register(b: &mut TableBuilder) {
    let f = Family::Vector;
    b.add("DOTR", f, op::DOT, Variant::Rr, REG_REG, 0, dispatch);
    b.add("DOTV", f, op::DOT, Variant::V, REG_VEC, 0, dispatch);
    b.add("DOTS", f, op::DOT, Variant::S, STACK2, 0, dispatch);
    b.add("CRSR", f, op::CRS, Variant::Rr, REG_REG, 0, dispatch);
    b.add("CRSV", f, op::CRS, Variant::V, REG_VEC, 0, dispatch);
    b.add("CRSS", f, op::CRS, Variant::S, STACK2, 0, dispatch);
    b.add("VGTR", f, op::VGT, Variant::Rr, REG_REG, 0, dispatch);
    b.add("VGTI", f, op::VGT, Variant::Ri, REG_IMM, 0, dispatch);
    b.add("VGTS", f, op::VGT, Variant::S, STACK2, 0, dispatch);
    b.add("VSTR", f, op::VST, Variant::Rr, REG_REG_REG, 0, dispatch);
    b.add("VSTI", f, op::VST, Variant::Ri, REG_IMM_IMM, 0, dispatch);
    b.add("VSTS", f, op::VST, Variant::S, STACK3, 0, dispatch);
}

fn dispatch(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<Outcome, FailureReason> {
    match info.op {
        op::DOT => {
            let (a, b) = vector_pair(ctx, info, args)?;
            if a.len() != b.len() {
                return Err(FailureReason::TypeGuard {
                    expected: "vectors of equal arity",
                });
            }
            let dot: i64 = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| i64::from(*x) * i64::from(*y))
                .sum();
            ctx.store(&args[0], RegisterValue::Scalar(molecule::data_clamped(dot)))?;
        }
        op::CRS => {
            let (a, b) = vector_pair(ctx, info, args)?;
            if a.len() != 2 || b.len() != 2 {
                return Err(FailureReason::TypeGuard {
                    expected: "2-dimensional vectors",
                });
            }
            let cross = i64::from(a[0]) * i64::from(b[1]) - i64::from(a[1]) * i64::from(b[0]);
            ctx.store(&args[0], RegisterValue::Scalar(molecule::data_clamped(cross)))?;
        }
        op::VGT => {
            let v = ctx.fetch_vector(&args[0])?;
            let idx = ctx.fetch_scalar(&args[1])?;
            let component = usize::try_from(idx)
                .ok()
                .and_then(|i| v.get(i).copied())
                .ok_or(FailureReason::VectorRange(idx))?;
            ctx.store(&args[0], RegisterValue::Scalar(molecule::data(component)))?;
        }
        op::VST => {
            let mut v = ctx.fetch_vector(&args[0])?;
            let idx = ctx.fetch_scalar(&args[1])?;
            let value = ctx.fetch_scalar(&args[2])?;
            let slot = usize::try_from(idx)
                .ok()
                .and_then(|i| v.get_mut(i))
                .ok_or(FailureReason::VectorRange(idx))?;
            *slot = value;
            ctx.store(&args[0], RegisterValue::Vector(v))?;
        }
        _ => return Err(FailureReason::UnknownOpcode(u32::from(info.id))),
    }
    Ok(Outcome::ok())
}

fn vector_pair(
    ctx: &mut ExecCtx<'_>,
    info: &OpcodeInfo,
    args: &[RawOperand],
) -> Result<(Vec<i32>, Vec<i32>), FailureReason> {
    let first = ctx.fetch_vector(&args[0])?;
    let second = ctx.fetch_vector(&args[1])?;
    Ok(if info.variant == Variant::S {
        (second, first)
    } else {
        (first, second)
    })
}
