// SPDX-License-Identifier: Apache-2.0
//! Per-organism state: registers, stacks, pointers, and lifecycle.
//!
//! Register ids are bank-coded: data registers start at [`DR_BASE`], procedure
//! registers at [`PR_BASE`], formal parameter registers at [`FPR_BASE`], and
//! location registers at [`LR_BASE`]. Each bank occupies a [`BANK_STRIDE`]-wide
//! id window so a single scalar both names a register and identifies its bank.
//!
//! Ownership vocabulary: the organism exclusively owns these structures. Grid
//! cells tagged with `owner_id == self.id` are soft ownership — the grid owns
//! the bytes, the organism owns the right to overwrite without failure.

use bytes::{BufMut as _, BytesMut};

use crate::config::SimulationConfig;
use crate::coords;
use crate::error::{FailureReason, SimError};
use crate::molecule;
use crate::persist;
use vivarium_port::OrganismSnapshot;

/// Width of each register-bank id window.
pub const BANK_STRIDE: u32 = 100;
/// First data-register id.
pub const DR_BASE: u32 = 0;
/// First procedure-register id.
pub const PR_BASE: u32 = 100;
/// First formal-parameter-register id.
pub const FPR_BASE: u32 = 200;
/// First location-register id.
pub const LR_BASE: u32 = 300;

/// A register slot: either a packed molecule word or an integer vector whose
/// arity matches the grid. Stack elements use the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    /// A packed molecule word.
    Scalar(u32),
    /// An integer vector (arity = grid dimensionality).
    Vector(Vec<i32>),
}

impl RegisterValue {
    /// The molecule word, if this slot holds a scalar.
    pub fn as_scalar(&self) -> Option<u32> {
        match self {
            Self::Scalar(word) => Some(*word),
            Self::Vector(_) => None,
        }
    }

    /// The vector, if this slot holds one.
    pub fn as_vector(&self) -> Option<&[i32]> {
        match self {
            Self::Scalar(_) => None,
            Self::Vector(v) => Some(v),
        }
    }

    fn fresh() -> Self {
        Self::Scalar(molecule::data(0))
    }
}

/// One call-stack frame saved by `CALL` and consumed by `RET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    /// Instruction pointer to resume at.
    pub return_ip: Vec<i32>,
    /// Direction vector restored on return.
    pub saved_dv: Vec<i32>,
    /// Procedure-register bank restored on return.
    pub saved_prs: Vec<RegisterValue>,
    /// Formal-parameter bank restored on return (after write-back).
    pub saved_fprs: Vec<RegisterValue>,
    /// Active data-pointer index restored on return.
    pub saved_active_dp: usize,
    /// Caller register ids bound to formal-parameter slots, in slot order.
    pub bindings: Vec<u32>,
}

/// A single organism: the unit the scheduler advances once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    /// Unique positive id; matches the owner tag in the grid.
    pub id: u32,
    /// Parent organism, if forked.
    pub parent_id: Option<u32>,
    /// Tick the organism entered the simulation.
    pub birth_tick: u64,
    /// Instructions attempted since birth.
    pub age: u64,
    /// Cleared when energy runs out or death is decreed; reaped at tick end.
    pub alive: bool,
    /// Instruction pointer.
    pub ip: Vec<i32>,
    /// Direction vector (unit).
    pub dv: Vec<i32>,
    /// Data pointers; `active_dp` selects the current one.
    pub dps: Vec<Vec<i32>>,
    /// Index of the active data pointer.
    pub active_dp: usize,
    /// Data registers.
    pub drs: Vec<RegisterValue>,
    /// Procedure registers (saved automatically on CALL).
    pub prs: Vec<RegisterValue>,
    /// Formal parameter registers (pushed by caller, bound by callee).
    pub fprs: Vec<RegisterValue>,
    /// Location registers holding coordinate snapshots.
    pub lrs: Vec<Vec<i32>>,
    /// LIFO of molecule words or vectors.
    pub data_stack: Vec<RegisterValue>,
    /// LIFO of activation records.
    pub call_stack: Vec<ActivationRecord>,
    /// LIFO of coordinate snapshots.
    pub location_stack: Vec<Vec<i32>>,
    /// Energy register, clamped to `[0, max_energy]`.
    pub er: i64,
    /// Entropy register, clamped to `[0, max_entropy]`.
    pub sr: i64,
    /// 4-bit marker register tagged onto molecules written via POKE.
    pub mr: u8,
    /// Set when an instruction cannot complete; cleared at the next tick.
    pub failure: Option<FailureReason>,
}

impl Organism {
    /// Creates a newborn organism at `pos` facing `dv`.
    pub fn create(
        id: u32,
        parent_id: Option<u32>,
        pos: Vec<i32>,
        dv: Vec<i32>,
        energy: i64,
        birth_tick: u64,
        config: &SimulationConfig,
    ) -> Self {
        let arity = pos.len();
        let num_dps = config.num_dps as usize;
        Self {
            id,
            parent_id,
            birth_tick,
            age: 0,
            alive: true,
            dps: vec![pos.clone(); num_dps.max(1)],
            ip: pos,
            dv,
            active_dp: 0,
            drs: vec![RegisterValue::fresh(); config.num_dr as usize],
            prs: vec![RegisterValue::fresh(); config.num_pr as usize],
            fprs: vec![RegisterValue::fresh(); config.num_fpr as usize],
            lrs: vec![coords::zero(arity); config.num_lr as usize],
            data_stack: Vec::new(),
            call_stack: Vec::new(),
            location_stack: Vec::new(),
            er: energy,
            sr: 0,
            mr: 0,
            failure: None,
        }
    }

    /// Reads a bank-coded register (DR/PR/FPR).
    ///
    /// Location registers are not addressable here; they are reached only
    /// through the location-register instructions.
    ///
    /// # Errors
    ///
    /// [`FailureReason::RegisterRange`] for ids outside the configured banks.
    pub fn read_reg(&self, id: u32) -> Result<RegisterValue, FailureReason> {
        self.bank(id)?
            .get((id % BANK_STRIDE) as usize)
            .cloned()
            .ok_or(FailureReason::RegisterRange(id))
    }

    /// Writes a bank-coded register (DR/PR/FPR).
    ///
    /// # Errors
    ///
    /// [`FailureReason::RegisterRange`] for ids outside the configured banks.
    pub fn write_reg(&mut self, id: u32, value: RegisterValue) -> Result<(), FailureReason> {
        let slot = self
            .bank_mut(id)?
            .get_mut((id % BANK_STRIDE) as usize)
            .ok_or(FailureReason::RegisterRange(id))?;
        *slot = value;
        Ok(())
    }

    fn bank(&self, id: u32) -> Result<&[RegisterValue], FailureReason> {
        match id / BANK_STRIDE {
            0 => Ok(&self.drs),
            1 => Ok(&self.prs),
            2 => Ok(&self.fprs),
            _ => Err(FailureReason::RegisterRange(id)),
        }
    }

    fn bank_mut(&mut self, id: u32) -> Result<&mut Vec<RegisterValue>, FailureReason> {
        match id / BANK_STRIDE {
            0 => Ok(&mut self.drs),
            1 => Ok(&mut self.prs),
            2 => Ok(&mut self.fprs),
            _ => Err(FailureReason::RegisterRange(id)),
        }
    }

    /// The active data pointer.
    pub fn active_dp_coord(&self) -> &[i32] {
        &self.dps[self.active_dp]
    }

    /// Read-model snapshot for external observers.
    pub fn snapshot(&self) -> OrganismSnapshot {
        OrganismSnapshot {
            id: self.id,
            parent_id: self.parent_id,
            alive: self.alive,
            ip: self.ip.clone(),
            dv: self.dv.clone(),
            energy: self.er,
            entropy: self.sr,
            age: self.age,
            birth_tick: self.birth_tick,
        }
    }

    // ── Persistence ─────────────────────────────────────────────────────

    pub(crate) fn save_state(&self, out: &mut BytesMut) {
        out.put_u32_le(self.id);
        out.put_u32_le(self.parent_id.unwrap_or(0));
        out.put_u64_le(self.birth_tick);
        out.put_u64_le(self.age);
        out.put_u8(u8::from(self.alive));
        persist::put_coord(out, &self.ip);
        persist::put_coord(out, &self.dv);
        out.put_u32_le(u32::try_from(self.dps.len()).unwrap_or(0));
        for dp in &self.dps {
            persist::put_coord(out, dp);
        }
        out.put_u32_le(u32::try_from(self.active_dp).unwrap_or(0));
        put_bank(out, &self.drs);
        put_bank(out, &self.prs);
        put_bank(out, &self.fprs);
        out.put_u32_le(u32::try_from(self.lrs.len()).unwrap_or(0));
        for lr in &self.lrs {
            persist::put_coord(out, lr);
        }
        put_bank(out, &self.data_stack);
        out.put_u32_le(u32::try_from(self.call_stack.len()).unwrap_or(0));
        for frame in &self.call_stack {
            persist::put_coord(out, &frame.return_ip);
            persist::put_coord(out, &frame.saved_dv);
            put_bank(out, &frame.saved_prs);
            put_bank(out, &frame.saved_fprs);
            out.put_u32_le(u32::try_from(frame.saved_active_dp).unwrap_or(0));
            out.put_u32_le(u32::try_from(frame.bindings.len()).unwrap_or(0));
            for &binding in &frame.bindings {
                out.put_u32_le(binding);
            }
        }
        out.put_u32_le(u32::try_from(self.location_stack.len()).unwrap_or(0));
        for loc in &self.location_stack {
            persist::put_coord(out, loc);
        }
        out.put_i64_le(self.er);
        out.put_i64_le(self.sr);
        out.put_u8(self.mr);
    }

    pub(crate) fn load_state(buf: &mut &[u8], arity: usize) -> Result<Self, SimError> {
        let id = persist::get_u32(buf)?;
        let parent_raw = persist::get_u32(buf)?;
        let birth_tick = persist::get_u64(buf)?;
        let age = persist::get_u64(buf)?;
        let alive = persist::get_u8(buf)? != 0;
        let ip = persist::get_coord(buf, arity)?;
        let dv = persist::get_coord(buf, arity)?;
        let num_dps = persist::get_u32(buf)? as usize;
        let mut dps = Vec::with_capacity(num_dps);
        for _ in 0..num_dps {
            dps.push(persist::get_coord(buf, arity)?);
        }
        let active_dp = persist::get_u32(buf)? as usize;
        if active_dp >= num_dps {
            return Err(SimError::PersistCorrupt("active data pointer out of range"));
        }
        let drs = get_bank(buf, arity)?;
        let prs = get_bank(buf, arity)?;
        let fprs = get_bank(buf, arity)?;
        let num_lr = persist::get_u32(buf)? as usize;
        let mut lrs = Vec::with_capacity(num_lr);
        for _ in 0..num_lr {
            lrs.push(persist::get_coord(buf, arity)?);
        }
        let data_stack = get_bank(buf, arity)?;
        let frames = persist::get_u32(buf)? as usize;
        let mut call_stack = Vec::with_capacity(frames);
        for _ in 0..frames {
            let return_ip = persist::get_coord(buf, arity)?;
            let saved_dv = persist::get_coord(buf, arity)?;
            let saved_prs = get_bank(buf, arity)?;
            let saved_fprs = get_bank(buf, arity)?;
            let saved_active_dp = persist::get_u32(buf)? as usize;
            let num_bindings = persist::get_u32(buf)? as usize;
            let mut bindings = Vec::with_capacity(num_bindings);
            for _ in 0..num_bindings {
                bindings.push(persist::get_u32(buf)?);
            }
            call_stack.push(ActivationRecord {
                return_ip,
                saved_dv,
                saved_prs,
                saved_fprs,
                saved_active_dp,
                bindings,
            });
        }
        let num_locs = persist::get_u32(buf)? as usize;
        let mut location_stack = Vec::with_capacity(num_locs);
        for _ in 0..num_locs {
            location_stack.push(persist::get_coord(buf, arity)?);
        }
        let er = persist::get_i64(buf)?;
        let sr = persist::get_i64(buf)?;
        let mr = persist::get_u8(buf)?;
        Ok(Self {
            id,
            parent_id: (parent_raw != 0).then_some(parent_raw),
            birth_tick,
            age,
            alive,
            ip,
            dv,
            dps,
            active_dp,
            drs,
            prs,
            fprs,
            lrs,
            data_stack,
            call_stack,
            location_stack,
            er,
            sr,
            mr,
            failure: None,
        })
    }
}

fn put_bank(out: &mut BytesMut, bank: &[RegisterValue]) {
    out.put_u32_le(u32::try_from(bank.len()).unwrap_or(0));
    for value in bank {
        match value {
            RegisterValue::Scalar(word) => {
                out.put_u8(0);
                out.put_u32_le(*word);
            }
            RegisterValue::Vector(v) => {
                out.put_u8(1);
                persist::put_coord(out, v);
            }
        }
    }
}

fn get_bank(buf: &mut &[u8], arity: usize) -> Result<Vec<RegisterValue>, SimError> {
    let len = persist::get_u32(buf)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let tag = persist::get_u8(buf)?;
        match tag {
            0 => out.push(RegisterValue::Scalar(persist::get_u32(buf)?)),
            1 => out.push(RegisterValue::Vector(persist::get_coord(buf, arity)?)),
            _ => return Err(SimError::PersistCorrupt("unknown register value tag")),
        }
    }
    Ok(out)
}
