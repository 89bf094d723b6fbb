// SPDX-License-Identifier: Apache-2.0
//! Execution engine: one instruction for one organism.
//!
//! Per-tick order of operations, fixed and never reordered:
//! fetch → decode → energy check → dispatch → accounting → IP advance.
//!
//! The engine borrows everything it needs explicitly — organism, grid, label
//! index, table, policy — and stores no back-pointers. Handlers communicate
//! through [`Outcome`] values; there is no control-flow-by-exception.
//!
//! Failure discipline: an instruction that cannot complete sets the failure
//! flag and reason, debits the error penalty, and the IP still advances past
//! the full instruction. Empty cells execute as NOP so organisms can traverse
//! the vacant interior of their genome.

use crate::config::SimulationConfig;
use crate::env::Environment;
use crate::error::FailureReason;
use crate::isa::{IsaTable, OpcodeInfo, OperandSource};
use crate::label_index::LabelIndex;
use crate::molecule::{self, MoleculeKind};
use crate::organism::{Organism, RegisterValue};
use crate::thermo::ThermoPolicy;

/// A decoded operand, before any values are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawOperand {
    /// Bank-coded register id read from a data cell.
    Reg(u32),
    /// Scalar immediate read from a data cell.
    Imm(i32),
    /// Vector immediate assembled from `arity` data cells.
    Vec(Vec<i32>),
    /// 19-bit label hash read from a labelref cell.
    Label(u32),
    /// Location-register index read from a data cell.
    Loc(u32),
    /// Deferred: the value is popped from the data stack at execution time.
    Stack,
}

/// What a handler tells the engine after dispatch.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    /// Control transfer: replaces the default advance past the instruction.
    pub ip_override: Option<Vec<i32>>,
    /// Conditional result: advance past the *next* instruction as well.
    pub skip_next: bool,
    /// Extra entropy delta (dissipation), applied on top of the base cost.
    pub sr_delta: i64,
}

impl Outcome {
    pub(crate) fn ok() -> Self {
        Self::default()
    }

    pub(crate) fn jump(ip: Vec<i32>) -> Self {
        Self {
            ip_override: Some(ip),
            ..Self::default()
        }
    }

    pub(crate) fn skip(skip_next: bool) -> Self {
        Self {
            skip_next,
            ..Self::default()
        }
    }

    pub(crate) fn dissipate(sr_delta: i64) -> Self {
        Self {
            sr_delta,
            ..Self::default()
        }
    }
}

/// Handler function registered per opcode.
pub(crate) type Handler =
    fn(&mut ExecCtx<'_>, &OpcodeInfo, &[RawOperand]) -> Result<Outcome, FailureReason>;

/// Explicit borrows handed to every handler. No back-pointers anywhere.
pub(crate) struct ExecCtx<'a> {
    pub org: &'a mut Organism,
    pub env: &'a mut Environment,
    pub labels: &'a mut LabelIndex,
    pub config: &'a SimulationConfig,
    /// Executing organism first, then its ancestors in order.
    pub lineage: &'a [u32],
    /// Children spawned this tick; the scheduler admits them at tick end.
    pub births: &'a mut Vec<Organism>,
    pub next_id: &'a mut u32,
    pub tick: u64,
    /// IP one past the current instruction (the CALL return address).
    pub next_ip: Vec<i32>,
}

impl ExecCtx<'_> {
    /// Pops the data stack.
    pub(crate) fn pop_value(&mut self) -> Result<RegisterValue, FailureReason> {
        self.org.data_stack.pop().ok_or(FailureReason::StackUnderflow)
    }

    /// Pushes onto the data stack, honoring the configured depth limit.
    pub(crate) fn push_value(&mut self, value: RegisterValue) -> Result<(), FailureReason> {
        if self.org.data_stack.len() >= self.config.max_data_stack {
            return Err(FailureReason::StackOverflow);
        }
        self.org.data_stack.push(value);
        Ok(())
    }

    /// Materializes an operand into a register value.
    pub(crate) fn fetch(&mut self, arg: &RawOperand) -> Result<RegisterValue, FailureReason> {
        match arg {
            RawOperand::Reg(id) => self.org.read_reg(*id),
            RawOperand::Imm(v) => Ok(RegisterValue::Scalar(molecule::data(*v))),
            RawOperand::Vec(v) => Ok(RegisterValue::Vector(v.clone())),
            RawOperand::Label(hash) => Ok(RegisterValue::Scalar(molecule::pack(
                MoleculeKind::LabelRef,
                cast_hash(*hash),
                0,
            ))),
            RawOperand::Loc(idx) => {
                let lr = self
                    .org
                    .lrs
                    .get(*idx as usize)
                    .ok_or(FailureReason::LocationRange(*idx))?;
                Ok(RegisterValue::Vector(lr.clone()))
            }
            RawOperand::Stack => self.pop_value(),
        }
    }

    /// Fetches an operand that must be a scalar molecule word.
    pub(crate) fn fetch_word(&mut self, arg: &RawOperand) -> Result<u32, FailureReason> {
        self.fetch(arg)?
            .as_scalar()
            .ok_or(FailureReason::TypeGuard { expected: "scalar" })
    }

    /// Fetches an operand as a signed scalar.
    pub(crate) fn fetch_scalar(&mut self, arg: &RawOperand) -> Result<i32, FailureReason> {
        Ok(molecule::to_scalar(self.fetch_word(arg)?))
    }

    /// Fetches an operand that must be a vector of grid arity.
    pub(crate) fn fetch_vector(&mut self, arg: &RawOperand) -> Result<Vec<i32>, FailureReason> {
        let value = self.fetch(arg)?;
        let v = value
            .as_vector()
            .ok_or(FailureReason::TypeGuard { expected: "vector" })?;
        if v.len() != self.env.arity() {
            return Err(FailureReason::TypeGuard {
                expected: "vector of grid arity",
            });
        }
        Ok(v.to_vec())
    }

    /// Writes a result back through the first operand: register or stack.
    pub(crate) fn store(
        &mut self,
        arg: &RawOperand,
        value: RegisterValue,
    ) -> Result<(), FailureReason> {
        match arg {
            RawOperand::Reg(id) => self.org.write_reg(*id, value),
            RawOperand::Stack => self.push_value(value),
            _ => Err(FailureReason::TypeGuard {
                expected: "writable operand",
            }),
        }
    }

    /// Resolves the cell `offset` away from the active data pointer.
    pub(crate) fn target_cell(&self, offset: &[i32]) -> Result<Vec<i32>, FailureReason> {
        let dp = self.org.active_dp_coord();
        self.env
            .wrap(&crate::coords::add(dp, offset))
            .ok_or(FailureReason::OutOfBounds)
    }

    /// Resolves a label hash through the organism's lineage.
    pub(crate) fn resolve_label(&mut self, hash: u32) -> Result<Vec<i32>, FailureReason> {
        let from = self
            .env
            .coord_to_flat(&self.org.ip)
            .ok_or(FailureReason::OutOfBounds)?;
        let flat = self
            .labels
            .find_target(self.env, self.lineage, hash, from)
            .ok_or(FailureReason::LabelNotFound(hash))?;
        Ok(self.env.flat_to_coord(flat))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn cast_hash(hash: u32) -> i32 {
    hash as i32
}

/// What the scheduler needs to know about one organism step.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StepOutput {
    pub executed: bool,
    pub failed: bool,
}

/// Advances `from` up to `cells` steps along `dv`, stopping at a bounded edge.
fn advance(env: &Environment, from: &[i32], dv: &[i32], cells: usize) -> Vec<i32> {
    let mut cursor = from.to_vec();
    for _ in 0..cells {
        match env.step(&cursor, dv) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    cursor
}

/// Cells occupied by the instruction at `ip` (opcode plus declared operands).
///
/// Empty, non-code, and unknown cells occupy a single cell; conditionals use
/// this to skip exactly one whole instruction.
fn instruction_span(env: &Environment, table: &IsaTable, ip: &[i32]) -> usize {
    let Ok(word) = env.molecule_at(ip) else {
        return 1;
    };
    if molecule::is_empty(word) || molecule::kind_of(word) != Some(MoleculeKind::Code) {
        return 1;
    }
    table
        .lookup(molecule::raw_value(word))
        .map_or(1, |info| 1 + info.operand_cells(env.arity()))
}

struct Decoded {
    args: Vec<RawOperand>,
    /// Cells consumed by opcode + operands.
    span: usize,
}

/// Reads the declared operand cells along DV.
fn decode_operands(
    env: &Environment,
    info: &OpcodeInfo,
    ip: &[i32],
    dv: &[i32],
) -> Result<Decoded, FailureReason> {
    let arity = env.arity();
    let mut cursor = ip.to_vec();
    let mut consumed = 1usize;
    let mut args = Vec::with_capacity(info.operands.len());

    let mut next_cell = |cursor: &mut Vec<i32>| -> Result<u32, FailureReason> {
        *cursor = env.step(cursor, dv).ok_or(FailureReason::OutOfBounds)?;
        consumed += 1;
        env.molecule_at(cursor)
    };

    for source in info.operands {
        match source {
            OperandSource::Stack => args.push(RawOperand::Stack),
            OperandSource::Register => {
                let word = next_cell(&mut cursor)?;
                let id = data_scalar(word)?;
                let id = u32::try_from(id).map_err(|_| FailureReason::TypeGuard {
                    expected: "non-negative register id",
                })?;
                args.push(RawOperand::Reg(id));
            }
            OperandSource::Immediate => {
                let word = next_cell(&mut cursor)?;
                args.push(RawOperand::Imm(data_scalar(word)?));
            }
            OperandSource::LocationRegister => {
                let word = next_cell(&mut cursor)?;
                let idx = data_scalar(word)?;
                let idx = u32::try_from(idx).map_err(|_| FailureReason::TypeGuard {
                    expected: "non-negative location register index",
                })?;
                args.push(RawOperand::Loc(idx));
            }
            OperandSource::Vector => {
                let mut components = Vec::with_capacity(arity);
                for _ in 0..arity {
                    let word = next_cell(&mut cursor)?;
                    components.push(data_scalar(word)?);
                }
                args.push(RawOperand::Vec(components));
            }
            OperandSource::LabelRef => {
                let word = next_cell(&mut cursor)?;
                if molecule::kind_of(word) != Some(MoleculeKind::LabelRef) {
                    return Err(FailureReason::TypeGuard { expected: "LABELREF" });
                }
                args.push(RawOperand::Label(molecule::raw_value(word)));
            }
        }
    }
    Ok(Decoded { args, span: consumed })
}

fn data_scalar(word: u32) -> Result<i32, FailureReason> {
    if molecule::kind_of(word) != Some(MoleculeKind::Data) {
        return Err(FailureReason::TypeGuard { expected: "DATA" });
    }
    Ok(molecule::to_scalar(word))
}

/// Executes one instruction for one organism.
///
/// The caller guarantees `org.alive` and `org.er > 0` on entry. On exit the
/// organism's failure flag, registers, IP, age, and energy/entropy are
/// updated; a drained energy register marks the organism dead for end-of-tick
/// reaping.
#[allow(clippy::too_many_arguments)]
pub(crate) fn step_organism(
    org: &mut Organism,
    env: &mut Environment,
    labels: &mut LabelIndex,
    table: &IsaTable,
    thermo: &ThermoPolicy,
    config: &SimulationConfig,
    lineage: &[u32],
    births: &mut Vec<Organism>,
    next_id: &mut u32,
    tick: u64,
) -> StepOutput {
    org.failure = None;

    // Fetch.
    let word = env.molecule_at(&org.ip).unwrap_or(molecule::EMPTY_WORD);
    let info: &OpcodeInfo = if molecule::is_empty(word) {
        // Vacant genome interior executes as NOP.
        table.nop_info()
    } else if molecule::kind_of(word) != Some(MoleculeKind::Code) {
        return fail(org, env, config, thermo, FailureReason::NotCode, 1);
    } else {
        let opcode = molecule::raw_value(word);
        match table.lookup(opcode) {
            Some(info) => info,
            None => return fail(org, env, config, thermo, FailureReason::UnknownOpcode(opcode), 1),
        }
    };

    // Decode.
    let decoded = match decode_operands(env, info, &org.ip, &org.dv) {
        Ok(decoded) => decoded,
        Err(reason) => {
            let span = 1 + info.operand_cells(env.arity());
            return fail(org, env, config, thermo, reason, span);
        }
    };

    // Declared cost, resolved through the policy table alone.
    let cost = thermo.cost_of(info);
    let declared = cost.energy + i64::from(info.touched_cells) * thermo.cell_surcharge();
    if org.er < declared {
        let available = org.er;
        org.failure = Some(FailureReason::InsufficientEnergy {
            needed: declared,
            available,
        });
        // Debited what remained; dies at end of step.
        org.er = 0;
        org.alive = false;
        org.ip = advance(env, &org.ip, &org.dv, decoded.span);
        org.age += 1;
        return StepOutput {
            executed: false,
            failed: true,
        };
    }

    let next_ip = advance(env, &org.ip, &org.dv, decoded.span);
    let mut ctx = ExecCtx {
        org: &mut *org,
        env: &mut *env,
        labels: &mut *labels,
        config,
        lineage,
        births: &mut *births,
        next_id: &mut *next_id,
        tick,
        next_ip: next_ip.clone(),
    };

    // Dispatch.
    match (info.handler)(&mut ctx, info, &decoded.args) {
        Ok(outcome) => {
            org.er = (org.er - declared).clamp(0, config.max_energy);
            org.sr = (org.sr + cost.entropy + outcome.sr_delta).clamp(0, config.max_entropy);
            org.ip = outcome.ip_override.unwrap_or(next_ip);
            if outcome.skip_next {
                let span = instruction_span(env, table, &org.ip);
                org.ip = advance(env, &org.ip, &org.dv, span);
            }
            org.age += 1;
            if org.er <= 0 {
                org.alive = false;
            }
            StepOutput {
                executed: true,
                failed: false,
            }
        }
        Err(reason) => fail(org, env, config, thermo, reason, decoded.span),
    }
}

/// Shared failure path: flag, penalty, advance, age.
fn fail(
    org: &mut Organism,
    env: &Environment,
    config: &SimulationConfig,
    thermo: &ThermoPolicy,
    reason: FailureReason,
    span: usize,
) -> StepOutput {
    org.failure = Some(reason);
    org.er = (org.er - thermo.error_penalty()).clamp(0, config.max_energy);
    org.ip = advance(env, &org.ip, &org.dv, span);
    org.age += 1;
    if org.er <= 0 {
        org.alive = false;
    }
    StepOutput {
        executed: false,
        failed: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn advance_stops_at_bounded_edge() {
        let env = Environment::new(&[5, 5], false).unwrap();
        let ip = advance(&env, &[4, 0], &[1, 0], 3);
        assert_eq!(ip, vec![4, 0]);
    }

    #[test]
    fn advance_wraps_on_torus() {
        let env = Environment::new(&[5, 5], true).unwrap();
        let ip = advance(&env, &[4, 0], &[1, 0], 3);
        assert_eq!(ip, vec![2, 0]);
    }
}
