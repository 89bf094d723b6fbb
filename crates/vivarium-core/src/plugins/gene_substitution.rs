// SPDX-License-Identifier: Apache-2.0
//! Gene substitution: mutates a single cell of the child's genome, in a
//! type-specific way.
//!
//! Cell selection is a single-pass weighted reservoir over the child's
//! non-empty cells, weighted by molecule type. A weight of zero disables a
//! type entirely; ENERGY and STRUCTURE are never mutated.
//!
//! Type-specific mutations:
//! - CODE: flip one of the opcode's three components; a variant flip stays
//!   within the same arity group.
//! - REGISTER: ±1 clamped at the register's bank boundaries.
//! - DATA: `value ± max(1, round(|value|^exponent))`, raw field clamped to
//!   `[0, VALUE_MASK]`.
//! - LABEL / LABELREF: flip exactly one bit of the 19-bit hash.

use crate::error::SimError;
use crate::isa::IsaTable;
use crate::molecule::{self, MoleculeKind, VALUE_BITS, VALUE_MASK};
use crate::organism::{Organism, BANK_STRIDE, DR_BASE, FPR_BASE, LR_BASE, PR_BASE};
use crate::plugins::{WorldCtx, WorldPlugin};
use crate::prng::Prng;

/// Gene-substitution configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneSubstitutionConfig {
    /// Selection weight for CODE cells.
    pub code_weight: f64,
    /// Selection weight for DATA cells.
    pub data_weight: f64,
    /// Selection weight for REGISTER cells.
    pub register_weight: f64,
    /// Selection weight for LABEL cells.
    pub label_weight: f64,
    /// Selection weight for LABELREF cells.
    pub labelref_weight: f64,
    /// Relative odds of mutating the operation component of a CODE cell.
    pub op_flip: f64,
    /// Relative odds of mutating the family component of a CODE cell.
    pub family_flip: f64,
    /// Relative odds of mutating the variant component of a CODE cell.
    pub variant_flip: f64,
    /// Exponent shaping the DATA perturbation magnitude.
    pub exponent: f64,
}

impl Default for GeneSubstitutionConfig {
    fn default() -> Self {
        Self {
            code_weight: 1.0,
            data_weight: 1.0,
            register_weight: 1.0,
            label_weight: 1.0,
            labelref_weight: 1.0,
            op_flip: 0.5,
            family_flip: 0.2,
            variant_flip: 0.3,
            exponent: 0.5,
        }
    }
}

/// Post-birth gene-substitution plugin. Stateless.
#[derive(Debug)]
pub struct GeneSubstitutionPlugin {
    config: GeneSubstitutionConfig,
}

impl GeneSubstitutionPlugin {
    /// Creates the plugin from its configuration.
    pub fn new(config: GeneSubstitutionConfig) -> Self {
        Self { config }
    }

    fn weight_for(&self, kind: MoleculeKind) -> f64 {
        let w = match kind {
            MoleculeKind::Code => self.config.code_weight,
            MoleculeKind::Data => self.config.data_weight,
            MoleculeKind::Register => self.config.register_weight,
            MoleculeKind::Label => self.config.label_weight,
            MoleculeKind::LabelRef => self.config.labelref_weight,
            MoleculeKind::Energy | MoleculeKind::Structure | MoleculeKind::Empty => 0.0,
        };
        w.max(0.0)
    }

    fn mutate_code(word: u32, config: &GeneSubstitutionConfig, isa: &IsaTable, arity: usize, prng: &mut Prng) -> u32 {
        let raw = molecule::raw_value(word);
        let Ok(opcode) = u16::try_from(raw) else {
            return word;
        };
        let Some((family, op, variant)) = IsaTable::decompose(opcode) else {
            return word;
        };
        let Some(info) = isa.lookup(u32::from(opcode)) else {
            return word;
        };

        let total = config.op_flip.max(0.0) + config.family_flip.max(0.0) + config.variant_flip.max(0.0);
        if total <= 0.0 {
            return word;
        }
        let roll = prng.next_f64() * total;

        let new_id = if roll < config.op_flip.max(0.0) {
            // Operation flip: same family, same variant.
            let candidates: Vec<u16> = isa
                .ops_in_family(family)
                .into_iter()
                .filter(|&candidate| candidate != op && isa.exists(family, candidate, variant))
                .map(|candidate| crate::isa::opcode_id(family, candidate, variant))
                .collect();
            pick(&candidates, prng)
        } else if roll < config.op_flip.max(0.0) + config.family_flip.max(0.0) {
            // Family flip: same operation and variant.
            let candidates: Vec<u16> = crate::isa::Family::ALL
                .into_iter()
                .filter(|&candidate| candidate != family && isa.exists(candidate, op, variant))
                .map(|candidate| crate::isa::opcode_id(candidate, op, variant))
                .collect();
            pick(&candidates, prng)
        } else {
            // Variant flip: stays within the arity group.
            let cells = info.operand_cells(arity);
            let candidates: Vec<u16> = isa
                .sibling_variants(family, op, cells, arity)
                .into_iter()
                .filter(|&id| id != opcode)
                .collect();
            pick(&candidates, prng)
        };

        match new_id {
            Some(id) => molecule::pack(
                MoleculeKind::Code,
                i32::from(id),
                molecule::marker_of(word),
            ),
            None => word,
        }
    }

    fn mutate_register(word: u32, config: &crate::config::SimulationConfig, prng: &mut Prng) -> u32 {
        let raw = molecule::raw_value(word);
        let bank_base = (raw / BANK_STRIDE) * BANK_STRIDE;
        let size = match bank_base {
            DR_BASE => config.num_dr,
            PR_BASE => config.num_pr,
            FPR_BASE => config.num_fpr,
            LR_BASE => config.num_lr,
            _ => return word,
        };
        let lo = bank_base;
        let hi = bank_base + size - 1;
        let next = if prng.chance(0.5) {
            raw.saturating_add(1)
        } else {
            raw.saturating_sub(1)
        };
        let clamped = next.clamp(lo, hi);
        rebuild(word, MoleculeKind::Register, clamped)
    }

    fn mutate_data(word: u32, exponent: f64, prng: &mut Prng) -> u32 {
        let scalar = molecule::to_scalar(word);
        let magnitude = libm::pow(f64::from(scalar.abs()), exponent);
        let delta = to_delta(libm::round(magnitude)).max(1);
        let raw = i64::from(molecule::raw_value(word));
        let next = if prng.chance(0.5) {
            raw + delta
        } else {
            raw - delta
        };
        let clamped = next.clamp(0, i64::from(VALUE_MASK));
        rebuild(word, MoleculeKind::Data, narrow_u32(clamped))
    }

    fn mutate_hash(word: u32, kind: MoleculeKind, prng: &mut Prng) -> u32 {
        let bit = prng.next_int(0, i32::try_from(VALUE_BITS - 1).unwrap_or(18));
        let flipped = molecule::raw_value(word) ^ (1 << bit);
        rebuild(word, kind, flipped)
    }
}

impl WorldPlugin for GeneSubstitutionPlugin {
    fn name(&self) -> &'static str {
        "gene-substitution"
    }

    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        // Single-pass weighted reservoir (k = 1): each candidate replaces the
        // current pick with probability weight / running_total.
        let mut total = 0.0f64;
        let mut selected: Option<(usize, MoleculeKind)> = None;
        for flat in 0..ctx.env.total_cells() {
            if ctx.env.owner_flat(flat) != child.id {
                continue;
            }
            let word = ctx.env.molecule_flat(flat);
            if molecule::is_empty(word) {
                continue;
            }
            let Some(kind) = molecule::kind_of(word) else {
                continue;
            };
            let weight = self.weight_for(kind);
            if weight <= 0.0 {
                continue;
            }
            total += weight;
            if ctx.prng.next_f64() < weight / total {
                selected = Some((flat, kind));
            }
        }
        let Some((flat, kind)) = selected else {
            return Ok(());
        };

        let word = ctx.env.molecule_flat(flat);
        let owner = ctx.env.owner_flat(flat);
        let mutated = match kind {
            MoleculeKind::Code => {
                Self::mutate_code(word, &self.config, ctx.isa, ctx.env.arity(), ctx.prng)
            }
            MoleculeKind::Register => Self::mutate_register(word, ctx.config, ctx.prng),
            MoleculeKind::Data => Self::mutate_data(word, self.config.exponent, ctx.prng),
            MoleculeKind::Label | MoleculeKind::LabelRef => Self::mutate_hash(word, kind, ctx.prng),
            MoleculeKind::Energy | MoleculeKind::Structure | MoleculeKind::Empty => word,
        };
        if mutated != word {
            ctx.env.write_flat(flat, mutated, owner);
        }
        Ok(())
    }
}

fn pick(candidates: &[u16], prng: &mut Prng) -> Option<u16> {
    prng.pick_index(candidates.len()).map(|i| candidates[i])
}

/// Rebuilds a word with the same marker but a new raw value.
#[allow(clippy::cast_possible_wrap)]
fn rebuild(word: u32, kind: MoleculeKind, raw: u32) -> u32 {
    molecule::pack(kind, raw as i32, molecule::marker_of(word))
}

#[allow(clippy::cast_possible_truncation)]
fn to_delta(rounded: f64) -> i64 {
    rounded as i64
}

#[allow(clippy::cast_possible_truncation)]
fn narrow_u32(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(0)
}
