// SPDX-License-Identifier: Apache-2.0
//! Point mutation: inserts a complete instruction chain into a child's genome.
//!
//! With probability `rate` per birth, one instruction (opcode plus its full
//! operand chain) is written into a naturally-empty window of the child's
//! scan line, inside the STRUCTURE-delimited interior. Owned cells are never
//! overwritten. The instruction is sampled from a weighted catalogue (uniform
//! over the whole table when the catalogue is empty); operand cells are
//! sampled per source kind.

use crate::error::SimError;
use crate::isa::OperandSource;
use crate::molecule::{self, MoleculeKind, VALUE_MASK};
use crate::organism::{Organism, DR_BASE, FPR_BASE, PR_BASE};
use crate::plugins::{owned_labels, scan_line_interior, vacant_windows, WorldCtx, WorldPlugin};

/// Relative odds of each register bank appearing in a sampled operand.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterBankWeights {
    /// Data registers.
    pub dr: f64,
    /// Procedure registers.
    pub pr: f64,
    /// Formal parameter registers.
    pub fpr: f64,
}

impl Default for RegisterBankWeights {
    fn default() -> Self {
        Self {
            dr: 1.0,
            pr: 0.0,
            fpr: 0.0,
        }
    }
}

/// One weighted catalogue entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatalogueWeight {
    /// Instruction mnemonic.
    pub name: String,
    /// Relative sampling weight.
    pub weight: f64,
}

/// Point-mutation configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointMutationConfig {
    /// Probability of inserting one instruction per birth.
    pub rate: f64,
    /// Inclusive range sampled for immediate DATA operands.
    pub data_range: (i32, i32),
    /// Bank odds for sampled register operands.
    pub register_weights: RegisterBankWeights,
    /// Weighted instruction catalogue; empty means uniform over the table.
    pub catalogue: Vec<CatalogueWeight>,
    /// Probability a labelref operand reuses an existing child label instead
    /// of a random hash.
    pub labelref_existing_bias: f64,
}

impl Default for PointMutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.01,
            data_range: (-64, 64),
            register_weights: RegisterBankWeights::default(),
            catalogue: Vec::new(),
            labelref_existing_bias: 0.75,
        }
    }
}

/// Post-birth point-mutation plugin. Stateless.
#[derive(Debug)]
pub struct PointMutationPlugin {
    config: PointMutationConfig,
    /// Catalogue resolved to `(opcode id, weight)`, built on first use.
    resolved: Option<Vec<(u16, f64)>>,
}

impl PointMutationPlugin {
    /// Creates the plugin from its configuration.
    pub fn new(config: PointMutationConfig) -> Self {
        Self {
            config,
            resolved: None,
        }
    }

    fn resolve_catalogue(&mut self, ctx: &WorldCtx<'_>) -> Result<&[(u16, f64)], SimError> {
        if self.resolved.is_none() {
            let mut resolved = Vec::with_capacity(self.config.catalogue.len());
            for entry in &self.config.catalogue {
                let id = ctx
                    .isa
                    .opcode_by_name(&entry.name)
                    .ok_or_else(|| SimError::UnknownInstructionName(entry.name.clone()))?;
                resolved.push((id, entry.weight.max(0.0)));
            }
            self.resolved = Some(resolved);
        }
        Ok(self.resolved.as_deref().unwrap_or(&[]))
    }

    fn sample_opcode(&mut self, ctx: &mut WorldCtx<'_>) -> Result<Option<u16>, SimError> {
        let catalogue = self.resolve_catalogue(ctx)?;
        if catalogue.is_empty() {
            let position = ctx.prng.pick_index(ctx.isa.len());
            return Ok(position
                .and_then(|p| ctx.isa.by_position(p))
                .map(|info| info.id));
        }
        let total: f64 = catalogue.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Ok(None);
        }
        let mut roll = ctx.prng.next_f64() * total;
        for &(id, weight) in catalogue {
            roll -= weight;
            if roll <= 0.0 {
                return Ok(Some(id));
            }
        }
        Ok(catalogue.last().map(|&(id, _)| id))
    }

    fn sample_operand_cells(
        &self,
        child: &Organism,
        ctx: &mut WorldCtx<'_>,
        sources: &[OperandSource],
    ) -> Vec<u32> {
        let arity = ctx.env.arity();
        let mut cells = Vec::new();
        for source in sources {
            match source {
                OperandSource::Stack => {}
                OperandSource::Register => {
                    cells.push(molecule::data(self.sample_register_id(ctx)));
                }
                OperandSource::Immediate => {
                    let (lo, hi) = self.config.data_range;
                    cells.push(molecule::data(ctx.prng.next_int(lo.min(hi), hi.max(lo))));
                }
                OperandSource::LocationRegister => {
                    let hi = i32::try_from(ctx.config.num_lr - 1).unwrap_or(0);
                    cells.push(molecule::data(ctx.prng.next_int(0, hi)));
                }
                OperandSource::Vector => {
                    // Sampled vectors are always unit: axis plus sign.
                    let axis = ctx.prng.pick_index(arity).unwrap_or(0);
                    let sign = if ctx.prng.chance(0.5) { 1 } else { -1 };
                    for component in 0..arity {
                        cells.push(molecule::data(if component == axis { sign } else { 0 }));
                    }
                }
                OperandSource::LabelRef => {
                    cells.push(self.sample_labelref(child, ctx));
                }
            }
        }
        cells
    }

    #[allow(clippy::cast_possible_wrap)]
    fn sample_labelref(&self, child: &Organism, ctx: &mut WorldCtx<'_>) -> u32 {
        let existing = owned_labels(ctx.env, child.id);
        let hash = if !existing.is_empty() && ctx.prng.chance(self.config.labelref_existing_bias) {
            let flat = existing[ctx.prng.pick_index(existing.len()).unwrap_or(0)];
            molecule::raw_value(ctx.env.molecule_flat(flat))
        } else {
            let max = VALUE_MASK as i32;
            molecule::raw_value(molecule::data(ctx.prng.next_int(0, max)))
        };
        molecule::pack(MoleculeKind::LabelRef, hash as i32, 0)
    }

    fn sample_register_id(&self, ctx: &mut WorldCtx<'_>) -> i32 {
        let w = self.config.register_weights;
        let banks = [
            (DR_BASE, ctx.config.num_dr, w.dr.max(0.0)),
            (PR_BASE, ctx.config.num_pr, w.pr.max(0.0)),
            (FPR_BASE, ctx.config.num_fpr, w.fpr.max(0.0)),
        ];
        let total: f64 = banks.iter().map(|(_, _, w)| w).sum();
        let mut roll = if total > 0.0 {
            ctx.prng.next_f64() * total
        } else {
            0.0
        };
        let mut chosen = banks[0];
        for bank in banks {
            if bank.2 > 0.0 {
                chosen = bank;
                roll -= bank.2;
                if roll <= 0.0 {
                    break;
                }
            }
        }
        let (base, size, _) = chosen;
        let hi = i32::try_from(size - 1).unwrap_or(0);
        i32::try_from(base).unwrap_or(0) + ctx.prng.next_int(0, hi)
    }
}

impl WorldPlugin for PointMutationPlugin {
    fn name(&self) -> &'static str {
        "point-mutation"
    }

    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        if !ctx.prng.chance(self.config.rate) {
            return Ok(());
        }
        let Some(opcode) = self.sample_opcode(ctx)? else {
            return Ok(());
        };
        let Some(info) = ctx.isa.lookup(u32::from(opcode)) else {
            return Ok(());
        };
        let operand_cells = self.sample_operand_cells(child, ctx, info.operands);
        let needed = 1 + operand_cells.len();

        let line = scan_line_interior(ctx.env, &child.ip, &child.dv, child.id);
        let windows = vacant_windows(ctx.env, &line, needed);
        let Some(&start) = windows.get(ctx.prng.pick_index(windows.len()).unwrap_or(0)) else {
            return Ok(());
        };

        let opcode_word = molecule::pack(MoleculeKind::Code, i32::from(opcode), 0);
        ctx.env.write_flat(line[start], opcode_word, child.id);
        for (i, &word) in operand_cells.iter().enumerate() {
            ctx.env.write_flat(line[start + 1 + i], word, child.id);
        }
        Ok(())
    }
}
