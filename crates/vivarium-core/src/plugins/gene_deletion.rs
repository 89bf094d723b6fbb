// SPDX-License-Identifier: Apache-2.0
//! Gene deletion: removes a labeled block from the child's genome.
//!
//! Label selection is weighted toward duplicated hashes (`count^exponent`),
//! so redundant genes are the likeliest to disappear. Deletion clears both
//! molecule and ownership from the label up to the next label or STRUCTURE
//! cell, and stops untouched at the first cell the child does not own.

use rustc_hash::FxHashMap;

use crate::coords;
use crate::error::SimError;
use crate::molecule::{self, EMPTY_WORD, MoleculeKind};
use crate::organism::Organism;
use crate::plugins::{owned_labels, WorldCtx, WorldPlugin};

/// Gene-deletion configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneDeletionConfig {
    /// Exponent applied to duplicate-hash counts when weighting selection.
    pub exponent: f64,
}

impl Default for GeneDeletionConfig {
    fn default() -> Self {
        Self { exponent: 2.0 }
    }
}

/// Post-birth gene-deletion plugin. Stateless.
#[derive(Debug)]
pub struct GeneDeletionPlugin {
    config: GeneDeletionConfig,
}

impl GeneDeletionPlugin {
    /// Creates the plugin from its configuration.
    pub fn new(config: GeneDeletionConfig) -> Self {
        Self { config }
    }
}

impl WorldPlugin for GeneDeletionPlugin {
    fn name(&self) -> &'static str {
        "gene-deletion"
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let labels = owned_labels(ctx.env, child.id);
        if labels.is_empty() {
            return Ok(());
        }

        // Group by hash; weight = count^exponent.
        let mut by_hash: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for &flat in &labels {
            let hash = molecule::raw_value(ctx.env.molecule_flat(flat));
            by_hash.entry(hash).or_default().push(flat);
        }
        let mut hashes: Vec<(u32, Vec<usize>)> = by_hash.into_iter().collect();
        hashes.sort_unstable_by_key(|(hash, _)| *hash);
        let weights: Vec<f64> = hashes
            .iter()
            .map(|(_, flats)| libm::pow(flats.len() as f64, self.config.exponent))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Ok(());
        }
        let mut roll = ctx.prng.next_f64() * total;
        let mut chosen = hashes.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            roll -= w;
            if roll <= 0.0 {
                chosen = i;
                break;
            }
        }
        let flats = &hashes[chosen].1;
        let start_flat = flats[ctx.prng.pick_index(flats.len()).unwrap_or(0)];

        // Delete from the label along DV.
        let Some((axis, _)) = coords::unit_axis(&child.dv) else {
            return Ok(());
        };
        let extent = usize::try_from(ctx.env.shape()[axis]).unwrap_or(0);
        let mut cursor = ctx.env.flat_to_coord(start_flat);
        for step in 0..extent {
            let Some(flat) = ctx.env.coord_to_flat(&cursor) else {
                break;
            };
            // A foreign (or vacant) cell ends the block and stays untouched.
            if ctx.env.owner_flat(flat) != child.id {
                break;
            }
            let kind = molecule::kind_of(ctx.env.molecule_flat(flat));
            if step > 0
                && (kind == Some(MoleculeKind::Label) || kind == Some(MoleculeKind::Structure))
            {
                break;
            }
            ctx.env.write_flat(flat, EMPTY_WORD, 0);
            match ctx.env.step(&cursor, &child.dv) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        Ok(())
    }
}
