// SPDX-License-Identifier: Apache-2.0
//! Gene duplication: copies a labeled code block onto another scan line.
//!
//! Picks one of the child's labels and copies the block from the label up to
//! (but not including) the next label or STRUCTURE cell into a vacant window
//! on a different scan line. Copied cells inherit child ownership.

use crate::coords;
use crate::error::SimError;
use crate::molecule::{self, MoleculeKind};
use crate::organism::Organism;
use crate::plugins::{owned_labels, vacant_windows, WorldCtx, WorldPlugin};

/// Gene-duplication configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneDuplicationConfig {
    /// Smallest vacant window considered a valid destination, even for
    /// shorter blocks.
    pub min_nop_size: usize,
}

impl Default for GeneDuplicationConfig {
    fn default() -> Self {
        Self { min_nop_size: 4 }
    }
}

/// Post-birth gene-duplication plugin. Stateless.
#[derive(Debug)]
pub struct GeneDuplicationPlugin {
    config: GeneDuplicationConfig,
}

impl GeneDuplicationPlugin {
    /// Creates the plugin from its configuration.
    pub fn new(config: GeneDuplicationConfig) -> Self {
        Self { config }
    }

    /// Collects the block starting at the label: stops before the next label,
    /// a STRUCTURE cell, any cell not owned by the child, or a full extent.
    fn collect_block(
        env: &crate::env::Environment,
        child: &Organism,
        label_flat: usize,
    ) -> Vec<u32> {
        let Some((axis, _)) = coords::unit_axis(&child.dv) else {
            return Vec::new();
        };
        let extent = usize::try_from(env.shape()[axis]).unwrap_or(0);
        let mut block = Vec::new();
        let mut cursor = env.flat_to_coord(label_flat);
        for step in 0..extent {
            let Some(flat) = env.coord_to_flat(&cursor) else {
                break;
            };
            if env.owner_flat(flat) != child.id {
                break;
            }
            let word = env.molecule_flat(flat);
            let kind = molecule::kind_of(word);
            if step > 0
                && (kind == Some(MoleculeKind::Label) || kind == Some(MoleculeKind::Structure))
            {
                break;
            }
            block.push(word);
            match env.step(&cursor, &child.dv) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        block
    }
}

impl WorldPlugin for GeneDuplicationPlugin {
    fn name(&self) -> &'static str {
        "gene-duplication"
    }

    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let labels = owned_labels(ctx.env, child.id);
        let Some(pick) = ctx.prng.pick_index(labels.len()) else {
            return Ok(());
        };
        let label_flat = labels[pick];
        let block = Self::collect_block(ctx.env, child, label_flat);
        if block.is_empty() {
            return Ok(());
        }
        let needed = block.len().max(self.config.min_nop_size);

        let Some((axis, _)) = coords::unit_axis(&child.dv) else {
            return Ok(());
        };
        let source_line = perpendicular(ctx.env.flat_to_coord(label_flat), axis);

        // A bounded number of random probes; dense grids simply miss.
        for _ in 0..16 {
            let Some(anchor_flat) = ctx.prng.pick_index(ctx.env.total_cells()) else {
                return Ok(());
            };
            let anchor = ctx.env.flat_to_coord(anchor_flat);
            if perpendicular(anchor.clone(), axis) == source_line {
                continue;
            }
            let line = line_from(ctx.env, &anchor, &child.dv);
            let windows = vacant_windows(ctx.env, &line, needed);
            let Some(pick) = ctx.prng.pick_index(windows.len()) else {
                continue;
            };
            let start = windows[pick];
            for (i, &word) in block.iter().enumerate() {
                ctx.env.write_flat(line[start + i], word, child.id);
            }
            return Ok(());
        }
        Ok(())
    }
}

/// Coordinate with the DV-axis component zeroed: identifies the scan line.
fn perpendicular(mut coord: Vec<i32>, axis: usize) -> Vec<i32> {
    if let Some(c) = coord.get_mut(axis) {
        *c = 0;
    }
    coord
}

/// One full extent of cells along `dv` starting at `anchor`.
fn line_from(env: &crate::env::Environment, anchor: &[i32], dv: &[i32]) -> Vec<usize> {
    let Some((axis, _)) = coords::unit_axis(dv) else {
        return Vec::new();
    };
    let extent = usize::try_from(env.shape()[axis]).unwrap_or(0);
    let mut out = Vec::with_capacity(extent);
    let mut cursor = anchor.to_vec();
    for _ in 0..extent {
        match env.coord_to_flat(&cursor) {
            Some(flat) => out.push(flat),
            None => break,
        }
        match env.step(&cursor, dv) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    out
}
