// SPDX-License-Identifier: Apache-2.0
//! World-generation plugins.
//!
//! Hooks that mutate the world outside the per-organism instruction loop:
//! post-birth genome mutators, death handlers, and tick-0 seeding. Plugins
//! run serialized, after the organism loop, in registration order. Each
//! plugin draws from its own derived PRNG sub-stream so adding or reordering
//! plugins never perturbs another plugin's randomness.
//!
//! Plugin errors are reported through the telemetry sink and never fail the
//! tick.

use bytes::Bytes;

use crate::config::SimulationConfig;
use crate::coords;
use crate::env::Environment;
use crate::error::SimError;
use crate::isa::IsaTable;
use crate::label_index::LabelIndex;
use crate::molecule::{self, MoleculeKind};
use crate::organism::Organism;
use crate::prng::Prng;

mod decay;
mod gene_deletion;
mod gene_duplication;
mod gene_substitution;
mod label_rewrite;
mod point_mutation;
mod seed_energy;

pub use decay::{DecayMode, DecayOnDeath, DecayOnDeathConfig};
pub use gene_deletion::{GeneDeletionConfig, GeneDeletionPlugin};
pub use gene_duplication::{GeneDuplicationConfig, GeneDuplicationPlugin};
pub use gene_substitution::{GeneSubstitutionConfig, GeneSubstitutionPlugin};
pub use label_rewrite::LabelRewritePlugin;
pub use point_mutation::{CatalogueWeight, PointMutationConfig, PointMutationPlugin, RegisterBankWeights};
pub use seed_energy::{SeedEnergyConfig, SeedEnergyCreator};

/// World state handed to plugin hooks.
///
/// `prng` is the plugin's private derived sub-stream, not the simulation's
/// root generator.
pub struct WorldCtx<'a> {
    /// The grid.
    pub env: &'a mut Environment,
    /// This plugin's derived random stream.
    pub prng: &'a mut Prng,
    /// Label index (rebuilds lazily after genome edits).
    pub labels: &'a mut LabelIndex,
    /// Instruction table, for opcode-aware mutations.
    pub isa: &'a IsaTable,
    /// Runtime configuration.
    pub config: &'a SimulationConfig,
    /// Tick being processed.
    pub tick: u64,
}

/// A post-birth / death / tick-start hook.
///
/// All hooks default to no-ops; implement only what the plugin consumes.
/// Stateless plugins (the common case) inherit the empty `save_state`
/// surface: empty bytes out, and `load_state` of empty bytes is a no-op.
pub trait WorldPlugin {
    /// Stable name; used for telemetry, checkpoint sections, and PRNG
    /// sub-stream derivation.
    fn name(&self) -> &'static str;

    /// Runs before the organism loop each tick.
    fn on_tick_start(&mut self, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs once for every organism born this tick, at tick end.
    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let _ = (child, ctx);
        Ok(())
    }

    /// Runs once for every organism that died this tick.
    fn on_death(&mut self, organism: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let _ = (organism, ctx);
        Ok(())
    }

    /// Serialized plugin state; empty for stateless plugins.
    fn save_state(&self) -> Bytes {
        Bytes::new()
    }

    /// Restores plugin state; loading empty bytes is a no-op.
    ///
    /// # Errors
    ///
    /// [`SimError::PersistCorrupt`] when a stateless plugin receives bytes.
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        if bytes.is_empty() {
            Ok(())
        } else {
            Err(SimError::PersistCorrupt("unexpected state for stateless plugin"))
        }
    }
}

// ── Shared genome-walking helpers ───────────────────────────────────────

/// Flat indices of every cell owned by `owner`, ascending.
pub(crate) fn owned_cells(env: &Environment, owner: u32) -> Vec<usize> {
    (0..env.total_cells())
        .filter(|&flat| env.owner_flat(flat) == owner)
        .collect()
}

/// Flat indices of `owner`'s `LABEL` cells, ascending.
pub(crate) fn owned_labels(env: &Environment, owner: u32) -> Vec<usize> {
    owned_cells(env, owner)
        .into_iter()
        .filter(|&flat| molecule::kind_of(env.molecule_flat(flat)) == Some(MoleculeKind::Label))
        .collect()
}

/// True when the cell is naturally empty: vacant molecule, no owner.
pub(crate) fn is_vacant(env: &Environment, flat: usize) -> bool {
    molecule::is_empty(env.molecule_flat(flat)) && env.owner_flat(flat) == 0
}

/// The interior of `owner`'s genome along the scan line through `start`,
/// in walk order along `dv`.
///
/// The interior is delimited by the owner's `STRUCTURE` boundary cells on the
/// DV axis (exclusive). Without boundaries the walk covers at most one full
/// axis extent, so negative DV components and toroidal wrap terminate.
pub(crate) fn scan_line_interior(
    env: &Environment,
    start: &[i32],
    dv: &[i32],
    owner: u32,
) -> Vec<usize> {
    let Some((axis, _)) = coords::unit_axis(dv) else {
        return Vec::new();
    };
    let extent = usize::try_from(env.shape()[axis]).unwrap_or(0);
    let neg_dv: Vec<i32> = dv.iter().map(|c| -c).collect();

    let boundary = |coord: &[i32]| -> bool {
        env.molecule_at(coord).is_ok_and(|word| {
            molecule::kind_of(word) == Some(MoleculeKind::Structure)
                && env.owner_at(coord) == Ok(owner)
        })
    };

    // Rewind to the cell just after the backward boundary (or as far as the
    // line allows).
    let mut first = start.to_vec();
    for _ in 0..extent.saturating_sub(1) {
        match env.step(&first, &neg_dv) {
            Some(prev) if !boundary(&prev) && prev != *start => first = prev,
            _ => break,
        }
    }

    // Collect forward until the boundary, the edge, or one full extent.
    let mut out = Vec::new();
    let mut cursor = first;
    for _ in 0..extent {
        if boundary(&cursor) {
            break;
        }
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

/// Start offsets (into `line`) of every all-vacant window of length `len`.
pub(crate) fn vacant_windows(env: &Environment, line: &[usize], len: usize) -> Vec<usize> {
    if len == 0 || line.len() < len {
        return Vec::new();
    }
    let mut out = Vec::new();
    for start in 0..=(line.len() - len) {
        if line[start..start + len].iter().all(|&flat| is_vacant(env, flat)) {
            out.push(start);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::molecule::{data, pack, EMPTY_WORD};

    #[test]
    fn interior_stops_at_structure_boundaries() {
        let mut env = Environment::new(&[20], true).unwrap();
        let wall = pack(MoleculeKind::Structure, 0, 0);
        env.write_flat(2, wall, 7);
        env.write_flat(10, wall, 7);
        env.write_flat(5, data(1), 7);

        let interior = scan_line_interior(&env, &[5], &[1], 7);
        assert_eq!(interior, vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn interior_handles_negative_dv() {
        let mut env = Environment::new(&[20], true).unwrap();
        let wall = pack(MoleculeKind::Structure, 0, 0);
        env.write_flat(2, wall, 7);
        env.write_flat(10, wall, 7);

        let interior = scan_line_interior(&env, &[5], &[-1], 7);
        assert_eq!(interior, vec![9, 8, 7, 6, 5, 4, 3]);
    }

    #[test]
    fn unbounded_line_covers_one_extent_on_a_torus() {
        let env = Environment::new(&[8], true).unwrap();
        let interior = scan_line_interior(&env, &[3], &[1], 1);
        assert_eq!(interior.len(), 8);
    }

    #[test]
    fn vacant_windows_skip_owned_and_filled_cells() {
        let mut env = Environment::new(&[10], true).unwrap();
        // Cell 4 holds a molecule; cell 7 is empty but owned.
        env.write_flat(4, data(1), 0);
        env.write_flat(7, EMPTY_WORD, 3);
        let line: Vec<usize> = (0..10).collect();

        assert_eq!(vacant_windows(&env, &line, 3), vec![0, 1]);
        assert_eq!(vacant_windows(&env, &line, 2), vec![0, 1, 2, 5, 8]);
    }
}
