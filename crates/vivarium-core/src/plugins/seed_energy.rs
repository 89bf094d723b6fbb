// SPDX-License-Identifier: Apache-2.0
//! Seed energy: scatters ENERGY molecules across the empty grid at tick 0.
//!
//! Idempotent against the target density: re-running at the same tick tops
//! the population up to `percentage * total_cells` and never beyond, and
//! never overwrites a non-empty cell.

use crate::error::SimError;
use crate::molecule::{self, MoleculeKind};
use crate::plugins::{is_vacant, WorldCtx, WorldPlugin};

/// Seed-energy configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeedEnergyConfig {
    /// Target fraction of cells carrying an ENERGY molecule.
    pub percentage: f64,
    /// Nominal energy value per molecule.
    pub amount: i32,
    /// Relative variance: each value is `amount * (1 + U(-1,1) * variance)`.
    pub amount_variance: f64,
}

impl Default for SeedEnergyConfig {
    fn default() -> Self {
        Self {
            percentage: 0.05,
            amount: 100,
            amount_variance: 0.25,
        }
    }
}

/// Tick-0 energy seeding plugin. Stateless (idempotence is computed from the
/// grid, not remembered).
#[derive(Debug)]
pub struct SeedEnergyCreator {
    config: SeedEnergyConfig,
}

impl SeedEnergyCreator {
    /// Creates the plugin from its configuration.
    pub fn new(config: SeedEnergyConfig) -> Self {
        Self { config }
    }
}

impl WorldPlugin for SeedEnergyCreator {
    fn name(&self) -> &'static str {
        "seed-energy"
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_tick_start(&mut self, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        if ctx.tick != 0 {
            return Ok(());
        }
        let total = ctx.env.total_cells();
        let target = libm::round(self.config.percentage.clamp(0.0, 1.0) * total as f64) as usize;
        let existing = (0..total)
            .filter(|&flat| {
                molecule::kind_of(ctx.env.molecule_flat(flat)) == Some(MoleculeKind::Energy)
            })
            .count();
        if existing >= target {
            return Ok(());
        }
        let mut remaining = target - existing;

        for flat in 0..total {
            if remaining == 0 {
                break;
            }
            if !is_vacant(ctx.env, flat) {
                continue;
            }
            if !ctx.prng.chance(self.config.percentage) {
                continue;
            }
            let swing = ctx.prng.next_signed_unit() * self.config.amount_variance;
            let value = libm::round(f64::from(self.config.amount) * (1.0 + swing)) as i64;
            let word = molecule::energy(narrow(value.max(0)));
            ctx.env.write_flat(flat, word, 0);
            remaining -= 1;
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
