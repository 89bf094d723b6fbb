// SPDX-License-Identifier: Apache-2.0
//! Decay on death: reclaims a dead organism's cells.
//!
//! Every cell owned by the dying organism becomes the configured replacement:
//! either the canonical empty molecule, or an ENERGY molecule whose value is
//! the organism's remaining energy (scaled, then split evenly across the
//! owned cells — the division remainder dissipates). Other organisms' cells
//! are never touched.

use crate::error::SimError;
use crate::molecule::{self, EMPTY_WORD};
use crate::organism::Organism;
use crate::plugins::{owned_cells, WorldCtx, WorldPlugin};

/// What a dead organism's cells turn into.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecayMode {
    /// Clear to the canonical empty molecule.
    Clear,
    /// Convert to ENERGY, distributing `remaining_er * fraction` evenly.
    Energy {
        /// Fraction of the remaining energy returned to the grid.
        fraction: f64,
    },
}

/// Decay-on-death configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecayOnDeathConfig {
    /// Replacement molecule policy.
    pub mode: DecayMode,
}

impl Default for DecayOnDeathConfig {
    fn default() -> Self {
        Self {
            mode: DecayMode::Energy { fraction: 1.0 },
        }
    }
}

/// Death handler converting an organism's remains. Stateless.
#[derive(Debug)]
pub struct DecayOnDeath {
    config: DecayOnDeathConfig,
}

impl DecayOnDeath {
    /// Creates the plugin from its configuration.
    pub fn new(config: DecayOnDeathConfig) -> Self {
        Self { config }
    }
}

impl WorldPlugin for DecayOnDeath {
    fn name(&self) -> &'static str {
        "decay-on-death"
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn on_death(&mut self, organism: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let cells = owned_cells(ctx.env, organism.id);
        if cells.is_empty() {
            return Ok(());
        }
        let replacement = match self.config.mode {
            DecayMode::Clear => EMPTY_WORD,
            DecayMode::Energy { fraction } => {
                let pool = f64::from(narrow(organism.er.max(0))) * fraction.clamp(0.0, 1.0);
                let per_cell = (pool as i64) / cells.len() as i64;
                molecule::energy(narrow(per_cell))
            }
        };
        for flat in cells {
            ctx.env.write_flat(flat, replacement, 0);
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
