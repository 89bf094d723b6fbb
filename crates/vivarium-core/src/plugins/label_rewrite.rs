// SPDX-License-Identifier: Apache-2.0
//! Label rewrite: XORs every child-owned label and labelref with one random
//! 19-bit mask.
//!
//! Applying the same mask to every hash preserves the pairwise Hamming
//! distance between any label and labelref in the genome, so resolved jump
//! relationships survive the rewrite verbatim while the concrete hash values
//! diverge from the parent's.

use crate::error::SimError;
use crate::molecule::{self, MoleculeKind, VALUE_MASK};
use crate::organism::Organism;
use crate::plugins::{owned_cells, WorldCtx, WorldPlugin};

/// Post-birth label-rewrite plugin. Stateless, no configuration.
#[derive(Debug, Default)]
pub struct LabelRewritePlugin;

impl LabelRewritePlugin {
    /// Creates the plugin.
    pub fn new() -> Self {
        Self
    }
}

impl WorldPlugin for LabelRewritePlugin {
    fn name(&self) -> &'static str {
        "label-rewrite"
    }

    #[allow(clippy::cast_possible_wrap)]
    fn on_birth(&mut self, child: &Organism, ctx: &mut WorldCtx<'_>) -> Result<(), SimError> {
        let mask = molecule::raw_value(molecule::data(
            ctx.prng.next_int(0, VALUE_MASK as i32),
        ));
        let mut touched = false;
        for flat in owned_cells(ctx.env, child.id) {
            let word = ctx.env.molecule_flat(flat);
            match molecule::kind_of(word) {
                Some(kind @ (MoleculeKind::Label | MoleculeKind::LabelRef)) => {
                    let rewritten = molecule::pack(
                        kind,
                        (molecule::raw_value(word) ^ mask) as i32,
                        molecule::marker_of(word),
                    );
                    let owner = ctx.env.owner_flat(flat);
                    ctx.env.write_flat(flat, rewritten, owner);
                    touched = true;
                }
                _ => {}
            }
        }
        if touched {
            ctx.labels.invalidate();
        }
        Ok(())
    }
}
