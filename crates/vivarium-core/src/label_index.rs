// SPDX-License-Identifier: Apache-2.0
//! Label index: `(owner, label hash) → flat indices`.
//!
//! Resolves symbolic jump targets in O(log n) after a lazy rebuild. The index
//! is a cache over the grid: it records the environment generation it was
//! built against and rebuilds itself on the first query after any mutation.
//!
//! Determinism contract:
//! - Candidates are measured by absolute flat-index distance from the query
//!   point ("stride distance").
//! - Ties break toward the smallest flat index.

use rustc_hash::FxHashMap;

use crate::env::Environment;
use crate::molecule::{self, MoleculeKind};

/// Lazily rebuilt map from `(owner, hash)` to sorted label locations.
#[derive(Debug, Default)]
pub struct LabelIndex {
    built_against: Option<u64>,
    by_owner: FxHashMap<u32, FxHashMap<u32, Vec<usize>>>,
}

impl LabelIndex {
    /// Creates an empty index; the first query populates it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces a rebuild on the next query.
    pub fn invalidate(&mut self) {
        self.built_against = None;
    }

    fn ensure_fresh(&mut self, env: &Environment) {
        if self.built_against == Some(env.generation()) {
            return;
        }
        self.by_owner.clear();
        for flat in 0..env.total_cells() {
            let word = env.molecule_flat(flat);
            if molecule::kind_of(word) == Some(MoleculeKind::Label) {
                let owner = env.owner_flat(flat);
                self.by_owner
                    .entry(owner)
                    .or_default()
                    .entry(molecule::raw_value(word))
                    .or_default()
                    .push(flat);
            }
        }
        // Scan order is ascending, so every candidate list is already sorted.
        self.built_against = Some(env.generation());
    }

    /// Finds the nearest `LABEL` with value `hash` owned by the first entry
    /// of `owners` that has one; later entries (the parent lineage) are
    /// consulted only when earlier ones have no match.
    pub fn find_target(
        &mut self,
        env: &Environment,
        owners: &[u32],
        hash: u32,
        from: usize,
    ) -> Option<usize> {
        self.ensure_fresh(env);
        for &owner in owners {
            if let Some(found) = self.lookup_owner(owner, hash, from) {
                return Some(found);
            }
        }
        None
    }

    fn lookup_owner(&self, owner: u32, hash: u32, from: usize) -> Option<usize> {
        let candidates = self.by_owner.get(&owner)?.get(&hash)?;
        debug_assert!(!candidates.is_empty(), "empty candidate list in label index");
        // Binary search for the insertion point, then compare neighbors.
        let at = candidates.partition_point(|&flat| flat < from);
        let right = candidates.get(at).copied();
        let left = at.checked_sub(1).and_then(|i| candidates.get(i).copied());
        match (left, right) {
            (None, None) => None,
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (Some(l), Some(r)) => {
                let dl = from - l;
                let dr = r - from;
                // Equal distance resolves to the smaller flat index.
                if dl <= dr {
                    Some(l)
                } else {
                    Some(r)
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::molecule::pack;

    fn label_word(hash: i32) -> u32 {
        pack(MoleculeKind::Label, hash, 0)
    }

    fn env_with_labels(labels: &[(usize, u32, i32)]) -> Environment {
        let mut env = Environment::new(&[100], true).unwrap();
        for &(flat, owner, hash) in labels {
            env.write_flat(flat, label_word(hash), owner);
        }
        env
    }

    #[test]
    fn finds_nearest_by_flat_distance() {
        let env = env_with_labels(&[(10, 1, 0x55), (40, 1, 0x55)]);
        let mut index = LabelIndex::new();
        assert_eq!(index.find_target(&env, &[1], 0x55, 20), Some(10));
        assert_eq!(index.find_target(&env, &[1], 0x55, 35), Some(40));
    }

    #[test]
    fn equal_distance_ties_break_to_smaller_index() {
        let env = env_with_labels(&[(10, 1, 0x7), (30, 1, 0x7)]);
        let mut index = LabelIndex::new();
        assert_eq!(index.find_target(&env, &[1], 0x7, 20), Some(10));
    }

    #[test]
    fn falls_back_through_the_lineage() {
        let env = env_with_labels(&[(50, 9, 0x3)]);
        let mut index = LabelIndex::new();
        assert_eq!(index.find_target(&env, &[2, 9], 0x3, 0), Some(50));
        assert_eq!(index.find_target(&env, &[2], 0x3, 0), None);
    }

    #[test]
    fn rebuilds_after_grid_mutation() {
        let mut env = env_with_labels(&[(10, 1, 0x55)]);
        let mut index = LabelIndex::new();
        assert_eq!(index.find_target(&env, &[1], 0x55, 0), Some(10));

        env.write_flat(10, crate::molecule::EMPTY_WORD, 0);
        env.write_flat(60, label_word(0x55), 1);
        assert_eq!(index.find_target(&env, &[1], 0x55, 0), Some(60));
    }
}
