// SPDX-License-Identifier: Apache-2.0
//! N-dimensional environment grid.
//!
//! Two parallel dense arrays — packed molecule words and owner ids — addressed
//! by row-major flat index. Coordinate arithmetic honors the configured
//! topology: toroidal grids wrap component-wise, bounded grids reject
//! out-of-range coordinates.
//!
//! Invariants:
//! - Every write through the mutating API marks the change bitset. The bitset
//!   is the delta-compression hook for external observers and is reset only
//!   by [`Environment::reset_change_tracking`].
//! - `owners[i] == 0` means unowned; organism ids are strictly positive.
//! - Bulk ownership operations iterate the grid exactly once, mark every cell
//!   they mutate, and return the mutated-cell count.

use crate::coords;
use crate::error::{FailureReason, SimError};
use crate::molecule::{self, EMPTY_WORD};

/// Bit-packed set of mutated flat indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChangeTracker {
    words: Vec<u64>,
}

impl ChangeTracker {
    fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    #[inline]
    fn mark(&mut self, index: usize) {
        self.words[index / 64] |= 1 << (index % 64);
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|w| w & (1 << (index % 64)) != 0)
    }

    fn clear(&mut self) {
        self.words.fill(0);
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let tz = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(wi * 64 + tz)
            })
        })
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn restore(words: Vec<u64>) -> Self {
        Self { words }
    }
}

/// The simulation grid: molecule words, owner ids, and change tracking.
#[derive(Debug, Clone)]
pub struct Environment {
    shape: Vec<i32>,
    strides: Vec<usize>,
    toroidal: bool,
    molecules: Vec<u32>,
    owners: Vec<u32>,
    changed: ChangeTracker,
    /// Monotonic mutation counter; lazy caches (label index) compare against it.
    generation: u64,
}

impl Environment {
    /// Creates an empty grid with the given extents and topology.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyShape`], [`SimError::NonPositiveExtent`], or
    /// [`SimError::CellCountOverflow`] for degenerate shapes.
    pub fn new(shape: &[i32], toroidal: bool) -> Result<Self, SimError> {
        if shape.is_empty() {
            return Err(SimError::EmptyShape);
        }
        for (axis, &extent) in shape.iter().enumerate() {
            if extent <= 0 {
                return Err(SimError::NonPositiveExtent { axis, extent });
            }
        }
        let mut total: usize = 1;
        for &extent in shape {
            let extent = usize::try_from(extent).map_err(|_| SimError::CellCountOverflow)?;
            total = total
                .checked_mul(extent)
                .ok_or(SimError::CellCountOverflow)?;
        }
        // Row-major strides: stride[k-1] = 1, stride[i] = stride[i+1] * d[i+1].
        let mut strides = vec![1usize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            let next_extent = usize::try_from(shape[i + 1]).map_err(|_| SimError::CellCountOverflow)?;
            strides[i] = strides[i + 1]
                .checked_mul(next_extent)
                .ok_or(SimError::CellCountOverflow)?;
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides,
            toroidal,
            molecules: vec![EMPTY_WORD; total],
            owners: vec![0; total],
            changed: ChangeTracker::new(total),
            generation: 0,
        })
    }

    /// Grid extents per axis.
    pub fn shape(&self) -> &[i32] {
        &self.shape
    }

    /// Number of axes.
    pub fn arity(&self) -> usize {
        self.shape.len()
    }

    /// Total cell count (product of the extents).
    pub fn total_cells(&self) -> usize {
        self.molecules.len()
    }

    /// Whether coordinate arithmetic wraps.
    pub fn is_toroidal(&self) -> bool {
        self.toroidal
    }

    /// Monotonic mutation counter for lazy cache invalidation.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Normalizes `coord` for the grid's topology.
    ///
    /// Toroidal grids wrap each component modulo the axis extent; bounded
    /// grids return `None` when any component is out of range.
    pub fn wrap(&self, coord: &[i32]) -> Option<Vec<i32>> {
        if coord.len() != self.shape.len() {
            return None;
        }
        let mut out = Vec::with_capacity(coord.len());
        for (&c, &extent) in coord.iter().zip(self.shape.iter()) {
            if self.toroidal {
                out.push(c.rem_euclid(extent));
            } else if (0..extent).contains(&c) {
                out.push(c);
            } else {
                return None;
            }
        }
        Some(out)
    }

    /// One step from `coord` along `dv`, honoring topology.
    pub fn step(&self, coord: &[i32], dv: &[i32]) -> Option<Vec<i32>> {
        self.wrap(&coords::add(coord, dv))
    }

    /// Converts a coordinate to its row-major flat index.
    pub fn coord_to_flat(&self, coord: &[i32]) -> Option<usize> {
        let wrapped = self.wrap(coord)?;
        let mut flat = 0usize;
        for (&c, &stride) in wrapped.iter().zip(self.strides.iter()) {
            flat += usize::try_from(c).ok()? * stride;
        }
        Some(flat)
    }

    /// Converts a row-major flat index back to a coordinate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn flat_to_coord(&self, mut flat: usize) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.strides.len());
        for &stride in &self.strides {
            out.push((flat / stride) as i32);
            flat %= stride;
        }
        out
    }

    /// Reads the molecule word at `coord`.
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn molecule_at(&self, coord: &[i32]) -> Result<u32, FailureReason> {
        let flat = self.coord_to_flat(coord).ok_or(FailureReason::OutOfBounds)?;
        Ok(self.molecules[flat])
    }

    /// Reads the owner id at `coord` (0 = unowned).
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn owner_at(&self, coord: &[i32]) -> Result<u32, FailureReason> {
        let flat = self.coord_to_flat(coord).ok_or(FailureReason::OutOfBounds)?;
        Ok(self.owners[flat])
    }

    /// Reads `(molecule, owner)` by flat index.
    pub fn cell(&self, flat: usize) -> Option<(u32, u32)> {
        let word = *self.molecules.get(flat)?;
        Some((word, self.owners[flat]))
    }

    /// Writes `word` at `coord` and clears ownership.
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn set_molecule(&mut self, word: u32, coord: &[i32]) -> Result<(), FailureReason> {
        let flat = self.coord_to_flat(coord).ok_or(FailureReason::OutOfBounds)?;
        self.write_flat(flat, word, 0);
        Ok(())
    }

    /// Writes `word` at `coord` and assigns `owner`.
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn set_molecule_with_owner(
        &mut self,
        word: u32,
        owner: u32,
        coord: &[i32],
    ) -> Result<(), FailureReason> {
        let flat = self.coord_to_flat(coord).ok_or(FailureReason::OutOfBounds)?;
        self.write_flat(flat, word, owner);
        Ok(())
    }

    /// Reassigns ownership of the cell at `coord` without touching the molecule.
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn set_owner(&mut self, owner: u32, coord: &[i32]) -> Result<(), FailureReason> {
        let flat = self.coord_to_flat(coord).ok_or(FailureReason::OutOfBounds)?;
        self.owners[flat] = owner;
        self.touch(flat);
        Ok(())
    }

    /// Clears ownership of the cell at `coord`.
    ///
    /// # Errors
    ///
    /// [`FailureReason::OutOfBounds`] on a bounded grid.
    pub fn clear_owner(&mut self, coord: &[i32]) -> Result<(), FailureReason> {
        self.set_owner(0, coord)
    }

    /// Flat-index write with ownership; used by plugins and persistence.
    pub(crate) fn write_flat(&mut self, flat: usize, word: u32, owner: u32) {
        self.molecules[flat] = word;
        self.owners[flat] = owner;
        self.touch(flat);
    }

    pub(crate) fn molecule_flat(&self, flat: usize) -> u32 {
        self.molecules[flat]
    }

    pub(crate) fn owner_flat(&self, flat: usize) -> u32 {
        self.owners[flat]
    }

    #[inline]
    fn touch(&mut self, flat: usize) {
        self.changed.mark(flat);
        self.generation += 1;
    }

    /// Moves every cell owned by `from` whose stored marker equals `marker`
    /// to `to`, resetting the marker to 0. Returns the transferred count.
    pub fn transfer_ownership(&mut self, from: u32, to: u32, marker: u8) -> usize {
        let mut count = 0;
        for flat in 0..self.molecules.len() {
            if self.owners[flat] == from && molecule::marker_of(self.molecules[flat]) == marker {
                self.molecules[flat] = molecule::with_marker(self.molecules[flat], 0);
                self.owners[flat] = to;
                self.touch(flat);
                count += 1;
            }
        }
        count
    }

    /// Orphans every cell owned by `owner` whose marker equals `marker`:
    /// both owner and marker become 0. Returns the orphaned count.
    pub fn orphan_marked(&mut self, owner: u32, marker: u8) -> usize {
        let mut count = 0;
        for flat in 0..self.molecules.len() {
            if self.owners[flat] == owner && molecule::marker_of(self.molecules[flat]) == marker {
                self.molecules[flat] = molecule::with_marker(self.molecules[flat], 0);
                self.owners[flat] = 0;
                self.touch(flat);
                count += 1;
            }
        }
        count
    }

    /// Clears ownership of every cell owned by `owner`. Returns the count.
    pub fn clear_ownership_for(&mut self, owner: u32) -> usize {
        let mut count = 0;
        for flat in 0..self.owners.len() {
            if self.owners[flat] == owner {
                self.owners[flat] = 0;
                self.touch(flat);
                count += 1;
            }
        }
        count
    }

    /// Flat indices mutated since the last reset, in ascending order.
    pub fn changed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.changed.iter()
    }

    /// True iff `flat` was mutated since the last reset.
    pub fn is_changed(&self, flat: usize) -> bool {
        self.changed.contains(flat)
    }

    /// Clears the change bitset. Callers decide snapshot boundaries.
    pub fn reset_change_tracking(&mut self) {
        self.changed.clear();
    }

    // ── Persistence ─────────────────────────────────────────────────────

    pub(crate) fn save_state(&self, out: &mut bytes::BytesMut) {
        use bytes::BufMut as _;
        out.put_u32_le(u32::try_from(self.shape.len()).unwrap_or(0));
        for &extent in &self.shape {
            out.put_i32_le(extent);
        }
        out.put_u8(u8::from(self.toroidal));
        for &word in &self.molecules {
            out.put_u32_le(word);
        }
        for &owner in &self.owners {
            out.put_u32_le(owner);
        }
        for &word in self.changed.words() {
            out.put_u64_le(word);
        }
    }

    pub(crate) fn load_state(buf: &mut &[u8]) -> Result<Self, SimError> {
        use crate::persist;
        let arity = persist::get_u32(buf)? as usize;
        if arity == 0 || arity > 16 {
            return Err(SimError::PersistCorrupt("implausible grid arity"));
        }
        let mut shape = Vec::with_capacity(arity);
        for _ in 0..arity {
            shape.push(persist::get_i32(buf)?);
        }
        let toroidal = persist::get_u8(buf)? != 0;
        let mut env = Self::new(&shape, toroidal)?;
        let total = env.total_cells();
        for flat in 0..total {
            env.molecules[flat] = persist::get_u32(buf)?;
        }
        for flat in 0..total {
            env.owners[flat] = persist::get_u32(buf)?;
        }
        let words = total.div_ceil(64);
        let mut bitset = Vec::with_capacity(words);
        for _ in 0..words {
            bitset.push(persist::get_u64(buf)?);
        }
        env.changed = ChangeTracker::restore(bitset);
        Ok(env)
    }
}
