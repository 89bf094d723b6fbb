// SPDX-License-Identifier: Apache-2.0
//! Molecule word codec.
//!
//! A molecule is a single `u32` with a fixed bit layout:
//!
//! ```text
//! bits 28..32   marker   (4 bits, organism-assigned tag)
//! bits 20..24   type     (4 bits, MoleculeKind)
//! bits  0..19   value    (19-bit two's-complement scalar)
//! ```
//!
//! Invariants:
//! - `value` is always stored masked to [`VALUE_MASK`]; the sign is recovered
//!   on scalar read via [`to_scalar`].
//! - `marker` is masked to 4 bits on every write.
//! - The canonical empty molecule is `CODE` with value `0` (the all-zero word
//!   with marker 0).

/// Width of the value field in bits.
pub const VALUE_BITS: u32 = 19;

/// Mask extracting the raw value field (`0x7FFFF`).
pub const VALUE_MASK: u32 = (1 << VALUE_BITS) - 1;

/// Bit position of the type field.
pub const TYPE_SHIFT: u32 = 20;

/// Mask for the type field after shifting.
pub const TYPE_MASK: u32 = 0xF;

/// Bit position of the marker field.
pub const MARKER_SHIFT: u32 = 28;

/// Mask for the marker field after shifting.
pub const MARKER_MASK: u32 = 0xF;

/// The canonical empty molecule word (`CODE` with value 0, marker 0).
pub const EMPTY_WORD: u32 = 0;

/// Enumerated molecule kinds stored in the 4-bit type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MoleculeKind {
    /// Executable instruction cell (value 0 is the canonical empty molecule).
    Code = 0,
    /// Inert scalar payload: operands, register ids, stored numbers.
    Data = 1,
    /// Harvestable energy.
    Energy = 2,
    /// Genome boundary material; never executed, never mutated by plugins.
    Structure = 3,
    /// Symbolic jump target carrying a 19-bit hash.
    Label = 4,
    /// Reference to a [`MoleculeKind::Label`] by hash.
    LabelRef = 5,
    /// Register reference (bank-coded register id) used for call binding.
    Register = 6,
    /// Explicitly-typed vacancy; distinct from the canonical empty `CODE:0`.
    Empty = 7,
}

impl MoleculeKind {
    /// Decodes a 4-bit type field into a kind, or `None` for unassigned tags.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Code),
            1 => Some(Self::Data),
            2 => Some(Self::Energy),
            3 => Some(Self::Structure),
            4 => Some(Self::Label),
            5 => Some(Self::LabelRef),
            6 => Some(Self::Register),
            7 => Some(Self::Empty),
            _ => None,
        }
    }

    /// Stable display name used in failure reasons and telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::Data => "DATA",
            Self::Energy => "ENERGY",
            Self::Structure => "STRUCTURE",
            Self::Label => "LABEL",
            Self::LabelRef => "LABELREF",
            Self::Register => "REGISTER",
            Self::Empty => "EMPTY",
        }
    }
}

/// Packs `(kind, value, marker)` into a molecule word.
///
/// Total over all inputs: `value` is masked to [`VALUE_MASK`], `marker` to 4
/// bits. `unpack(pack(t, v, m)) == (t, v & VALUE_MASK, m & 0xF)`.
pub fn pack(kind: MoleculeKind, value: i32, marker: u8) -> u32 {
    let value_bits = cast_unsigned(value) & VALUE_MASK;
    let marker_bits = (u32::from(marker) & MARKER_MASK) << MARKER_SHIFT;
    (u32::from(kind as u8) << TYPE_SHIFT) | value_bits | marker_bits
}

/// Unpacks a molecule word into `(kind, raw_value, marker)`.
///
/// Returns `None` when the type field holds an unassigned tag (possible only
/// for words that never went through [`pack`]).
pub fn unpack(word: u32) -> Option<(MoleculeKind, u32, u8)> {
    let kind = kind_of(word)?;
    Some((kind, raw_value(word), marker_of(word)))
}

/// Returns the kind stored in `word`, or `None` for unassigned type tags.
pub fn kind_of(word: u32) -> Option<MoleculeKind> {
    MoleculeKind::from_bits((word >> TYPE_SHIFT) & TYPE_MASK)
}

/// Returns the raw (unsigned, masked) value field of `word`.
pub fn raw_value(word: u32) -> u32 {
    word & VALUE_MASK
}

/// Returns the 4-bit marker of `word`.
pub fn marker_of(word: u32) -> u8 {
    let bits = (word >> MARKER_SHIFT) & MARKER_MASK;
    // Masked to 4 bits, always fits.
    bits.to_le_bytes()[0]
}

/// Returns `word` with its marker field replaced by `marker & 0xF`.
pub fn with_marker(word: u32, marker: u8) -> u32 {
    let cleared = word & !(MARKER_MASK << MARKER_SHIFT);
    cleared | ((u32::from(marker) & MARKER_MASK) << MARKER_SHIFT)
}

/// Sign-extends the 19-bit value field of `word` to a native `i32`.
///
/// Inverse of the scalar encoding performed by [`pack`]: for any `v`
/// representable in 19 bits, `to_scalar(pack(k, v, m)) == v`.
pub fn to_scalar(word: u32) -> i32 {
    let v = word & VALUE_MASK;
    if v & (1 << (VALUE_BITS - 1)) == 0 {
        cast_signed(v)
    } else {
        cast_signed(v | !VALUE_MASK)
    }
}

/// True iff `word` is the canonical empty molecule (`CODE` with value 0).
///
/// The marker field does not participate: an empty cell keeps marker 0 by
/// construction, but stray marker bits still denote vacancy.
pub fn is_empty(word: u32) -> bool {
    kind_of(word) == Some(MoleculeKind::Code) && raw_value(word) == 0
}

/// Convenience constructor for a `DATA` molecule with marker 0.
pub fn data(value: i32) -> u32 {
    pack(MoleculeKind::Data, value, 0)
}

/// Convenience constructor for an `ENERGY` molecule with marker 0.
pub fn energy(value: i32) -> u32 {
    pack(MoleculeKind::Energy, value, 0)
}

/// Encodes a wide result as a `DATA` molecule, saturating at the 19-bit
/// two's-complement range instead of silently wrapping.
#[allow(clippy::cast_possible_truncation)]
pub fn data_clamped(value: i64) -> u32 {
    const MIN: i64 = -(1 << (VALUE_BITS - 1));
    const MAX: i64 = (1 << (VALUE_BITS - 1)) - 1;
    data(value.clamp(MIN, MAX) as i32)
}

#[inline]
fn cast_unsigned(v: i32) -> u32 {
    u32::from_le_bytes(v.to_le_bytes())
}

#[inline]
fn cast_signed(v: u32) -> i32 {
    i32::from_le_bytes(v.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pack_masks_value_and_marker() {
        let word = pack(MoleculeKind::Data, -1, 0xFF);
        assert_eq!(raw_value(word), VALUE_MASK);
        assert_eq!(marker_of(word), 0xF);
        assert_eq!(kind_of(word), Some(MoleculeKind::Data));
    }

    #[test]
    fn scalar_round_trips_negative_values() {
        for v in [-262144, -1, 0, 1, 262143] {
            let word = pack(MoleculeKind::Data, v, 0);
            assert_eq!(to_scalar(word), v, "scalar {v} should round-trip");
        }
    }

    #[test]
    fn empty_is_code_zero_only() {
        assert!(is_empty(EMPTY_WORD));
        assert!(is_empty(pack(MoleculeKind::Code, 0, 0)));
        assert!(!is_empty(pack(MoleculeKind::Code, 1, 0)));
        assert!(!is_empty(pack(MoleculeKind::Data, 0, 0)));
        assert!(!is_empty(pack(MoleculeKind::Empty, 0, 0)));
    }

    #[test]
    fn with_marker_replaces_only_marker_bits() {
        let word = pack(MoleculeKind::Energy, 1234, 7);
        let tagged = with_marker(word, 0x3);
        assert_eq!(marker_of(tagged), 0x3);
        assert_eq!(raw_value(tagged), 1234);
        assert_eq!(kind_of(tagged), Some(MoleculeKind::Energy));
    }

    #[test]
    fn unassigned_type_tags_decode_to_none() {
        let word = 0xE << TYPE_SHIFT;
        assert_eq!(kind_of(word), None);
        assert_eq!(unpack(word), None);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trip(value in -262_144i32..=262_143, marker in 0u8..=0xF) {
            let word = pack(MoleculeKind::Label, value, marker);
            let expected = (MoleculeKind::Label, cast_unsigned(value) & VALUE_MASK, marker);
            prop_assert_eq!(unpack(word), Some(expected));
            prop_assert_eq!(to_scalar(word), value);
        }
    }
}
