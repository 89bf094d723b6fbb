// SPDX-License-Identifier: Apache-2.0
//! Instruction set: opcode model, operand declarations, and the flat table.
//!
//! An opcode id occupies the low 16 bits of a molecule's 19-bit value field:
//!
//! ```text
//! bits 12..16   family    (4 bits)
//! bits  4..12   operation (8 bits, family-relative)
//! bits  0..4    variant   (4 bits, addressing mode)
//! ```
//!
//! Every opcode declares an ordered operand-source list; operand length and
//! encoding derive from that list. The table is built once from the static
//! family registrations and then only read — lookups are O(1) through a dense
//! index. Implementations that want several tables build and pass them
//! explicitly; nothing here is global.

use rustc_hash::FxHashMap;

use crate::error::SimError;
use crate::exec::Handler;

mod arith;
mod bitwise;
mod conditional;
mod control;
mod env_io;
mod special;
mod stack_ops;
mod state_ops;
mod vector_ops;

/// Instruction family (high 4 bits of an opcode id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Family {
    /// Scalar and polymorphic arithmetic.
    Arithmetic = 1,
    /// Logical operations on the raw 19-bit value field.
    Bitwise = 2,
    /// Predicates that execute or skip the following instruction.
    Conditional = 3,
    /// Data- and location-stack manipulation.
    Stack = 4,
    /// Jumps, calls, and scheduling control.
    Control = 5,
    /// Grid reads and writes relative to the active data pointer.
    Environment = 6,
    /// Organism-state access: DV, DPs, markers, energy, entropy.
    State = 7,
    /// Vector construction and products.
    Vector = 8,
    /// Reproduction.
    Special = 9,
}

impl Family {
    /// All families, in id order.
    pub const ALL: [Self; 9] = [
        Self::Arithmetic,
        Self::Bitwise,
        Self::Conditional,
        Self::Stack,
        Self::Control,
        Self::Environment,
        Self::State,
        Self::Vector,
        Self::Special,
    ];

    /// Stable display name used in configuration keys and telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Self::Arithmetic => "ARITHMETIC",
            Self::Bitwise => "BITWISE",
            Self::Conditional => "CONDITIONAL",
            Self::Stack => "STACK",
            Self::Control => "CONTROL",
            Self::Environment => "ENVIRONMENT",
            Self::State => "STATE",
            Self::Vector => "VECTOR",
            Self::Special => "SPECIAL",
        }
    }

    /// Parses a configuration key back into a family.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn from_bits(bits: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| u16::from(*f as u8) == bits)
    }
}

/// Addressing-mode variant (low 4 bits of an opcode id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Variant {
    /// Register, register.
    Rr = 0,
    /// Register, immediate.
    Ri = 1,
    /// Register, stack.
    Rs = 2,
    /// Single register.
    R = 3,
    /// Single immediate.
    I = 4,
    /// Operands from the data stack.
    S = 5,
    /// No operands.
    None = 6,
    /// Vector immediate.
    V = 7,
    /// Location register.
    Lr = 8,
}

/// Where one operand comes from and how many cells it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSource {
    /// One data cell holding a bank-coded register id.
    Register,
    /// One data cell holding a scalar.
    Immediate,
    /// Zero cells; the value is popped from the data stack.
    Stack,
    /// `arity` data cells forming an integer vector.
    Vector,
    /// One labelref cell holding a 19-bit hash.
    LabelRef,
    /// One data cell holding a location-register index.
    LocationRegister,
}

impl OperandSource {
    /// Cells this operand consumes along DV for a grid of the given arity.
    pub fn cells(self, arity: usize) -> usize {
        match self {
            Self::Stack => 0,
            Self::Vector => arity,
            Self::Register | Self::Immediate | Self::LabelRef | Self::LocationRegister => 1,
        }
    }
}

// Shared operand-source lists referenced by the family registrations.
pub(crate) const NO_OPERANDS: &[OperandSource] = &[];
pub(crate) const REG: &[OperandSource] = &[OperandSource::Register];
pub(crate) const REG_REG: &[OperandSource] = &[OperandSource::Register, OperandSource::Register];
pub(crate) const REG_IMM: &[OperandSource] = &[OperandSource::Register, OperandSource::Immediate];
pub(crate) const REG_VEC: &[OperandSource] = &[OperandSource::Register, OperandSource::Vector];
pub(crate) const IMM: &[OperandSource] = &[OperandSource::Immediate];
pub(crate) const VEC: &[OperandSource] = &[OperandSource::Vector];
pub(crate) const STACK1: &[OperandSource] = &[OperandSource::Stack];
pub(crate) const STACK2: &[OperandSource] = &[OperandSource::Stack, OperandSource::Stack];
pub(crate) const STACK3: &[OperandSource] =
    &[OperandSource::Stack, OperandSource::Stack, OperandSource::Stack];
pub(crate) const LABEL: &[OperandSource] = &[OperandSource::LabelRef];
pub(crate) const LOC: &[OperandSource] = &[OperandSource::LocationRegister];
pub(crate) const REG_REG_REG: &[OperandSource] = &[
    OperandSource::Register,
    OperandSource::Register,
    OperandSource::Register,
];
pub(crate) const REG_IMM_IMM: &[OperandSource] = &[
    OperandSource::Register,
    OperandSource::Immediate,
    OperandSource::Immediate,
];
pub(crate) const VEC_IMM_VEC: &[OperandSource] = &[
    OperandSource::Vector,
    OperandSource::Immediate,
    OperandSource::Vector,
];

/// Packs `(family, operation, variant)` into an opcode id.
pub fn opcode_id(family: Family, op: u8, variant: Variant) -> u16 {
    (u16::from(family as u8) << 12) | (u16::from(op) << 4) | u16::from(variant as u8)
}

/// One registered opcode: identity, operand declarations, and handler.
pub struct OpcodeInfo {
    /// Opcode id (as stored in a CODE molecule's value field).
    pub id: u16,
    /// Mnemonic (unique table-wide).
    pub name: &'static str,
    /// Family component of the id.
    pub family: Family,
    /// Operation component of the id (family-relative).
    pub op: u8,
    /// Addressing-mode component of the id.
    pub variant: Variant,
    /// Ordered operand sources; cell layout derives from this list.
    pub operands: &'static [OperandSource],
    /// Grid cells this opcode touches, for the per-cell energy surcharge.
    pub touched_cells: u8,
    pub(crate) handler: Handler,
}

impl std::fmt::Debug for OpcodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("family", &self.family)
            .field("op", &self.op)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

impl OpcodeInfo {
    /// Total operand cells for a grid of the given arity.
    pub fn operand_cells(&self, arity: usize) -> usize {
        self.operands.iter().map(|s| s.cells(arity)).sum()
    }
}

pub(crate) struct TableBuilder {
    entries: Vec<OpcodeInfo>,
}

impl TableBuilder {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add(
        &mut self,
        name: &'static str,
        family: Family,
        op: u8,
        variant: Variant,
        operands: &'static [OperandSource],
        touched_cells: u8,
        handler: Handler,
    ) {
        self.entries.push(OpcodeInfo {
            id: opcode_id(family, op, variant),
            name,
            family,
            op,
            variant,
            operands,
            touched_cells,
            handler,
        });
    }
}

const NO_SLOT: u16 = u16::MAX;

/// Flat, index-by-opcode instruction table.
///
/// Built once from the static family registrations; subsequent lookups are
/// O(1) array indexing through a dense id → entry map.
pub struct IsaTable {
    infos: Vec<OpcodeInfo>,
    index: Vec<u16>,
    by_name: FxHashMap<&'static str, u16>,
    nop: u16,
}

impl std::fmt::Debug for IsaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsaTable")
            .field("opcodes", &self.infos.len())
            .finish_non_exhaustive()
    }
}

impl IsaTable {
    /// Builds the table from every family registration.
    ///
    /// # Errors
    ///
    /// [`SimError::DuplicateOpcode`] if two registrations collide on an id —
    /// an integrity violation, never a runtime condition.
    pub fn new() -> Result<Self, SimError> {
        let mut builder = TableBuilder { entries: Vec::new() };
        arith::register(&mut builder);
        bitwise::register(&mut builder);
        conditional::register(&mut builder);
        stack_ops::register(&mut builder);
        control::register(&mut builder);
        env_io::register(&mut builder);
        state_ops::register(&mut builder);
        vector_ops::register(&mut builder);
        special::register(&mut builder);

        let mut index = vec![NO_SLOT; 1 << 16];
        let mut by_name = FxHashMap::default();
        for (slot, info) in builder.entries.iter().enumerate() {
            let id = info.id as usize;
            if index[id] != NO_SLOT {
                return Err(SimError::DuplicateOpcode(info.id));
            }
            let slot = u16::try_from(slot).map_err(|_| SimError::DuplicateOpcode(info.id))?;
            index[id] = slot;
            if by_name.insert(info.name, info.id).is_some() {
                return Err(SimError::DuplicateOpcode(info.id));
            }
        }
        let nop = *by_name
            .get("NOP")
            .ok_or_else(|| SimError::UnknownInstructionName("NOP".to_owned()))?;
        Ok(Self {
            infos: builder.entries,
            index,
            by_name,
            nop,
        })
    }

    /// Resolves an opcode id (a CODE molecule's value) to its entry.
    pub fn lookup(&self, opcode: u32) -> Option<&OpcodeInfo> {
        let id = usize::try_from(opcode).ok()?;
        let slot = *self.index.get(id)?;
        if slot == NO_SLOT {
            return None;
        }
        self.infos.get(slot as usize)
    }

    /// Resolves a mnemonic to its opcode id.
    pub fn opcode_by_name(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    /// Resolves a mnemonic to its entry.
    pub fn info_by_name(&self, name: &str) -> Option<&OpcodeInfo> {
        self.lookup(u32::from(self.opcode_by_name(name)?))
    }

    /// All registered opcodes, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.infos.iter()
    }

    /// Number of registered opcodes.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// True when the table is empty (never, after a successful build).
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Entry by dense position, for uniform random sampling.
    pub fn by_position(&self, position: usize) -> Option<&OpcodeInfo> {
        self.infos.get(position)
    }

    pub(crate) fn nop_info(&self) -> &OpcodeInfo {
        // Invariant: the NOP slot is verified during construction.
        // If not, fail loudly rather than executing garbage.
        self.lookup(u32::from(self.nop))
            .map_or_else(|| unreachable!("BUG: NOP missing from table"), |info| info)
    }

    /// True when `(family, op, variant)` names a registered opcode.
    pub fn exists(&self, family: Family, op: u8, variant: Variant) -> bool {
        self.lookup(u32::from(opcode_id(family, op, variant))).is_some()
    }

    /// Registered variants of `(family, op)` whose operand layout occupies the
    /// same number of cells — the arity group a variant flip must stay in.
    pub fn sibling_variants(&self, family: Family, op: u8, cells: usize, arity: usize) -> Vec<u16> {
        self.infos
            .iter()
            .filter(|i| i.family == family && i.op == op && i.operand_cells(arity) == cells)
            .map(|i| i.id)
            .collect()
    }

    /// Registered operations within `family`.
    pub fn ops_in_family(&self, family: Family) -> Vec<u8> {
        let mut ops: Vec<u8> = self
            .infos
            .iter()
            .filter(|i| i.family == family)
            .map(|i| i.op)
            .collect();
        ops.sort_unstable();
        ops.dedup();
        ops
    }

    /// Decomposes a raw opcode id into its three components, when valid.
    pub fn decompose(opcode: u16) -> Option<(Family, u8, Variant)> {
        let family = Family::from_bits(opcode >> 12)?;
        let op = u8::try_from((opcode >> 4) & 0xFF).ok()?;
        let variant = match opcode & 0xF {
            0 => Variant::Rr,
            1 => Variant::Ri,
            2 => Variant::Rs,
            3 => Variant::R,
            4 => Variant::I,
            5 => Variant::S,
            6 => Variant::None,
            7 => Variant::V,
            8 => Variant::Lr,
            _ => return None,
        };
        Some((family, op, variant))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn table_builds_with_full_inventory() {
        let table = IsaTable::new().unwrap();
        assert!(table.len() > 120, "inventory too small: {}", table.len());
        assert!(!table.is_empty());
    }

    #[test]
    fn ids_round_trip_through_decompose() {
        let table = IsaTable::new().unwrap();
        for info in table.iter() {
            let (family, op, variant) = IsaTable::decompose(info.id).unwrap();
            assert_eq!(family, info.family);
            assert_eq!(op, info.op);
            assert_eq!(variant, info.variant);
            assert_eq!(opcode_id(family, op, variant), info.id);
        }
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        let table = IsaTable::new().unwrap();
        for info in table.iter() {
            assert_eq!(table.opcode_by_name(info.name), Some(info.id), "{}", info.name);
        }
    }

    #[test]
    fn scenario_mnemonics_are_registered() {
        let table = IsaTable::new().unwrap();
        for name in ["ADDI", "IFI", "POKE", "FORK", "NOP", "CALL", "RET", "PEEK", "SCAN"] {
            assert!(table.opcode_by_name(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn sibling_variants_share_cell_counts() {
        let table = IsaTable::new().unwrap();
        let add = table.info_by_name("ADDR").unwrap();
        let siblings = table.sibling_variants(add.family, add.op, add.operand_cells(2), 2);
        assert!(siblings.contains(&add.id));
        // ADDI also consumes 2 cells on a 2-D grid.
        let addi = table.info_by_name("ADDI").unwrap();
        assert!(siblings.contains(&addi.id));
    }

    #[test]
    fn empty_opcode_value_is_not_registered() {
        let table = IsaTable::new().unwrap();
        assert!(table.lookup(0).is_none(), "opcode 0 must stay reserved for empty cells");
    }
}
