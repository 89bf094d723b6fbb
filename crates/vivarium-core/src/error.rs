// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy.
//!
//! Two disjoint layers:
//!
//! - [`FailureReason`] — recoverable at tick granularity. An instruction that
//!   cannot complete sets the organism's failure flag, an energy penalty is
//!   debited, and the simulation continues. These never escape `tick()`.
//! - [`SimError`] — fatal. Invariant violations, corrupt persistence payloads,
//!   and configuration errors surface to the caller and halt the simulation.

use thiserror::Error;

/// Why an instruction could not complete.
///
/// Stored on the organism until the start of its next tick and reported
/// through the telemetry sink. Failures debit the configured error penalty
/// from the energy register but never halt the organism directly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The cell at the instruction pointer is not an executable `CODE` molecule.
    #[error("cell at instruction pointer is not executable code")]
    NotCode,
    /// The opcode id is not registered in the instruction table.
    #[error("unknown opcode {0:#07x}")]
    UnknownOpcode(u32),
    /// An operand had the wrong molecule type or shape.
    #[error("operand type guard violated: expected {expected}")]
    TypeGuard {
        /// What the instruction required (stable display string).
        expected: &'static str,
    },
    /// A register id fell outside the configured banks.
    #[error("register id {0} outside configured banks")]
    RegisterRange(u32),
    /// A location-register index fell outside the configured bank.
    #[error("location register {0} out of range")]
    LocationRange(u32),
    /// A data-pointer index fell outside the configured bank.
    #[error("data pointer index {0} out of range")]
    DataPointerRange(u32),
    /// A vector component index fell outside the vector.
    #[error("vector component {0} out of range")]
    VectorRange(i32),
    /// A coordinate resolved out of bounds on a non-toroidal grid.
    #[error("coordinate out of bounds on a bounded grid")]
    OutOfBounds,
    /// An operand that must be a unit vector was not one.
    #[error("operand must be a unit vector")]
    NotUnitVector,
    /// Divide or modulo by zero; the target register is left unchanged.
    #[error("division by zero")]
    DivisionByZero,
    /// The organism could not pay the instruction's declared cost.
    #[error("insufficient energy: needed {needed}, had {available}")]
    InsufficientEnergy {
        /// Declared cost of the attempted instruction.
        needed: i64,
        /// Energy available before the attempt.
        available: i64,
    },
    /// A stack operand was requested from an empty data stack.
    #[error("data stack underflow")]
    StackUnderflow,
    /// A push exceeded the configured stack limit.
    #[error("stack limit exceeded")]
    StackOverflow,
    /// `RET` executed with an empty call stack.
    #[error("call stack underflow")]
    CallStackUnderflow,
    /// A location-stack pop was requested from an empty location stack.
    #[error("location stack underflow")]
    LocationStackUnderflow,
    /// No matching label is reachable through the organism's lineage.
    #[error("no label with hash {0:#07x} reachable from this lineage")]
    LabelNotFound(u32),
}

/// Fatal errors: the only kind that escapes `tick()`.
#[derive(Debug, Error)]
pub enum SimError {
    /// The environment shape has no axes.
    #[error("environment shape must have at least one axis")]
    EmptyShape,
    /// An environment axis extent is zero or negative.
    #[error("environment axis {axis} has non-positive extent {extent}")]
    NonPositiveExtent {
        /// Axis index in the shape.
        axis: usize,
        /// The offending extent.
        extent: i32,
    },
    /// The product of the extents exceeds the addressable cell range.
    #[error("environment cell count overflows addressable range")]
    CellCountOverflow,
    /// A coordinate's arity does not match the grid's.
    #[error("coordinate arity {found} does not match grid arity {expected}")]
    ArityMismatch {
        /// Grid arity.
        expected: usize,
        /// Supplied arity.
        found: usize,
    },
    /// A direction vector supplied at spawn is not a unit vector.
    #[error("spawn direction vector must be a unit vector")]
    BadSpawnDirection,
    /// A spawn position is outside a bounded grid.
    #[error("spawn position out of bounds")]
    SpawnOutOfBounds,
    /// A configured register bank exceeds the bank id stride.
    #[error("bank size {size} for {bank} exceeds the bank stride {stride}")]
    BankTooLarge {
        /// Bank name.
        bank: &'static str,
        /// Configured size.
        size: u32,
        /// Maximum representable size.
        stride: u32,
    },
    /// A configured register bank is empty.
    #[error("bank size for {0} must be positive")]
    EmptyBank(&'static str),
    /// Two opcode registrations collided on the same id.
    #[error("duplicate opcode id {0:#06x} during table construction")]
    DuplicateOpcode(u16),
    /// A thermodynamics override names an instruction that does not exist.
    #[error("thermodynamics override references unknown instruction {0:?}")]
    UnknownInstructionName(String),
    /// A thermodynamics override names a family that does not exist.
    #[error("thermodynamics override references unknown family {0:?}")]
    UnknownFamilyName(String),
    /// The saved state ended before the declared payload did.
    #[error("saved state is truncated")]
    PersistTruncated,
    /// The saved state does not start with the expected magic bytes.
    #[error("saved state has wrong magic bytes")]
    PersistMagic,
    /// The saved state was written by an unsupported format version.
    #[error("saved state format version {0} is not supported")]
    PersistVersion(u16),
    /// The integrity digest over the payload did not match.
    #[error("saved state digest mismatch: stored {stored}, computed {computed}")]
    PersistDigest {
        /// Digest recorded in the payload (hex).
        stored: String,
        /// Digest recomputed over the payload (hex).
        computed: String,
    },
    /// The payload decoded but violates an internal invariant.
    #[error("saved state is internally inconsistent: {0}")]
    PersistCorrupt(&'static str),
    /// A restored plugin section names a plugin that is not registered.
    #[error("saved state references unregistered plugin {0:?}")]
    UnknownPlugin(String),
}
