// SPDX-License-Identifier: Apache-2.0
//! vivarium-core: deterministic artificial-life simulation runtime.
//!
//! An environment grid of bit-packed molecules with ownership, a population
//! of organisms executing a fixed bytecode instruction set, and a
//! tick-synchronous scheduler advancing them under a shared thermodynamic
//! accounting discipline. External concerns — storage, visualization, CLI,
//! compilation — live behind the `vivarium-port` contracts.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Coordinate and direction-vector helpers.
pub mod coords;
/// Molecule word codec: pack/unpack, scalar handling.
pub mod molecule;

mod config;
mod env;
mod error;
mod exec;
/// Instruction set: opcode model and the flat table.
pub mod isa;
mod label_index;
mod organism;
mod persist;
/// World-generation plugins: post-birth mutators, death handlers, seeding.
pub mod plugins;
mod prng;
mod sim;
mod thermo;

// Re-exports for a stable public API.
/// Runtime configuration structs.
pub use config::{CostConfig, SimulationConfig, ThermoConfig};
/// The grid.
pub use env::Environment;
/// Error taxonomy: recoverable instruction failures and fatal errors.
pub use error::{FailureReason, SimError};
/// Label resolution over the grid.
pub use label_index::LabelIndex;
/// Per-organism state.
pub use organism::{
    ActivationRecord, Organism, RegisterValue, BANK_STRIDE, DR_BASE, FPR_BASE, LR_BASE, PR_BASE,
};
/// Checkpoint format constants.
pub use persist::{MAGIC, VERSION};
/// Seeded, derivable PRNG.
pub use prng::Prng;
/// The simulation runtime and its builder.
pub use sim::{Simulation, SimulationBuilder};
/// Thermodynamic policy.
pub use thermo::{Cost, ThermoPolicy};
