// SPDX-License-Identifier: Apache-2.0
//! Shared helpers for runtime integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use vivarium_core::molecule::{self, MoleculeKind};
use vivarium_core::{Simulation, SimulationBuilder};

/// A 30×20 toroidal world with a fixed seed.
pub fn sim_2d() -> Simulation {
    SimulationBuilder::new(&[30, 20]).seed(7).build().unwrap()
}

/// Packs a CODE molecule for the named instruction.
pub fn opcode(sim: &Simulation, name: &str) -> u32 {
    let id = sim
        .isa()
        .opcode_by_name(name)
        .unwrap_or_else(|| panic!("unknown mnemonic {name}"));
    molecule::pack(MoleculeKind::Code, i32::from(id), 0)
}

/// DATA molecule shorthand.
pub fn data(value: i32) -> u32 {
    molecule::data(value)
}

/// LABEL molecule with the given hash.
pub fn label(hash: i32) -> u32 {
    molecule::pack(MoleculeKind::Label, hash, 0)
}

/// LABELREF molecule with the given hash.
pub fn labelref(hash: i32) -> u32 {
    molecule::pack(MoleculeKind::LabelRef, hash, 0)
}

/// Installs `words` along +x starting at `origin`, owned by `owner`.
pub fn install(sim: &mut Simulation, origin: &[i32], owner: u32, words: &[u32]) {
    sim.write_genome(origin, &[1, 0], owner, words).unwrap();
}
