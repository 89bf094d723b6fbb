// SPDX-License-Identifier: Apache-2.0
//! Thermodynamic accounting through the engine: override layering, failure
//! penalties, starvation, and register clamps.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{data, install, opcode};
use vivarium_core::molecule::{self, MoleculeKind};
use vivarium_core::{
    CostConfig, FailureReason, RegisterValue, SimulationBuilder, SimulationConfig,
};

fn config_with_addi_override() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.thermodynamics.instructions.insert(
        "ADDI".to_owned(),
        CostConfig {
            base_energy: 7,
            base_entropy: 2,
        },
    );
    config.thermodynamics.families.insert(
        "ARITHMETIC".to_owned(),
        CostConfig {
            base_energy: 3,
            base_entropy: 0,
        },
    );
    config
}

#[test]
fn per_instruction_override_beats_family_and_default() {
    let mut sim = SimulationBuilder::new(&[30, 20])
        .seed(1)
        .config(config_with_addi_override())
        .build()
        .unwrap();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [
        opcode(&sim, "ADDI"),
        data(0),
        data(1),
        opcode(&sim, "SUBI"),
        data(0),
        data(1),
        opcode(&sim, "NOP"),
    ];
    install(&mut sim, &[0, 0], id, &program);

    sim.tick().unwrap(); // ADDI: instruction override, 7 energy / 2 entropy.
    assert_eq!(sim.organism(id).unwrap().er, 993);
    assert_eq!(sim.organism(id).unwrap().sr, 2);

    sim.tick().unwrap(); // SUBI: family override, 3 energy.
    assert_eq!(sim.organism(id).unwrap().er, 990);

    sim.tick().unwrap(); // NOP: default, 1 energy.
    assert_eq!(sim.organism(id).unwrap().er, 989);
}

#[test]
fn unknown_opcode_debits_the_error_penalty() {
    let mut sim = common::sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // A CODE molecule whose value is not in the table.
    let garbage = molecule::pack(MoleculeKind::Code, 0x7EEE, 0);
    install(&mut sim, &[0, 0], id, &[garbage]);

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.failure, Some(FailureReason::UnknownOpcode(0x7EEE)));
    assert_eq!(org.er, 990);
    assert_eq!(org.ip, vec![1, 0]);
}

#[test]
fn starved_organism_is_reaped_at_end_of_tick() {
    let mut sim = common::sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 3).unwrap();
    // POKE declares base 1 + one-cell surcharge 5 = 6 > 3.
    let program = [opcode(&sim, "POKE"), data(0), data(1)];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[1] = RegisterValue::Vector(vec![0, 1]);

    sim.tick().unwrap();

    assert_eq!(sim.population(), 0, "drained organism leaves the active set");
}

#[test]
fn entropy_is_clamped_to_the_configured_range() {
    let mut sim = common::sim_2d();
    let id = sim.spawn(&[5, 5], &[1, 0], 1000).unwrap();
    // POKE a large positive value with SR already at zero: clamp at 0.
    let program = [opcode(&sim, "POKE"), data(0), data(1)];
    install(&mut sim, &[5, 5], id, &program);
    {
        let org = sim.organism_mut(id).unwrap();
        org.drs[0] = RegisterValue::Scalar(data(500));
        org.drs[1] = RegisterValue::Vector(vec![0, 1]);
        org.sr = 40;
    }

    sim.tick().unwrap();

    assert_eq!(sim.organism(id).unwrap().sr, 0, "SR clamps at zero");
}

#[test]
fn energy_register_never_exceeds_the_maximum() {
    let mut sim = common::sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 32767).unwrap();
    let program = [opcode(&sim, "NOP")];
    install(&mut sim, &[0, 0], id, &program);

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert!(org.er <= 32767 && org.er >= 0);
}
