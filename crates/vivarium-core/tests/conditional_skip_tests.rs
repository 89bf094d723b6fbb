// SPDX-License-Identifier: Apache-2.0
//! Conditional skip semantics: a false predicate advances the IP past the
//! entire next instruction.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{data, install, opcode, sim_2d};
use vivarium_core::RegisterValue;

#[test]
fn false_predicate_skips_the_next_instruction() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // IFI DR0 0 ; ADDI DR0 1 — with DR0 = 1 the increment must be skipped.
    let program = [
        opcode(&sim, "IFI"),
        data(0),
        data(0),
        opcode(&sim, "ADDI"),
        data(0),
        data(1),
    ];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Scalar(data(1));

    sim.tick().unwrap();
    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.drs[0], RegisterValue::Scalar(data(1)), "skip must fire");
}

#[test]
fn true_predicate_lets_the_next_instruction_execute() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [
        opcode(&sim, "IFI"),
        data(0),
        data(0),
        opcode(&sim, "ADDI"),
        data(0),
        data(1),
    ];
    install(&mut sim, &[0, 0], id, &program);
    // DR0 starts at DATA:0, so the predicate holds.

    sim.tick().unwrap();
    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.drs[0], RegisterValue::Scalar(data(1)));
}

#[test]
fn negated_predicate_inverts_the_decision() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // INI DR0 0 executes the next instruction only when DR0 != 0.
    let program = [
        opcode(&sim, "INI"),
        data(0),
        data(0),
        opcode(&sim, "ADDI"),
        data(0),
        data(1),
    ];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Scalar(data(9));

    sim.tick().unwrap();
    sim.tick().unwrap();

    assert_eq!(
        sim.organism(id).unwrap().drs[0],
        RegisterValue::Scalar(data(10))
    );
}

#[test]
fn ordered_comparison_skips_on_false() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // LTI DR0 5 with DR0 = 9: predicate false, increment skipped.
    let program = [
        opcode(&sim, "LTI"),
        data(0),
        data(5),
        opcode(&sim, "ADDI"),
        data(0),
        data(1),
    ];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Scalar(data(9));

    sim.tick().unwrap();
    sim.tick().unwrap();

    assert_eq!(
        sim.organism(id).unwrap().drs[0],
        RegisterValue::Scalar(data(9))
    );
}
