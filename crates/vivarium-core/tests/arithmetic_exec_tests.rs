// SPDX-License-Identifier: Apache-2.0
//! Arithmetic execution: immediate variants, stack operand direction, and
//! the divide-by-zero failure contract.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{data, install, opcode, sim_2d};
use vivarium_core::{FailureReason, RegisterValue, DR_BASE};

#[test]
fn addi_adds_an_immediate_into_the_register() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "ADDI"), data(0), data(5)];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Scalar(data(10));

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.drs[0], RegisterValue::Scalar(data(15)));
    // ER decreases by exactly ADDI's base cost.
    assert_eq!(org.er, 999);
    assert_eq!(org.failure, None);
    assert_eq!(org.ip, vec![3, 0]);
}

#[test]
fn subs_computes_second_minus_top() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "SUBS")];
    install(&mut sim, &[0, 0], id, &program);
    {
        let org = sim.organism_mut(id).unwrap();
        org.data_stack.push(RegisterValue::Scalar(data(10))); // op2
        org.data_stack.push(RegisterValue::Scalar(data(3))); // op1 (top)
    }

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.data_stack, vec![RegisterValue::Scalar(data(7))]);
}

#[test]
fn vector_addition_is_component_wise() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "ADDR"), data(0), data(1)];
    install(&mut sim, &[0, 0], id, &program);
    {
        let org = sim.organism_mut(id).unwrap();
        org.drs[0] = RegisterValue::Vector(vec![1, 2]);
        org.drs[1] = RegisterValue::Vector(vec![3, -4]);
    }

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.drs[0], RegisterValue::Vector(vec![4, -2]));
}

#[test]
fn divide_by_zero_fails_and_leaves_the_target_unchanged() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "DIVI"), data(0), data(0)];
    install(&mut sim, &[0, 0], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Scalar(data(42));

    sim.tick().unwrap();

    let org = sim.organism(id).unwrap();
    assert_eq!(org.failure, Some(FailureReason::DivisionByZero));
    assert_eq!(org.drs[0], RegisterValue::Scalar(data(42)));
    // Failure debits the error penalty, not the instruction cost.
    assert_eq!(org.er, 990);
    // IP still advances past the full instruction.
    assert_eq!(org.ip, vec![3, 0]);
}

#[test]
fn register_ids_resolve_across_banks() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // ADDR PR0 DR0 : procedure register accumulates from a data register.
    let pr0 = i32::try_from(vivarium_core::PR_BASE).unwrap();
    let dr0 = i32::try_from(DR_BASE).unwrap();
    let program = [opcode(&sim, "ADDR"), data(pr0), data(dr0)];
    install(&mut sim, &[0, 0], id, &program);
    {
        let org = sim.organism_mut(id).unwrap();
        org.prs[0] = RegisterValue::Scalar(data(100));
        org.drs[0] = RegisterValue::Scalar(data(11));
    }

    sim.tick().unwrap();

    assert_eq!(
        sim.organism(id).unwrap().prs[0],
        RegisterValue::Scalar(data(111))
    );
}
