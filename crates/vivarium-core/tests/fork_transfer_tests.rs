// SPDX-License-Identifier: Apache-2.0
//! FORK: endowment accounting, child creation, and marker-filtered ownership
//! transfer.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{data, install, opcode, sim_2d};
use vivarium_core::molecule::{self, MoleculeKind};
use vivarium_core::{FailureReason, RegisterValue};

#[test]
fn fork_spawns_a_child_and_transfers_marked_cells() {
    let mut sim = sim_2d();
    let parent = sim.spawn(&[5, 5], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "FORK"), data(0), data(1), data(2)];
    install(&mut sim, &[5, 5], parent, &program);
    {
        let org = sim.organism_mut(parent).unwrap();
        org.mr = 3;
        org.drs[0] = RegisterValue::Vector(vec![0, 3]); // delta
        org.drs[1] = RegisterValue::Scalar(data(100)); // endowment
        org.drs[2] = RegisterValue::Vector(vec![1, 0]); // child DV
    }
    // A and B carry the parent's marker; C carries a different one.
    let a = molecule::pack(MoleculeKind::Data, 1, 3);
    let b = molecule::pack(MoleculeKind::Data, 2, 3);
    let c = molecule::pack(MoleculeKind::Data, 3, 5);
    sim.env_mut().set_molecule_with_owner(a, parent, &[0, 10]).unwrap();
    sim.env_mut().set_molecule_with_owner(b, parent, &[0, 11]).unwrap();
    sim.env_mut().set_molecule_with_owner(c, parent, &[0, 12]).unwrap();

    sim.tick().unwrap();

    assert_eq!(sim.population(), 2);
    let child = sim
        .organisms()
        .find(|o| o.parent_id == Some(parent))
        .unwrap();
    assert_eq!(child.energy, 100);
    assert_eq!(child.ip, vec![5, 8], "child placed at IP + delta");
    assert_eq!(child.dv, vec![1, 0]);

    // A and B moved to the child with markers reset; C is untouched.
    assert_eq!(sim.env().owner_at(&[0, 10]).unwrap(), child.id);
    assert_eq!(sim.env().owner_at(&[0, 11]).unwrap(), child.id);
    assert_eq!(molecule::marker_of(sim.env().molecule_at(&[0, 10]).unwrap()), 0);
    assert_eq!(molecule::marker_of(sim.env().molecule_at(&[0, 11]).unwrap()), 0);
    assert_eq!(sim.env().owner_at(&[0, 12]).unwrap(), parent);
    assert_eq!(molecule::marker_of(sim.env().molecule_at(&[0, 12]).unwrap()), 5);

    // Parent paid the endowment plus the instruction's base cost.
    assert_eq!(sim.organism(parent).unwrap().er, 899);
}

#[test]
fn fork_fails_without_sufficient_energy() {
    let mut sim = sim_2d();
    let parent = sim.spawn(&[5, 5], &[1, 0], 50).unwrap();
    let program = [opcode(&sim, "FORK"), data(0), data(1), data(2)];
    install(&mut sim, &[5, 5], parent, &program);
    {
        let org = sim.organism_mut(parent).unwrap();
        org.drs[0] = RegisterValue::Vector(vec![0, 3]);
        org.drs[1] = RegisterValue::Scalar(data(100));
        org.drs[2] = RegisterValue::Vector(vec![1, 0]);
    }

    sim.tick().unwrap();

    assert_eq!(sim.population(), 1, "no child on failed fork");
    let org = sim.organism(parent).unwrap();
    assert!(matches!(
        org.failure,
        Some(FailureReason::InsufficientEnergy { .. })
    ));
}

#[test]
fn fork_requires_a_unit_child_dv() {
    let mut sim = sim_2d();
    let parent = sim.spawn(&[5, 5], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "FORK"), data(0), data(1), data(2)];
    install(&mut sim, &[5, 5], parent, &program);
    {
        let org = sim.organism_mut(parent).unwrap();
        org.drs[0] = RegisterValue::Vector(vec![0, 3]);
        org.drs[1] = RegisterValue::Scalar(data(100));
        org.drs[2] = RegisterValue::Vector(vec![1, 1]);
    }

    sim.tick().unwrap();

    assert_eq!(sim.population(), 1);
    assert_eq!(
        sim.organism(parent).unwrap().failure,
        Some(FailureReason::NotUnitVector)
    );
}
