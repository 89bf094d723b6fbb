// SPDX-License-Identifier: Apache-2.0
//! Label resolution, jumps, and the CALL/RET binding protocol.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{data, install, label, labelref, opcode, sim_2d};
use vivarium_core::molecule::{self, MoleculeKind};
use vivarium_core::{FailureReason, RegisterValue, DR_BASE, FPR_BASE};

#[test]
fn jmpi_resolves_the_nearest_owned_label() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "JMPI"), labelref(0x123)];
    install(&mut sim, &[0, 0], id, &program);
    sim.env_mut()
        .set_molecule_with_owner(label(0x123), id, &[10, 0])
        .unwrap();

    sim.tick().unwrap();

    assert_eq!(sim.organism(id).unwrap().ip, vec![10, 0]);
}

#[test]
fn jmpi_to_a_missing_label_fails() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "JMPI"), labelref(0x321)];
    install(&mut sim, &[0, 0], id, &program);

    sim.tick().unwrap();

    assert_eq!(
        sim.organism(id).unwrap().failure,
        Some(FailureReason::LabelNotFound(0x321))
    );
}

#[test]
fn labels_resolve_through_the_parent_lineage() {
    let mut sim = sim_2d();
    let parent = sim.spawn(&[0, 5], &[1, 0], 1000).unwrap();
    let child = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    sim.organism_mut(child).unwrap().parent_id = Some(parent);
    // Only the parent owns the label.
    sim.env_mut()
        .set_molecule_with_owner(label(0x77), parent, &[12, 0])
        .unwrap();
    let program = [opcode(&sim, "JMPI"), labelref(0x77)];
    install(&mut sim, &[0, 0], child, &program);

    sim.tick().unwrap();

    assert_eq!(sim.organism(child).unwrap().ip, vec![12, 0]);
}

#[test]
fn jmpr_jumps_relative_to_the_ip() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[5, 5], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "JMPR"), data(0)];
    install(&mut sim, &[5, 5], id, &program);
    sim.organism_mut(id).unwrap().drs[0] = RegisterValue::Vector(vec![-3, 4]);

    sim.tick().unwrap();

    assert_eq!(sim.organism(id).unwrap().ip, vec![2, 9]);
}

#[test]
fn call_binds_formals_and_ret_writes_them_back() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    // Caller: CALL .proc with DR0 bound to FPR0.
    let program = [opcode(&sim, "CALL"), labelref(0x44)];
    install(&mut sim, &[0, 0], id, &program);
    // Procedure at the label: ADDI FPR0 1 ; RET.
    let fpr0 = i32::try_from(FPR_BASE).unwrap();
    let procedure = [
        label(0x44),
        opcode(&sim, "ADDI"),
        data(fpr0),
        data(1),
        opcode(&sim, "RET"),
    ];
    install(&mut sim, &[10, 0], id, &procedure);
    {
        let org = sim.organism_mut(id).unwrap();
        org.drs[0] = RegisterValue::Scalar(data(41));
        // The caller publishes the binding: a REGISTER molecule naming DR0.
        let dr0 = i32::try_from(DR_BASE).unwrap();
        org.data_stack.push(RegisterValue::Scalar(molecule::pack(
            MoleculeKind::Register,
            dr0,
            0,
        )));
    }

    // CALL.
    sim.tick().unwrap();
    {
        let org = sim.organism(id).unwrap();
        assert_eq!(org.ip, vec![10, 0], "IP lands on the label");
        assert_eq!(org.call_stack.len(), 1);
        assert_eq!(org.fprs[0], RegisterValue::Scalar(data(41)));
        assert!(org.data_stack.is_empty(), "binding reference was consumed");
    }

    // The label cell itself is not CODE; it fails and the IP moves on.
    sim.tick().unwrap();
    assert_eq!(
        sim.organism(id).unwrap().failure,
        Some(FailureReason::NotCode)
    );

    // ADDI FPR0 1.
    sim.tick().unwrap();
    assert_eq!(
        sim.organism(id).unwrap().fprs[0],
        RegisterValue::Scalar(data(42))
    );

    // RET: write-back through the binding, frame popped, IP restored.
    sim.tick().unwrap();
    let org = sim.organism(id).unwrap();
    assert_eq!(org.drs[0], RegisterValue::Scalar(data(42)));
    assert!(org.call_stack.is_empty());
    assert_eq!(org.ip, vec![2, 0], "resumes past the call site");
}

#[test]
fn ret_with_an_empty_call_stack_fails() {
    let mut sim = sim_2d();
    let id = sim.spawn(&[0, 0], &[1, 0], 1000).unwrap();
    let program = [opcode(&sim, "RET")];
    install(&mut sim, &[0, 0], id, &program);

    sim.tick().unwrap();

    assert_eq!(
        sim.organism(id).unwrap().failure,
        Some(FailureReason::CallStackUnderflow)
    );
}
