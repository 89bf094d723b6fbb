// SPDX-License-Identifier: Apache-2.0
//! World-generation plugins driven directly through their hooks: seeding
//! idempotence, substitution clamping, deletion extents, duplication
//! ownership, point-mutation placement discipline, and decay.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use vivarium_core::isa::IsaTable;
use vivarium_core::molecule::{self, MoleculeKind};
use vivarium_core::plugins::{
    CatalogueWeight, DecayMode, DecayOnDeath, DecayOnDeathConfig, GeneDeletionConfig,
    GeneDeletionPlugin, GeneDuplicationConfig, GeneDuplicationPlugin, GeneSubstitutionConfig,
    GeneSubstitutionPlugin, PointMutationConfig, PointMutationPlugin, SeedEnergyConfig,
    SeedEnergyCreator, WorldCtx, WorldPlugin,
};
use vivarium_core::{Environment, LabelIndex, Organism, Prng, SimulationConfig};

struct World {
    env: Environment,
    prng: Prng,
    labels: LabelIndex,
    isa: IsaTable,
    config: SimulationConfig,
}

impl World {
    fn new(shape: &[i32], seed: u64) -> Self {
        Self {
            env: Environment::new(shape, true).unwrap(),
            prng: Prng::from_seed_u64(seed),
            labels: LabelIndex::new(),
            isa: IsaTable::new().unwrap(),
            config: SimulationConfig::default(),
        }
    }

    fn ctx(&mut self, tick: u64) -> WorldCtx<'_> {
        WorldCtx {
            env: &mut self.env,
            prng: &mut self.prng,
            labels: &mut self.labels,
            isa: &self.isa,
            config: &self.config,
            tick,
        }
    }

    fn child(&self, id: u32, pos: &[i32], dv: &[i32]) -> Organism {
        Organism::create(id, None, pos.to_vec(), dv.to_vec(), 100, 0, &self.config)
    }

    fn put(&mut self, coord: &[i32], word: u32, owner: u32) {
        self.env
            .set_molecule_with_owner(word, owner, coord)
            .unwrap();
    }

    fn word_at(&self, coord: &[i32]) -> u32 {
        self.env.molecule_at(coord).unwrap()
    }

    fn count_energy(&self) -> usize {
        (0..self.env.total_cells())
            .filter(|&flat| {
                let (word, _) = self.env.cell(flat).unwrap();
                molecule::kind_of(word) == Some(MoleculeKind::Energy)
            })
            .count()
    }
}

#[test]
fn seed_energy_tops_up_to_the_target_and_never_beyond() {
    let mut world = World::new(&[20, 20], 5);
    let mut plugin = SeedEnergyCreator::new(SeedEnergyConfig {
        percentage: 0.1,
        amount: 100,
        amount_variance: 0.0,
    });
    // A pre-existing molecule must survive seeding.
    world.put(&[0, 0], molecule::data(7), 0);

    let mut ctx = world.ctx(0);
    plugin.on_tick_start(&mut ctx).unwrap();
    let first = world.count_energy();
    assert!(first > 0, "seeding must place some energy");
    assert!(first <= 40, "target is percentage * total_cells");

    let mut ctx = world.ctx(0);
    plugin.on_tick_start(&mut ctx).unwrap();
    let second = world.count_energy();
    assert!(second >= first);
    assert!(second <= 40, "idempotent: never exceeds the target");

    assert_eq!(world.word_at(&[0, 0]), molecule::data(7));
}

#[test]
fn seed_energy_only_runs_at_tick_zero() {
    let mut world = World::new(&[20, 20], 5);
    let mut plugin = SeedEnergyCreator::new(SeedEnergyConfig::default());
    let mut ctx = world.ctx(3);
    plugin.on_tick_start(&mut ctx).unwrap();
    assert_eq!(world.count_energy(), 0);
}

#[test]
fn seeded_values_track_the_configured_amount_without_variance() {
    let mut world = World::new(&[20, 20], 9);
    let mut plugin = SeedEnergyCreator::new(SeedEnergyConfig {
        percentage: 0.1,
        amount: 100,
        amount_variance: 0.0,
    });
    let mut ctx = world.ctx(0);
    plugin.on_tick_start(&mut ctx).unwrap();
    for flat in 0..world.env.total_cells() {
        let (word, _) = world.env.cell(flat).unwrap();
        if molecule::kind_of(word) == Some(MoleculeKind::Energy) {
            assert_eq!(molecule::to_scalar(word), 100);
        }
    }
}

#[test]
fn substitution_never_leaves_the_register_bank() {
    let config = GeneSubstitutionConfig {
        code_weight: 0.0,
        data_weight: 0.0,
        register_weight: 1.0,
        label_weight: 0.0,
        labelref_weight: 0.0,
        ..GeneSubstitutionConfig::default()
    };
    for seed in 0..20 {
        let mut world = World::new(&[10], seed);
        let child = world.child(1, &[0], &[1]);
        // Start at the top edge of the DR bank (size 8 → ids 0..=7).
        world.put(&[4], molecule::pack(MoleculeKind::Register, 7, 0), 1);
        let mut plugin = GeneSubstitutionPlugin::new(config);
        let mut ctx = world.ctx(1);
        plugin.on_birth(&child, &mut ctx).unwrap();

        let raw = molecule::raw_value(world.word_at(&[4]));
        assert!(raw <= 7, "register id {raw} escaped the DR bank");
    }
}

#[test]
fn substitution_flips_exactly_one_label_bit() {
    let config = GeneSubstitutionConfig {
        code_weight: 0.0,
        data_weight: 0.0,
        register_weight: 0.0,
        label_weight: 1.0,
        labelref_weight: 0.0,
        ..GeneSubstitutionConfig::default()
    };
    let mut world = World::new(&[10], 3);
    let child = world.child(1, &[0], &[1]);
    let old = 0x55555u32;
    world.put(&[4], molecule::pack(MoleculeKind::Label, 0x55555, 0), 1);
    let mut plugin = GeneSubstitutionPlugin::new(config);
    let mut ctx = world.ctx(1);
    plugin.on_birth(&child, &mut ctx).unwrap();

    let new = molecule::raw_value(world.word_at(&[4]));
    assert_eq!((old ^ new).count_ones(), 1);
}

#[test]
fn substitution_perturbs_data_within_the_raw_value_range() {
    let config = GeneSubstitutionConfig {
        code_weight: 0.0,
        data_weight: 1.0,
        register_weight: 0.0,
        label_weight: 0.0,
        labelref_weight: 0.0,
        exponent: 0.5,
        ..GeneSubstitutionConfig::default()
    };
    for seed in 0..10 {
        let mut world = World::new(&[10], 100 + seed);
        let child = world.child(1, &[0], &[1]);
        world.put(&[4], molecule::data(3), 1);
        let mut plugin = GeneSubstitutionPlugin::new(config);
        let mut ctx = world.ctx(1);
        plugin.on_birth(&child, &mut ctx).unwrap();

        let word = world.word_at(&[4]);
        assert_eq!(molecule::kind_of(word), Some(MoleculeKind::Data));
        let new = molecule::raw_value(word);
        assert!(new == 1 || new == 5, "|3|^0.5 rounds to a delta of 2: {new}");
    }
}

#[test]
fn deletion_clears_the_block_and_stops_at_foreign_cells() {
    let mut world = World::new(&[20], 2);
    let child = world.child(1, &[2], &[1]);
    world.put(&[2], molecule::pack(MoleculeKind::Label, 0x9, 0), 1);
    world.put(&[3], molecule::data(1), 1);
    world.put(&[4], molecule::data(2), 1);
    world.put(&[5], molecule::data(3), 2); // foreign
    world.put(&[6], molecule::data(4), 1);

    let mut plugin = GeneDeletionPlugin::new(GeneDeletionConfig::default());
    let mut ctx = world.ctx(1);
    plugin.on_birth(&child, &mut ctx).unwrap();

    for x in [2, 3, 4] {
        let flat = world.env.coord_to_flat(&[x]).unwrap();
        let (word, owner) = world.env.cell(flat).unwrap();
        assert!(molecule::is_empty(word), "cell {x} must be cleared");
        assert_eq!(owner, 0, "cell {x} must be orphaned");
    }
    assert_eq!(world.word_at(&[5]), molecule::data(3));
    assert_eq!(world.env.owner_at(&[5]).unwrap(), 2);
    assert_eq!(world.word_at(&[6]), molecule::data(4));
    assert_eq!(world.env.owner_at(&[6]).unwrap(), 1);
}

#[test]
fn duplication_copies_the_block_onto_another_line_with_child_ownership() {
    let mut world = World::new(&[10, 10], 4);
    let child = world.child(1, &[0, 0], &[1, 0]);
    let label_word = molecule::pack(MoleculeKind::Label, 0x3, 0);
    world.put(&[0, 0], label_word, 1);
    world.put(&[1, 0], molecule::data(11), 1);
    world.put(&[2, 0], molecule::data(22), 1);

    let mut plugin = GeneDuplicationPlugin::new(GeneDuplicationConfig { min_nop_size: 3 });
    let mut ctx = world.ctx(1);
    plugin.on_birth(&child, &mut ctx).unwrap();

    // The copy lands on a different scan line (y != 0) and belongs to the
    // child.
    let mut copies = 0;
    for flat in 0..world.env.total_cells() {
        let coord = world.env.flat_to_coord(flat);
        if coord[1] == 0 {
            continue;
        }
        let (word, owner) = world.env.cell(flat).unwrap();
        if word == label_word {
            assert_eq!(owner, 1);
            copies += 1;
        }
    }
    assert_eq!(copies, 1, "exactly one copied block expected");
}

#[test]
fn point_mutation_stays_inside_the_structural_interior() {
    let mut world = World::new(&[40], 6);
    let child = world.child(1, &[5], &[1]);
    let wall = molecule::pack(MoleculeKind::Structure, 0, 0);
    world.put(&[0], wall, 1);
    world.put(&[30], wall, 1);
    world.put(&[5], molecule::pack(MoleculeKind::Code, 1, 0), 1);

    let mut plugin = PointMutationPlugin::new(PointMutationConfig {
        rate: 1.0,
        catalogue: vec![CatalogueWeight {
            name: "NOP".to_owned(),
            weight: 1.0,
        }],
        ..PointMutationConfig::default()
    });
    let nop = world.isa.opcode_by_name("NOP").unwrap();
    let mut ctx = world.ctx(1);
    plugin.on_birth(&child, &mut ctx).unwrap();

    let mut inserted = Vec::new();
    for flat in 0..world.env.total_cells() {
        if flat == 5 || flat == 0 || flat == 30 {
            continue;
        }
        let (word, owner) = world.env.cell(flat).unwrap();
        if owner == 1 && !molecule::is_empty(word) {
            inserted.push((flat, word));
        }
    }
    assert_eq!(inserted.len(), 1, "one complete instruction inserted");
    let (flat, word) = inserted[0];
    assert!((1..30).contains(&flat), "insertion must stay interior");
    assert_eq!(molecule::raw_value(word), u32::from(nop));
    // The pre-existing owned cell was not overwritten.
    assert_eq!(world.word_at(&[5]), molecule::pack(MoleculeKind::Code, 1, 0));
}

#[test]
fn decay_distributes_remaining_energy_across_owned_cells() {
    let mut world = World::new(&[10], 8);
    let mut organism = world.child(1, &[0], &[1]);
    organism.er = 300;
    for x in [1, 2, 3] {
        world.put(&[x], molecule::data(9), 1);
    }
    world.put(&[5], molecule::data(9), 2);

    let mut plugin = DecayOnDeath::new(DecayOnDeathConfig {
        mode: DecayMode::Energy { fraction: 1.0 },
    });
    let mut ctx = world.ctx(9);
    plugin.on_death(&organism, &mut ctx).unwrap();

    for x in [1, 2, 3] {
        assert_eq!(world.word_at(&[x]), molecule::energy(100));
        assert_eq!(world.env.owner_at(&[x]).unwrap(), 0);
    }
    // Another organism's cell is untouched.
    assert_eq!(world.word_at(&[5]), molecule::data(9));
    assert_eq!(world.env.owner_at(&[5]).unwrap(), 2);
}

#[test]
fn decay_clear_mode_blanks_the_remains() {
    let mut world = World::new(&[10], 8);
    let organism = world.child(1, &[0], &[1]);
    world.put(&[4], molecule::data(9), 1);

    let mut plugin = DecayOnDeath::new(DecayOnDeathConfig {
        mode: DecayMode::Clear,
    });
    let mut ctx = world.ctx(9);
    plugin.on_death(&organism, &mut ctx).unwrap();

    let (word, owner) = world.env.cell(world.env.coord_to_flat(&[4]).unwrap()).unwrap();
    assert!(molecule::is_empty(word));
    assert_eq!(owner, 0);
}
