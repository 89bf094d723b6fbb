// SPDX-License-Identifier: Apache-2.0
//! Simulation: the tick-synchronous scheduler and the external read surface.
//!
//! Scheduling model: single-threaded, cooperative within a tick. One `tick()`
//! advances every living organism exactly once, in insertion order (ids are
//! assigned monotonically, so insertion order and id order agree). Later
//! organisms see earlier organisms' writes immediately. After the organism
//! loop: death handlers fire, then newborn children are admitted and every
//! post-birth plugin runs over them in registration order. Only `Fatal`
//! errors escape `tick()`; plugin errors are reported to telemetry and the
//! tick continues.

use std::sync::Arc;

use bytes::{BufMut as _, Bytes, BytesMut};
use rustc_hash::FxHashMap;

use crate::config::SimulationConfig;
use crate::coords;
use crate::env::Environment;
use crate::error::SimError;
use crate::exec;
use crate::isa::IsaTable;
use crate::label_index::LabelIndex;
use crate::organism::Organism;
use crate::persist;
use crate::plugins::{WorldCtx, WorldPlugin};
use crate::prng::Prng;
use crate::thermo::ThermoPolicy;
use vivarium_port::{
    CellDelta, LabelResolver, NullTelemetrySink, OrganismSnapshot, TelemetrySink, TickSummary,
};

struct PluginSlot {
    plugin: Box<dyn WorldPlugin>,
    prng: Prng,
}

/// Fluent builder for [`Simulation`].
///
/// Defaults: seed 0, default configuration, null telemetry, no plugins.
pub struct SimulationBuilder {
    shape: Vec<i32>,
    seed: u64,
    config: SimulationConfig,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    plugins: Vec<Box<dyn WorldPlugin>>,
}

impl SimulationBuilder {
    /// Starts a builder for a grid with the given extents.
    pub fn new(shape: &[i32]) -> Self {
        Self {
            shape: shape.to_vec(),
            seed: 0,
            config: SimulationConfig::default(),
            telemetry: None,
            plugins: Vec::new(),
        }
    }

    /// Sets the root PRNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the telemetry sink for observability events.
    #[must_use]
    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Registers a world-generation plugin; registration order is execution
    /// order.
    #[must_use]
    pub fn plugin(mut self, plugin: Box<dyn WorldPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Builds the simulation.
    ///
    /// # Errors
    ///
    /// Configuration validation errors, degenerate shapes, thermodynamic
    /// override resolution failures, and opcode-table integrity violations.
    pub fn build(self) -> Result<Simulation, SimError> {
        self.config.validate()?;
        let env = Environment::new(&self.shape, self.config.toroidal)?;
        let isa = IsaTable::new()?;
        let thermo = ThermoPolicy::from_config(
            &self.config.thermodynamics,
            self.config.error_penalty_cost,
            &isa,
        )?;
        let prng = Prng::from_seed_u64(self.seed);
        let plugins = self
            .plugins
            .into_iter()
            .map(|plugin| {
                let stream = prng.derive(plugin.name());
                PluginSlot {
                    plugin,
                    prng: stream,
                }
            })
            .collect();
        Ok(Simulation {
            config: self.config,
            env,
            isa,
            thermo,
            labels: LabelIndex::new(),
            prng,
            organisms: Vec::new(),
            next_id: 1,
            tick: 0,
            plugins,
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Arc::new(NullTelemetrySink)),
        })
    }
}

/// The core simulation runtime.
pub struct Simulation {
    config: SimulationConfig,
    env: Environment,
    isa: IsaTable,
    thermo: ThermoPolicy,
    labels: LabelIndex,
    prng: Prng,
    organisms: Vec<Organism>,
    next_id: u32,
    tick: u64,
    plugins: Vec<PluginSlot>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("organisms", &self.organisms.len())
            .field("shape", &self.env.shape())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Admits a new organism at `pos` facing `dv` with the given energy.
    ///
    /// This is the external seeding path (loaders, tests); organisms created
    /// here are not birth events and post-birth plugins do not run on them.
    ///
    /// # Errors
    ///
    /// [`SimError::ArityMismatch`], [`SimError::BadSpawnDirection`], or
    /// [`SimError::SpawnOutOfBounds`].
    pub fn spawn(&mut self, pos: &[i32], dv: &[i32], energy: i64) -> Result<u32, SimError> {
        if pos.len() != self.env.arity() || dv.len() != self.env.arity() {
            return Err(SimError::ArityMismatch {
                expected: self.env.arity(),
                found: pos.len(),
            });
        }
        if !coords::is_unit(dv) {
            return Err(SimError::BadSpawnDirection);
        }
        let pos = self.env.wrap(pos).ok_or(SimError::SpawnOutOfBounds)?;
        let id = self.next_id;
        self.next_id += 1;
        let organism = Organism::create(
            id,
            None,
            pos,
            dv.to_vec(),
            energy,
            self.tick,
            &self.config,
        );
        self.organisms.push(organism);
        Ok(id)
    }

    /// Writes a molecule sequence along `dv` starting at `origin`, owned by
    /// `owner`. The loader-facing genome installation path.
    ///
    /// # Errors
    ///
    /// [`SimError::SpawnOutOfBounds`] when the run leaves a bounded grid.
    pub fn write_genome(
        &mut self,
        origin: &[i32],
        dv: &[i32],
        owner: u32,
        words: &[u32],
    ) -> Result<(), SimError> {
        let mut cursor = self.env.wrap(origin).ok_or(SimError::SpawnOutOfBounds)?;
        for (i, &word) in words.iter().enumerate() {
            self.env
                .set_molecule_with_owner(word, owner, &cursor)
                .map_err(|_| SimError::SpawnOutOfBounds)?;
            if i + 1 < words.len() {
                cursor = self.env.step(&cursor, dv).ok_or(SimError::SpawnOutOfBounds)?;
            }
        }
        Ok(())
    }

    /// Advances the simulation one tick.
    ///
    /// # Errors
    ///
    /// Only `Fatal` conditions ([`SimError`]); instruction failures and
    /// plugin errors are absorbed (the latter reported to telemetry).
    pub fn tick(&mut self) -> Result<(), SimError> {
        let tick = self.tick;

        // Tick-start plugins (e.g. tick-0 energy seeding).
        for slot in &mut self.plugins {
            let mut ctx = WorldCtx {
                env: &mut self.env,
                prng: &mut slot.prng,
                labels: &mut self.labels,
                isa: &self.isa,
                config: &self.config,
                tick,
            };
            if let Err(error) = slot.plugin.on_tick_start(&mut ctx) {
                self.telemetry
                    .on_plugin_error(tick, slot.plugin.name(), &error.to_string());
            }
        }

        // Lineages resolve label references through ancestors; the chain ends
        // at the first ancestor no longer in the active set.
        let parent_of: FxHashMap<u32, Option<u32>> = self
            .organisms
            .iter()
            .map(|o| (o.id, o.parent_id))
            .collect();
        let lineages: Vec<Vec<u32>> = self
            .organisms
            .iter()
            .map(|o| {
                let mut chain = vec![o.id];
                let mut cursor = o.parent_id;
                while let Some(pid) = cursor {
                    if chain.len() > 64 || chain.contains(&pid) {
                        break;
                    }
                    chain.push(pid);
                    cursor = parent_of.get(&pid).copied().flatten();
                }
                chain
            })
            .collect();

        let alive_at_start: Vec<bool> = self.organisms.iter().map(|o| o.alive).collect();
        let mut births: Vec<Organism> = Vec::new();
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };

        // Organism loop: insertion order, ids ascending.
        for i in 0..self.organisms.len() {
            if !self.organisms[i].alive {
                continue;
            }
            if self.organisms[i].er <= 0 {
                self.organisms[i].alive = false;
                continue;
            }
            let out = exec::step_organism(
                &mut self.organisms[i],
                &mut self.env,
                &mut self.labels,
                &self.isa,
                &self.thermo,
                &self.config,
                &lineages[i],
                &mut births,
                &mut self.next_id,
                tick,
            );
            if out.executed {
                summary.executed += 1;
            }
            if out.failed {
                summary.failed += 1;
                let org = &self.organisms[i];
                if let Some(reason) = &org.failure {
                    self.telemetry
                        .on_instruction_failure(tick, org.id, &reason.to_string());
                }
            }
        }

        // Death handlers, in organism order.
        for i in 0..self.organisms.len() {
            if !alive_at_start.get(i).copied().unwrap_or(false) || self.organisms[i].alive {
                continue;
            }
            summary.deaths += 1;
            let organism = &self.organisms[i];
            for slot in &mut self.plugins {
                let mut ctx = WorldCtx {
                    env: &mut self.env,
                    prng: &mut slot.prng,
                    labels: &mut self.labels,
                    isa: &self.isa,
                    config: &self.config,
                    tick,
                };
                if let Err(error) = slot.plugin.on_death(organism, &mut ctx) {
                    self.telemetry
                        .on_plugin_error(tick, slot.plugin.name(), &error.to_string());
                }
            }
            self.telemetry.on_death(tick, organism.id);
        }

        // Births: post-birth plugins run before the child is admitted, in
        // registration order.
        for child in births {
            summary.births += 1;
            for slot in &mut self.plugins {
                let mut ctx = WorldCtx {
                    env: &mut self.env,
                    prng: &mut slot.prng,
                    labels: &mut self.labels,
                    isa: &self.isa,
                    config: &self.config,
                    tick,
                };
                if let Err(error) = slot.plugin.on_birth(&child, &mut ctx) {
                    self.telemetry
                        .on_plugin_error(tick, slot.plugin.name(), &error.to_string());
                }
            }
            self.telemetry.on_birth(tick, child.id, child.parent_id);
            self.organisms.push(child);
        }

        // Reap the dead at end of tick.
        self.organisms.retain(|o| o.alive);

        summary.alive = self.organisms.len() as u64;
        self.tick += 1;
        self.telemetry.on_tick_summary(&summary);
        Ok(())
    }

    // ── Read interface ──────────────────────────────────────────────────

    /// Completed ticks.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Snapshots of every organism in the active set.
    pub fn organisms(&self) -> impl Iterator<Item = OrganismSnapshot> + '_ {
        self.organisms.iter().map(Organism::snapshot)
    }

    /// Number of living organisms.
    pub fn population(&self) -> usize {
        self.organisms.len()
    }

    /// Grid extents.
    pub fn env_shape(&self) -> &[i32] {
        self.env.shape()
    }

    /// Whether the grid wraps.
    pub fn is_toroidal(&self) -> bool {
        self.env.is_toroidal()
    }

    /// `(molecule, owner)` at a flat index.
    pub fn get_cell(&self, flat: usize) -> Option<(u32, u32)> {
        self.env.cell(flat)
    }

    /// Cells mutated since the last change-tracking reset.
    pub fn changed_cells_since_last_reset(&self) -> impl Iterator<Item = CellDelta> + '_ {
        self.env.changed_indices().map(|index| {
            let (molecule, owner) = self.env.cell(index).unwrap_or((0, 0));
            CellDelta {
                index,
                molecule,
                owner,
            }
        })
    }

    /// Clears change tracking; the caller decides snapshot boundaries.
    pub fn reset_change_tracking(&mut self) {
        self.env.reset_change_tracking();
    }

    /// The environment grid (loader/observer access).
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Mutable grid access for world setup.
    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// The instruction table backing this simulation.
    pub fn isa(&self) -> &IsaTable {
        &self.isa
    }

    /// Borrow an organism by id.
    pub fn organism(&self, id: u32) -> Option<&Organism> {
        self.organisms.iter().find(|o| o.id == id)
    }

    /// Mutably borrow an organism by id (loader/test setup).
    pub fn organism_mut(&mut self, id: u32) -> Option<&mut Organism> {
        self.organisms.iter_mut().find(|o| o.id == id)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Serializes the full simulation state.
    ///
    /// Layout (after the sealed header): tick, next id, environment, PRNG,
    /// organism list, plugin sections. `save → load → save` is
    /// byte-identical.
    pub fn save_state(&self) -> Bytes {
        let mut payload = BytesMut::new();
        payload.put_u64_le(self.tick);
        payload.put_u32_le(self.next_id);
        self.env.save_state(&mut payload);
        let prng_state = self.prng.state();
        payload.put_u64_le(prng_state[0]);
        payload.put_u64_le(prng_state[1]);
        payload.put_u32_le(u32::try_from(self.organisms.len()).unwrap_or(0));
        for organism in &self.organisms {
            organism.save_state(&mut payload);
        }
        payload.put_u32_le(u32::try_from(self.plugins.len()).unwrap_or(0));
        for slot in &self.plugins {
            persist::put_str(&mut payload, slot.plugin.name());
            let stream = slot.prng.state();
            payload.put_u64_le(stream[0]);
            payload.put_u64_le(stream[1]);
            let state = slot.plugin.save_state();
            payload.put_u32_le(u32::try_from(state.len()).unwrap_or(0));
            payload.put_slice(&state);
        }
        persist::seal(&payload)
    }

    /// Restores the simulation from a checkpoint produced by
    /// [`Simulation::save_state`].
    ///
    /// The registered plugin set must cover every plugin section in the
    /// checkpoint (matched by name).
    ///
    /// # Errors
    ///
    /// Persistence-format errors ([`SimError::PersistMagic`],
    /// [`SimError::PersistVersion`], [`SimError::PersistDigest`],
    /// [`SimError::PersistTruncated`], [`SimError::PersistCorrupt`]) and
    /// [`SimError::UnknownPlugin`].
    pub fn load_state(&mut self, blob: &[u8]) -> Result<(), SimError> {
        let mut buf = persist::unseal(blob)?;
        let tick = persist::get_u64(&mut buf)?;
        let next_id = persist::get_u32(&mut buf)?;
        let env = Environment::load_state(&mut buf)?;
        let arity = env.arity();
        let prng = Prng::restore([persist::get_u64(&mut buf)?, persist::get_u64(&mut buf)?]);
        let organism_count = persist::get_u32(&mut buf)? as usize;
        let mut organisms = Vec::with_capacity(organism_count);
        for _ in 0..organism_count {
            organisms.push(Organism::load_state(&mut buf, arity)?);
        }
        let plugin_count = persist::get_u32(&mut buf)? as usize;
        let mut plugin_sections = Vec::with_capacity(plugin_count);
        for _ in 0..plugin_count {
            let name = persist::get_str(&mut buf)?;
            let stream = [persist::get_u64(&mut buf)?, persist::get_u64(&mut buf)?];
            let len = persist::get_u32(&mut buf)? as usize;
            let state = persist::get_bytes(&mut buf, len)?;
            plugin_sections.push((name, stream, state));
        }
        if !buf.is_empty() {
            return Err(SimError::PersistCorrupt("trailing bytes after payload"));
        }

        for (name, stream, state) in plugin_sections {
            let slot = self
                .plugins
                .iter_mut()
                .find(|slot| slot.plugin.name() == name)
                .ok_or(SimError::UnknownPlugin(name))?;
            slot.prng = Prng::restore(stream);
            slot.plugin.load_state(&state)?;
        }
        self.tick = tick;
        self.next_id = next_id;
        self.env = env;
        self.prng = prng;
        self.organisms = organisms;
        self.labels.invalidate();
        Ok(())
    }
}

impl LabelResolver for Simulation {
    fn resolve_label(&mut self, owner: u32, hash: u32, from: usize) -> Option<usize> {
        self.labels.find_target(&self.env, &[owner], hash, from)
    }
}
