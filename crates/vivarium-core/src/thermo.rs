// SPDX-License-Identifier: Apache-2.0
//! Thermodynamic cost policy.
//!
//! Maps opcodes to `(energy, entropy)` costs with layered overrides:
//! per-instruction beats per-family beats default. The environment-I/O
//! per-cell surcharge is a policy value too — the engine multiplies it by the
//! opcode's declared touched-cell count, so no call site carries a magic
//! number. POKE's dissipation (entropy decreases by the written scalar) is
//! reported by the handler and applied by the engine on top of the base
//! entropy cost.

use rustc_hash::FxHashMap;

use crate::config::{CostConfig, ThermoConfig};
use crate::error::SimError;
use crate::isa::{Family, IsaTable, OpcodeInfo};

const DEFAULT_CELL_SURCHARGE: i64 = 5;

/// Resolved cost pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cost {
    /// Energy debited from ER.
    pub energy: i64,
    /// Entropy added to SR.
    pub entropy: i64,
}

impl From<CostConfig> for Cost {
    fn from(c: CostConfig) -> Self {
        Self {
            energy: c.base_energy,
            entropy: c.base_entropy,
        }
    }
}

/// Immutable, fully resolved cost table.
#[derive(Debug, Clone)]
pub struct ThermoPolicy {
    default: Cost,
    cell_surcharge: i64,
    error_penalty: i64,
    by_family: FxHashMap<u8, Cost>,
    by_opcode: FxHashMap<u16, Cost>,
}

impl ThermoPolicy {
    /// Resolves a configuration against the instruction table.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownInstructionName`] / [`SimError::UnknownFamilyName`]
    /// when an override names something the table does not define.
    pub fn from_config(
        config: &ThermoConfig,
        error_penalty: i64,
        table: &IsaTable,
    ) -> Result<Self, SimError> {
        let mut by_family = FxHashMap::default();
        for (name, cost) in &config.families {
            let family = Family::from_name(name)
                .ok_or_else(|| SimError::UnknownFamilyName(name.clone()))?;
            by_family.insert(family as u8, Cost::from(*cost));
        }
        let mut by_opcode = FxHashMap::default();
        for (name, cost) in &config.instructions {
            let id = table
                .opcode_by_name(name)
                .ok_or_else(|| SimError::UnknownInstructionName(name.clone()))?;
            by_opcode.insert(id, Cost::from(*cost));
        }
        Ok(Self {
            default: Cost::from(config.default),
            cell_surcharge: config.cell_surcharge.unwrap_or(DEFAULT_CELL_SURCHARGE),
            error_penalty,
            by_family,
            by_opcode,
        })
    }

    /// Resolved cost for one opcode: instruction > family > default.
    pub fn cost_of(&self, info: &OpcodeInfo) -> Cost {
        if let Some(cost) = self.by_opcode.get(&info.id) {
            return *cost;
        }
        if let Some(cost) = self.by_family.get(&(info.family as u8)) {
            return *cost;
        }
        self.default
    }

    /// Extra energy per grid cell touched by environment I/O.
    pub fn cell_surcharge(&self) -> i64 {
        self.cell_surcharge
    }

    /// Energy debited when an instruction fails.
    pub fn error_penalty(&self) -> i64 {
        self.error_penalty
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ThermoConfig;

    fn table() -> IsaTable {
        IsaTable::new().unwrap()
    }

    #[test]
    fn layering_instruction_beats_family_beats_default() {
        let table = table();
        let mut config = ThermoConfig::default();
        config.families.insert(
            "ARITHMETIC".to_owned(),
            CostConfig {
                base_energy: 3,
                base_entropy: 1,
            },
        );
        config.instructions.insert(
            "ADDI".to_owned(),
            CostConfig {
                base_energy: 7,
                base_entropy: 2,
            },
        );
        let policy = ThermoPolicy::from_config(&config, 10, &table).unwrap();

        let addi = table.info_by_name("ADDI").unwrap();
        let subi = table.info_by_name("SUBI").unwrap();
        let nop = table.info_by_name("NOP").unwrap();

        assert_eq!(policy.cost_of(addi).energy, 7);
        assert_eq!(policy.cost_of(subi).energy, 3);
        assert_eq!(policy.cost_of(nop).energy, 1);
    }

    #[test]
    fn unknown_override_names_are_fatal() {
        let table = table();
        let mut config = ThermoConfig::default();
        config
            .instructions
            .insert("NOSUCH".to_owned(), CostConfig::default());
        assert!(matches!(
            ThermoPolicy::from_config(&config, 10, &table),
            Err(SimError::UnknownInstructionName(_))
        ));
    }

    #[test]
    fn surcharge_defaults_to_five_per_cell() {
        let table = table();
        let policy = ThermoPolicy::from_config(&ThermoConfig::default(), 10, &table).unwrap();
        assert_eq!(policy.cell_surcharge(), 5);
    }
}
