// SPDX-License-Identifier: Apache-2.0
//! Simulation configuration.
//!
//! Plain structs consumed by the simulation builder. File formats and CLI
//! parsing live outside the core; with the `serde` feature enabled every
//! struct here derives `Serialize`/`Deserialize` so hosts can load them from
//! whatever format they prefer.

use std::collections::BTreeMap;

use crate::error::SimError;
use crate::organism::BANK_STRIDE;

/// Per-instruction cost pair used at every thermodynamic layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostConfig {
    /// Energy debited from ER when the instruction completes.
    pub base_energy: i64,
    /// Entropy added to SR when the instruction completes.
    pub base_entropy: i64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            base_energy: 1,
            base_entropy: 0,
        }
    }
}

/// Layered thermodynamic cost table.
///
/// Resolution order: per-instruction override, then per-family override, then
/// the default. The environment-I/O per-cell surcharge is part of the policy
/// — call sites never hard-code it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThermoConfig {
    /// Fallback cost when no override applies.
    pub default: CostConfig,
    /// Extra energy per grid cell touched by PEEK/POKE/SCAN/PPK.
    pub cell_surcharge: Option<i64>,
    /// Per-family overrides, keyed by family display name (e.g. `"ARITHMETIC"`).
    pub families: BTreeMap<String, CostConfig>,
    /// Per-instruction overrides, keyed by mnemonic (e.g. `"ADDI"`).
    pub instructions: BTreeMap<String, CostConfig>,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Clamp for the energy register.
    pub max_energy: i64,
    /// Clamp for the entropy register.
    pub max_entropy: i64,
    /// Energy debited when an instruction fails.
    pub error_penalty_cost: i64,
    /// Data-register bank size.
    pub num_dr: u32,
    /// Procedure-register bank size.
    pub num_pr: u32,
    /// Formal-parameter-register bank size.
    pub num_fpr: u32,
    /// Location-register bank size.
    pub num_lr: u32,
    /// Number of data pointers.
    pub num_dps: u32,
    /// Whether coordinate arithmetic wraps.
    pub toroidal: bool,
    /// Data-stack depth limit.
    pub max_data_stack: usize,
    /// Call-stack depth limit.
    pub max_call_stack: usize,
    /// Location-stack depth limit.
    pub max_location_stack: usize,
    /// Thermodynamic cost layers.
    pub thermodynamics: ThermoConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_energy: 32767,
            max_entropy: 8191,
            error_penalty_cost: 10,
            num_dr: 8,
            num_pr: 4,
            num_fpr: 4,
            num_lr: 4,
            num_dps: 2,
            toroidal: true,
            max_data_stack: 128,
            max_call_stack: 64,
            max_location_stack: 64,
            thermodynamics: ThermoConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validates bank sizes against the id windows they must fit in.
    ///
    /// # Errors
    ///
    /// [`SimError::EmptyBank`] or [`SimError::BankTooLarge`] when a bank size
    /// is zero or exceeds [`BANK_STRIDE`].
    pub fn validate(&self) -> Result<(), SimError> {
        for (bank, size) in [
            ("num_dr", self.num_dr),
            ("num_pr", self.num_pr),
            ("num_fpr", self.num_fpr),
            ("num_lr", self.num_lr),
            ("num_dps", self.num_dps),
        ] {
            if size == 0 {
                return Err(SimError::EmptyBank(bank));
            }
            if size > BANK_STRIDE {
                return Err(SimError::BankTooLarge {
                    bank,
                    size,
                    stride: BANK_STRIDE,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SimulationConfig::default();
        assert_eq!(config.max_energy, 32767);
        assert_eq!(config.max_entropy, 8191);
        assert_eq!(config.error_penalty_cost, 10);
        assert!(config.toroidal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_banks_are_rejected() {
        let config = SimulationConfig {
            num_dr: BANK_STRIDE + 1,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::BankTooLarge { bank: "num_dr", .. })
        ));
    }

    #[test]
    fn empty_banks_are_rejected() {
        let config = SimulationConfig {
            num_lr: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::EmptyBank("num_lr"))));
    }
}
