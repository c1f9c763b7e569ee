use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Economic constants of the STR supply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    /// Hard cap on everything ever credited.
    pub total_supply: u64,
    /// Distributed amount up to which the multiplier stays at 1.
    pub difficulty_start_threshold: u64,
    /// Distributed amount per difficulty step past the threshold.
    pub difficulty_step_amount: u64,
    /// Fractional multiplier increase per step (0.05 = 5%).
    pub difficulty_step_rate: f64,
    /// Points for one STR at multiplier 1.
    pub base_points_per_unit: u64,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            total_supply: 21_000_000,
            difficulty_start_threshold: 500_000,
            difficulty_step_amount: 100_000,
            difficulty_step_rate: 0.05,
            base_points_per_unit: 100,
        }
    }
}

impl SupplyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_supply == 0 {
            return Err(ConfigError {
                field: "total_supply",
                reason: "must be greater than zero",
            });
        }
        if self.difficulty_step_amount == 0 {
            return Err(ConfigError {
                field: "difficulty_step_amount",
                reason: "must be greater than zero",
            });
        }
        if self.base_points_per_unit == 0 {
            return Err(ConfigError {
                field: "base_points_per_unit",
                reason: "must be greater than zero",
            });
        }
        if !self.difficulty_step_rate.is_finite() || self.difficulty_step_rate < 0.0 {
            return Err(ConfigError {
                field: "difficulty_step_rate",
                reason: "must be a finite non-negative number",
            });
        }
        Ok(())
    }
}
