use crate::config::SupplyConfig;
use crate::error::{ConfigError, LedgerError};

/// Fixed-point scale for the step rate (parts per million). Required points
/// are derived in integers so multipliers like 1.15 never round up an extra
/// point through float drift.
const RATE_SCALE: u128 = 1_000_000;

/// Result of converting a points submission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conversion {
    pub earned: u64,
    pub required_points: u64,
    pub multiplier: f64,
}

/// Pure points -> STR conversion under the configured difficulty curve and
/// supply cap. Holds no state besides the constants.
#[derive(Clone, Debug)]
pub struct ConversionEngine {
    cfg: SupplyConfig,
    step_rate_ppm: u128,
}

impl ConversionEngine {
    pub fn new(cfg: SupplyConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let step_rate_ppm = (cfg.difficulty_step_rate * RATE_SCALE as f64).round() as u128;
        Ok(Self { cfg, step_rate_ppm })
    }

    pub fn config(&self) -> &SupplyConfig {
        &self.cfg
    }

    pub fn total_supply(&self) -> u64 {
        self.cfg.total_supply
    }

    /// Completed difficulty steps past the start threshold.
    fn difficulty_steps(&self, total_distributed: u64) -> u64 {
        if total_distributed <= self.cfg.difficulty_start_threshold {
            return 0;
        }
        (total_distributed - self.cfg.difficulty_start_threshold) / self.cfg.difficulty_step_amount
    }

    /// Multiplier in parts per million, 1.0 == RATE_SCALE.
    fn multiplier_ppm(&self, total_distributed: u64) -> u128 {
        let steps = self.difficulty_steps(total_distributed) as u128;
        RATE_SCALE.saturating_add(steps.saturating_mul(self.step_rate_ppm))
    }

    /// 1 up to the start threshold, then `1 + steps * rate`.
    pub fn difficulty_multiplier(&self, total_distributed: u64) -> f64 {
        self.multiplier_ppm(total_distributed) as f64 / RATE_SCALE as f64
    }

    /// Points needed for one STR at the current difficulty, rounded up.
    pub fn required_points(&self, total_distributed: u64) -> u64 {
        let scaled = (self.cfg.base_points_per_unit as u128)
            .saturating_mul(self.multiplier_ppm(total_distributed));
        let required = scaled.div_ceil(RATE_SCALE);
        u64::try_from(required).unwrap_or(u64::MAX)
    }

    /// Conversion for a whole number of points. Earnable units are floored and
    /// clamped to what is left of the supply.
    pub fn convert_units(&self, points: u64, total_distributed: u64) -> Conversion {
        let required_points = self.required_points(total_distributed);
        let raw_earnable = points / required_points;
        let remaining = self.cfg.total_supply.saturating_sub(total_distributed);
        Conversion {
            earned: raw_earnable.min(remaining),
            required_points,
            multiplier: self.difficulty_multiplier(total_distributed),
        }
    }

    /// Conversion for a client-supplied points value. Fractions are dropped,
    /// which cannot change the earned amount since required points are whole.
    pub fn convert(&self, points: f64, total_distributed: u64) -> Result<Conversion, LedgerError> {
        if !points.is_finite() {
            return Err(LedgerError::invalid("points must be a finite number"));
        }
        if points < 0.0 {
            return Err(LedgerError::invalid("points must not be negative"));
        }
        Ok(self.convert_units(points.floor() as u64, total_distributed))
    }
}
