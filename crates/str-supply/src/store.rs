use crate::backend::LedgerBackend;
use crate::config::SupplyConfig;
use crate::conversion::ConversionEngine;
use crate::error::{ConfigError, LedgerError};
use crate::ledger::Ledger;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Supply left, but the points do not cover one unit.
    InsufficientPoints,
    SupplyExhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClaimReceipt {
    pub player_id: String,
    pub earned: u64,
    pub new_balance: u64,
    pub required_points: u64,
    /// Multiplier the claim was converted at.
    pub multiplier: f64,
    /// Multiplier in force after the credit; differs when the claim crossed a step.
    pub multiplier_after: f64,
    pub total_distributed: u64,
    pub remaining: u64,
}

/// A claim that earned nothing. The ledger is left untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct ClaimRejection {
    pub reason: RejectReason,
    pub required_points: u64,
    pub multiplier: f64,
    pub total_distributed: u64,
    pub remaining: u64,
}

impl ClaimRejection {
    pub fn message(&self) -> String {
        match self.reason {
            RejectReason::InsufficientPoints => format!(
                "Insufficient points. Need {} points to earn 1 STR.",
                self.required_points
            ),
            RejectReason::SupplyExhausted => "Total supply exhausted.".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClaimOutcome {
    Credited(ClaimReceipt),
    Rejected(ClaimRejection),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SupplyStatus {
    pub total_supply: u64,
    pub total_distributed: u64,
    pub remaining: u64,
    pub multiplier: f64,
    pub points_per_unit_now: u64,
}

/// Claim, balance and supply operations over a persisted [`Ledger`].
///
/// Every operation runs under one gate, so a claim's load-convert-commit is
/// indivisible and readers only ever see the record before or after a claim.
pub struct LedgerStore<B> {
    backend: B,
    engine: ConversionEngine,
    gate: Mutex<()>,
}

impl<B: LedgerBackend> LedgerStore<B> {
    pub fn new(backend: B, cfg: SupplyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            backend,
            engine: ConversionEngine::new(cfg)?,
            gate: Mutex::new(()),
        })
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // The gate guards no data of its own, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_checked(&self) -> Result<Ledger, LedgerError> {
        let ledger = self.backend.load().map_err(|e| {
            error!(error = %e, "failed to load ledger");
            e
        })?;
        ledger.check_invariants(self.engine.total_supply())?;
        Ok(ledger)
    }

    /// Balance of `player_id`; 0 for players never credited.
    pub fn get_balance(&self, player_id: &str) -> Result<u64, LedgerError> {
        let _gate = self.lock();
        Ok(self.load_checked()?.balance_of(player_id))
    }

    pub fn claim(&self, player_id: &str, points: f64) -> Result<ClaimOutcome, LedgerError> {
        if player_id.trim().is_empty() {
            return Err(LedgerError::invalid("playerId is required"));
        }

        let _gate = self.lock();
        let mut ledger = self.load_checked()?;
        let conv = self.engine.convert(points, ledger.total_distributed)?;
        let total_supply = self.engine.total_supply();

        if conv.earned == 0 {
            let remaining = ledger.remaining(total_supply);
            let reason = if remaining == 0 {
                RejectReason::SupplyExhausted
            } else {
                RejectReason::InsufficientPoints
            };
            debug!(player_id, points, ?reason, required = conv.required_points, "claim rejected");
            return Ok(ClaimOutcome::Rejected(ClaimRejection {
                reason,
                required_points: conv.required_points,
                multiplier: conv.multiplier,
                total_distributed: ledger.total_distributed,
                remaining,
            }));
        }

        let new_balance = ledger.credit(player_id, conv.earned);
        if let Err(e) = self.backend.commit(&ledger) {
            error!(player_id, earned = conv.earned, error = %e, "failed to commit ledger, claim dropped");
            return Err(e.into());
        }

        info!(
            player_id,
            earned = conv.earned,
            new_balance,
            total_distributed = ledger.total_distributed,
            "claim credited"
        );
        Ok(ClaimOutcome::Credited(ClaimReceipt {
            player_id: player_id.to_string(),
            earned: conv.earned,
            new_balance,
            required_points: conv.required_points,
            multiplier: conv.multiplier,
            multiplier_after: self.engine.difficulty_multiplier(ledger.total_distributed),
            total_distributed: ledger.total_distributed,
            remaining: ledger.remaining(total_supply),
        }))
    }

    pub fn supply_status(&self) -> Result<SupplyStatus, LedgerError> {
        let _gate = self.lock();
        let ledger = self.load_checked()?;
        let total_supply = self.engine.total_supply();
        Ok(SupplyStatus {
            total_supply,
            total_distributed: ledger.total_distributed,
            remaining: ledger.remaining(total_supply),
            multiplier: self.engine.difficulty_multiplier(ledger.total_distributed),
            points_per_unit_now: self.engine.required_points(ledger.total_distributed),
        })
    }

    /// Full copy of the current record.
    pub fn ledger_snapshot(&self) -> Result<Ledger, LedgerError> {
        let _gate = self.lock();
        self.load_checked()
    }
}
