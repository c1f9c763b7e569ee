use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type PlayerId = String;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAccount {
    #[serde(default)]
    pub balance: u64,
}

/// Process-wide record of cumulative distribution and per-player balances.
///
/// Older records used `distributed` / `users`; both are read transparently.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default, alias = "distributed")]
    pub total_distributed: u64,
    #[serde(default, alias = "users")]
    pub players: BTreeMap<PlayerId, PlayerAccount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown players hold 0.
    pub fn balance_of(&self, player_id: &str) -> u64 {
        self.players.get(player_id).map(|p| p.balance).unwrap_or(0)
    }

    pub fn remaining(&self, total_supply: u64) -> u64 {
        total_supply.saturating_sub(self.total_distributed)
    }

    /// Credits `amount`, creating the player entry if absent. Returns the new
    /// balance. Callers clamp `amount` to the remaining supply first.
    pub fn credit(&mut self, player_id: &str, amount: u64) -> u64 {
        let account = self.players.entry(player_id.to_string()).or_default();
        account.balance += amount;
        self.total_distributed += amount;
        account.balance
    }

    pub fn check_invariants(&self, total_supply: u64) -> Result<(), StoreError> {
        let sum: u128 = self.players.values().map(|p| p.balance as u128).sum();
        if sum != self.total_distributed as u128 {
            return Err(StoreError::Corrupt(format!(
                "totalDistributed={} but player balances sum to {}",
                self.total_distributed, sum
            )));
        }
        if self.total_distributed > total_supply {
            return Err(StoreError::Corrupt(format!(
                "totalDistributed={} exceeds total supply {}",
                self.total_distributed, total_supply
            )));
        }
        Ok(())
    }
}
