use thiserror::Error;

/// Rejected supply configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid supply config: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Failures of the persisted ledger record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger record is not valid json: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("ledger record violates invariant: {0}")]
    Corrupt(String),
}

/// Errors surfaced by claim, balance and supply queries.
///
/// An exhausted supply is not an error; it comes back as a rejected claim.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        LedgerError::InvalidInput(msg.into())
    }
}
