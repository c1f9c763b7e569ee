//! STR reward accounting: points-to-currency conversion under a capped
//! supply with a stepped difficulty curve, plus the player ledger and the
//! backends it is persisted through.

pub mod backend;
pub mod config;
pub mod conversion;
pub mod error;
pub mod ledger;
pub mod store;

pub use backend::{JsonFileBackend, LedgerBackend, MemoryBackend, RetryPolicy};
pub use config::SupplyConfig;
pub use conversion::{Conversion, ConversionEngine};
pub use error::{ConfigError, LedgerError, StoreError};
pub use ledger::{Ledger, PlayerAccount};
pub use store::{ClaimOutcome, ClaimReceipt, ClaimRejection, LedgerStore, RejectReason, SupplyStatus};
