//! HTTP shell around the STR ledger: claims, balances, supply status.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod server;

pub use config::{LogFormat, ServiceConfig, ServiceConfigError};
pub use metrics::ClaimMetrics;
pub use routes::{handle_request, AppState, SharedStore};
pub use server::serve;
