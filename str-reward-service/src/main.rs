use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use str_reward_service::logging::init_tracing;
use str_reward_service::{serve, AppState, ClaimMetrics, LogFormat, ServiceConfig};
use str_supply::{JsonFileBackend, LedgerBackend, LedgerStore, MemoryBackend};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "str-reward-service", version, about = "STR reward claims over HTTP")]
struct Cli {
    /// JSON config file; every field is optional.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:3000. Wins over --port.
    #[arg(long)]
    listen: Option<String>,
    #[arg(long, env = "PORT")]
    port: Option<u16>,
    /// Ledger JSON file.
    #[arg(long)]
    ledger: Option<PathBuf>,
    /// Keep balances in memory only; nothing is written to disk.
    #[arg(long)]
    in_memory: bool,
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn resolve(&self) -> anyhow::Result<ServiceConfig> {
        let mut cfg = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(port) = self.port {
            cfg.set_port(port)?;
        }
        if let Some(listen) = &self.listen {
            cfg.listen_addr = listen.clone();
        }
        if let Some(ledger) = &self.ledger {
            cfg.ledger_path = ledger.clone();
        }
        if self.in_memory {
            cfg.in_memory = true;
        }
        if self.log_json {
            cfg.log_format = LogFormat::Json;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().resolve()?;
    init_tracing(cfg.log_format);

    let backend: Box<dyn LedgerBackend> = if cfg.in_memory {
        Box::new(MemoryBackend::new())
    } else {
        Box::new(JsonFileBackend::new(&cfg.ledger_path).with_retry(cfg.retry_policy()))
    };
    let store = LedgerStore::new(backend, cfg.supply.clone())?;

    // first access creates the ledger record if it is missing
    let status = store
        .supply_status()
        .with_context(|| format!("cannot open ledger {}", cfg.ledger_path.display()))?;
    let metrics = ClaimMetrics::new()?;
    metrics.observe_supply(&status);

    info!(
        ledger = %cfg.ledger_path.display(),
        in_memory = cfg.in_memory,
        total_supply = cfg.supply.total_supply,
        total_distributed = status.total_distributed,
        multiplier = status.multiplier,
        "ledger ready"
    );

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", cfg.listen_addr))?;
    info!(addr = %cfg.listen_addr, "str-reward-service listening");

    serve(listener, AppState::new(store, metrics)).await
}
