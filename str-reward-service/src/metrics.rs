use prometheus::{Encoder, Gauge, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use str_supply::{ClaimOutcome, RejectReason, SupplyStatus};

/// Claim counters and supply gauges, on a registry owned by the service.
pub struct ClaimMetrics {
    registry: Registry,
    pub claims_total: IntCounterVec,
    pub total_distributed: IntGauge,
    pub difficulty_multiplier: Gauge,
}

impl ClaimMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            Opts::new("str_claims_total", "Claims handled, by outcome"),
            &["outcome"],
        )?;
        let total_distributed =
            IntGauge::new("str_total_distributed", "STR credited across all players")?;
        let difficulty_multiplier =
            Gauge::new("str_difficulty_multiplier", "Current points multiplier per STR")?;

        registry.register(Box::new(claims_total.clone()))?;
        registry.register(Box::new(total_distributed.clone()))?;
        registry.register(Box::new(difficulty_multiplier.clone()))?;

        Ok(Self {
            registry,
            claims_total,
            total_distributed,
            difficulty_multiplier,
        })
    }

    pub fn observe_outcome(&self, outcome: &ClaimOutcome) {
        let label = match outcome {
            ClaimOutcome::Credited(receipt) => {
                self.set_distributed(receipt.total_distributed);
                self.difficulty_multiplier.set(receipt.multiplier_after);
                "credited"
            }
            ClaimOutcome::Rejected(r) if r.reason == RejectReason::SupplyExhausted => "supply_exhausted",
            ClaimOutcome::Rejected(_) => "insufficient_points",
        };
        self.claims_total.with_label_values(&[label]).inc();
    }

    /// `invalid` or `failed`.
    pub fn observe_error(&self, label: &str) {
        self.claims_total.with_label_values(&[label]).inc();
    }

    pub fn observe_supply(&self, status: &SupplyStatus) {
        self.set_distributed(status.total_distributed);
        self.difficulty_multiplier.set(status.multiplier);
    }

    fn set_distributed(&self, total: u64) {
        self.total_distributed.set(i64::try_from(total).unwrap_or(i64::MAX));
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
