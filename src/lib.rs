// src/lib.rs
//
// Núcleo financeiro da banda: carga dual (planilha remota com fallback
// local), cache com TTL, métricas, tendências e rateio de cachês.

pub mod common;
pub mod config;
pub mod engine;
pub mod models;
pub mod services;
pub mod source;

pub use common::error::{AppError, ErrorKind};
pub use config::AppConfig;
pub use engine::FinanceEngine;
pub use models::dataset::{NormalizedDataset, PeriodFilter, Provenance, Severity, ValidationWarning};
pub use services::metrics::KpiReport;
pub use services::payout::{PayoutBreakdown, RuleResolutionError};
pub use services::trends::{TrendMetric, TrendSeries};

/// Inicializa o `tracing` para binários e exemplos que consomem o núcleo.
/// Respeita `RUST_LOG`; o padrão é `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}
