// src/models/dataset.rs

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::{Show, Transaction};
use super::payout::{Member, MemberShare, PayoutRule, ShowPayoutConfig};

/// De onde veio o snapshot. A camada de apresentação exibe isso na sidebar;
/// aqui só garantimos que a informação é observável.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Remote,
    LocalFallback,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Remote => "Google Sheets",
            Provenance::LocalFallback => "Arquivo local (fallback)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Problema encontrado na carga ou na validação. Nunca aborta a leitura;
/// o cálculo segue com o subconjunto utilizável.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub severity: Severity,
    pub tabela: String,
    pub mensagem: String,
}

impl ValidationWarning {
    pub fn new(severity: Severity, tabela: &str, mensagem: impl Into<String>) -> Self {
        Self { severity, tabela: tabela.to_string(), mensagem: mensagem.into() }
    }
}

/// Snapshot completo e internamente consistente de uma passada de carga.
/// Todas as entidades são imutáveis; uma escrita bem-sucedida invalida o
/// cache e força uma nova carga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDataset {
    pub shows: Vec<Show>,
    pub transactions: Vec<Transaction>,
    pub payout_rules: Vec<PayoutRule>,
    pub show_payout_configs: Vec<ShowPayoutConfig>,
    pub members: Vec<Member>,
    pub member_shares: Vec<MemberShare>,
    pub provenance: Provenance,
    pub warnings: Vec<ValidationWarning>,
    pub loaded_at: DateTime<Utc>,
}

/// Filtro de período aplicado pelas métricas (o dataset em cache cobre
/// sempre o histórico completo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodFilter {
    MesAtual,
    MesAnterior,
    Ultimos6Meses,
    AnoAtual,
    AnoAnterior,
    TodoPeriodo,
}

impl PeriodFilter {
    /// Intervalo fechado `[início, fim]` relativo a `hoje`;
    /// `None` = todo o período.
    pub fn range(&self, hoje: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            PeriodFilter::MesAtual => {
                let inicio = hoje.with_day(1).expect("dia 1 sempre existe");
                Some((inicio, hoje))
            }
            PeriodFilter::MesAnterior => {
                let primeiro_dia_atual = hoje.with_day(1).expect("dia 1 sempre existe");
                let fim = primeiro_dia_atual.pred_opt().expect("calendário não começa aqui");
                let inicio = fim.with_day(1).expect("dia 1 sempre existe");
                Some((inicio, fim))
            }
            PeriodFilter::Ultimos6Meses => {
                let inicio = hoje.checked_sub_days(Days::new(180)).unwrap_or(hoje);
                Some((inicio, hoje))
            }
            PeriodFilter::AnoAtual => {
                let inicio = NaiveDate::from_ymd_opt(hoje.year(), 1, 1).expect("1º de janeiro");
                Some((inicio, hoje))
            }
            PeriodFilter::AnoAnterior => {
                let ano = hoje.year() - 1;
                let inicio = NaiveDate::from_ymd_opt(ano, 1, 1).expect("1º de janeiro");
                let fim = NaiveDate::from_ymd_opt(ano, 12, 31).expect("31 de dezembro");
                Some((inicio, fim))
            }
            PeriodFilter::TodoPeriodo => None,
        }
    }

    pub fn contem(&self, data: NaiveDate, hoje: NaiveDate) -> bool {
        match self.range(hoje) {
            Some((inicio, fim)) => data >= inicio && data <= fim,
            None => true,
        }
    }
}
