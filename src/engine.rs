// src/engine.rs
//
// Fachada consumida pela camada de apresentação: um único objeto que
// amarra conector, loader, cache e os serviços de cálculo.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::common::error::AppError;
use crate::config::AppConfig;
use crate::models::dataset::{NormalizedDataset, PeriodFilter};
use crate::services::cache::DataCache;
use crate::services::metrics::{self, KpiReport, ShowProfit};
use crate::services::payout::{self, PayoutBreakdown};
use crate::services::trends::{self, TrendMetric, TrendSeries};
use crate::source::credentials::ServiceAccountKey;
use crate::source::loader::DatasetLoader;
use crate::source::local::CsvStore;
use crate::source::mutation::{Mutation, NovaRegraRateio, NovaTransacao, NovoShow};
use crate::source::sheets::{ConnectionStatus, LogEntry, SheetsClient};

pub struct FinanceEngine {
    cache: DataCache,
    remota: Option<Arc<SheetsClient>>,
}

impl FinanceEngine {
    /// Monta o motor a partir da configuração. Falha de bootstrap remoto
    /// só é fatal quando o fallback está desligado; com fallback ligado
    /// o conector fica de pé e cada carga re-tenta a planilha.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let remota = if config.remoto_configurado() {
            // remoto_configurado() garante os dois campos
            let (Some(json), Some(id)) = (&config.credentials_json, &config.spreadsheet_id)
            else {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "configuração remota inconsistente"
                )));
            };

            let chave = ServiceAccountKey::from_json(json)?;
            let cliente = Arc::new(SheetsClient::new(chave, id.clone())?);

            match cliente.bootstrap().await {
                Ok(()) => info!("✅ Conector remoto pronto"),
                Err(err) if config.allow_fallback => {
                    warn!("⚠️ Bootstrap remoto falhou ({err}); seguindo com fallback local");
                }
                Err(err) => return Err(err),
            }
            Some(cliente)
        } else {
            info!("Fonte remota não configurada; operando só com o diretório local");
            None
        };

        let local = Arc::new(CsvStore::new(config.fallback_dir.clone()));
        let loader = DatasetLoader::new(remota.clone(), local, config.allow_fallback);
        let cache = DataCache::new(loader, config.cache_ttl, config.cache_dir.clone());

        Ok(Self { cache, remota })
    }

    /// Snapshot completo (cacheado). O snapshot cobre sempre o histórico
    /// inteiro: o filtro entra na assinatura para os chamadores, mas é
    /// aplicado nas funções de cálculo, não na carga.
    pub async fn load_dataset(
        &self,
        filtro: PeriodFilter,
    ) -> Result<Arc<NormalizedDataset>, AppError> {
        tracing::debug!("Carga de dataset solicitada (filtro {filtro:?})");
        self.cache.get_or_load().await
    }

    pub fn compute_kpis(&self, dataset: &NormalizedDataset, filtro: PeriodFilter) -> KpiReport {
        metrics::compute_kpis_em(dataset, filtro, self.hoje())
    }

    pub fn compute_trend(
        &self,
        dataset: &NormalizedDataset,
        metric: TrendMetric,
        filtro: PeriodFilter,
    ) -> TrendSeries {
        trends::compute_trend(dataset, metric, filtro, self.hoje())
    }

    pub fn profitability_by_show(
        &self,
        dataset: &NormalizedDataset,
        filtro: PeriodFilter,
    ) -> Vec<ShowProfit> {
        metrics::profitability_by_show(dataset, filtro, self.hoje())
    }

    pub fn allocate_payout(
        &self,
        dataset: &NormalizedDataset,
        show_id: &str,
    ) -> Result<PayoutBreakdown, AppError> {
        payout::allocate(dataset, show_id)
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Status do conector remoto; sem conector, reporta o fallback local
    /// como fonte conectada.
    pub fn get_connection_status(&self) -> ConnectionStatus {
        match &self.remota {
            Some(cliente) => cliente.get_connection_status(),
            None => {
                let mut status = ConnectionStatus::desconectado("Arquivo local (fallback)");
                status.connected = true;
                status
            }
        }
    }

    pub fn diagnostic_log(&self) -> Vec<LogEntry> {
        self.remota.as_ref().map(|c| c.diagnostic_log()).unwrap_or_default()
    }

    // --- Escritas (write-through: fonte primeiro, cache invalidado depois) ---

    pub async fn registrar_show(&self, novo: NovoShow) -> Result<(), AppError> {
        self.cache.write_through(&novo.into_mutation()?).await
    }

    pub async fn registrar_transacao(&self, nova: NovaTransacao) -> Result<(), AppError> {
        self.cache.write_through(&nova.into_mutation()?).await
    }

    pub async fn registrar_regra(&self, nova: NovaRegraRateio) -> Result<(), AppError> {
        self.cache.write_through(&nova.into_mutation()?).await
    }

    pub async fn aplicar_mutacao(&self, mutation: &Mutation) -> Result<(), AppError> {
        self.cache.write_through(mutation).await
    }

    fn hoje(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
