// src/services/metrics.rs
//
// Os 14 KPIs do painel financeiro. Funções puras sobre o snapshot
// normalizado + filtro de período; nada aqui toca fonte, cache ou rede.
//
// Regras de reconhecimento, aplicadas uniformemente:
//   - só payment_status == PAGO entra em total monetário;
//   - NÃO RECEBIDO alimenta apenas "A Receber";
//   - ESTORNADO fica fora de tudo;
//   - receita de show só é reconhecida com status REALIZADO.

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::dataset::{NormalizedDataset, PeriodFilter};
use crate::models::ledger::{
    CATEGORIAS_CACHE_MUSICOS, CATEGORIAS_DESPESAS_FIXAS, Show, ShowStatus, Transaction,
};
use crate::services::trends::{margin, safe_division, safe_percentage};

/// Janela do KPI de público (dias) e meta de público médio por show.
const JANELA_KPI_PUBLICO_DIAS: u64 = 90;
const META_PUBLICO_POR_SHOW: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiPublico {
    /// Média de público dos shows REALIZADOs na janela de 90 dias.
    pub media_janela: Option<Decimal>,
    pub meta: u32,
    /// Percentual da meta atingido, limitado a 100.
    pub atingimento_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiReport {
    pub total_shows_realizados: usize,
    pub total_entradas: Decimal,
    pub valor_efetivo_por_show: Option<Decimal>,
    pub total_cache_musicos: Decimal,
    /// Despesas pagas EXCLUINDO cachês de músicos (itemizados acima).
    pub total_despesas: Decimal,
    /// Entradas pagas − todas as saídas pagas (cachês inclusos).
    pub caixa_atual: Decimal,
    pub a_receber: Decimal,
    pub publico_total: u64,
    pub publico_medio: Option<Decimal>,
    /// Caixa sobre receita, em percentual.
    pub percentual_caixa: Option<Decimal>,
    /// Caixa atual + cachês acordados dos shows CONFIRMADOs do período.
    pub caixa_estimado: Decimal,
    pub shows_sem_entrada_paga: usize,
    pub kpi_publico: KpiPublico,
    /// Média mensal das categorias de despesa fixa no período.
    pub despesas_fixas_mensais: Decimal,
}

/// Rentabilidade individual de um show REALIZADO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowProfit {
    pub show_id: String,
    pub casa: String,
    pub data_show: NaiveDate,
    pub receita: Decimal,
    pub despesas: Decimal,
    pub lucro: Decimal,
    pub margem_pct: Option<Decimal>,
}

fn categoria_de_cache(categoria: &str) -> bool {
    CATEGORIAS_CACHE_MUSICOS.contains(&categoria)
}

fn categoria_fixa(categoria: &str) -> bool {
    CATEGORIAS_DESPESAS_FIXAS.contains(&categoria)
}

fn no_periodo<'a>(
    transacoes: &'a [Transaction],
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> impl Iterator<Item = &'a Transaction> {
    transacoes.iter().filter(move |t| filtro.contem(t.data, hoje))
}

fn shows_no_periodo<'a>(
    shows: &'a [Show],
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> impl Iterator<Item = &'a Show> {
    shows.iter().filter(move |s| filtro.contem(s.data_show, hoje))
}

/// Calcula os 14 KPIs para o período. `hoje` é injetado para manter a
/// função pura e os testes determinísticos.
pub fn compute_kpis_em(
    dataset: &NormalizedDataset,
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> KpiReport {
    let realizados: Vec<&Show> = shows_no_periodo(&dataset.shows, filtro, hoje)
        .filter(|s| s.status == ShowStatus::Realizado)
        .collect();
    let total_shows_realizados = realizados.len();

    let mut total_entradas = Decimal::ZERO;
    let mut total_cache_musicos = Decimal::ZERO;
    let mut total_despesas = Decimal::ZERO;
    let mut a_receber = Decimal::ZERO;
    let mut shows_com_entrada: HashSet<&str> = HashSet::new();

    for t in no_periodo(&dataset.transactions, filtro, hoje) {
        if t.entrada_paga() {
            total_entradas += t.valor;
            if let Some(show_id) = &t.show_id {
                shows_com_entrada.insert(show_id.as_str());
            }
        } else if t.saida_paga() {
            if categoria_de_cache(&t.categoria) {
                total_cache_musicos += t.valor;
            } else {
                total_despesas += t.valor;
            }
        } else if t.a_receber() {
            a_receber += t.valor;
        }
    }

    let caixa_atual = total_entradas - total_despesas - total_cache_musicos;

    let publico_total: u64 = realizados.iter().map(|s| u64::from(s.publico)).sum();
    let publico_medio =
        safe_division(Decimal::from(publico_total), Decimal::from(total_shows_realizados));

    let valor_efetivo_por_show =
        safe_division(total_entradas, Decimal::from(total_shows_realizados));

    let percentual_caixa = safe_percentage(caixa_atual, total_entradas);

    let receita_confirmada: Decimal = shows_no_periodo(&dataset.shows, filtro, hoje)
        .filter(|s| s.status == ShowStatus::Confirmado)
        .map(|s| s.cache_acordado)
        .sum();
    let caixa_estimado = caixa_atual + receita_confirmada;

    let shows_sem_entrada_paga = realizados
        .iter()
        .filter(|s| !shows_com_entrada.contains(s.show_id.as_str()))
        .count();

    KpiReport {
        total_shows_realizados,
        total_entradas,
        valor_efetivo_por_show,
        total_cache_musicos,
        total_despesas,
        caixa_atual,
        a_receber,
        publico_total,
        publico_medio,
        percentual_caixa,
        caixa_estimado,
        shows_sem_entrada_paga,
        kpi_publico: kpi_publico(dataset, hoje),
        despesas_fixas_mensais: despesas_fixas_mensais(dataset, filtro, hoje),
    }
}

/// KPI de público: média móvel dos últimos 90 dias contra a meta fixa,
/// independente do filtro de período do painel.
fn kpi_publico(dataset: &NormalizedDataset, hoje: NaiveDate) -> KpiPublico {
    let inicio = hoje.checked_sub_days(Days::new(JANELA_KPI_PUBLICO_DIAS)).unwrap_or(hoje);

    let na_janela: Vec<&Show> = dataset
        .shows
        .iter()
        .filter(|s| {
            s.status == ShowStatus::Realizado && s.data_show >= inicio && s.data_show <= hoje
        })
        .collect();

    let media_janela = safe_division(
        Decimal::from(na_janela.iter().map(|s| u64::from(s.publico)).sum::<u64>()),
        Decimal::from(na_janela.len()),
    );

    let atingimento_pct = media_janela.map(|media| {
        (media / Decimal::from(META_PUBLICO_POR_SHOW) * Decimal::ONE_HUNDRED)
            .min(Decimal::ONE_HUNDRED)
    });

    KpiPublico { media_janela, meta: META_PUBLICO_POR_SHOW, atingimento_pct }
}

/// Média mensal das despesas fixas: soma das categorias fixas pagas no
/// período dividida pelos meses distintos em que houve despesa fixa.
fn despesas_fixas_mensais(
    dataset: &NormalizedDataset,
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> Decimal {
    let mut total = Decimal::ZERO;
    let mut meses: BTreeSet<(i32, u32)> = BTreeSet::new();

    for t in no_periodo(&dataset.transactions, filtro, hoje) {
        if t.saida_paga() && categoria_fixa(&t.categoria) {
            total += t.valor;
            meses.insert((t.data.year(), t.data.month()));
        }
    }

    if meses.is_empty() {
        return Decimal::ZERO;
    }
    (total / Decimal::from(meses.len())).round_dp(2)
}

/// Rentabilidade por show REALIZADO no período, ordenada por lucro
/// decrescente. Só considera transações vinculadas ao show.
pub fn profitability_by_show(
    dataset: &NormalizedDataset,
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> Vec<ShowProfit> {
    let mut resultado: Vec<ShowProfit> = shows_no_periodo(&dataset.shows, filtro, hoje)
        .filter(|s| s.status == ShowStatus::Realizado)
        .map(|show| {
            let mut receita = Decimal::ZERO;
            let mut despesas = Decimal::ZERO;
            for t in &dataset.transactions {
                if t.show_id.as_deref() != Some(show.show_id.as_str()) {
                    continue;
                }
                if t.entrada_paga() {
                    receita += t.valor;
                } else if t.saida_paga() {
                    despesas += t.valor;
                }
            }
            let lucro = receita - despesas;
            ShowProfit {
                show_id: show.show_id.clone(),
                casa: show.casa.clone(),
                data_show: show.data_show,
                receita,
                despesas,
                lucro,
                margem_pct: margin(lucro, receita),
            }
        })
        .collect();

    resultado.sort_by(|a, b| b.lucro.cmp(&a.lucro));
    resultado
}
