// src/services/trends.rs
//
// Aritmética defensiva de tendências. Regra de ouro: base quase nula
// não vira percentual; vira "dados insuficientes" (None). Percentuais
// definidos são sempre limitados a [-100, +1000].

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::dataset::{NormalizedDataset, PeriodFilter};
use crate::models::ledger::ShowStatus;

/// Base mínima (em unidades monetárias) para um percentual fazer sentido.
pub const LIMIAR_BASE: Decimal = Decimal::ONE;

const TETO_PCT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
const PISO_PCT: Decimal = Decimal::from_parts(100, 0, 0, true, 0);
const LIMIAR_DIVISAO: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Variação percentual entre períodos. `None` = indefinido: a base é
/// pequena demais para o percentual significar alguma coisa.
pub fn safe_percentage_change(atual: Decimal, anterior: Decimal) -> Option<Decimal> {
    if anterior.abs() < LIMIAR_BASE {
        return None;
    }
    // Valor atual quase nulo sobre base real: queda total
    if atual.abs() < LIMIAR_BASE {
        return Some(PISO_PCT);
    }
    let variacao = (atual - anterior) / anterior.abs() * Decimal::ONE_HUNDRED;
    Some(variacao.clamp(PISO_PCT, TETO_PCT))
}

/// Divisão que trata denominador quase nulo como indefinido.
pub fn safe_division(numerador: Decimal, denominador: Decimal) -> Option<Decimal> {
    if denominador.abs() < LIMIAR_DIVISAO {
        return None;
    }
    Some(numerador / denominador)
}

pub fn safe_percentage(parte: Decimal, todo: Decimal) -> Option<Decimal> {
    safe_division(parte, todo).map(|v| v * Decimal::ONE_HUNDRED)
}

/// Margem de lucro sobre a receita; indefinida com receita abaixo do limiar.
pub fn margin(lucro: Decimal, receita: Decimal) -> Option<Decimal> {
    if receita < LIMIAR_BASE {
        return None;
    }
    Some((lucro / receita * Decimal::ONE_HUNDRED).clamp(PISO_PCT, TETO_PCT))
}

/// Série confiável: pelo menos dois pontos e nenhum valor abaixo do
/// limiar de magnitude.
pub fn is_reliable_trend(valores: &[Decimal]) -> bool {
    valores.len() >= 2 && valores.iter().all(|v| v.abs() >= LIMIAR_BASE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendMetric {
    Entradas,
    Despesas,
    Saldo,
    Publico,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Primeiro dia do mês do balde.
    pub mes: NaiveDate,
    pub valor: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSeries {
    pub metric: TrendMetric,
    pub pontos: Vec<TrendPoint>,
    /// Variação do último mês sobre o penúltimo; `None` = dados
    /// insuficientes.
    pub variacao_pct: Option<Decimal>,
    pub confiavel: bool,
}

fn primeiro_dia_do_mes(data: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(data.year(), data.month(), 1).unwrap_or(data)
}

/// Série mensal de uma métrica dentro do período. Baldes ordenados por
/// mês; meses sem movimento não aparecem.
pub fn compute_trend(
    dataset: &NormalizedDataset,
    metric: TrendMetric,
    filtro: PeriodFilter,
    hoje: NaiveDate,
) -> TrendSeries {
    let mut baldes: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    match metric {
        TrendMetric::Publico => {
            for show in &dataset.shows {
                if show.status == ShowStatus::Realizado && filtro.contem(show.data_show, hoje) {
                    *baldes.entry(primeiro_dia_do_mes(show.data_show)).or_default() +=
                        Decimal::from(show.publico);
                }
            }
        }
        _ => {
            for t in &dataset.transactions {
                if !filtro.contem(t.data, hoje) {
                    continue;
                }
                let mes = primeiro_dia_do_mes(t.data);
                match metric {
                    TrendMetric::Entradas if t.entrada_paga() => {
                        *baldes.entry(mes).or_default() += t.valor;
                    }
                    TrendMetric::Despesas if t.saida_paga() => {
                        *baldes.entry(mes).or_default() += t.valor;
                    }
                    TrendMetric::Saldo => {
                        if t.entrada_paga() {
                            *baldes.entry(mes).or_default() += t.valor;
                        } else if t.saida_paga() {
                            *baldes.entry(mes).or_default() -= t.valor;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let pontos: Vec<TrendPoint> =
        baldes.into_iter().map(|(mes, valor)| TrendPoint { mes, valor }).collect();
    let valores: Vec<Decimal> = pontos.iter().map(|p| p.valor).collect();

    let variacao_pct = match valores.as_slice() {
        [.., penultimo, ultimo] => safe_percentage_change(*ultimo, *penultimo),
        _ => None,
    };

    TrendSeries { metric, confiavel: is_reliable_trend(&valores), pontos, variacao_pct }
}
