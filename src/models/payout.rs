// src/models/payout.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ledger::norm_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutModel {
    Percentual,
    Misto,
}

impl PayoutModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match norm_str(raw).as_str() {
            "PERCENTUAL" => Some(PayoutModel::Percentual),
            "MISTO" => Some(PayoutModel::Misto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutModel::Percentual => "PERCENTUAL",
            PayoutModel::Misto => "MISTO",
        }
    }
}

/// Regra de rateio com vigência meio-aberta `[início, fim)`.
/// `vigencia_fim == None` significa vigência em aberto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRule {
    pub rule_id: String,
    pub nome_regra: String,
    pub modelo: PayoutModel,
    /// Percentual retido pelo caixa da banda (0–100).
    pub pct_caixa: Decimal,
    /// Percentual destinado ao pool de músicos (0–100).
    pub pct_musicos: Decimal,
    pub ativa: bool,
    pub vigencia_inicio: Option<NaiveDate>,
    pub vigencia_fim: Option<NaiveDate>,
}

impl PayoutRule {
    /// Intervalo meio-aberto: início inclusivo, fim exclusivo.
    pub fn vigente_em(&self, data: NaiveDate) -> bool {
        let depois_do_inicio = self.vigencia_inicio.map(|i| data >= i).unwrap_or(true);
        let antes_do_fim = self.vigencia_fim.map(|f| data < f).unwrap_or(true);
        depois_do_inicio && antes_do_fim
    }
}

/// Vínculo explícito show → regra; quando presente, vence a resolução
/// por vigência.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowPayoutConfig {
    pub show_id: String,
    pub rule_id: String,
}

/// Integrante da banda. Inativos ficam fora da distribuição mas são
/// mantidos para relatórios históricos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub nome: String,
    pub ativo: bool,
}

/// Participação de um membro numa regra: peso proporcional ou valor fixo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShareKind {
    Peso(Decimal),
    Fixo(Decimal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberShare {
    pub share_id: String,
    pub rule_id: String,
    pub member_id: String,
    pub kind: ShareKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regra(inicio: Option<&str>, fim: Option<&str>) -> PayoutRule {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        PayoutRule {
            rule_id: "R1".into(),
            nome_regra: "Padrão".into(),
            modelo: PayoutModel::Percentual,
            pct_caixa: Decimal::from(30),
            pct_musicos: Decimal::from(70),
            ativa: true,
            vigencia_inicio: inicio.map(d),
            vigencia_fim: fim.map(d),
        }
    }

    #[test]
    fn vigencia_meio_aberta() {
        let r = regra(Some("2025-01-01"), Some("2025-07-01"));
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(r.vigente_em(d("2025-01-01")));
        assert!(r.vigente_em(d("2025-06-30")));
        assert!(!r.vigente_em(d("2025-07-01")));
        assert!(!r.vigente_em(d("2024-12-31")));
    }

    #[test]
    fn vigencia_em_aberto() {
        let r = regra(Some("2025-01-01"), None);
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(r.vigente_em(d("2030-12-31")));
    }
}
