// src/source/mutation.rs
//
// Toda escrita passa por aqui: um payload validado vira uma `Mutation`
// que qualquer fonte tabular sabe aplicar. A fonte nunca recebe dados
// que não passaram pelo validator.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::error::AppError;
use crate::models::ledger::{PaymentStatus, ShowStatus, TransactionType};
use crate::models::payout::PayoutModel;
use crate::source::{RawRow, TabularSource};

/// Operação de escrita pendente contra uma fonte tabular.
#[derive(Debug, Clone)]
pub enum Mutation {
    AppendRow { tabela: &'static str, linha: RawRow },
    UpdateRow { tabela: &'static str, coluna_id: &'static str, id: String, mudancas: RawRow },
    DeleteRow { tabela: &'static str, coluna_id: &'static str, id: String },
}

impl Mutation {
    pub fn tabela(&self) -> &'static str {
        match self {
            Mutation::AppendRow { tabela, .. }
            | Mutation::UpdateRow { tabela, .. }
            | Mutation::DeleteRow { tabela, .. } => tabela,
        }
    }

    pub async fn apply(&self, fonte: &dyn TabularSource) -> Result<(), AppError> {
        match self {
            Mutation::AppendRow { tabela, linha } => fonte.append_row(tabela, linha).await,
            Mutation::UpdateRow { tabela, coluna_id, id, mudancas } => {
                fonte.update_row(tabela, coluna_id, id, mudancas).await
            }
            Mutation::DeleteRow { tabela, coluna_id, id } => {
                fonte.delete_row(tabela, coluna_id, id).await
            }
        }
    }
}

fn valor_nao_negativo(valor: &Decimal) -> Result<(), ValidationError> {
    if *valor < Decimal::ZERO {
        return Err(ValidationError::new("valor_negativo"));
    }
    Ok(())
}

fn percentual_0_a_100(valor: &Decimal) -> Result<(), ValidationError> {
    if *valor < Decimal::ZERO || *valor > Decimal::from(100) {
        return Err(ValidationError::new("percentual_fora_da_faixa"));
    }
    Ok(())
}

fn data_como_texto(data: NaiveDate) -> String {
    data.format("%Y-%m-%d").to_string()
}

fn par(chave: &str, valor: impl Into<String>) -> (String, String) {
    (chave.to_string(), valor.into())
}

// --- DTOs de escrita ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovoShow {
    pub data_show: NaiveDate,
    #[validate(length(min = 1, message = "casa é obrigatória"))]
    pub casa: String,
    #[validate(length(min = 1, message = "cidade é obrigatória"))]
    pub cidade: String,
    pub status: ShowStatus,
    pub publico: u32,
    #[validate(custom(function = "valor_nao_negativo"))]
    pub cache_acordado: Decimal,
    #[serde(default)]
    pub observacao: String,
}

impl NovoShow {
    pub fn into_mutation(self) -> Result<Mutation, AppError> {
        self.validate()?;
        let linha: RawRow = [
            par("show_id", format!("SH-{}", Uuid::new_v4())),
            par("data_show", data_como_texto(self.data_show)),
            par("casa", self.casa),
            par("cidade", self.cidade),
            par("status", self.status.as_str()),
            par("publico", self.publico.to_string()),
            par("cache_acordado", self.cache_acordado.to_string()),
            par("observacao", self.observacao),
        ]
        .into();
        Ok(Mutation::AppendRow { tabela: "shows", linha })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovaTransacao {
    pub data: NaiveDate,
    pub tipo: TransactionType,
    #[validate(length(min = 1, message = "categoria é obrigatória"))]
    pub categoria: String,
    #[serde(default)]
    pub subcategoria: String,
    #[serde(default)]
    pub descricao: String,
    #[validate(custom(function = "valor_nao_negativo"))]
    pub valor: Decimal,
    #[serde(default)]
    pub show_id: Option<String>,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub conta: String,
}

impl NovaTransacao {
    pub fn into_mutation(self) -> Result<Mutation, AppError> {
        self.validate()?;
        let linha: RawRow = [
            par("id", format!("TX-{}", Uuid::new_v4())),
            par("data", data_como_texto(self.data)),
            par("tipo", self.tipo.as_str()),
            par("categoria", self.categoria),
            par("subcategoria", self.subcategoria),
            par("descricao", self.descricao),
            par("valor", self.valor.to_string()),
            par("show_id", self.show_id.unwrap_or_default()),
            par("payment_status", self.payment_status.as_str()),
            par("conta", self.conta),
        ]
        .into();
        Ok(Mutation::AppendRow { tabela: "transactions", linha })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovaRegraRateio {
    #[validate(length(min = 1, message = "nome_regra é obrigatório"))]
    pub nome_regra: String,
    pub modelo: PayoutModel,
    #[validate(custom(function = "percentual_0_a_100"))]
    pub pct_caixa: Decimal,
    #[validate(custom(function = "percentual_0_a_100"))]
    pub pct_musicos: Decimal,
    pub ativa: bool,
    #[serde(default)]
    pub vigencia_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub vigencia_fim: Option<NaiveDate>,
}

impl NovaRegraRateio {
    pub fn into_mutation(self) -> Result<Mutation, AppError> {
        self.validate()?;
        if self.pct_caixa + self.pct_musicos > Decimal::from(100) {
            return Err(AppError::Alocacao {
                detalhe: "pct_caixa + pct_musicos excede 100".into(),
            });
        }
        let linha: RawRow = [
            par("rule_id", format!("RL-{}", Uuid::new_v4())),
            par("nome_regra", self.nome_regra),
            par("modelo", self.modelo.as_str()),
            par("pct_caixa", self.pct_caixa.to_string()),
            par("pct_musicos", self.pct_musicos.to_string()),
            par("ativa", if self.ativa { "SIM" } else { "NÃO" }),
            par(
                "vigencia_inicio",
                self.vigencia_inicio.map(data_como_texto).unwrap_or_default(),
            ),
            par("vigencia_fim", self.vigencia_fim.map(data_como_texto).unwrap_or_default()),
        ]
        .into();
        Ok(Mutation::AppendRow { tabela: "payout_rules", linha })
    }
}

/// Atualização pontual de uma transação existente (ex.: marcar como PAGO).
pub fn atualizar_payment_status(id: &str, novo_status: PaymentStatus) -> Mutation {
    Mutation::UpdateRow {
        tabela: "transactions",
        coluna_id: "id",
        id: id.to_string(),
        mudancas: [par("payment_status", novo_status.as_str())].into(),
    }
}

pub fn excluir_transacao(id: &str) -> Mutation {
    Mutation::DeleteRow { tabela: "transactions", coluna_id: "id", id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn novo_show_vira_append_com_id_gerado() {
        let mutation = NovoShow {
            data_show: d("2026-09-12"),
            casa: "Teatro Guaíra".into(),
            cidade: "Curitiba".into(),
            status: ShowStatus::Confirmado,
            publico: 0,
            cache_acordado: Decimal::new(450000, 2),
            observacao: String::new(),
        }
        .into_mutation()
        .unwrap();

        match mutation {
            Mutation::AppendRow { tabela, linha } => {
                assert_eq!(tabela, "shows");
                assert!(linha["show_id"].starts_with("SH-"));
                assert_eq!(linha["data_show"], "2026-09-12");
                assert_eq!(linha["cache_acordado"], "4500.00");
            }
            other => panic!("mutação inesperada: {other:?}"),
        }
    }

    #[test]
    fn transacao_sem_categoria_falha_na_validacao() {
        let err = NovaTransacao {
            data: d("2026-01-05"),
            tipo: TransactionType::Saida,
            categoria: String::new(),
            subcategoria: String::new(),
            descricao: String::new(),
            valor: Decimal::from(10),
            show_id: None,
            payment_status: PaymentStatus::Pago,
            conta: String::new(),
        }
        .into_mutation()
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn regra_com_percentuais_acima_de_100_falha() {
        let err = NovaRegraRateio {
            nome_regra: "Regra impossível".into(),
            modelo: PayoutModel::Percentual,
            pct_caixa: Decimal::from(60),
            pct_musicos: Decimal::from(60),
            ativa: true,
            vigencia_inicio: None,
            vigencia_fim: None,
        }
        .into_mutation()
        .unwrap_err();
        assert!(matches!(err, AppError::Alocacao { .. }));
    }
}
