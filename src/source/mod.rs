// src/source/mod.rs

pub mod credentials;
pub mod loader;
pub mod local;
pub mod mutation;
pub mod normalize;
pub mod sheets;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::common::error::AppError;
use crate::models::dataset::Provenance;

/// Linha crua de qualquer fonte tabular, indexada pelo cabeçalho.
/// Toda a tipagem acontece depois, na normalização.
pub type RawRow = BTreeMap<String, String>;

/// Abas obrigatórias da planilha (remota ou local).
pub const TABELAS: [&str; 6] = [
    "shows",
    "transactions",
    "payout_rules",
    "show_payout_config",
    "members",
    "member_shares",
];

/// Costura entre as duas fontes intercambiáveis: a planilha remota e o
/// diretório de CSVs local. O loader e o write-through só enxergam isso.
#[async_trait]
pub trait TabularSource: Send + Sync {
    fn provenance(&self) -> Provenance;

    async fn read_table(&self, tabela: &str) -> Result<Vec<RawRow>, AppError>;

    async fn append_row(&self, tabela: &str, linha: &RawRow) -> Result<(), AppError>;

    async fn update_row(
        &self,
        tabela: &str,
        coluna_id: &str,
        id: &str,
        mudancas: &RawRow,
    ) -> Result<(), AppError>;

    async fn delete_row(&self, tabela: &str, coluna_id: &str, id: &str) -> Result<(), AppError>;
}
