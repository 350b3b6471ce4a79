// src/models/ledger.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Remove acentos comuns do português e normaliza para maiúsculas.
/// A planilha é editada à mão; "Não recebido", "NAO RECEBIDO" e
/// "NÃO RECEBIDO" precisam cair no mesmo vocabulário.
pub fn norm_str(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ã' => 'A',
            'É' | 'Ê' => 'E',
            'Í' => 'I',
            'Ó' | 'Ô' | 'Õ' => 'O',
            'Ú' | 'Ü' => 'U',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

// --- Enums (vocabulários fechados da planilha) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowStatus {
    Realizado,
    Confirmado,
}

impl ShowStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match norm_str(raw).as_str() {
            "REALIZADO" => Some(ShowStatus::Realizado),
            "CONFIRMADO" => Some(ShowStatus::Confirmado),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShowStatus::Realizado => "REALIZADO",
            ShowStatus::Confirmado => "CONFIRMADO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Entrada,
    Saida,
}

impl TransactionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match norm_str(raw).as_str() {
            "ENTRADA" => Some(TransactionType::Entrada),
            "SAIDA" => Some(TransactionType::Saida),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Entrada => "ENTRADA",
            TransactionType::Saida => "SAIDA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pago,
    NaoRecebido,
    Estornado,
    NaoPago,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match norm_str(raw).as_str() {
            "PAGO" => Some(PaymentStatus::Pago),
            "NAO RECEBIDO" => Some(PaymentStatus::NaoRecebido),
            "ESTORNADO" => Some(PaymentStatus::Estornado),
            "NAO PAGO" => Some(PaymentStatus::NaoPago),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pago => "PAGO",
            PaymentStatus::NaoRecebido => "NÃO RECEBIDO",
            PaymentStatus::Estornado => "ESTORNADO",
            PaymentStatus::NaoPago => "NÃO PAGO",
        }
    }
}

// --- Structs ---

/// Um show da agenda. Imutável após o carregamento; edições viram novas
/// linhas na fonte e um novo snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub show_id: String,
    pub data_show: NaiveDate,
    pub casa: String,
    pub cidade: String,
    pub status: ShowStatus,
    pub publico: u32,
    pub cache_acordado: Decimal,
    pub observacao: String,
}

/// Lançamento do livro-caixa. `valor` é sempre não-negativo; o sinal é
/// implícito no `tipo`. ESTORNADO nunca entra em agregado monetário.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub data: NaiveDate,
    pub tipo: TransactionType,
    pub categoria: String,
    pub subcategoria: String,
    pub descricao: String,
    pub valor: Decimal,
    pub show_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub conta: String,
}

impl Transaction {
    /// Só entra em caixa: payment_status == PAGO.
    pub fn entrada_paga(&self) -> bool {
        self.tipo == TransactionType::Entrada && self.payment_status == PaymentStatus::Pago
    }

    pub fn saida_paga(&self) -> bool {
        self.tipo == TransactionType::Saida && self.payment_status == PaymentStatus::Pago
    }

    pub fn a_receber(&self) -> bool {
        self.tipo == TransactionType::Entrada && self.payment_status == PaymentStatus::NaoRecebido
    }
}

/// Cachês de músicos aparecem com duas nomenclaturas na planilha histórica.
pub const CATEGORIAS_CACHE_MUSICOS: [&str; 2] = ["CACHES-MUSICOS", "PAYOUT_MUSICOS"];

/// Categorias consideradas despesa fixa para o KPI mensal.
pub const CATEGORIAS_DESPESAS_FIXAS: [&str; 7] = [
    "ALUGUEL",
    "INTERNET",
    "ENERGIA",
    "AGUA",
    "MANUTENCAO",
    "ASSINATURAS",
    "SEGURO",
];
