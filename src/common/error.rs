// src/common/error.rs

use thiserror::Error;

use crate::services::payout::RuleResolutionError;

/// Classe do erro, exposta no `ConnectionStatus` e usada pelos chamadores
/// para decidir entre reconfigurar, tentar de novo ou cair para o fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Credencial,
    Rede,
    Permissao,
    NaoEncontrado,
    Escrita,
    FonteIndisponivel,
    Rateio,
    Validacao,
    Interno,
}

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Erros de credencial são fatais (nunca re-tentados); erros de rede são
// transitórios e passam pela política de retry do conector.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credencial incompleta: campos ausentes: {campos}")]
    CredencialIncompleta { campos: String },

    #[error("Credencial com campo de tipo inválido: '{campo}'")]
    CredencialTipoInvalido { campo: String },

    #[error("Chave privada da credencial com formato inválido")]
    CredencialChaveMalformada,

    #[error("Identificador de planilha inválido: {motivo}")]
    PlanilhaIdInvalido { motivo: String },

    #[error("Erro de rede ao acessar a fonte remota: {detalhe}")]
    Rede { detalhe: String },

    #[error("Acesso negado à planilha remota")]
    PermissaoNegada,

    #[error("Planilha não encontrada: {planilha_id}")]
    NaoEncontrado { planilha_id: String },

    #[error("Nenhuma fonte de dados disponível: {detalhe}")]
    FonteIndisponivel { detalhe: String },

    #[error("Falha ao gravar na fonte de dados: {detalhe}")]
    Escrita { detalhe: String },

    #[error(transparent)]
    Rateio(#[from] RuleResolutionError),

    #[error("Rateio inconsistente: {detalhe}")]
    Alocacao { detalhe: String },

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro de E/S")]
    IoError(#[from] std::io::Error),

    #[error("Erro ao ler CSV local")]
    CsvError(#[from] csv::Error),

    // Variante genérica para qualquer outro erro inesperado
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::CredencialIncompleta { .. }
            | AppError::CredencialTipoInvalido { .. }
            | AppError::CredencialChaveMalformada => ErrorKind::Credencial,
            AppError::PlanilhaIdInvalido { .. } => ErrorKind::Credencial,
            AppError::Rede { .. } => ErrorKind::Rede,
            AppError::PermissaoNegada => ErrorKind::Permissao,
            AppError::NaoEncontrado { .. } => ErrorKind::NaoEncontrado,
            AppError::FonteIndisponivel { .. } => ErrorKind::FonteIndisponivel,
            AppError::Escrita { .. } | AppError::IoError(_) | AppError::CsvError(_) => {
                ErrorKind::Escrita
            }
            AppError::Rateio(_) | AppError::Alocacao { .. } => ErrorKind::Rateio,
            AppError::ValidationError(_) => ErrorKind::Validacao,
            AppError::JwtError(_) | AppError::InternalError(_) => ErrorKind::Interno,
        }
    }

    /// Erros transitórios podem ser re-tentados; os demais não.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Rede { .. })
    }

    /// Sugestão de correção legível, sem nunca expor material de credencial.
    pub fn suggestion(&self) -> &'static str {
        match self {
            AppError::CredencialIncompleta { .. }
            | AppError::CredencialTipoInvalido { .. }
            | AppError::CredencialChaveMalformada => {
                "Revise o JSON da conta de serviço apontado por ROCKBUZZ_CREDENTIALS_FILE \
                 (ou o conteúdo de ROCKBUZZ_CREDENTIALS_JSON)."
            }
            AppError::PlanilhaIdInvalido { .. } => {
                "Copie o identificador da URL da planilha (trecho entre /d/ e /edit) \
                 para ROCKBUZZ_SPREADSHEET_ID."
            }
            AppError::Rede { .. } => {
                "Verifique a conexão de rede; o sistema cai para o arquivo local \
                 quando o fallback está habilitado."
            }
            AppError::PermissaoNegada => {
                "Compartilhe a planilha com o e-mail da conta de serviço (client_email) \
                 com permissão de edição."
            }
            AppError::NaoEncontrado { .. } => {
                "Confirme se o ROCKBUZZ_SPREADSHEET_ID aponta para uma planilha existente."
            }
            AppError::FonteIndisponivel { .. } => {
                "Configure a fonte remota ou disponibilize os arquivos CSV em ROCKBUZZ_FALLBACK_DIR."
            }
            AppError::Escrita { .. } | AppError::IoError(_) | AppError::CsvError(_) => {
                "A gravação falhou e o cache não foi alterado; tente novamente."
            }
            AppError::Rateio(_) | AppError::Alocacao { .. } => {
                "Revise as regras de rateio ativas e suas vigências para a data do show."
            }
            AppError::ValidationError(_) => "Um ou mais campos do registro são inválidos.",
            AppError::JwtError(_) | AppError::InternalError(_) => {
                "Erro inesperado; consulte o log de diagnóstico do conector."
            }
        }
    }
}
