// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::common::error::AppError;

/// Fonte primária de dados. `Local` ignora a planilha remota mesmo com
/// credencial configurada (modo offline explícito).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimarySource {
    Remote,
    Local,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Conteúdo do JSON de conta de serviço, se configurado.
    pub credentials_json: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub primary_source: PrimarySource,
    pub allow_fallback: bool,
    /// Diretório dos CSVs de fallback.
    pub fallback_dir: PathBuf,
    /// Diretório do blob de cache persistido.
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
}

impl AppConfig {
    /// Carrega de variáveis de ambiente (`.env` incluso via dotenvy).
    /// O conteúdo da credencial NUNCA aparece em log ou mensagem de erro.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let credentials_json = match env::var("ROCKBUZZ_CREDENTIALS_JSON") {
            Ok(json) if !json.trim().is_empty() => Some(json),
            _ => match env::var("ROCKBUZZ_CREDENTIALS_FILE") {
                Ok(caminho) if !caminho.trim().is_empty() => {
                    Some(std::fs::read_to_string(caminho.trim())?)
                }
                _ => None,
            },
        };

        let spreadsheet_id = env::var("ROCKBUZZ_SPREADSHEET_ID")
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let primary_source = match env::var("ROCKBUZZ_PRIMARY_SOURCE").as_deref() {
            Ok("local") | Ok("LOCAL") => PrimarySource::Local,
            _ => PrimarySource::Remote,
        };

        let allow_fallback = env::var("ROCKBUZZ_ALLOW_FALLBACK")
            .map(|v| !matches!(v.trim(), "false" | "FALSE" | "0" | "nao" | "NAO" | "não"))
            .unwrap_or(true);

        let cache_ttl = match env::var("ROCKBUZZ_CACHE_TTL") {
            Ok(segundos) => match segundos.trim().parse::<u64>() {
                Ok(s) => Duration::from_secs(s),
                Err(_) => {
                    warn!("⚠️ ROCKBUZZ_CACHE_TTL inválido ('{segundos}'); usando 300s");
                    Duration::from_secs(300)
                }
            },
            Err(_) => Duration::from_secs(300),
        };

        Ok(Self {
            credentials_json,
            spreadsheet_id,
            primary_source,
            allow_fallback,
            fallback_dir: PathBuf::from(
                env::var("ROCKBUZZ_FALLBACK_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            cache_dir: PathBuf::from(
                env::var("ROCKBUZZ_CACHE_DIR").unwrap_or_else(|_| "cache".to_string()),
            ),
            cache_ttl,
        })
    }

    /// Modo remoto exige credencial E identificador da planilha.
    pub fn remoto_configurado(&self) -> bool {
        self.primary_source == PrimarySource::Remote
            && self.credentials_json.is_some()
            && self.spreadsheet_id.is_some()
    }
}
