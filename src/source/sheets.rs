// src/source/sheets.rs
//
// Conector da planilha remota (Google Sheets API v4, fluxo JWT-bearer de
// conta de serviço). Valida credenciais antes de qualquer rede, re-tenta
// só falhas transitórias e mantém um log de diagnóstico append-only.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::common::error::{AppError, ErrorKind};
use crate::models::dataset::Provenance;
use crate::source::credentials::{ServiceAccountKey, validate_spreadsheet_id};
use crate::source::{RawRow, TabularSource};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const MAX_TENTATIVAS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 2;
const TIMEOUT_POR_TENTATIVA: Duration = Duration::from_secs(10);

/// Estado estruturado da conexão, consultável a qualquer momento.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub source_label: String,
    pub error_kind: Option<ErrorKind>,
    pub human_message: Option<String>,
    pub suggestion: Option<String>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn desconectado(label: &str) -> Self {
        Self {
            connected: false,
            source_label: label.to_string(),
            error_kind: None,
            human_message: None,
            suggestion: None,
            last_attempt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Entrada do log de diagnóstico, retido pela vida do processo.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
struct BearerToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
    title: String,
}

pub struct SheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    token: tokio::sync::Mutex<Option<BearerToken>>,
    status: std::sync::Mutex<ConnectionStatus>,
    log: std::sync::Mutex<Vec<LogEntry>>,
}

impl SheetsClient {
    /// Valida credencial e identificador ANTES de tocar a rede.
    pub fn new(key: ServiceAccountKey, spreadsheet_id: String) -> Result<Self, AppError> {
        validate_spreadsheet_id(&spreadsheet_id)?;

        let http = reqwest::Client::builder()
            .timeout(TIMEOUT_POR_TENTATIVA)
            .user_agent("rockbuzz-core/0.1")
            .build()
            .map_err(|e| AppError::Rede { detalhe: e.to_string() })?;

        Ok(Self {
            http,
            key,
            spreadsheet_id,
            token: tokio::sync::Mutex::new(None),
            status: std::sync::Mutex::new(ConnectionStatus::desconectado("Google Sheets")),
            log: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Estabelece o handle: troca a credencial por um token e faz uma
    /// leitura de sondagem. Não mexe em dados.
    pub async fn bootstrap(&self) -> Result<(), AppError> {
        self.registrar(LogLevel::Info, "Iniciando bootstrap do conector remoto".to_string());

        let resultado = async {
            self.ensure_token().await?;
            // Sondagem: metadados confirmam existência e permissão
            self.spreadsheet_meta().await?;
            Ok::<(), AppError>(())
        }
        .await;

        let mut status = self.status.lock().expect("status lock");
        status.last_attempt = Some(Utc::now());
        match &resultado {
            Ok(()) => {
                status.connected = true;
                status.error_kind = None;
                status.human_message = None;
                status.suggestion = None;
                drop(status);
                self.registrar(LogLevel::Info, "✅ Conectado ao Google Sheets".to_string());
                tracing::info!("✅ Conectado ao Google Sheets");
            }
            Err(e) => {
                status.connected = false;
                status.error_kind = Some(e.kind());
                status.human_message = Some(e.to_string());
                status.suggestion = Some(e.suggestion().to_string());
                drop(status);
                self.registrar(LogLevel::Error, format!("❌ Falha no bootstrap: {e}"));
                tracing::warn!("❌ Falha no bootstrap do Google Sheets: {e}");
            }
        }
        resultado
    }

    pub fn get_connection_status(&self) -> ConnectionStatus {
        self.status.lock().expect("status lock").clone()
    }

    pub fn diagnostic_log(&self) -> Vec<LogEntry> {
        self.log.lock().expect("log lock").clone()
    }

    fn registrar(&self, level: LogLevel, message: String) {
        self.log
            .lock()
            .expect("log lock")
            .push(LogEntry { timestamp: Utc::now(), level, message });
    }

    /// Assina o assertion RS256 com a chave da conta de serviço.
    fn assinar_assertion(&self) -> Result<String, AppError> {
        let agora = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: agora,
            exp: agora + 3600,
        };
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let chave = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|_| AppError::CredencialChaveMalformada)?;
        Ok(jsonwebtoken::encode(&header, &claims, &chave)?)
    }

    /// Retorna um token válido, renovando quando faltar menos de 1 minuto.
    async fn ensure_token(&self) -> Result<String, AppError> {
        let mut guarda = self.token.lock().await;
        if let Some(token) = guarda.as_ref() {
            if token.expires_at - Utc::now() > chrono::Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.assinar_assertion()?;
        let token_uri = self.key.token_uri.clone();
        let resposta = self
            .enviar_com_retry(|| {
                self.http.post(&token_uri).form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", assertion.as_str()),
                ])
            })
            .await?;

        let corpo: TokenResponse = resposta
            .json()
            .await
            .map_err(|e| AppError::Rede { detalhe: format!("resposta de token ilegível: {e}") })?;

        let token = BearerToken {
            access_token: corpo.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(corpo.expires_in),
        };
        let acesso = token.access_token.clone();
        *guarda = Some(token);
        self.registrar(LogLevel::Info, "Token de acesso renovado".to_string());
        Ok(acesso)
    }

    /// Até 3 tentativas com backoff exponencial (2s, 4s). Permissão e
    /// não-encontrado falham de imediato: não são transitórios.
    async fn enviar_com_retry<F>(&self, montar: F) -> Result<reqwest::Response, AppError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut ultimo_erro = String::new();

        for tentativa in 1..=MAX_TENTATIVAS {
            match montar().send().await {
                Ok(resposta) => {
                    let status = resposta.status();
                    if status.is_success() {
                        return Ok(resposta);
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        self.registrar(
                            LogLevel::Error,
                            format!("Acesso negado (HTTP {status}) na tentativa {tentativa}"),
                        );
                        return Err(AppError::PermissaoNegada);
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(AppError::NaoEncontrado {
                            planilha_id: self.spreadsheet_id.clone(),
                        });
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        ultimo_erro = format!("HTTP {status}");
                        self.registrar(
                            LogLevel::Warning,
                            format!("Falha transitória (HTTP {status}) na tentativa {tentativa}"),
                        );
                    } else {
                        let corpo = resposta.text().await.unwrap_or_default();
                        return Err(AppError::Rede {
                            detalhe: format!("HTTP {status}: {corpo}"),
                        });
                    }
                }
                Err(e) => {
                    ultimo_erro = if e.is_timeout() {
                        "timeout na requisição".to_string()
                    } else {
                        e.to_string()
                    };
                    self.registrar(
                        LogLevel::Warning,
                        format!("Tentativa {tentativa} falhou: {ultimo_erro}"),
                    );
                }
            }

            if tentativa < MAX_TENTATIVAS {
                let espera = BACKOFF_BASE_SECS << (tentativa - 1);
                sleep(Duration::from_secs(espera)).await;
            }
        }

        Err(AppError::Rede {
            detalhe: format!("esgotadas {MAX_TENTATIVAS} tentativas: {ultimo_erro}"),
        })
    }

    async fn spreadsheet_meta(&self) -> Result<SpreadsheetMeta, AppError> {
        let token = self.ensure_token().await?;
        let url = format!("{SHEETS_BASE}/{}", self.spreadsheet_id);
        let resposta = self
            .enviar_com_retry(|| {
                self.http
                    .get(&url)
                    .query(&[("fields", "sheets(properties(sheetId,title))")])
                    .bearer_auth(&token)
            })
            .await?;
        resposta
            .json()
            .await
            .map_err(|e| AppError::Rede { detalhe: format!("metadados ilegíveis: {e}") })
    }

    async fn read_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError> {
        let token = self.ensure_token().await?;
        let url = format!("{SHEETS_BASE}/{}/values/{range}", self.spreadsheet_id);
        let resposta = self
            .enviar_com_retry(|| {
                self.http
                    .get(&url)
                    .query(&[("majorDimension", "ROWS")])
                    .bearer_auth(&token)
            })
            .await?;

        let corpo: ValueRange = resposta
            .json()
            .await
            .map_err(|e| AppError::Rede { detalhe: format!("intervalo ilegível: {e}") })?;

        let linhas = corpo.values.unwrap_or_default();
        Ok(linhas
            .into_iter()
            .map(|linha| linha.into_iter().map(celula_para_texto).collect())
            .collect())
    }

    async fn write_values(
        &self,
        range: &str,
        valores: Vec<Vec<String>>,
        append: bool,
    ) -> Result<(), AppError> {
        let token = self.ensure_token().await?;
        let url = if append {
            format!("{SHEETS_BASE}/{}/values/{range}:append", self.spreadsheet_id)
        } else {
            format!("{SHEETS_BASE}/{}/values/{range}", self.spreadsheet_id)
        };
        let corpo = serde_json::json!({ "values": valores });

        self.enviar_com_retry(|| {
            let pedido = if append { self.http.post(&url) } else { self.http.put(&url) };
            pedido
                .query(&[("valueInputOption", "USER_ENTERED")])
                .bearer_auth(&token)
                .json(&corpo)
        })
        .await?;
        Ok(())
    }

    /// Localiza a linha (1-based, contando o cabeçalho) de um registro.
    async fn localizar_linha(
        &self,
        tabela: &str,
        coluna_id: &str,
        id: &str,
    ) -> Result<(Vec<String>, Vec<String>, usize), AppError> {
        let mut linhas = self.read_values(tabela).await?;
        if linhas.is_empty() {
            return Err(AppError::Escrita {
                detalhe: format!("aba '{tabela}' sem cabeçalho"),
            });
        }
        let cabecalho = linhas.remove(0);
        let idx_coluna = cabecalho.iter().position(|c| c == coluna_id).ok_or_else(|| {
            AppError::Escrita {
                detalhe: format!("coluna '{coluna_id}' não existe na aba '{tabela}'"),
            }
        })?;

        for (i, linha) in linhas.iter().enumerate() {
            if linha.get(idx_coluna).map(String::as_str) == Some(id) {
                // +2: uma pelo cabeçalho, uma pelo 1-based
                return Ok((cabecalho, linha.clone(), i + 2));
            }
        }
        Err(AppError::Escrita { detalhe: format!("registro não encontrado: {id}") })
    }
}

fn celula_para_texto(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Letra(s) de coluna no padrão A1 (1-based).
fn coluna_a1(mut n: usize) -> String {
    let mut letras = String::new();
    while n > 0 {
        let resto = (n - 1) % 26;
        letras.insert(0, (b'A' + resto as u8) as char);
        n = (n - 1) / 26;
    }
    letras
}

#[async_trait]
impl TabularSource for SheetsClient {
    fn provenance(&self) -> Provenance {
        Provenance::Remote
    }

    async fn read_table(&self, tabela: &str) -> Result<Vec<RawRow>, AppError> {
        let mut linhas = self.read_values(tabela).await?;
        if linhas.is_empty() {
            return Ok(Vec::new());
        }
        let cabecalho = linhas.remove(0);
        Ok(linhas
            .into_iter()
            .map(|linha| {
                cabecalho
                    .iter()
                    .enumerate()
                    .map(|(i, coluna)| {
                        (coluna.clone(), linha.get(i).cloned().unwrap_or_default())
                    })
                    .collect()
            })
            .collect())
    }

    async fn append_row(&self, tabela: &str, linha: &RawRow) -> Result<(), AppError> {
        let mut cabecalho = self
            .read_values(&format!("{tabela}!1:1"))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        // Aba virgem: o cabeçalho nasce das chaves da própria linha
        if cabecalho.is_empty() {
            cabecalho = linha.keys().cloned().collect();
            self.write_values(tabela, vec![cabecalho.clone()], true).await?;
        }

        let valores: Vec<String> = cabecalho
            .iter()
            .map(|c| linha.get(c).cloned().unwrap_or_default())
            .collect();
        self.write_values(tabela, vec![valores], true).await
    }

    async fn update_row(
        &self,
        tabela: &str,
        coluna_id: &str,
        id: &str,
        mudancas: &RawRow,
    ) -> Result<(), AppError> {
        let (cabecalho, linha_atual, numero) =
            self.localizar_linha(tabela, coluna_id, id).await?;

        let nova_linha: Vec<String> = cabecalho
            .iter()
            .enumerate()
            .map(|(i, coluna)| {
                mudancas
                    .get(coluna)
                    .cloned()
                    .unwrap_or_else(|| linha_atual.get(i).cloned().unwrap_or_default())
            })
            .collect();

        let range = format!("{tabela}!A{numero}:{}{numero}", coluna_a1(cabecalho.len()));
        self.write_values(&range, vec![nova_linha], false).await
    }

    async fn delete_row(&self, tabela: &str, coluna_id: &str, id: &str) -> Result<(), AppError> {
        let (_, _, numero) = self.localizar_linha(tabela, coluna_id, id).await?;

        let meta = self.spreadsheet_meta().await?;
        let sheet_id = meta
            .sheets
            .iter()
            .find(|s| s.properties.title == tabela)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| AppError::Escrita {
                detalhe: format!("aba não encontrada: {tabela}"),
            })?;

        let token = self.ensure_token().await?;
        let url = format!("{SHEETS_BASE}/{}:batchUpdate", self.spreadsheet_id);
        let corpo = serde_json::json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": numero - 1,
                        "endIndex": numero
                    }
                }
            }]
        });
        self.enviar_com_retry(|| self.http.post(&url).bearer_auth(&token).json(&corpo))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coluna_a1_basica() {
        assert_eq!(coluna_a1(1), "A");
        assert_eq!(coluna_a1(10), "J");
        assert_eq!(coluna_a1(26), "Z");
        assert_eq!(coluna_a1(27), "AA");
        assert_eq!(coluna_a1(52), "AZ");
    }

    #[test]
    fn celula_converte_tipos_basicos() {
        assert_eq!(celula_para_texto(serde_json::json!("abc")), "abc");
        assert_eq!(celula_para_texto(serde_json::json!(12.5)), "12.5");
        assert_eq!(celula_para_texto(serde_json::json!(true)), "true");
        assert_eq!(celula_para_texto(serde_json::Value::Null), "");
    }
}
