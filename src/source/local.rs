// src/source/local.rs
//
// Fonte de fallback: um arquivo CSV por aba dentro de um diretório local.
// Mesma forma tabular da planilha remota; o loader não distingue as duas.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};

use crate::common::error::AppError;
use crate::models::dataset::Provenance;
use crate::source::{RawRow, TabularSource};

pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn caminho(&self, tabela: &str) -> PathBuf {
        self.dir.join(format!("{tabela}.csv"))
    }

    /// Aba ausente é tratada como vazia; quem valida decide se isso é
    /// um warning.
    fn ler(&self, tabela: &str) -> Result<(Vec<String>, Vec<Vec<String>>), AppError> {
        let caminho = self.caminho(tabela);
        if !caminho.exists() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut leitor = ReaderBuilder::new().flexible(true).from_path(&caminho)?;
        let cabecalho: Vec<String> =
            leitor.headers()?.iter().map(|c| c.trim().to_string()).collect();

        let mut linhas = Vec::new();
        for registro in leitor.records() {
            let registro = registro?;
            linhas.push(registro.iter().map(str::to_string).collect());
        }
        Ok((cabecalho, linhas))
    }

    /// Regrava a aba inteira de forma atômica (temp + rename), para que
    /// nenhum leitor concorrente observe um arquivo pela metade.
    fn regravar(
        &self,
        tabela: &str,
        cabecalho: &[String],
        linhas: &[Vec<String>],
    ) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        let temporario = self.dir.join(format!(".{tabela}.csv.tmp-{}", uuid::Uuid::new_v4()));

        {
            let mut escritor = WriterBuilder::new().flexible(true).from_path(&temporario)?;
            escritor.write_record(cabecalho)?;
            for linha in linhas {
                escritor.write_record(linha)?;
            }
            escritor.flush()?;
        }

        fs::rename(&temporario, self.caminho(tabela))?;
        Ok(())
    }
}

#[async_trait]
impl TabularSource for CsvStore {
    fn provenance(&self) -> Provenance {
        Provenance::LocalFallback
    }

    async fn read_table(&self, tabela: &str) -> Result<Vec<RawRow>, AppError> {
        let (cabecalho, linhas) = self.ler(tabela)?;
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
        let (mut cabecalho, mut linhas) = self.ler(tabela)?;
        if cabecalho.is_empty() {
            cabecalho = linha.keys().cloned().collect();
        }
        linhas.push(
            cabecalho.iter().map(|c| linha.get(c).cloned().unwrap_or_default()).collect(),
        );
        self.regravar(tabela, &cabecalho, &linhas)
    }

    async fn update_row(
        &self,
        tabela: &str,
        coluna_id: &str,
        id: &str,
        mudancas: &RawRow,
    ) -> Result<(), AppError> {
        let (cabecalho, mut linhas) = self.ler(tabela)?;
        let idx_coluna = cabecalho.iter().position(|c| c == coluna_id).ok_or_else(|| {
            AppError::Escrita {
                detalhe: format!("coluna '{coluna_id}' não existe na aba '{tabela}'"),
            }
        })?;

        let linha = linhas
            .iter_mut()
            .find(|l| l.get(idx_coluna).map(String::as_str) == Some(id))
            .ok_or_else(|| AppError::Escrita {
                detalhe: format!("registro não encontrado: {id}"),
            })?;

        for (i, coluna) in cabecalho.iter().enumerate() {
            if let Some(novo) = mudancas.get(coluna) {
                if i < linha.len() {
                    linha[i] = novo.clone();
                } else {
                    linha.resize(i, String::new());
                    linha.push(novo.clone());
                }
            }
        }

        self.regravar(tabela, &cabecalho, &linhas)
    }

    async fn delete_row(&self, tabela: &str, coluna_id: &str, id: &str) -> Result<(), AppError> {
        let (cabecalho, mut linhas) = self.ler(tabela)?;
        let idx_coluna = cabecalho.iter().position(|c| c == coluna_id).ok_or_else(|| {
            AppError::Escrita {
                detalhe: format!("coluna '{coluna_id}' não existe na aba '{tabela}'"),
            }
        })?;

        let antes = linhas.len();
        linhas.retain(|l| l.get(idx_coluna).map(String::as_str) != Some(id));
        if linhas.len() == antes {
            return Err(AppError::Escrita { detalhe: format!("registro não encontrado: {id}") });
        }

        self.regravar(tabela, &cabecalho, &linhas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loja_temporaria() -> CsvStore {
        let dir = std::env::temp_dir().join(format!("rockbuzz-csv-{}", uuid::Uuid::new_v4()));
        CsvStore::new(dir)
    }

    fn linha(pares: &[(&str, &str)]) -> RawRow {
        pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn ciclo_de_vida_de_uma_aba() {
        let loja = loja_temporaria();

        // Aba inexistente lê vazio
        assert!(loja.read_table("members").await.unwrap().is_empty());

        loja.append_row("members", &linha(&[("member_id", "M1"), ("nome", "Zé"), ("ativo", "SIM")]))
            .await
            .unwrap();
        loja.append_row("members", &linha(&[("member_id", "M2"), ("nome", "Ana"), ("ativo", "SIM")]))
            .await
            .unwrap();

        let lidas = loja.read_table("members").await.unwrap();
        assert_eq!(lidas.len(), 2);
        assert_eq!(lidas[0]["nome"], "Zé");

        loja.update_row("members", "member_id", "M2", &linha(&[("ativo", "NÃO")]))
            .await
            .unwrap();
        let lidas = loja.read_table("members").await.unwrap();
        assert_eq!(lidas[1]["ativo"], "NÃO");

        loja.delete_row("members", "member_id", "M1").await.unwrap();
        let lidas = loja.read_table("members").await.unwrap();
        assert_eq!(lidas.len(), 1);
        assert_eq!(lidas[0]["member_id"], "M2");

        let err = loja.delete_row("members", "member_id", "M9").await.unwrap_err();
        assert!(matches!(err, AppError::Escrita { .. }));

        std::fs::remove_dir_all(loja.dir()).ok();
    }
}
