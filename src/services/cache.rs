// src/services/cache.rs
//
// Cache do snapshot normalizado: TTL de 5 minutos, recarga única sob
// concorrência (single-flight), escrita serializada com invalidação e
// persistência best-effort em disco para sobreviver a restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::common::error::AppError;
use crate::models::dataset::NormalizedDataset;
use crate::source::loader::DatasetLoader;
use crate::source::mutation::Mutation;

pub const TTL_PADRAO: Duration = Duration::from_secs(300);

pub struct DataCache {
    loader: DatasetLoader,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<NormalizedDataset>>>,
    /// Garante UMA recarga por expiração, mesmo com leitores concorrentes.
    reload_lock: Mutex<()>,
    /// Serializa escritas; leituras seguem livres no snapshot corrente.
    write_lock: Mutex<()>,
    persist_path: PathBuf,
}

impl DataCache {
    pub fn new(loader: DatasetLoader, ttl: Duration, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            ttl,
            snapshot: RwLock::new(None),
            reload_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            persist_path: cache_dir.into().join("dataset.json"),
        }
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    fn fresco(&self, dataset: &NormalizedDataset) -> bool {
        let idade = Utc::now().signed_duration_since(dataset.loaded_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => idade >= chrono::Duration::zero() && idade < ttl,
            Err(_) => false,
        }
    }

    /// Snapshot fresco do cache, ou uma recarga completa. Um snapshot
    /// além do TTL é tratado como ausente.
    pub async fn get_or_load(&self) -> Result<Arc<NormalizedDataset>, AppError> {
        if let Some(dataset) = self.snapshot.read().await.as_ref() {
            if self.fresco(dataset) {
                return Ok(Arc::clone(dataset));
            }
        }

        let _recarga = self.reload_lock.lock().await;

        // Outro chamador pode ter recarregado enquanto esperávamos
        if let Some(dataset) = self.snapshot.read().await.as_ref() {
            if self.fresco(dataset) {
                return Ok(Arc::clone(dataset));
            }
        }

        // Partida a frio: o blob persistido vale como cache se ainda
        // estiver dentro do TTL
        if self.snapshot.read().await.is_none() {
            if let Some(dataset) = self.ler_persistido() {
                if self.fresco(&dataset) {
                    info!("✅ Cache restaurado do disco ({})", self.persist_path.display());
                    let dataset = Arc::new(dataset);
                    *self.snapshot.write().await = Some(Arc::clone(&dataset));
                    return Ok(dataset);
                }
            }
        }

        let dataset = Arc::new(self.loader.load().await?);
        *self.snapshot.write().await = Some(Arc::clone(&dataset));
        self.persistir(&dataset);
        Ok(dataset)
    }

    /// Descarta o snapshot em memória e o blob em disco; a próxima
    /// leitura recarrega da fonte.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
        if let Err(err) = fs::remove_file(&self.persist_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!("Falha ao remover cache persistido: {err}");
            }
        }
    }

    /// Aplica a mutação na fonte de escrita e, SÓ em caso de sucesso,
    /// invalida o cache. Falha deixa o cache intacto: dado em cache
    /// nunca reflete escrita que não durou.
    pub async fn write_through(&self, mutation: &Mutation) -> Result<(), AppError> {
        let _escrita = self.write_lock.lock().await;
        mutation.apply(self.loader.fonte_de_escrita()).await?;
        info!("✅ Escrita aplicada na aba '{}'; cache invalidado", mutation.tabela());
        self.invalidate().await;
        Ok(())
    }

    /// Blob corrompido ou ilegível é cache miss, nunca erro.
    fn ler_persistido(&self) -> Option<NormalizedDataset> {
        let conteudo = fs::read_to_string(&self.persist_path).ok()?;
        match serde_json::from_str(&conteudo) {
            Ok(dataset) => Some(dataset),
            Err(err) => {
                warn!("⚠️ Cache persistido corrompido, ignorando: {err}");
                None
            }
        }
    }

    /// Persistência best-effort: falha vira log, nunca erro de leitura.
    fn persistir(&self, dataset: &NormalizedDataset) {
        if let Err(err) = self.gravar_atomico(dataset) {
            warn!("⚠️ Falha ao persistir cache em disco: {err}");
        }
    }

    fn gravar_atomico(&self, dataset: &NormalizedDataset) -> Result<(), AppError> {
        let dir = self.persist_path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let temporario = dir.join(format!(".dataset.json.tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&temporario, serde_json::to_vec(dataset).map_err(anyhow::Error::from)?)?;
        fs::rename(&temporario, &self.persist_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::local::CsvStore;
    use crate::source::{RawRow, TabularSource};

    fn dir_temporario(prefixo: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefixo}-{}", uuid::Uuid::new_v4()))
    }

    fn linha(pares: &[(&str, &str)]) -> RawRow {
        pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn semear(loja: &CsvStore) {
        loja.append_row(
            "shows",
            &linha(&[
                ("show_id", "S1"),
                ("data_show", "2026-08-01"),
                ("casa", "Casa"),
                ("cidade", "Cidade"),
                ("status", "REALIZADO"),
                ("publico", "100"),
                ("cache_acordado", "1000.00"),
            ]),
        )
        .await
        .unwrap();
        loja.append_row(
            "transactions",
            &linha(&[
                ("id", "T1"),
                ("data", "2026-08-01"),
                ("tipo", "ENTRADA"),
                ("categoria", "CACHE"),
                ("valor", "1000.00"),
                ("show_id", "S1"),
                ("payment_status", "PAGO"),
            ]),
        )
        .await
        .unwrap();
    }

    fn cache_local(dados: PathBuf, blobs: PathBuf, ttl: Duration) -> DataCache {
        let loader = DatasetLoader::new(None, Arc::new(CsvStore::new(dados)), true);
        DataCache::new(loader, ttl, blobs)
    }

    #[tokio::test]
    async fn snapshot_fresco_nao_recarrega() {
        let dados = dir_temporario("rockbuzz-cache-dados");
        let blobs = dir_temporario("rockbuzz-cache-blobs");
        let loja = CsvStore::new(dados.clone());
        semear(&loja).await;

        let cache = cache_local(dados.clone(), blobs.clone(), TTL_PADRAO);
        let primeiro = cache.get_or_load().await.unwrap();
        let segundo = cache.get_or_load().await.unwrap();
        assert!(Arc::ptr_eq(&primeiro, &segundo));

        std::fs::remove_dir_all(&dados).ok();
        std::fs::remove_dir_all(&blobs).ok();
    }

    #[tokio::test]
    async fn escrita_invalida_o_cache() {
        let dados = dir_temporario("rockbuzz-cache-dados");
        let blobs = dir_temporario("rockbuzz-cache-blobs");
        let loja = CsvStore::new(dados.clone());
        semear(&loja).await;

        let cache = cache_local(dados.clone(), blobs.clone(), TTL_PADRAO);
        let antes = cache.get_or_load().await.unwrap();
        assert_eq!(antes.transactions.len(), 1);

        let mutation = Mutation::AppendRow {
            tabela: "transactions",
            linha: linha(&[
                ("id", "T2"),
                ("data", "2026-08-02"),
                ("tipo", "SAIDA"),
                ("categoria", "TRANSPORTE"),
                ("valor", "200.00"),
                ("payment_status", "PAGO"),
            ]),
        };
        cache.write_through(&mutation).await.unwrap();

        let depois = cache.get_or_load().await.unwrap();
        assert_eq!(depois.transactions.len(), 2);
        assert!(!Arc::ptr_eq(&antes, &depois));

        std::fs::remove_dir_all(&dados).ok();
        std::fs::remove_dir_all(&blobs).ok();
    }

    #[tokio::test]
    async fn escrita_que_falha_preserva_o_cache() {
        let dados = dir_temporario("rockbuzz-cache-dados");
        let blobs = dir_temporario("rockbuzz-cache-blobs");
        let loja = CsvStore::new(dados.clone());
        semear(&loja).await;

        let cache = cache_local(dados.clone(), blobs.clone(), TTL_PADRAO);
        let antes = cache.get_or_load().await.unwrap();

        let mutation = Mutation::DeleteRow {
            tabela: "transactions",
            coluna_id: "id",
            id: "T-inexistente".into(),
        };
        assert!(cache.write_through(&mutation).await.is_err());

        let depois = cache.get_or_load().await.unwrap();
        assert!(Arc::ptr_eq(&antes, &depois));

        std::fs::remove_dir_all(&dados).ok();
        std::fs::remove_dir_all(&blobs).ok();
    }

    #[tokio::test]
    async fn blob_corrompido_e_cache_miss() {
        let dados = dir_temporario("rockbuzz-cache-dados");
        let blobs = dir_temporario("rockbuzz-cache-blobs");
        let loja = CsvStore::new(dados.clone());
        semear(&loja).await;

        std::fs::create_dir_all(&blobs).unwrap();
        std::fs::write(blobs.join("dataset.json"), b"{isto nao e json").unwrap();

        let cache = cache_local(dados.clone(), blobs.clone(), TTL_PADRAO);
        let dataset = cache.get_or_load().await.unwrap();
        assert_eq!(dataset.shows.len(), 1);

        std::fs::remove_dir_all(&dados).ok();
        std::fs::remove_dir_all(&blobs).ok();
    }

    #[tokio::test]
    async fn ttl_zero_expira_imediatamente() {
        let dados = dir_temporario("rockbuzz-cache-dados");
        let blobs = dir_temporario("rockbuzz-cache-blobs");
        let loja = CsvStore::new(dados.clone());
        semear(&loja).await;

        let cache = cache_local(dados.clone(), blobs.clone(), Duration::ZERO);
        let primeiro = cache.get_or_load().await.unwrap();
        let segundo = cache.get_or_load().await.unwrap();
        assert!(!Arc::ptr_eq(&primeiro, &segundo));

        std::fs::remove_dir_all(&dados).ok();
        std::fs::remove_dir_all(&blobs).ok();
    }
}
