// tests/engine_test.rs
//
// Teste de ponta a ponta do motor em modo local: carga, KPIs, rateio e
// o ciclo escrita -> invalidação -> recarga.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;

use rockbuzz_core::config::{AppConfig, PrimarySource};
use rockbuzz_core::models::ledger::{PaymentStatus, TransactionType};
use rockbuzz_core::source::mutation::NovaTransacao;
use rockbuzz_core::{FinanceEngine, PeriodFilter, Provenance};

fn dir_temporario(prefixo: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{prefixo}-{}", uuid::Uuid::new_v4()))
}

fn config_local(fallback_dir: PathBuf, cache_dir: PathBuf) -> AppConfig {
    AppConfig {
        credentials_json: None,
        spreadsheet_id: None,
        primary_source: PrimarySource::Local,
        allow_fallback: true,
        fallback_dir,
        cache_dir,
        cache_ttl: Duration::from_secs(300),
    }
}

/// Abas mínimas: um show realizado neste mês, receita paga, regra única
/// e três integrantes com pesos iguais.
fn semear(dir: &PathBuf) {
    std::fs::create_dir_all(dir).unwrap();
    let hoje = Utc::now().date_naive();
    let data = hoje.format("%Y-%m-%d").to_string();
    let ano = hoje.year();

    std::fs::write(
        dir.join("shows.csv"),
        format!(
            "show_id,data_show,casa,cidade,status,publico,cache_acordado,observacao\n\
             S1,{data},Bar do Zé,São Paulo,REALIZADO,90,1000.00,\n"
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("transactions.csv"),
        format!(
            "id,data,tipo,categoria,subcategoria,descricao,valor,show_id,payment_status,conta\n\
             T1,{data},ENTRADA,CACHE,,,1000.01,S1,PAGO,PIX\n\
             T2,{data},ENTRADA,CACHE,,,500.00,S1,NÃO RECEBIDO,PIX\n"
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("payout_rules.csv"),
        format!(
            "rule_id,nome_regra,modelo,pct_caixa,pct_musicos,ativa,vigencia_inicio,vigencia_fim\n\
             R1,Padrão,PERCENTUAL,0,100,SIM,{ano}-01-01,\n"
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("members.csv"),
        "member_id,nome,ativo\nM1,Zé,SIM\nM2,Ana,SIM\nM3,Bia,SIM\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("member_shares.csv"),
        "share_id,rule_id,member_id,tipo,peso,valor_fixo\n\
         P1,R1,M1,PESO,1,\nP2,R1,M2,PESO,1,\nP3,R1,M3,PESO,1,\n",
    )
    .unwrap();
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[tokio::test]
async fn carga_kpis_e_rateio_de_ponta_a_ponta() {
    let dados = dir_temporario("rockbuzz-engine-dados");
    let blobs = dir_temporario("rockbuzz-engine-blobs");
    semear(&dados);

    let engine = FinanceEngine::from_config(&config_local(dados.clone(), blobs.clone()))
        .await
        .unwrap();

    let dataset = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    assert_eq!(dataset.provenance, Provenance::LocalFallback);
    assert_eq!(dataset.shows.len(), 1);

    let kpis = engine.compute_kpis(&dataset, PeriodFilter::MesAtual);
    assert_eq!(kpis.total_shows_realizados, 1);
    assert_eq!(kpis.total_entradas, dec("1000.01"));
    assert_eq!(kpis.a_receber, dec("500.00"));
    assert_eq!(kpis.publico_total, 90);

    let rateio = engine.allocate_payout(&dataset, "S1").unwrap();
    let valores: Vec<String> = rateio.pesos.iter().map(|p| p.valor.to_string()).collect();
    assert_eq!(valores, vec!["333.34", "333.34", "333.33"]);
    let soma: Decimal = rateio.pesos.iter().map(|p| p.valor).sum();
    assert_eq!(soma + rateio.caixa_retido, rateio.receita_reconhecida);

    std::fs::remove_dir_all(&dados).ok();
    std::fs::remove_dir_all(&blobs).ok();
}

#[tokio::test]
async fn duas_cargas_sem_escrita_dao_os_mesmos_kpis() {
    let dados = dir_temporario("rockbuzz-engine-dados");
    let blobs = dir_temporario("rockbuzz-engine-blobs");
    semear(&dados);

    let engine = FinanceEngine::from_config(&config_local(dados.clone(), blobs.clone()))
        .await
        .unwrap();

    let a = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    let b = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let kpis_a = engine.compute_kpis(&a, PeriodFilter::TodoPeriodo);
    let kpis_b = engine.compute_kpis(&b, PeriodFilter::TodoPeriodo);
    assert_eq!(kpis_a.caixa_atual, kpis_b.caixa_atual);
    assert_eq!(kpis_a.total_entradas, kpis_b.total_entradas);

    std::fs::remove_dir_all(&dados).ok();
    std::fs::remove_dir_all(&blobs).ok();
}

#[tokio::test]
async fn escrita_confirmada_aparece_na_leitura_seguinte() {
    let dados = dir_temporario("rockbuzz-engine-dados");
    let blobs = dir_temporario("rockbuzz-engine-blobs");
    semear(&dados);

    let engine = FinanceEngine::from_config(&config_local(dados.clone(), blobs.clone()))
        .await
        .unwrap();

    let antes = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    let kpis_antes = engine.compute_kpis(&antes, PeriodFilter::MesAtual);

    engine
        .registrar_transacao(NovaTransacao {
            data: Utc::now().date_naive(),
            tipo: TransactionType::Saida,
            categoria: "TRANSPORTE".into(),
            subcategoria: String::new(),
            descricao: "Van para o show".into(),
            valor: dec("200.00"),
            show_id: Some("S1".into()),
            payment_status: PaymentStatus::Pago,
            conta: "PIX".into(),
        })
        .await
        .unwrap();

    let depois = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    assert!(!Arc::ptr_eq(&antes, &depois));
    assert_eq!(depois.transactions.len(), antes.transactions.len() + 1);

    let kpis_depois = engine.compute_kpis(&depois, PeriodFilter::MesAtual);
    assert_eq!(kpis_depois.total_despesas, kpis_antes.total_despesas + dec("200.00"));
    assert_eq!(kpis_depois.caixa_atual, kpis_antes.caixa_atual - dec("200.00"));

    std::fs::remove_dir_all(&dados).ok();
    std::fs::remove_dir_all(&blobs).ok();
}

#[tokio::test]
async fn transacao_invalida_nao_toca_a_fonte() {
    let dados = dir_temporario("rockbuzz-engine-dados");
    let blobs = dir_temporario("rockbuzz-engine-blobs");
    semear(&dados);

    let engine = FinanceEngine::from_config(&config_local(dados.clone(), blobs.clone()))
        .await
        .unwrap();

    let antes = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();

    let resultado = engine
        .registrar_transacao(NovaTransacao {
            data: Utc::now().date_naive(),
            tipo: TransactionType::Saida,
            categoria: String::new(),
            subcategoria: String::new(),
            descricao: String::new(),
            valor: dec("50.00"),
            show_id: None,
            payment_status: PaymentStatus::Pago,
            conta: String::new(),
        })
        .await;
    assert!(resultado.is_err());

    let depois = engine.load_dataset(PeriodFilter::TodoPeriodo).await.unwrap();
    assert!(Arc::ptr_eq(&antes, &depois));

    std::fs::remove_dir_all(&dados).ok();
    std::fs::remove_dir_all(&blobs).ok();
}

#[tokio::test]
async fn status_em_modo_local_reporta_o_fallback() {
    let dados = dir_temporario("rockbuzz-engine-dados");
    let blobs = dir_temporario("rockbuzz-engine-blobs");
    semear(&dados);

    let engine = FinanceEngine::from_config(&config_local(dados.clone(), blobs.clone()))
        .await
        .unwrap();

    let status = engine.get_connection_status();
    assert!(status.connected);
    assert_eq!(status.source_label, "Arquivo local (fallback)");
    assert!(engine.diagnostic_log().is_empty());

    std::fs::remove_dir_all(&dados).ok();
    std::fs::remove_dir_all(&blobs).ok();
}
