// src/services/validators.rs
//
// Checagens estruturais e semânticas do snapshot. Nada aqui lança erro:
// problemas viram avisos anexados ao dataset e o cálculo segue com o
// subconjunto utilizável.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::dataset::{NormalizedDataset, Severity, ValidationWarning};
use crate::models::payout::PayoutRule;

/// Janelas meio-abertas se intersectam quando cada uma começa antes do
/// fim da outra. `None` = sem limite daquele lado.
fn vigencias_se_sobrepoem(a: &PayoutRule, b: &PayoutRule) -> bool {
    let comeca_antes_do_fim = |inicio: Option<NaiveDate>, fim: Option<NaiveDate>| match (inicio, fim)
    {
        (Some(i), Some(f)) => i < f,
        _ => true,
    };
    comeca_antes_do_fim(a.vigencia_inicio, b.vigencia_fim)
        && comeca_antes_do_fim(b.vigencia_inicio, a.vigencia_fim)
}

pub fn validate(dataset: &NormalizedDataset) -> Vec<ValidationWarning> {
    let mut avisos = Vec::new();
    let cem = Decimal::from(100);

    let vazias: [(&str, bool); 6] = [
        ("shows", dataset.shows.is_empty()),
        ("transactions", dataset.transactions.is_empty()),
        ("payout_rules", dataset.payout_rules.is_empty()),
        ("show_payout_config", dataset.show_payout_configs.is_empty()),
        ("members", dataset.members.is_empty()),
        ("member_shares", dataset.member_shares.is_empty()),
    ];
    for (tabela, vazia) in vazias {
        if vazia {
            avisos.push(ValidationWarning::new(Severity::Info, tabela, "aba sem registros"));
        }
    }

    // Regras de rateio: percentuais e vigências
    for regra in &dataset.payout_rules {
        let faixa = Decimal::ZERO..=cem;
        if !faixa.contains(&regra.pct_caixa) || !faixa.contains(&regra.pct_musicos) {
            avisos.push(ValidationWarning::new(
                Severity::Critical,
                "payout_rules",
                format!("regra {} com percentual fora de 0-100", regra.rule_id),
            ));
        } else if regra.pct_caixa + regra.pct_musicos > cem {
            avisos.push(ValidationWarning::new(
                Severity::Critical,
                "payout_rules",
                format!("regra {}: pct_caixa + pct_musicos excede 100", regra.rule_id),
            ));
        }

        if let (Some(inicio), Some(fim)) = (regra.vigencia_inicio, regra.vigencia_fim) {
            if fim <= inicio {
                avisos.push(ValidationWarning::new(
                    Severity::Warning,
                    "payout_rules",
                    format!("regra {} com vigência invertida ou vazia", regra.rule_id),
                ));
            }
        }
    }

    // Regras ativas com vigência sobreposta: rateio sem config explícita
    // vai falhar nesse intervalo
    let ativas: Vec<&PayoutRule> = dataset.payout_rules.iter().filter(|r| r.ativa).collect();
    for (i, a) in ativas.iter().enumerate() {
        for b in &ativas[i + 1..] {
            if vigencias_se_sobrepoem(a, b) {
                avisos.push(ValidationWarning::new(
                    Severity::Warning,
                    "payout_rules",
                    format!("regras ativas {} e {} com vigências sobrepostas", a.rule_id, b.rule_id),
                ));
            }
        }
    }

    // Integridade referencial
    let shows: HashSet<&str> = dataset.shows.iter().map(|s| s.show_id.as_str()).collect();
    let regras: HashSet<&str> = dataset.payout_rules.iter().map(|r| r.rule_id.as_str()).collect();
    let membros: HashSet<&str> = dataset.members.iter().map(|m| m.member_id.as_str()).collect();

    for t in &dataset.transactions {
        if let Some(show_id) = &t.show_id {
            if !shows.contains(show_id.as_str()) {
                avisos.push(ValidationWarning::new(
                    Severity::Warning,
                    "transactions",
                    format!("transação {} aponta para show inexistente {show_id}", t.id),
                ));
            }
        }
    }

    for config in &dataset.show_payout_configs {
        if !shows.contains(config.show_id.as_str()) {
            avisos.push(ValidationWarning::new(
                Severity::Warning,
                "show_payout_config",
                format!("vínculo aponta para show inexistente {}", config.show_id),
            ));
        }
        if !regras.contains(config.rule_id.as_str()) {
            avisos.push(ValidationWarning::new(
                Severity::Warning,
                "show_payout_config",
                format!("vínculo aponta para regra inexistente {}", config.rule_id),
            ));
        }
    }

    for share in &dataset.member_shares {
        if !regras.contains(share.rule_id.as_str()) {
            avisos.push(ValidationWarning::new(
                Severity::Warning,
                "member_shares",
                format!("participação {} aponta para regra inexistente {}", share.share_id, share.rule_id),
            ));
        }
        if !membros.contains(share.member_id.as_str()) {
            avisos.push(ValidationWarning::new(
                Severity::Warning,
                "member_shares",
                format!(
                    "participação {} aponta para membro inexistente {}",
                    share.share_id, share.member_id
                ),
            ));
        }
    }

    avisos
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::dataset::Provenance;
    use crate::models::payout::{MemberShare, PayoutModel, ShareKind};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn vazio() -> NormalizedDataset {
        NormalizedDataset {
            shows: vec![],
            transactions: vec![],
            payout_rules: vec![],
            show_payout_configs: vec![],
            members: vec![],
            member_shares: vec![],
            provenance: Provenance::LocalFallback,
            warnings: vec![],
            loaded_at: Utc::now(),
        }
    }

    fn regra(id: &str, inicio: Option<&str>, fim: Option<&str>, ativa: bool) -> PayoutRule {
        PayoutRule {
            rule_id: id.into(),
            nome_regra: id.into(),
            modelo: PayoutModel::Percentual,
            pct_caixa: Decimal::from(30),
            pct_musicos: Decimal::from(70),
            ativa,
            vigencia_inicio: inicio.map(d),
            vigencia_fim: fim.map(d),
        }
    }

    #[test]
    fn dataset_vazio_gera_avisos_informativos() {
        let avisos = validate(&vazio());
        assert_eq!(avisos.len(), 6);
        assert!(avisos.iter().all(|a| a.severity == Severity::Info));
    }

    #[test]
    fn vigencia_invertida_e_apontada() {
        let mut ds = vazio();
        ds.payout_rules = vec![regra("R1", Some("2025-06-01"), Some("2025-01-01"), true)];
        let avisos = validate(&ds);
        assert!(avisos.iter().any(|a| a.mensagem.contains("vigência invertida")));
    }

    #[test]
    fn sobreposicao_de_regras_ativas_e_apontada() {
        let mut ds = vazio();
        ds.payout_rules = vec![
            regra("R1", Some("2025-01-01"), Some("2025-07-01"), true),
            regra("R2", Some("2025-06-01"), None, true),
        ];
        let avisos = validate(&ds);
        assert!(avisos.iter().any(|a| a.mensagem.contains("sobrepostas")));
    }

    #[test]
    fn regras_encostadas_nao_se_sobrepoem() {
        let mut ds = vazio();
        ds.payout_rules = vec![
            regra("R1", Some("2025-01-01"), Some("2025-07-01"), true),
            regra("R2", Some("2025-07-01"), None, true),
        ];
        let avisos = validate(&ds);
        assert!(!avisos.iter().any(|a| a.mensagem.contains("sobrepostas")));
    }

    #[test]
    fn regra_inativa_nao_conta_para_sobreposicao() {
        let mut ds = vazio();
        ds.payout_rules = vec![
            regra("R1", None, None, true),
            regra("R2", None, None, false),
        ];
        let avisos = validate(&ds);
        assert!(!avisos.iter().any(|a| a.mensagem.contains("sobrepostas")));
    }

    #[test]
    fn percentuais_que_excedem_cem_sao_criticos() {
        let mut ds = vazio();
        let mut r = regra("R1", None, None, true);
        r.pct_caixa = Decimal::from(60);
        r.pct_musicos = Decimal::from(60);
        ds.payout_rules = vec![r];
        let avisos = validate(&ds);
        assert!(
            avisos
                .iter()
                .any(|a| a.severity == Severity::Critical && a.mensagem.contains("excede 100"))
        );
    }

    #[test]
    fn participacao_orfa_e_apontada() {
        let mut ds = vazio();
        ds.member_shares = vec![MemberShare {
            share_id: "P1".into(),
            rule_id: "R-fantasma".into(),
            member_id: "M-fantasma".into(),
            kind: ShareKind::Peso(Decimal::ONE),
        }];
        let avisos = validate(&ds);
        assert!(avisos.iter().any(|a| a.mensagem.contains("regra inexistente")));
        assert!(avisos.iter().any(|a| a.mensagem.contains("membro inexistente")));
    }
}
