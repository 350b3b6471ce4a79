// src/source/normalize.rs
//
// Normalização das linhas cruas (de qualquer fonte) para as entidades
// tipadas. Aqui mora toda a tolerância a digitação: datas em vários
// formatos, dinheiro em padrão brasileiro, vocabulário com acento e
// caixa variados, linhas duplicadas (vence a última).

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::common::money::parse_brl;
use crate::models::dataset::{Severity, ValidationWarning};
use crate::models::ledger::{
    PaymentStatus, Show, ShowStatus, Transaction, TransactionType, norm_str,
};
use crate::models::payout::{
    Member, MemberShare, PayoutModel, PayoutRule, ShareKind, ShowPayoutConfig,
};
use crate::source::RawRow;

const FORMATOS_DE_DATA: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for formato in FORMATOS_DE_DATA {
        if let Ok(data) = NaiveDate::parse_from_str(s, formato) {
            return Some(data);
        }
    }
    // Célula com data-hora ("2025-03-01 00:00:00"): fica só a data
    if s.len() > 10 {
        return NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok();
    }
    None
}

/// Busca um campo com tolerância a apelidos históricos de coluna.
fn campo<'a>(linha: &'a RawRow, nomes: &[&str]) -> &'a str {
    for nome in nomes {
        if let Some(valor) = linha.get(*nome) {
            let valor = valor.trim();
            if !valor.is_empty() {
                return valor;
            }
        }
    }
    ""
}

fn avisar(avisos: &mut Vec<ValidationWarning>, severity: Severity, tabela: &str, msg: String) {
    avisos.push(ValidationWarning::new(severity, tabela, msg));
}

/// Mantém a ÚLTIMA ocorrência de cada id (edições aparecem como novas
/// linhas na planilha).
fn dedup_mantendo_ultima<T>(
    itens: Vec<(String, T)>,
    tabela: &str,
    avisos: &mut Vec<ValidationWarning>,
) -> Vec<T> {
    let mut indice: HashMap<String, usize> = HashMap::new();
    let mut saida: Vec<Option<T>> = Vec::with_capacity(itens.len());
    let mut duplicadas = 0usize;

    for (id, item) in itens {
        if id.is_empty() {
            saida.push(Some(item));
            continue;
        }
        match indice.get(&id) {
            Some(&pos) => {
                saida[pos] = Some(item);
                duplicadas += 1;
            }
            None => {
                indice.insert(id, saida.len());
                saida.push(Some(item));
            }
        }
    }

    if duplicadas > 0 {
        avisar(
            avisos,
            Severity::Warning,
            tabela,
            format!("{duplicadas} linha(s) duplicada(s); mantida a última ocorrência"),
        );
    }
    saida.into_iter().flatten().collect()
}

fn ativo_de(raw: &str) -> bool {
    // Linhas antigas sem a coluna são consideradas ativas
    if raw.trim().is_empty() {
        return true;
    }
    matches!(norm_str(raw).as_str(), "SIM" | "ATIVO" | "ATIVA" | "TRUE" | "VERDADEIRO" | "1")
}

pub fn normalize_shows(linhas: &[RawRow], avisos: &mut Vec<ValidationWarning>) -> Vec<Show> {
    let mut shows = Vec::new();

    for linha in linhas {
        let show_id = campo(linha, &["show_id"]).to_string();
        if show_id.is_empty() {
            avisar(avisos, Severity::Warning, "shows", "linha sem show_id ignorada".into());
            continue;
        }

        let Some(data_show) = parse_date(campo(linha, &["data_show", "data_shd", "data"])) else {
            avisar(
                avisos,
                Severity::Warning,
                "shows",
                format!("show {show_id} sem data válida; linha ignorada"),
            );
            continue;
        };

        let status_bruto = campo(linha, &["status"]);
        let Some(status) = ShowStatus::parse(status_bruto) else {
            avisar(
                avisos,
                Severity::Warning,
                "shows",
                format!("show {show_id} com status inválido '{status_bruto}'; linha ignorada"),
            );
            continue;
        };

        let publico_bruto = campo(linha, &["publico", "publi"]);
        let publico = match publico_bruto.parse::<i64>() {
            Ok(n) if n >= 0 => n as u32,
            Ok(_) => {
                avisar(
                    avisos,
                    Severity::Warning,
                    "shows",
                    format!("show {show_id} com público negativo; ajustado para 0"),
                );
                0
            }
            Err(_) => {
                if !publico_bruto.is_empty() {
                    avisar(
                        avisos,
                        Severity::Warning,
                        "shows",
                        format!("show {show_id} com público ilegível '{publico_bruto}'"),
                    );
                }
                0
            }
        };

        let cache_acordado =
            parse_brl(campo(linha, &["cache_acordado"])).unwrap_or(Decimal::ZERO);

        shows.push((
            show_id.clone(),
            Show {
                show_id,
                data_show,
                casa: campo(linha, &["casa"]).to_string(),
                cidade: campo(linha, &["cidade"]).to_string(),
                status,
                publico,
                cache_acordado,
                observacao: campo(linha, &["observacao"]).to_string(),
            },
        ));
    }

    dedup_mantendo_ultima(shows, "shows", avisos)
}

pub fn normalize_transactions(
    linhas: &[RawRow],
    avisos: &mut Vec<ValidationWarning>,
) -> Vec<Transaction> {
    let mut transacoes = Vec::new();

    for linha in linhas {
        let id = campo(linha, &["id"]).to_string();

        let Some(data) = parse_date(campo(linha, &["data"])) else {
            avisar(
                avisos,
                Severity::Warning,
                "transactions",
                format!("transação '{id}' sem data válida; linha ignorada"),
            );
            continue;
        };

        let tipo_bruto = campo(linha, &["tipo"]);
        let Some(tipo) = TransactionType::parse(tipo_bruto) else {
            avisar(
                avisos,
                Severity::Warning,
                "transactions",
                format!("transação '{id}' com tipo inválido '{tipo_bruto}'; linha ignorada"),
            );
            continue;
        };

        let status_bruto = campo(linha, &["payment_status"]);
        let Some(payment_status) = PaymentStatus::parse(status_bruto) else {
            avisar(
                avisos,
                Severity::Warning,
                "transactions",
                format!(
                    "transação '{id}' com payment_status inválido '{status_bruto}'; linha ignorada"
                ),
            );
            continue;
        };

        let valor_bruto = campo(linha, &["valor"]);
        let valor = match parse_brl(valor_bruto) {
            // Sinal implícito no tipo; valor sempre não-negativo
            Some(v) => v.abs(),
            None => {
                avisar(
                    avisos,
                    Severity::Warning,
                    "transactions",
                    format!("transação '{id}' com valor nulo/ilegível; considerado 0"),
                );
                Decimal::ZERO
            }
        };

        let show_id = campo(linha, &["show_id"]);
        let show_id = (!show_id.is_empty()).then(|| show_id.to_string());

        transacoes.push((
            id.clone(),
            Transaction {
                id,
                data,
                tipo,
                categoria: norm_str(campo(linha, &["categoria"])),
                subcategoria: norm_str(campo(linha, &["subcategoria"])),
                descricao: campo(linha, &["descricao"]).to_string(),
                valor,
                show_id,
                payment_status,
                conta: campo(linha, &["conta"]).to_string(),
            },
        ));
    }

    dedup_mantendo_ultima(transacoes, "transactions", avisos)
}

pub fn normalize_payout_rules(
    linhas: &[RawRow],
    avisos: &mut Vec<ValidationWarning>,
) -> Vec<PayoutRule> {
    let mut regras = Vec::new();

    for linha in linhas {
        let rule_id = campo(linha, &["rule_id"]).to_string();
        if rule_id.is_empty() {
            avisar(avisos, Severity::Warning, "payout_rules", "linha sem rule_id ignorada".into());
            continue;
        }

        let modelo_bruto = campo(linha, &["modelo"]);
        let Some(modelo) = PayoutModel::parse(modelo_bruto) else {
            avisar(
                avisos,
                Severity::Warning,
                "payout_rules",
                format!("regra {rule_id} com modelo inválido '{modelo_bruto}'; linha ignorada"),
            );
            continue;
        };

        let pct_caixa = parse_brl(campo(linha, &["pct_caixa"])).unwrap_or(Decimal::ZERO);
        let pct_musicos = parse_brl(campo(linha, &["pct_musicos"])).unwrap_or(Decimal::ZERO);

        regras.push((
            rule_id.clone(),
            PayoutRule {
                rule_id,
                nome_regra: campo(linha, &["nome_regra"]).to_string(),
                modelo,
                pct_caixa,
                pct_musicos,
                ativa: ativo_de(campo(linha, &["ativa"])),
                vigencia_inicio: parse_date(campo(linha, &["vigencia_inicio"])),
                vigencia_fim: parse_date(campo(linha, &["vigencia_fim"])),
            },
        ));
    }

    dedup_mantendo_ultima(regras, "payout_rules", avisos)
}

pub fn normalize_show_configs(
    linhas: &[RawRow],
    avisos: &mut Vec<ValidationWarning>,
) -> Vec<ShowPayoutConfig> {
    let mut configs = Vec::new();

    for linha in linhas {
        let show_id = campo(linha, &["show_id"]).to_string();
        let rule_id = campo(linha, &["rule_id"]).to_string();
        if show_id.is_empty() || rule_id.is_empty() {
            avisar(
                avisos,
                Severity::Warning,
                "show_payout_config",
                "vínculo sem show_id ou rule_id ignorado".into(),
            );
            continue;
        }
        configs.push((show_id.clone(), ShowPayoutConfig { show_id, rule_id }));
    }

    dedup_mantendo_ultima(configs, "show_payout_config", avisos)
}

pub fn normalize_members(linhas: &[RawRow], avisos: &mut Vec<ValidationWarning>) -> Vec<Member> {
    let mut membros = Vec::new();

    for linha in linhas {
        let member_id = campo(linha, &["member_id"]).to_string();
        if member_id.is_empty() {
            avisar(avisos, Severity::Warning, "members", "linha sem member_id ignorada".into());
            continue;
        }
        membros.push((
            member_id.clone(),
            Member {
                member_id,
                nome: campo(linha, &["nome"]).to_string(),
                ativo: ativo_de(campo(linha, &["ativo"])),
            },
        ));
    }

    dedup_mantendo_ultima(membros, "members", avisos)
}

pub fn normalize_member_shares(
    linhas: &[RawRow],
    avisos: &mut Vec<ValidationWarning>,
) -> Vec<MemberShare> {
    let mut participacoes = Vec::new();

    for linha in linhas {
        let share_id = campo(linha, &["share_id"]).to_string();
        let rule_id = campo(linha, &["rule_id"]).to_string();
        let member_id = campo(linha, &["member_id"]).to_string();
        if share_id.is_empty() || rule_id.is_empty() || member_id.is_empty() {
            avisar(
                avisos,
                Severity::Warning,
                "member_shares",
                "participação sem share_id/rule_id/member_id ignorada".into(),
            );
            continue;
        }

        let tipo = norm_str(campo(linha, &["tipo"]));
        let kind = match tipo.as_str() {
            "PESO" => {
                let peso = parse_brl(campo(linha, &["peso"])).unwrap_or(Decimal::ZERO);
                if peso <= Decimal::ZERO {
                    avisar(
                        avisos,
                        Severity::Warning,
                        "member_shares",
                        format!("participação {share_id} com peso não-positivo; ignorada"),
                    );
                    continue;
                }
                ShareKind::Peso(peso)
            }
            "FIXO" => {
                let valor = parse_brl(campo(linha, &["valor_fixo"])).unwrap_or(Decimal::ZERO);
                if valor < Decimal::ZERO {
                    avisar(
                        avisos,
                        Severity::Warning,
                        "member_shares",
                        format!("participação {share_id} com valor fixo negativo; ignorada"),
                    );
                    continue;
                }
                ShareKind::Fixo(valor)
            }
            outro => {
                avisar(
                    avisos,
                    Severity::Warning,
                    "member_shares",
                    format!("participação {share_id} com tipo inválido '{outro}'; ignorada"),
                );
                continue;
            }
        };

        participacoes.push((
            share_id.clone(),
            MemberShare { share_id, rule_id, member_id, kind },
        ));
    }

    dedup_mantendo_ultima(participacoes, "member_shares", avisos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linha(pares: &[(&str, &str)]) -> RawRow {
        pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parse_date_multiplos_formatos() {
        let esperado = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(parse_date("01/03/2025"), Some(esperado));
        assert_eq!(parse_date("2025-03-01"), Some(esperado));
        assert_eq!(parse_date("01-03-2025"), Some(esperado));
        assert_eq!(parse_date("2025-03-01 00:00:00"), Some(esperado));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("amanhã"), None);
    }

    #[test]
    fn show_sem_data_e_descartado_com_aviso() {
        let mut avisos = Vec::new();
        let shows = normalize_shows(
            &[
                linha(&[("show_id", "S1"), ("data_show", "10/05/2025"), ("status", "REALIZADO"),
                        ("publico", "120"), ("cache_acordado", "R$ 2.500,00")]),
                linha(&[("show_id", "S2"), ("data_show", ""), ("status", "CONFIRMADO")]),
            ],
            &mut avisos,
        );
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].publico, 120);
        assert_eq!(shows[0].cache_acordado, Decimal::from(2500));
        assert_eq!(avisos.len(), 1);
    }

    #[test]
    fn transacao_duplicada_mantem_a_ultima() {
        let mut avisos = Vec::new();
        let base = [
            ("id", "T1"), ("data", "2025-01-10"), ("tipo", "ENTRADA"),
            ("payment_status", "PAGO"), ("valor", "100,00"),
        ];
        let mut corrigida = base;
        corrigida[4] = ("valor", "150,00");

        let transacoes =
            normalize_transactions(&[linha(&base), linha(&corrigida)], &mut avisos);
        assert_eq!(transacoes.len(), 1);
        assert_eq!(transacoes[0].valor, Decimal::from(150));
        assert!(avisos.iter().any(|a| a.mensagem.contains("duplicada")));
    }

    #[test]
    fn valor_ilegivel_vira_zero_com_aviso() {
        let mut avisos = Vec::new();
        let transacoes = normalize_transactions(
            &[linha(&[
                ("id", "T9"), ("data", "2025-01-10"), ("tipo", "SAIDA"),
                ("payment_status", "PAGO"), ("valor", "???"),
            ])],
            &mut avisos,
        );
        assert_eq!(transacoes.len(), 1);
        assert_eq!(transacoes[0].valor, Decimal::ZERO);
        assert!(avisos.iter().any(|a| a.mensagem.contains("valor nulo")));
    }

    #[test]
    fn participacao_peso_zero_e_descartada() {
        let mut avisos = Vec::new();
        let shares = normalize_member_shares(
            &[
                linha(&[("share_id", "P1"), ("rule_id", "R1"), ("member_id", "M1"),
                        ("tipo", "PESO"), ("peso", "0")]),
                linha(&[("share_id", "P2"), ("rule_id", "R1"), ("member_id", "M2"),
                        ("tipo", "FIXO"), ("valor_fixo", "300,00")]),
            ],
            &mut avisos,
        );
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].kind, ShareKind::Fixo(Decimal::from(300)));
    }
}
