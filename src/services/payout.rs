// src/services/payout.rs
//
// Motor de rateio: resolve a regra aplicável a cada show e distribui o
// pool de músicos com conservação exata de centavos (método do maior
// resto sobre inteiros, nunca floats).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tracing::debug;

use crate::common::error::AppError;
use crate::common::money::{from_centavos, to_centavos};
use crate::models::dataset::NormalizedDataset;
use crate::models::ledger::ShowStatus;
use crate::models::payout::{PayoutRule, ShareKind};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleResolutionError {
    #[error("show não encontrado: {show_id}")]
    ShowInexistente { show_id: String },

    #[error("show {show_id} aponta para regra inexistente {rule_id}")]
    RegraInexistente { show_id: String, rule_id: String },

    #[error("nenhuma regra de rateio ativa vigente para o show {show_id} em {data}")]
    NenhumaRegra { show_id: String, data: NaiveDate },

    #[error("regras ambíguas para o show {show_id} em {data}: [{rule_ids}]")]
    RegrasAmbiguas { show_id: String, data: NaiveDate, rule_ids: String },
}

/// Valor destinado a um membro, já arredondado ao centavo.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAllocation {
    pub member_id: String,
    pub nome: String,
    pub valor: Decimal,
}

/// Resultado completo do rateio de um show. Invariante central:
/// `caixa_retido + Σ fixos + Σ pesos == receita_reconhecida`, ao centavo.
#[derive(Debug, Clone)]
pub struct PayoutBreakdown {
    pub show_id: String,
    pub rule_id: String,
    pub receita_reconhecida: Decimal,
    pub pool_musicos: Decimal,
    pub caixa_retido: Decimal,
    pub fixos: Vec<MemberAllocation>,
    pub pesos: Vec<MemberAllocation>,
}

/// Config explícita vence; sem ela, exige exatamente UMA regra ativa
/// cuja vigência contenha a data do show.
pub fn resolve_rule<'a>(
    dataset: &'a NormalizedDataset,
    show_id: &str,
    data_show: NaiveDate,
) -> Result<&'a PayoutRule, RuleResolutionError> {
    if let Some(config) = dataset.show_payout_configs.iter().find(|c| c.show_id == show_id) {
        return dataset
            .payout_rules
            .iter()
            .find(|r| r.rule_id == config.rule_id)
            .ok_or_else(|| RuleResolutionError::RegraInexistente {
                show_id: show_id.to_string(),
                rule_id: config.rule_id.clone(),
            });
    }

    let candidatas: Vec<&PayoutRule> = dataset
        .payout_rules
        .iter()
        .filter(|r| r.ativa && r.vigente_em(data_show))
        .collect();

    match candidatas.as_slice() {
        [] => Err(RuleResolutionError::NenhumaRegra {
            show_id: show_id.to_string(),
            data: data_show,
        }),
        [unica] => Ok(unica),
        varias => Err(RuleResolutionError::RegrasAmbiguas {
            show_id: show_id.to_string(),
            data: data_show,
            rule_ids: varias.iter().map(|r| r.rule_id.as_str()).collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Distribui `total_c` centavos proporcionalmente aos pesos pelo método
/// do maior resto. Empate de resto respeita a ordem de entrada.
fn distribuir_por_peso(total_c: i64, pesos: &[Decimal]) -> Vec<i64> {
    if pesos.is_empty() || total_c <= 0 {
        return vec![0; pesos.len()];
    }
    let soma: Decimal = pesos.iter().sum();
    if soma <= Decimal::ZERO {
        return vec![0; pesos.len()];
    }

    let mut bases = Vec::with_capacity(pesos.len());
    let mut restos = Vec::with_capacity(pesos.len());
    let mut distribuido = 0i64;

    for peso in pesos {
        let exato = Decimal::from(total_c) * peso / soma;
        let base = exato.floor().to_i64().unwrap_or(0);
        bases.push(base);
        restos.push(exato - exato.floor());
        distribuido += base;
    }

    let mut sobra = total_c - distribuido;
    let mut ordem: Vec<usize> = (0..pesos.len()).collect();
    // sort estável: empates ficam na ordem original das participações
    ordem.sort_by(|&a, &b| restos[b].cmp(&restos[a]));

    for idx in ordem {
        if sobra == 0 {
            break;
        }
        bases[idx] += 1;
        sobra -= 1;
    }
    bases
}

/// Rateia um show. A receita reconhecida é a soma das ENTRADAs PAGAs
/// vinculadas ao show; show ainda não REALIZADO rateia sobre zero.
pub fn allocate(dataset: &NormalizedDataset, show_id: &str) -> Result<PayoutBreakdown, AppError> {
    let show = dataset
        .shows
        .iter()
        .find(|s| s.show_id == show_id)
        .ok_or_else(|| RuleResolutionError::ShowInexistente { show_id: show_id.to_string() })?;

    let regra = resolve_rule(dataset, show_id, show.data_show)?;

    let receita: Decimal = if show.status == ShowStatus::Realizado {
        dataset
            .transactions
            .iter()
            .filter(|t| t.entrada_paga() && t.show_id.as_deref() == Some(show_id))
            .map(|t| t.valor)
            .sum()
    } else {
        Decimal::ZERO
    };

    let receita_c = to_centavos(receita);
    let pool_bruto = (receita * regra.pct_musicos / Decimal::from(100)).round_dp(2);
    let mut pool_c = to_centavos(pool_bruto);
    let mut caixa_c = receita_c - pool_c;

    // Participações da regra, restritas a membros ativos
    let mut fixos: Vec<MemberAllocation> = Vec::new();
    let mut pesos_membros: Vec<(String, String, Decimal)> = Vec::new();
    for share in dataset.member_shares.iter().filter(|s| s.rule_id == regra.rule_id) {
        let Some(membro) = dataset.members.iter().find(|m| m.member_id == share.member_id)
        else {
            continue;
        };
        if !membro.ativo {
            continue;
        }
        match &share.kind {
            ShareKind::Fixo(valor) => fixos.push(MemberAllocation {
                member_id: membro.member_id.clone(),
                nome: membro.nome.clone(),
                valor: *valor,
            }),
            ShareKind::Peso(peso) => {
                pesos_membros.push((membro.member_id.clone(), membro.nome.clone(), *peso));
            }
        }
    }

    let total_fixos_c: i64 = fixos.iter().map(|f| to_centavos(f.valor)).sum();
    if total_fixos_c > pool_c {
        return Err(AppError::Alocacao {
            detalhe: format!(
                "show {show_id}: valores fixos ({}) excedem o pool de músicos ({})",
                from_centavos(total_fixos_c),
                from_centavos(pool_c)
            ),
        });
    }

    let restante_c = pool_c - total_fixos_c;
    let valores_c =
        distribuir_por_peso(restante_c, &pesos_membros.iter().map(|p| p.2).collect::<Vec<_>>());

    let pesos: Vec<MemberAllocation> = pesos_membros
        .into_iter()
        .zip(valores_c.iter())
        .map(|((member_id, nome, _), &c)| MemberAllocation {
            member_id,
            nome,
            valor: from_centavos(c),
        })
        .collect();

    // Sem nenhuma participação por peso, o que sobraria do pool volta
    // para o caixa; a conservação ao centavo é inegociável.
    let distribuido_c: i64 = valores_c.iter().sum();
    let nao_distribuido_c = restante_c - distribuido_c;
    if nao_distribuido_c > 0 {
        caixa_c += nao_distribuido_c;
        pool_c -= nao_distribuido_c;
    }

    debug!(
        "Rateio do show {show_id}: receita {}, pool {}, caixa {}",
        from_centavos(receita_c),
        from_centavos(pool_c),
        from_centavos(caixa_c)
    );

    Ok(PayoutBreakdown {
        show_id: show_id.to_string(),
        rule_id: regra.rule_id.clone(),
        receita_reconhecida: from_centavos(receita_c),
        pool_musicos: from_centavos(pool_c),
        caixa_retido: from_centavos(caixa_c),
        fixos,
        pesos,
    })
}

/// Rateia todos os shows REALIZADOs; cada show falha ou passa sozinho.
pub fn allocate_all(dataset: &NormalizedDataset) -> Vec<Result<PayoutBreakdown, AppError>> {
    dataset
        .shows
        .iter()
        .filter(|s| s.status == ShowStatus::Realizado)
        .map(|s| allocate(dataset, &s.show_id))
        .collect()
}
