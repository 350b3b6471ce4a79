// src/common/money.rs

use rust_decimal::Decimal;

/// Converte um valor vindo da planilha para `Decimal`.
///
/// Versão reforçada para evitar inflação de valores: remove qualquer
/// caractere que não seja dígito, ponto, vírgula ou sinal, e trata o
/// padrão brasileiro (ponto de milhar, vírgula decimal).
///
/// Retorna `None` para células vazias ou ilegíveis; quem normaliza decide
/// se isso vira zero com warning ou linha descartada.
pub fn parse_brl(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let mut limpo: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    // Se tem vírgula, o ponto é milhar e deve sumir
    if limpo.contains(',') {
        limpo = limpo.replace('.', "").replace(',', ".");
    } else if limpo.matches('.').count() > 1 {
        // Mais de um ponto só existe como separador de milhar
        limpo = limpo.replace('.', "");
    } else if let Some((_, fracao)) = limpo.split_once('.') {
        // Um ponto com grupo de exatamente 3 dígitos é milhar digitado
        // à brasileira ("1.000"); qualquer outro comprimento é decimal
        if fracao.len() == 3 {
            limpo = limpo.replace('.', "");
        }
    }

    limpo.parse::<Decimal>().ok()
}

/// Formata para exibição padrão `R$ 1.234,56`.
pub fn format_brl(valor: Decimal) -> String {
    let arredondado = valor.round_dp(2);
    let negativo = arredondado.is_sign_negative();
    let texto = arredondado.abs().to_string();
    let (inteiro, centavos) = match texto.split_once('.') {
        Some((i, c)) => (i.to_string(), format!("{:0<2}", &c[..c.len().min(2)])),
        None => (texto, "00".to_string()),
    };

    // Agrupamento de milhar com ponto
    let mut agrupado = String::new();
    for (i, d) in inteiro.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            agrupado.push('.');
        }
        agrupado.push(d);
    }
    let inteiro: String = agrupado.chars().rev().collect();

    let sinal = if negativo { "-" } else { "" };
    format!("R$ {sinal}{inteiro},{centavos}")
}

/// Converte para centavos inteiros (arredondamento bancário em 2 casas).
/// O rateio trabalha exclusivamente em centavos para conservação exata.
pub fn to_centavos(valor: Decimal) -> i64 {
    let arredondado = valor.round_dp(2);
    (arredondado * Decimal::from(100)).trunc().try_into().unwrap_or(0)
}

pub fn from_centavos(centavos: i64) -> Decimal {
    Decimal::new(centavos, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_brl_padrao_brasileiro() {
        assert_eq!(parse_brl("R$ 1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_brl("1234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_brl("1.000"), Some(Decimal::from(1000)));
    }

    #[test]
    fn parse_brl_milhar_sem_virgula() {
        // Milhar digitado à brasileira não pode encolher mil vezes
        assert_eq!(parse_brl("1.000"), Some(Decimal::from(1000)));
        assert_eq!(parse_brl("2.500"), Some(Decimal::from(2500)));
        assert_eq!(parse_brl("1.234.567"), Some(Decimal::from(1_234_567)));
        assert_eq!(parse_brl("R$ 12.000"), Some(Decimal::from(12000)));
        // Grupo que não tem 3 dígitos continua sendo decimal
        assert_eq!(parse_brl("1.5"), Some(Decimal::new(15, 1)));
        assert_eq!(parse_brl("0.07"), Some(Decimal::new(7, 2)));
    }

    #[test]
    fn parse_brl_padrao_americano_e_vazios() {
        assert_eq!(parse_brl("1234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_brl(""), None);
        assert_eq!(parse_brl("   "), None);
        assert_eq!(parse_brl("abc"), None);
    }

    #[test]
    fn parse_brl_negativo() {
        assert_eq!(parse_brl("-12,50"), Some(Decimal::new(-1250, 2)));
    }

    #[test]
    fn format_brl_agrupamento() {
        assert_eq!(format_brl(Decimal::new(123456, 2)), "R$ 1.234,56");
        assert_eq!(format_brl(Decimal::ZERO), "R$ 0,00");
        assert_eq!(format_brl(Decimal::new(-950, 2)), "R$ -9,50");
    }

    #[test]
    fn centavos_ida_e_volta() {
        assert_eq!(to_centavos(Decimal::new(10001, 2)), 10001);
        assert_eq!(from_centavos(10001), Decimal::new(10001, 2));
    }
}
