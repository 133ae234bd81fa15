// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TEXT UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Utilitários para processamento de texto:
// - Token estimation (~4 caracteres por token)
// - Normalização e truncamento seguro em UTF-8
// - Palavras-chave em português
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Caracteres por token (estimativa usada em custos e contexto)
const CHARS_PER_TOKEN: usize = 4;

/// Estima número de tokens em um texto: ceil(chars / 4)
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_len(text.chars().count())
}

/// Estima tokens a partir de uma contagem de caracteres
pub fn estimate_tokens_len(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Colapsa qualquer sequência de whitespace em um único espaço
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Conta palavras separadas por whitespace
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Primeiros `max_chars` caracteres (nunca corta no meio de um char)
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

const STOPWORDS: &[&str] = &[
    "o", "a", "os", "as", "um", "uma", "de", "da", "do", "das", "dos", "em", "na", "no", "nas",
    "nos", "para", "por", "com", "sem", "sobre", "entre", "que", "qual", "quando", "onde", "como",
    "porque", "então", "mas", "e", "ou", "se", "não", "sim", "também", "já", "ainda", "sempre",
    "nunca", "muito", "pouco", "mais", "menos", "bem", "mal",
];

/// Verifica se é uma stopword comum do português
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Extrai até `max` palavras-chave, na ordem em que aparecem.
///
/// Remove pontuação, descarta stopwords e palavras com 2 caracteres ou menos.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !is_stopword(w))
        .take(max)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // acentos contam como um caractere
        assert_eq!(estimate_tokens("ação"), 1);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("redação", 5), "redaç");
        assert_eq!(truncate_chars("curto", 10), "curto");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("Olá   mundo\nnovo"), 3);
    }

    #[test]
    fn test_extract_keywords() {
        let keywords = extract_keywords("Como funciona a fotossíntese nas plantas?", 10);
        assert_eq!(keywords, vec!["funciona", "fotossíntese", "plantas"]);
    }

    #[test]
    fn test_extract_keywords_limit() {
        let text = "alfa beta gama delta epsilon zeta theta iota kappa lambda omicron sigma";
        assert_eq!(extract_keywords(text, 10).len(), 10);
    }
}
