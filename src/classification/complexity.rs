// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DETECÇÃO DE CASO DE USO E COMPLEXIDADE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Heurísticas por palavra-chave para escolher provedor e modelo:
// 1. detect_use_case: conta palavras-chave por caso de uso
// 2. detect_complexity: regras em ordem (fast → creative → complex → simple)
// 3. route_model: provedor preferido → por complexidade → por caso de uso
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Complexity, ProviderId, UseCase};

const USE_CASE_KEYWORDS: &[(UseCase, &[&str])] = &[
    (
        UseCase::Education,
        &[
            "aula", "lição", "ensinar", "aprender", "estudar", "escola", "professor", "aluno",
            "matéria", "disciplina", "conteúdo", "explicar", "entender", "fotossíntese",
            "matemática", "história", "geografia", "ciências",
        ],
    ),
    (
        UseCase::Analysis,
        &[
            "analisar", "análise", "avaliar", "avaliação", "comparar", "comparação", "estudar",
            "pesquisar", "investigar", "examinar", "revisar", "crítica",
        ],
    ),
    (
        UseCase::Creative,
        &[
            "criar", "inventar", "imaginar", "desenhar", "escrever", "compor", "desenvolver",
            "inovador", "criativo", "artístico", "original",
        ],
    ),
    (
        UseCase::Technical,
        &[
            "problema", "erro", "bug", "configurar", "instalar", "tecnologia", "sistema",
            "software", "hardware", "programação", "código",
        ],
    ),
    (
        UseCase::Research,
        &[
            "pesquisar", "pesquisa", "informações", "dados", "estatísticas", "estudo",
            "investigação", "descoberta", "encontrar", "buscar",
        ],
    ),
    (
        UseCase::WebSearch,
        &["notícias", "noticias", "hoje", "agora mesmo", "últimas", "cotação", "na internet"],
    ),
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "complexo", "complexa", "detalhado", "detalhada", "profundo", "profunda", "análise",
    "analisar", "avaliação", "avaliar", "comparação", "comparar", "estratégia", "metodologia",
    "metodológico", "sistemático", "sistemática", "impactos", "socioeconômicos",
    "socioeconômico", "revolução", "industrial", "científica", "teoria", "evolução", "darwin",
    "pedagógicas", "construtivismo", "behaviorismo", "completa", "matemática", "avançada",
    "criticamente", "fatores", "império", "romano", "abordagens",
];

const SIMPLE_KEYWORDS: &[&str] = &[
    "simples", "básico", "básica", "rápido", "rápida", "breve", "resumo", "explicar",
    "entender", "o que é", "como funciona", "definição",
];

const FAST_KEYWORDS: &[&str] = &["rápido", "rápida", "urgente", "imediato", "agora", "já", "breve"];

const CREATIVE_KEYWORDS: &[&str] = &[
    "criativo", "criativa", "inovador", "inovadora", "original", "único", "imaginativo",
    "artístico", "artística", "criar", "inventar",
];

static TECHNICAL_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(metodologia|curriculo|competencia|habilidade|avaliacao|planejamento|estrategia|gestao|administracao|socioeconômicos|revolução|industrial|científica|teoria|evolução|pedagógicas|construtivismo|behaviorismo|matemática|avançada|império|romano)\b")
        .expect("valid regex")
});

static COMPLEX_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(faça uma análise|análise detalhada|compare e analise|desenvolva uma estratégia|analise criticamente|metodologia científica|abordagens pedagógicas)\b")
        .expect("valid regex")
});

fn count_hits(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| haystack.contains(*k)).count()
}

/// Detecta o caso de uso pela contagem de palavras-chave.
///
/// Empate fica com o caso declarado primeiro; nenhuma palavra → chat.
pub fn detect_use_case(message: &str) -> UseCase {
    let lower = message.to_lowercase();
    let mut best = (UseCase::Chat, 0usize);
    for (use_case, keywords) in USE_CASE_KEYWORDS {
        let hits = count_hits(&lower, keywords);
        if hits > best.1 {
            best = (*use_case, hits);
        }
    }
    best.0
}

/// Detecta a complexidade da mensagem.
pub fn detect_complexity(message: &str, use_case: UseCase) -> Complexity {
    let lower = message.to_lowercase();

    if count_hits(&lower, FAST_KEYWORDS) > 0 {
        return Complexity::Fast;
    }
    if count_hits(&lower, CREATIVE_KEYWORDS) > 0 {
        return Complexity::Creative;
    }

    let is_long = message.chars().count() > 150;
    let multiple_questions = message.matches('?').count() > 1;
    if count_hits(&lower, COMPLEX_KEYWORDS) > 0
        || is_long
        || multiple_questions
        || TECHNICAL_TERMS.is_match(message)
        || COMPLEX_PHRASES.is_match(message)
    {
        return Complexity::Complex;
    }

    if count_hits(&lower, SIMPLE_KEYWORDS) > 0 {
        return Complexity::Simple;
    }

    match use_case {
        UseCase::Analysis | UseCase::Research => Complexity::Analytical,
        UseCase::Creative => Complexity::Creative,
        UseCase::Education => Complexity::Complex,
        _ => Complexity::Simple,
    }
}

/// Modelo usado por provedor. Hoje a tabela é a mesma para qualquer
/// complexidade; o parâmetro fica para quando divergir.
pub fn model_for(provider: ProviderId, _complexity: Complexity) -> &'static str {
    match provider {
        ProviderId::Xai => "grok-4-fast-reasoning",
        ProviderId::OpenAi => "gpt-4o-mini",
        ProviderId::Google => "gemini-2.0-flash-exp",
        ProviderId::Perplexity => "sonar",
        ProviderId::Anthropic => "claude-3-haiku-20240307",
    }
}

/// Parâmetros de geração por modelo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

pub fn model_params(model: &str) -> ModelParams {
    match model {
        "grok-4-fast-reasoning" => ModelParams { temperature: 0.3, max_tokens: 2000, timeout_ms: 15_000 },
        "gpt-4o-mini" => ModelParams { temperature: 0.7, max_tokens: 2000, timeout_ms: 20_000 },
        "gpt-4o" => ModelParams { temperature: 0.7, max_tokens: 4000, timeout_ms: 30_000 },
        "gemini-2.0-flash-exp" => ModelParams { temperature: 0.7, max_tokens: 4000, timeout_ms: 30_000 },
        "claude-3-haiku-20240307" => ModelParams { temperature: 0.7, max_tokens: 2000, timeout_ms: 20_000 },
        _ => ModelParams { temperature: 0.7, max_tokens: 1000, timeout_ms: 30_000 },
    }
}

/// Resultado do roteamento por heurística
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub provider: ProviderId,
    pub model: String,
    pub complexity: Complexity,
    pub use_case: UseCase,
    pub params: ModelParams,
    pub reasoning: String,
}

fn use_case_preferred(use_case: UseCase) -> &'static [ProviderId] {
    match use_case {
        UseCase::WebSearch => &[ProviderId::Perplexity],
        _ => &[ProviderId::Xai, ProviderId::OpenAi, ProviderId::Google],
    }
}

fn complexity_preferred(complexity: Complexity) -> ProviderId {
    match complexity {
        Complexity::Fast => ProviderId::Google,
        _ => ProviderId::OpenAi,
    }
}

/// Escolhe provedor e modelo para a mensagem.
///
/// Ordem: provedor preferido (se disponível) → provedor da complexidade →
/// preferidos do caso de uso → primeiro disponível → OpenAI.
pub fn route_model(
    message: &str,
    available: &[ProviderId],
    use_case: Option<UseCase>,
    preferred_provider: Option<ProviderId>,
    preferred_complexity: Option<Complexity>,
) -> ModelRoute {
    let use_case = use_case.unwrap_or_else(|| detect_use_case(message));
    let complexity = preferred_complexity.unwrap_or_else(|| detect_complexity(message, use_case));

    let provider = preferred_provider
        .filter(|p| available.contains(p))
        .or_else(|| {
            let by_complexity = complexity_preferred(complexity);
            available.contains(&by_complexity).then_some(by_complexity)
        })
        .or_else(|| {
            use_case_preferred(use_case)
                .iter()
                .copied()
                .find(|p| available.contains(p))
        })
        .or_else(|| available.first().copied())
        .unwrap_or(ProviderId::OpenAi);

    let model = model_for(provider, complexity);
    let params = model_params(model);
    let reasoning = format!(
        "Selecionado {} com modelo {} para {} ({}). Configuração: temp={}, tokens={}, timeout={}ms.",
        provider, model, use_case, complexity, params.temperature, params.max_tokens, params.timeout_ms
    );

    ModelRoute {
        provider,
        model: model.to_string(),
        complexity,
        use_case,
        params,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_use_case() {
        assert_eq!(detect_use_case("quero aprender sobre fotossíntese na escola"), UseCase::Education);
        assert_eq!(detect_use_case("deu erro no sistema, bug no código"), UseCase::Technical);
        assert_eq!(detect_use_case("bom dia!"), UseCase::Chat);
    }

    #[test]
    fn test_use_case_tie_keeps_declaration_order() {
        // "estudar" conta para education e analysis
        assert_eq!(detect_use_case("estudar"), UseCase::Education);
    }

    #[test]
    fn test_detect_complexity_rules_in_order() {
        assert_eq!(detect_complexity("preciso urgente", UseCase::Chat), Complexity::Fast);
        assert_eq!(detect_complexity("ideia criativa para feira", UseCase::Chat), Complexity::Creative);
        assert_eq!(
            detect_complexity("faça uma análise dos impactos", UseCase::Chat),
            Complexity::Complex
        );
        assert_eq!(detect_complexity("o que é célula?", UseCase::Chat), Complexity::Simple);
    }

    #[test]
    fn test_complexity_signals() {
        let long = "palavra ".repeat(30);
        assert_eq!(detect_complexity(&long, UseCase::Chat), Complexity::Complex);
        assert_eq!(detect_complexity("isso? e aquilo?", UseCase::Chat), Complexity::Complex);
    }

    #[test]
    fn test_complexity_falls_back_to_use_case() {
        assert_eq!(detect_complexity("olá", UseCase::Research), Complexity::Analytical);
        assert_eq!(detect_complexity("olá", UseCase::Creative), Complexity::Creative);
        assert_eq!(detect_complexity("olá", UseCase::Education), Complexity::Complex);
        assert_eq!(detect_complexity("olá", UseCase::Technical), Complexity::Simple);
    }

    #[test]
    fn test_route_model_prefers_available_preferred_provider() {
        let route = route_model(
            "o que é célula?",
            &[ProviderId::OpenAi, ProviderId::Xai],
            None,
            Some(ProviderId::Xai),
            None,
        );
        assert_eq!(route.provider, ProviderId::Xai);
        assert_eq!(route.model, "grok-4-fast-reasoning");
        assert!(route.reasoning.contains("grok-4-fast-reasoning"));
    }

    #[test]
    fn test_route_model_fast_goes_to_google_when_available() {
        let route = route_model("responde rápido", &[ProviderId::OpenAi, ProviderId::Google], None, None, None);
        assert_eq!(route.complexity, Complexity::Fast);
        assert_eq!(route.provider, ProviderId::Google);
    }

    #[test]
    fn test_route_model_without_providers_defaults_to_openai() {
        let route = route_model("oi", &[], None, None, None);
        assert_eq!(route.provider, ProviderId::OpenAi);
        assert_eq!(route.model, "gpt-4o-mini");
    }

    #[test]
    fn test_route_model_web_search_uses_perplexity() {
        let route = route_model(
            "quais as notícias de hoje",
            &[ProviderId::Perplexity],
            None,
            None,
            Some(Complexity::Simple),
        );
        assert_eq!(route.use_case, UseCase::WebSearch);
        assert_eq!(route.provider, ProviderId::Perplexity);
        assert_eq!(route.model, "sonar");
    }
}
