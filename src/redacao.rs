// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CORREÇÃO DE REDAÇÃO (ENEM)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Fluxo de avaliação:
//
//   cache (30 min) ──hit──▶ resposta
//        │ miss
//        ▼
//   xAI grok-4-fast-reasoning (temp 0.1, 3000 tokens)
//        │ erro de rede → espera e tenta mais uma vez
//        ▼ ainda falhou
//   OpenAI gpt-4o-mini (temp 0.3, 2000 tokens)
//        │ falhou → erro ORIGINAL do xAI
//
// As 5 competências valem 0-200 cada; total 0-1000.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CacheConfig, CacheStats, TtlCache};
use crate::llm::{extract_json_object, ChatRequest, LlmClient, LlmClients, LlmError};
use crate::types::{ChatMessage, ProviderId};
use crate::utils::{normalize_whitespace, truncate_chars, word_count, LatencyTimer};

pub const MIN_WORDS: usize = 100;
pub const MAX_WORDS: usize = 1000;

pub const PRIMARY_MODEL: &str = "grok-4-fast-reasoning";
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Espera antes de repetir após erro de rede
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

const PRIMARY_SYSTEM: &str = "Você é um corretor especialista do ENEM com anos de experiência. \
Sempre forneça feedback personalizado e detalhado baseado no conteúdo específico da redação. \
Responda sempre com JSON válido conforme solicitado.";

const FALLBACK_SYSTEM: &str =
    "Você é um especialista em avaliação de redações do ENEM. Responda sempre com JSON válido.";

static CACHE_KEY_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RedacaoError {
    #[error("Tema e conteúdo são obrigatórios")]
    MissingFields,

    #[error("A redação deve ter entre 100 e 1000 palavras")]
    WordCount(usize),

    #[error("Nenhum provedor de IA configurado para avaliação")]
    NoProvider,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Resposta da IA em formato inválido: {0}")]
    InvalidResponse(String),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TEMAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub year: u32,
    pub theme: String,
}

/// Temas oficiais usados quando o id não é de tema gerado
pub fn official_themes() -> Vec<Theme> {
    [
        (
            "2023-1",
            2023,
            "Desafios para o combate à invisibilidade e ao registro civil de pessoas em situação de rua no Brasil",
        ),
        (
            "2022-1",
            2022,
            "Desafios para a valorização de comunidades e povos tradicionais no Brasil",
        ),
        (
            "2021-1",
            2021,
            "Invisibilidade e registro civil: garantia de acesso à cidadania no Brasil",
        ),
    ]
    .into_iter()
    .map(|(id, year, theme)| Theme {
        id: id.to_string(),
        year,
        theme: theme.to_string(),
    })
    .collect()
}

/// `ai-*` → tema gerado (2025); id desconhecido → primeiro tema oficial
pub fn theme_by_id(id: &str) -> Theme {
    if id.starts_with("ai-") {
        return Theme {
            id: id.to_string(),
            year: 2025,
            theme: format!("Tema gerado por IA ({})", id),
        };
    }
    let themes = official_themes();
    let first = themes[0].clone();
    themes.into_iter().find(|t| t.id == id).unwrap_or(first)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AVALIAÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetenciaScores {
    /// Norma padrão
    pub comp1: f64,
    /// Compreensão do tema
    pub comp2: f64,
    /// Organização dos argumentos
    pub comp3: f64,
    /// Mecanismos linguísticos
    pub comp4: f64,
    /// Proposta de intervenção
    pub comp5: f64,
}

impl CompetenciaScores {
    pub fn sum(&self) -> f64 {
        self.comp1 + self.comp2 + self.comp3 + self.comp4 + self.comp5
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Highlights {
    pub grammar: Vec<String>,
    pub structure: Vec<String>,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedacaoEvaluation {
    pub scores: CompetenciaScores,
    pub total_score: f64,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub highlights: Highlights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub theme: String,
    /// Texto completo do tema (temas gerados)
    #[serde(default)]
    pub theme_text: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub evaluation_time_ms: u64,
    pub word_count: usize,
    pub character_count: usize,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub success: bool,
    pub session_id: String,
    pub theme: Theme,
    pub evaluation: RedacaoEvaluation,
    pub performance: Performance,
}

/// Chave de cache: tema[..100] + conteúdo[..200], normalizados
pub fn cache_key(content: &str, theme: &str) -> String {
    let content = normalize_whitespace(&content.to_lowercase());
    let theme = normalize_whitespace(&theme.to_lowercase());
    let raw = format!("{}_{}", truncate_chars(&theme, 100), truncate_chars(&content, 200));
    CACHE_KEY_STRIP.replace_all(&raw, "").into_owned()
}

fn grading_prompt(content: &str, theme: &str) -> String {
    format!(
        r#"Você é um corretor especialista do ENEM. Avalie esta redação seguindo RIGOROSAMENTE os critérios oficiais, com feedback PERSONALIZADO baseado no conteúdo específico do texto.

TEMA: {theme}

REDAÇÃO PARA AVALIAÇÃO:
{content}

## COMPETÊNCIAS (0-200 cada)
1. Domínio da modalidade escrita formal da língua portuguesa
2. Compreensão da proposta e aplicação de conceitos das várias áreas
3. Seleção, relação, organização e interpretação de informações
4. Conhecimento dos mecanismos linguísticos de argumentação
5. Proposta de intervenção detalhada e respeitosa aos direitos humanos

## FORMATO DE RESPOSTA OBRIGATÓRIO (JSON):
{{
  "scores": {{ "comp1": 0, "comp2": 0, "comp3": 0, "comp4": 0, "comp5": 0 }},
  "totalScore": 0,
  "feedback": "Análise geral\n\nPontos fortes\n\nPontos de melhoria\n\nProposta de intervenção",
  "suggestions": ["sugestão específica", "..."],
  "highlights": {{ "grammar": [], "structure": [], "content": [] }}
}}

Seja específico: cite trechos e parágrafos da redação. Use linguagem clara e didática."#
    )
}

fn invalid(reason: impl Into<String>) -> RedacaoError {
    RedacaoError::InvalidResponse(reason.into())
}

/// Extrai e valida a avaliação da resposta do modelo.
///
/// `scores` e `feedback` são obrigatórios; `totalScore` ausente ou zero
/// vira a soma das competências; `highlights` ausente fica vazio.
pub fn parse_evaluation(text: &str) -> Result<RedacaoEvaluation, RedacaoError> {
    let json = extract_json_object(text).ok_or_else(|| invalid("JSON não encontrado na resposta"))?;
    let value: Value = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;

    let scores = value
        .get("scores")
        .filter(|s| s.is_object())
        .ok_or_else(|| invalid("campo scores ausente"))?;
    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| invalid("campo feedback ausente"))?;

    let comp = |name: &str| scores.get(name).and_then(Value::as_f64).unwrap_or(0.0);
    let scores = CompetenciaScores {
        comp1: comp("comp1"),
        comp2: comp("comp2"),
        comp3: comp("comp3"),
        comp4: comp("comp4"),
        comp5: comp("comp5"),
    };

    let total_score = value
        .get("totalScore")
        .and_then(Value::as_f64)
        .filter(|t| *t > 0.0)
        .unwrap_or_else(|| scores.sum());

    let suggestions = value
        .get("suggestions")
        .and_then(|s| serde_json::from_value(s.clone()).ok())
        .unwrap_or_default();
    let highlights = value
        .get("highlights")
        .and_then(|h| serde_json::from_value(h.clone()).ok())
        .unwrap_or_default();

    Ok(RedacaoEvaluation {
        scores,
        total_score,
        feedback: feedback.to_string(),
        suggestions,
        highlights,
    })
}

/// Valida campos obrigatórios e faixa de palavras; retorna a contagem.
///
/// A contagem sai sempre do texto recebido; um `wordCount` enviado pelo
/// cliente é ignorado na desserialização.
pub fn validate_submission(submission: &Submission) -> Result<usize, RedacaoError> {
    if submission.theme.trim().is_empty() || submission.content.trim().is_empty() {
        return Err(RedacaoError::MissingFields);
    }
    let words = word_count(&submission.content);
    if !(MIN_WORDS..=MAX_WORDS).contains(&words) {
        return Err(RedacaoError::WordCount(words));
    }
    Ok(words)
}

pub struct RedacaoGrader {
    primary: Option<Arc<dyn LlmClient>>,
    fallback: Option<Arc<dyn LlmClient>>,
    cache: TtlCache<String, RedacaoEvaluation>,
    retry_delay: Duration,
}

impl RedacaoGrader {
    /// xAI como primário, OpenAI como fallback
    pub fn new(clients: &LlmClients) -> Self {
        Self::with_clients(clients.get(ProviderId::Xai), clients.get(ProviderId::OpenAi))
    }

    pub fn with_clients(primary: Option<Arc<dyn LlmClient>>, fallback: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            primary,
            fallback,
            cache: TtlCache::new(CacheConfig::essay_evaluations()),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn grade_with(
        client: &dyn LlmClient,
        request: &ChatRequest,
    ) -> Result<RedacaoEvaluation, RedacaoError> {
        let response = client.complete(request).await?;
        log::info!("🤖 [REDACAO] Avaliação recebida: {} caracteres", response.content.len());
        parse_evaluation(&response.content)
    }

    /// Avalia a redação; o booleano indica hit de cache
    pub async fn evaluate(&self, content: &str, theme: &str) -> Result<(RedacaoEvaluation, bool), RedacaoError> {
        let key = cache_key(content, theme);
        if let Some(cached) = self.cache.get(&key) {
            log::info!("🎯 [REDACAO] Avaliação encontrada no cache");
            return Ok((cached, true));
        }

        let prompt = grading_prompt(content, theme);

        let primary_error = match &self.primary {
            Some(client) => {
                let request = ChatRequest::new(
                    PRIMARY_MODEL,
                    vec![ChatMessage::system(PRIMARY_SYSTEM), ChatMessage::user(prompt.clone())],
                )
                .with_temperature(0.1)
                .with_max_tokens(3000);

                log::info!("🚀 [REDACAO] Iniciando avaliação com {}", PRIMARY_MODEL);
                let mut result = Self::grade_with(client.as_ref(), &request).await;

                if let Err(RedacaoError::Llm(e)) = &result {
                    if e.is_network() {
                        log::warn!("🔄 [REDACAO] Erro de rede ({}), tentando novamente", e);
                        tokio::time::sleep(self.retry_delay).await;
                        result = Self::grade_with(client.as_ref(), &request).await;
                    }
                }

                match result {
                    Ok(evaluation) => {
                        log::info!("✅ [REDACAO] Nota total: {}", evaluation.total_score);
                        self.cache.insert(key, evaluation.clone());
                        return Ok((evaluation, false));
                    }
                    Err(e) => {
                        log::error!("❌ [REDACAO] Falha no provedor primário: {}", e);
                        Some(e)
                    }
                }
            }
            None => None,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error.unwrap_or(RedacaoError::NoProvider));
        };

        log::info!("🔄 [REDACAO] Tentando fallback {}", FALLBACK_MODEL);
        let request = ChatRequest::new(
            FALLBACK_MODEL,
            vec![ChatMessage::system(FALLBACK_SYSTEM), ChatMessage::user(prompt)],
        )
        .with_temperature(0.3)
        .with_max_tokens(2000);

        match Self::grade_with(fallback.as_ref(), &request).await {
            Ok(evaluation) => Ok((evaluation, false)),
            Err(e) => {
                log::error!("❌ [REDACAO] Erro no fallback: {}", e);
                Err(primary_error.unwrap_or(e))
            }
        }
    }

    /// Validação + tema + avaliação + métricas de desempenho
    pub async fn submit(&self, submission: &Submission) -> Result<EvaluationOutcome, RedacaoError> {
        let words = validate_submission(submission)?;

        let mut theme = theme_by_id(&submission.theme);
        if let Some(text) = submission.theme_text.as_deref().filter(|t| !t.trim().is_empty()) {
            theme.theme = text.to_string();
        }

        let timer = LatencyTimer::start("redacao");
        let (evaluation, cache_hit) = self.evaluate(&submission.content, &theme.theme).await?;
        let evaluation_time_ms = timer.elapsed_ms();

        Ok(EvaluationOutcome {
            success: true,
            session_id: Uuid::new_v4().to_string(),
            theme,
            evaluation,
            performance: Performance {
                evaluation_time_ms,
                word_count: words,
                character_count: submission.content.chars().count(),
                cache_hit,
            },
        })
    }
}
