// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLASSIFICAÇÃO DE MÓDULOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//!
//! Decide para qual módulo (professor, enem, ti, ...) uma mensagem vai.
//!
//! ## Fluxo
//!
//! 1. Cache por `mensagem_normalizada_tamanhoDoHistórico` (1 hora)
//! 2. Mensagens curtas (< 30 chars, sem "?") → classificação local
//! 3. Demais → LLM no formato `modulo|confiança` com timeout de 2s
//! 4. Qualquer falha do LLM → classificação local
//!
//! A classificação local nunca falha: o pior caso é `professor` com 0.6.

pub mod complexity;
pub mod patterns;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{CacheConfig, CacheStats, TtlCache};
use crate::llm::{ChatRequest, LlmClient};
use crate::types::{ChatMessage, Module};

pub use complexity::{detect_complexity, detect_use_case, model_for, route_model, ModelRoute};

/// Mensagens abaixo deste tamanho (sem "?") não vão ao LLM
const SHORT_MESSAGE_CHARS: usize = 30;
/// Limite de confiança abaixo do qual a heurística de contexto entra
pub const CONTEXT_THRESHOLD: f64 = 0.7;
/// Máximo de alternativas retornadas
pub const MAX_ALTERNATIVES: usize = 3;

/// Como a classificação foi obtida
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Local,
    Llm,
    Cache,
    Context,
}

/// Resultado da classificação
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub module: Module,
    pub confidence: f64,
    pub rationale: String,
    pub method: ClassificationMethod,
    /// Aulas interativas pedem busca de imagens
    pub needs_images: bool,
}

impl Classification {
    fn local(module: Module, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            module,
            confidence: clamp_confidence(confidence),
            rationale: rationale.into(),
            method: ClassificationMethod::Local,
            needs_images: module == Module::AulaInterativa,
        }
    }
}

/// Limita a confiança ao intervalo [0, 1]. NaN vira 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Classificação local por padrões e palavras-chave.
pub fn classify_local(message: &str, _history_len: usize) -> Classification {
    let lower = message.to_lowercase();

    if let Some((module, high, source)) = patterns::first_match(&lower) {
        let confidence = if high { 0.95 } else { 0.9 };
        let snippet: String = source.chars().take(50).collect();
        return Classification::local(module, confidence, format!("Pattern match: {}...", snippet));
    }

    if lower.contains("aula") || lower.contains("slide") {
        Classification::local(Module::AulaInterativa, 0.8, "Keyword: aula/slide")
    } else if lower.contains("simulado") || lower.contains("enem") {
        Classification::local(Module::Enem, 0.8, "Keyword: simulado/enem")
    } else if lower.contains("problema") && lower.contains("técnico") {
        Classification::local(Module::Ti, 0.8, "Keyword: problema técnico")
    } else if lower.contains("me sinto") || lower.contains("estou") || lower.contains("sinto") {
        Classification::local(Module::BemEstar, 0.85, "Keyword: estado emocional")
    } else if lower.contains("oi") || lower.contains("olá") || lower.contains("tudo bem") {
        Classification::local(Module::Atendimento, 0.9, "Keyword: saudação")
    } else {
        Classification::local(Module::Professor, 0.6, "Default fallback")
    }
}

/// Heurística de contexto: pergunta longa → professor, exclamação curta → atendimento
pub fn classify_contextual(message: &str) -> Option<Classification> {
    let words = message.split_whitespace().count();
    if message.contains('?') && words > 10 {
        Some(Classification {
            method: ClassificationMethod::Context,
            ..Classification::local(Module::Professor, 0.7, "Pergunta longa")
        })
    } else if message.contains('!') && words < 5 {
        Some(Classification {
            method: ClassificationMethod::Context,
            ..Classification::local(Module::Atendimento, 0.6, "Exclamação curta")
        })
    } else {
        None
    }
}

/// Alternativa de módulo com confiança
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAlternative {
    pub module: Module,
    pub confidence: f64,
}

/// Classificação com alternativas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualClassification {
    pub primary: Classification,
    pub alternatives: Vec<ModuleAlternative>,
}

/// Classificação local + heurística de contexto + alternativas.
///
/// Se a confiança local ficar abaixo de [`CONTEXT_THRESHOLD`] e a heurística
/// de contexto tiver algo a dizer, ela vence.
pub fn classify_with_context(message: &str, history_len: usize) -> ContextualClassification {
    let local = classify_local(message, history_len);
    let primary = if local.confidence < CONTEXT_THRESHOLD {
        classify_contextual(message).unwrap_or(local)
    } else {
        local
    };

    let alternatives = patterns::matching_modules(&message.to_lowercase())
        .into_iter()
        .filter(|(module, _)| *module != primary.module)
        .take(MAX_ALTERNATIVES)
        .map(|(module, high)| ModuleAlternative {
            module,
            confidence: if high { 0.95 } else { 0.9 } * 0.8,
        })
        .collect();

    ContextualClassification { primary, alternatives }
}

/// Interpreta a resposta `modulo|confiança` do LLM.
///
/// Módulo desconhecido ou confiança fora de [0, 1] → None.
pub fn parse_llm_classification(reply: &str) -> Option<(Module, f64)> {
    let line = reply.trim().lines().next()?;
    let (module, confidence) = line.split_once('|')?;
    let module = Module::parse(module)?;
    let confidence: f64 = confidence.trim().parse().ok()?;
    if (0.0..=1.0).contains(&confidence) {
        Some((module, confidence))
    } else {
        None
    }
}

const CLASSIFIER_PROMPT: &str = "Você é um classificador de módulos educacionais. Classifique a mensagem em um destes módulos:

- professor: dúvidas acadêmicas, explicações, conceitos, exercícios, matérias
- enem: simulados, provas, questões ENEM, vestibular
- aula_interativa: aulas, slides, atividades interativas
- ti: problemas técnicos, suporte tecnológico, bugs
- financeiro: pagamentos, valores, mensalidades
- rh: recursos humanos, salários, férias, benefícios
- social_media: redes sociais, posts, marketing digital
- bem_estar: apoio emocional, saúde mental, crises
- coordenacao: gestão acadêmica, calendários, provas
- secretaria: documentos, matrículas, procedimentos
- conteudo_midia: imagens, diagramas, conteúdo visual
- atendimento: saudações, dúvidas gerais

Responda apenas com o nome do módulo e a confiança (0.0-1.0) no formato: modulo|confiança";

/// Contadores do classificador
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub total: u64,
    pub llm_calls: u64,
    pub llm_fallbacks: u64,
    pub by_module: HashMap<Module, u64>,
    pub cache: CacheStats,
}

/// Classificador com cache e LLM opcional
pub struct ModuleClassifier {
    cache: TtlCache<String, Classification>,
    llm: Option<Arc<dyn LlmClient>>,
    llm_model: String,
    llm_timeout: Duration,
    stats: Mutex<ClassifierStats>,
}

impl ModuleClassifier {
    /// Classificador só com heurísticas locais
    pub fn local_only() -> Self {
        Self {
            cache: TtlCache::new(CacheConfig::classification()),
            llm: None,
            llm_model: String::new(),
            llm_timeout: Duration::from_secs(2),
            stats: Mutex::new(ClassifierStats::default()),
        }
    }

    /// Classificador que consulta o LLM para mensagens longas
    pub fn with_llm(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm: Some(client),
            llm_model: model.into(),
            ..Self::local_only()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    fn cache_key(message: &str, history_len: usize) -> String {
        format!("{}_{}", message.trim().to_lowercase(), history_len)
    }

    /// Classifica a mensagem (nunca falha)
    pub async fn classify(&self, message: &str, history_len: usize) -> Classification {
        let key = Self::cache_key(message, history_len);

        if let Some(mut cached) = self.cache.get(&key) {
            cached.method = ClassificationMethod::Cache;
            self.record(&cached, false, false);
            return cached;
        }

        let is_short = message.chars().count() < SHORT_MESSAGE_CHARS && !message.contains('?');

        let (result, llm_called, fell_back) = match (&self.llm, is_short) {
            (Some(client), false) => match self.classify_with_llm(client.as_ref(), message).await {
                Some(result) => (result, true, false),
                None => (classify_local(message, history_len), true, true),
            },
            _ => (classify_local(message, history_len), false, false),
        };

        self.cache.insert(key, result.clone());
        self.record(&result, llm_called, fell_back);
        result
    }

    async fn classify_with_llm(&self, client: &dyn LlmClient, message: &str) -> Option<Classification> {
        let request = ChatRequest::new(
            self.llm_model.clone(),
            vec![ChatMessage::system(CLASSIFIER_PROMPT), ChatMessage::user(message)],
        )
        .with_temperature(0.1)
        .with_max_tokens(50);

        let reply = match tokio::time::timeout(self.llm_timeout, client.complete(&request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                log::warn!("⚠️ [CLASSIFIER] LLM falhou, usando local: {}", e);
                return None;
            }
            Err(_) => {
                log::warn!("⚠️ [CLASSIFIER] LLM timeout ({:?}), usando local", self.llm_timeout);
                return None;
            }
        };

        match parse_llm_classification(&reply) {
            Some((module, confidence)) => Some(Classification {
                module,
                confidence: clamp_confidence(confidence),
                rationale: format!("LLM classification ({})", client.provider()),
                method: ClassificationMethod::Llm,
                needs_images: module == Module::AulaInterativa,
            }),
            None => {
                log::warn!("⚠️ [CLASSIFIER] resposta inválida do LLM: {:?}", reply);
                None
            }
        }
    }

    fn record(&self, result: &Classification, llm_called: bool, fell_back: bool) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.total += 1;
            if llm_called {
                stats.llm_calls += 1;
            }
            if fell_back {
                stats.llm_fallbacks += 1;
            }
            *stats.by_module.entry(result.module).or_insert(0) += 1;
        }
    }

    pub fn stats(&self) -> ClassifierStats {
        let mut stats = self.stats.lock().map(|s| s.clone()).unwrap_or_default();
        stats.cache = self.cache.stats();
        stats
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        log::info!("🧹 [CLASSIFIER] cache limpo");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::types::ProviderId;

    #[test]
    fn test_simulado_goes_to_enem() {
        let result = classify_local("quero fazer um simulado do enem", 0);
        assert_eq!(result.module, Module::Enem);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_doubt_pattern_has_highest_confidence() {
        let result = classify_local("tenho uma dúvida sobre logaritmo", 0);
        assert_eq!(result.module, Module::Professor);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_keyword_fallbacks() {
        assert_eq!(classify_local("aulas de sábado", 0).module, Module::AulaInterativa);
        assert_eq!(classify_local("estou mal", 0).module, Module::BemEstar);
        assert_eq!(classify_local("estou mal", 0).confidence, 0.85);
    }

    #[test]
    fn test_default_is_professor() {
        let result = classify_local("xyz", 0);
        assert_eq!(result.module, Module::Professor);
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.rationale, "Default fallback");
    }

    #[test]
    fn test_greeting() {
        let result = classify_local("Olá, bom dia", 0);
        assert_eq!(result.module, Module::Atendimento);
    }

    #[test]
    fn test_interactive_lesson_needs_images() {
        let result = classify_local("monte uma aula interativa sobre vulcões", 0);
        assert_eq!(result.module, Module::AulaInterativa);
        assert!(result.needs_images);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn test_parse_llm_classification() {
        assert_eq!(parse_llm_classification("enem|0.92"), Some((Module::Enem, 0.92)));
        assert_eq!(parse_llm_classification(" TI | 0.7 \n"), Some((Module::Ti, 0.7)));
        assert_eq!(parse_llm_classification("enem|1.5"), None);
        assert_eq!(parse_llm_classification("astronomia|0.9"), None);
        assert_eq!(parse_llm_classification("enem"), None);
    }

    #[test]
    fn test_contextual_heuristics() {
        let long_q = "alguém pode me dizer por que o céu fica alaranjado no fim da tarde?";
        assert_eq!(classify_contextual(long_q).unwrap().module, Module::Professor);
        assert_eq!(classify_contextual("valeu!").unwrap().module, Module::Atendimento);
        assert!(classify_contextual("qualquer coisa").is_none());
    }

    #[test]
    fn test_classify_with_context_uses_heuristic_below_threshold() {
        let result = classify_with_context("valeu mesmo!", 0);
        assert_eq!(result.primary.module, Module::Atendimento);
        assert_eq!(result.primary.method, ClassificationMethod::Context);
    }

    #[test]
    fn test_alternatives_exclude_primary_and_are_capped() {
        let result = classify_with_context("simulado de física com gráfico e boleto no instagram", 0);
        assert_eq!(result.primary.module, Module::Professor);
        assert!(result.alternatives.len() <= MAX_ALTERNATIVES);
        assert!(result.alternatives.iter().all(|a| a.module != Module::Professor));
    }

    #[tokio::test]
    async fn test_short_messages_skip_llm() {
        let mock = Arc::new(MockLlmClient::new(ProviderId::Google).with_reply("ti|0.99"));
        let classifier = ModuleClassifier::with_llm(mock.clone(), "gemini-2.0-flash-exp");

        let result = classifier.classify("quero um simulado", 0).await;
        assert_eq!(result.module, Module::Enem);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_messages_use_llm_and_cache() {
        let mock = Arc::new(MockLlmClient::new(ProviderId::Google).with_reply("financeiro|0.88"));
        let classifier = ModuleClassifier::with_llm(mock.clone(), "gemini-2.0-flash-exp");
        let message = "Preciso entender como funciona a cobrança deste mês, pode me ajudar?";

        let first = classifier.classify(message, 2).await;
        assert_eq!(first.module, Module::Financeiro);
        assert_eq!(first.method, ClassificationMethod::Llm);

        let second = classifier.classify(message, 2).await;
        assert_eq!(second.method, ClassificationMethod::Cache);
        assert_eq!(mock.calls(), 1);

        // histórico diferente → chave diferente
        classifier.classify(message, 3).await;
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_llm_error_falls_back_to_local() {
        let mock = Arc::new(MockLlmClient::new(ProviderId::Google).failing(LlmError::Timeout));
        let classifier = ModuleClassifier::with_llm(mock, "gemini-2.0-flash-exp");

        let result = classifier
            .classify("Tenho uma dúvida sobre a matéria de ontem, pode explicar?", 0)
            .await;
        assert_eq!(result.method, ClassificationMethod::Local);
        assert_eq!(result.module, Module::Professor);
        assert_eq!(classifier.stats().llm_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back_to_local() {
        let mock = Arc::new(
            MockLlmClient::new(ProviderId::Google)
                .with_reply("ti|0.9")
                .with_delay(Duration::from_millis(200)),
        );
        let classifier = ModuleClassifier::with_llm(mock, "gemini-2.0-flash-exp")
            .with_timeout(Duration::from_millis(20));

        let result = classifier
            .classify("O projetor da sala 3 não liga desde cedo, o que faço?", 0)
            .await;
        assert_eq!(result.method, ClassificationMethod::Local);
        assert_eq!(result.module, Module::Ti);
    }

    #[tokio::test]
    async fn test_invalid_llm_reply_falls_back() {
        let mock = Arc::new(MockLlmClient::new(ProviderId::Google).with_reply("não sei dizer"));
        let classifier = ModuleClassifier::with_llm(mock, "gemini-2.0-flash-exp");
        let result = classifier
            .classify("Qual o prazo para pedir a declaração de matrícula?", 0)
            .await;
        assert_eq!(result.method, ClassificationMethod::Local);
        assert_eq!(result.module, Module::Secretaria);
    }

    #[tokio::test]
    async fn test_stats_by_module() {
        let classifier = ModuleClassifier::local_only();
        classifier.classify("oi", 0).await;
        classifier.classify("boleto", 0).await;
        classifier.classify("oi", 0).await;
        let stats = classifier.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_module.get(&Module::Atendimento), Some(&2));
        assert_eq!(stats.cache.hits, 1);
    }
}
