// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PONTUAÇÃO E SELEÇÃO DE PROVEDOR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// score = 0.4·qualidade + 0.3·velocidade + 0.2·custo + 0.1·confiabilidade
//         − penalidades + bônus + aprendizado (±0.1), nunca negativo
//
// Depois da ordenação, a política do modo decide o que é servido:
// - shadow: sempre openai-gpt-4o-mini, registra o que seria escolhido
// - canary: a seleção só com probabilidade pct/100
// - auto:   a seleção
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::features::{CostSensitivity, RequestFeatures, TimeOfDay, UserType};
use super::providers::{ProviderRegistry, RouterProvider, SHADOW_PROVIDER_ID};
use crate::types::{Complexity, Module};

/// Custo de entrada de referência (gpt-4o-mini) por 1k tokens
const REFERENCE_INPUT_COST: f64 = 0.00015;
/// Custo acima do qual o score de custo zera
const COST_NORMALIZER: f64 = 0.1;
/// Latência acima da qual o score de velocidade zera
const LATENCY_NORMALIZER_MS: f64 = 5000.0;
const MAX_LEARNING_BONUS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    Shadow,
    Canary,
    Auto,
}

impl RouterMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "shadow" => Some(RouterMode::Shadow),
            "canary" => Some(RouterMode::Canary),
            "auto" => Some(RouterMode::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouterMode::Shadow => "shadow",
            RouterMode::Canary => "canary",
            RouterMode::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub quality: f64,
    pub speed: f64,
    pub cost: f64,
    pub reliability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.4,
            speed: 0.3,
            cost: 0.2,
            reliability: 0.1,
        }
    }
}

/// Orçamentos em USD
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budgets {
    pub per_session: f64,
    pub per_user_daily: f64,
    pub per_module: HashMap<Module, f64>,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            per_session: 0.50,
            per_user_daily: 5.00,
            per_module: HashMap::from([
                (Module::AulaInterativa, 2.00),
                (Module::Enem, 1.50),
                (Module::Ti, 0.75),
                (Module::Professor, 1.00),
                (Module::Atendimento, 0.50),
            ]),
        }
    }
}

impl Budgets {
    /// Orçamento do módulo; sem entrada → orçamento por sessão
    pub fn for_module(&self, module: Module) -> f64 {
        self.per_module.get(&module).copied().unwrap_or(self.per_session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafetyThresholds {
    pub json_validity: f64,
    pub response_timeout_ms: u64,
    /// Fração do orçamento que dispara alerta
    pub cost_alert: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            json_validity: 0.95,
            response_timeout_ms: 30_000,
            cost_alert: 0.80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterConfig {
    pub mode: RouterMode,
    /// 0..=100
    pub canary_percentage: f64,
    pub weights: ScoreWeights,
    pub budgets: Budgets,
    pub safety_thresholds: SafetyThresholds,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: RouterMode::Shadow,
            canary_percentage: 5.0,
            weights: ScoreWeights::default(),
            budgets: Budgets::default(),
            safety_thresholds: SafetyThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatedMetrics {
    pub latency_ms: u64,
    pub cost: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScore {
    pub provider_id: String,
    pub score: f64,
    pub reasoning: String,
    pub estimated: EstimatedMetrics,
}

/// Decisão do roteador de modelos
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Provedor servido (após a política do modo)
    pub selected_provider: String,
    /// Melhor provedor pela pontuação
    pub recommended_provider: String,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<ProviderScore>,
    pub fallback_chain: Vec<String>,
    pub estimated: EstimatedMetrics,
}

/// Histórico de desempenho por (provedor, domínio, complexidade)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub total_satisfaction: f64,
    pub avg_satisfaction: f64,
    pub success_rate: f64,
}

impl Default for LearningMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            total_satisfaction: 0.0,
            avg_satisfaction: 0.5,
            success_rate: 0.5,
        }
    }
}

fn learning_key(provider_id: &str, domain: Module, complexity: Complexity) -> String {
    format!("{}_{}_{}", provider_id, domain, complexity)
}

pub fn estimate_cost(provider: &RouterProvider, features: &RequestFeatures) -> f64 {
    let input_tokens = features.context_length.div_ceil(4) as f64;
    let output_tokens = if features.complexity == Complexity::Complex { 1000.0 } else { 500.0 };
    let cost = provider.capabilities.cost_per_1k;
    input_tokens / 1000.0 * cost.input + output_tokens / 1000.0 * cost.output
}

pub fn quality_score(provider: &RouterProvider, features: &RequestFeatures) -> f64 {
    let caps = &provider.capabilities;
    let mut score: f64 = 0.5;
    if features.requires_json_strict && caps.supports_json_strict {
        score += 0.3;
    }
    if features.requires_tool_use && caps.supports_tool_use {
        score += 0.2;
    }
    if let Some(expertise) = caps.expertise_in(features.domain) {
        score += expertise * 0.3;
    }
    if caps.language_preference == features.language || caps.language_preference == "multilingual" {
        score += 0.1;
    }
    if caps.max_context_tokens >= features.context_length {
        score += 0.1;
    }
    score.min(1.0)
}

pub fn speed_score(provider: &RouterProvider, features: &RequestFeatures) -> f64 {
    let caps = &provider.capabilities;
    let latency = (1.0 - caps.avg_latency_ms as f64 / LATENCY_NORMALIZER_MS).max(0.0);
    let streaming = if features.requires_streaming && caps.supports_streaming { 0.2 } else { 0.0 };
    (latency + streaming).min(1.0)
}

pub fn cost_score(provider: &RouterProvider, features: &RequestFeatures) -> f64 {
    let base = (1.0 - estimate_cost(provider, features) / COST_NORMALIZER).max(0.0);
    (base * features.cost_sensitivity.multiplier()).min(1.0)
}

pub fn reliability_score(provider: &RouterProvider, registry: &ProviderRegistry) -> f64 {
    let Some(metrics) = registry.metrics(provider.id) else {
        return provider.capabilities.success_rate;
    };
    let rate = metrics.success_rate().unwrap_or(provider.capabilities.success_rate);
    let penalty = (metrics.consecutive_errors as f64 * 0.1).min(0.5);
    (rate - penalty).max(0.0)
}

/// Penalidades e seus motivos
pub fn penalties(provider: &RouterProvider, features: &RequestFeatures, registry: &ProviderRegistry) -> (f64, Vec<String>) {
    let caps = &provider.capabilities;
    let mut total = 0.0;
    let mut details = Vec::new();

    if features.requires_json_strict && !caps.supports_json_strict {
        total += 0.5;
        details.push("No JSON strict support".to_string());
    }
    if features.requires_tool_use && !caps.supports_tool_use {
        total += 0.3;
        details.push("No tool-use support".to_string());
    }
    if caps.max_context_tokens < features.context_length {
        total += 0.4;
        details.push("Insufficient context length".to_string());
    }
    if let Some(errors) = registry
        .metrics(provider.id)
        .map(|m| m.consecutive_errors)
        .filter(|e| *e > 2)
    {
        total += 0.2 * errors as f64;
        details.push(format!("{} consecutive errors", errors));
    }
    if features.cost_sensitivity == CostSensitivity::High && caps.cost_per_1k.input / REFERENCE_INPUT_COST > 2.0 {
        total += 0.2;
        details.push("High cost for sensitive user".to_string());
    }
    (total, details)
}

/// Bônus e seus motivos
pub fn bonuses(provider: &RouterProvider, features: &RequestFeatures) -> (f64, Vec<String>) {
    let caps = &provider.capabilities;
    let mut total = 0.0;
    let mut details = Vec::new();

    if caps.expertise_in(features.domain).is_some_and(|c| c > 0.9) {
        total += 0.2;
        details.push("High domain expertise".to_string());
    }
    if features.time_of_day == TimeOfDay::Peak && caps.avg_latency_ms < 1000 {
        total += 0.1;
        details.push("Fast provider for peak time".to_string());
    }
    if features.user_type == UserType::Student && caps.complies_with("GDPR") {
        total += 0.1;
        details.push("GDPR compliant for student data".to_string());
    }
    (total, details)
}

/// Roteador de modelos com tabela de aprendizado
#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    learning: HashMap<String, LearningMetrics>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bônus histórico limitado a ±0.1
    pub fn learning_bonus(&self, provider_id: &str, features: &RequestFeatures) -> f64 {
        let Some(data) = self.learning.get(&learning_key(provider_id, features.domain, features.complexity)) else {
            return 0.0;
        };
        let performance = (data.success_rate - 0.5) * 0.2;
        let satisfaction = (data.avg_satisfaction - 0.5) * 0.1;
        (performance + satisfaction).clamp(-MAX_LEARNING_BONUS, MAX_LEARNING_BONUS)
    }

    pub fn score_provider(
        &self,
        provider: &RouterProvider,
        features: &RequestFeatures,
        registry: &ProviderRegistry,
        weights: &ScoreWeights,
    ) -> ProviderScore {
        let quality = quality_score(provider, features);
        let speed = speed_score(provider, features);
        let cost = cost_score(provider, features);
        let reliability = reliability_score(provider, registry);
        let (penalty, _) = penalties(provider, features, registry);
        let (bonus, _) = bonuses(provider, features);
        let learning = self.learning_bonus(provider.id, features);

        let score = quality * weights.quality + speed * weights.speed + cost * weights.cost
            + reliability * weights.reliability
            - penalty
            + bonus
            + learning;

        let mut reasoning = vec![
            format!("Quality: {:.2} (weight: {})", quality, weights.quality),
            format!("Speed: {:.2} (weight: {})", speed, weights.speed),
            format!("Cost: {:.2} (weight: {})", cost, weights.cost),
            format!("Reliability: {:.2} (weight: {})", reliability, weights.reliability),
            format!("Penalties: -{:.2}", penalty),
            format!("Bonuses: +{:.2}", bonus),
        ];
        if learning != 0.0 {
            reasoning.push(format!("Learning: {:+.2}", learning));
        }

        ProviderScore {
            provider_id: provider.id.to_string(),
            score: score.max(0.0),
            reasoning: reasoning.join("; "),
            estimated: EstimatedMetrics {
                latency_ms: provider.capabilities.avg_latency_ms,
                cost: estimate_cost(provider, features),
                quality,
            },
        }
    }

    /// Pontua os provedores habilitados e aplica a política do modo.
    ///
    /// `roll` é o sorteio uniforme em [0, 1) usado pelo modo canary.
    /// Sem provedores habilitados → None.
    pub fn select(
        &self,
        features: &RequestFeatures,
        registry: &ProviderRegistry,
        config: &RouterConfig,
        roll: f64,
    ) -> Option<RoutingDecision> {
        let mut scores: Vec<ProviderScore> = registry
            .enabled()
            .into_iter()
            .map(|p| self.score_provider(p, features, registry, &config.weights))
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));

        let best = scores.first()?.clone();
        let alternatives = scores.iter().skip(1).take(3).cloned().collect();
        let fallback_chain = scores.iter().map(|s| s.provider_id.clone()).collect();

        let (selected, reasoning) = apply_mode_policy(&best, config, roll);

        Some(RoutingDecision {
            selected_provider: selected,
            recommended_provider: best.provider_id.clone(),
            confidence: best.score,
            reasoning,
            alternatives,
            fallback_chain,
            estimated: best.estimated,
        })
    }

    pub fn update_learning(
        &mut self,
        provider_id: &str,
        domain: Module,
        complexity: Complexity,
        success: bool,
        satisfaction: Option<f64>,
    ) {
        let entry = self
            .learning
            .entry(learning_key(provider_id, domain, complexity))
            .or_default();
        entry.total_requests += 1;
        if success {
            entry.successful_requests += 1;
        }
        if let Some(s) = satisfaction {
            entry.total_satisfaction += s;
            entry.avg_satisfaction = entry.total_satisfaction / entry.total_requests as f64;
        }
        entry.success_rate = entry.successful_requests as f64 / entry.total_requests as f64;
    }

    pub fn learning_stats(&self) -> &HashMap<String, LearningMetrics> {
        &self.learning
    }
}

/// (provedor servido, justificativa)
pub fn apply_mode_policy(best: &ProviderScore, config: &RouterConfig, roll: f64) -> (String, String) {
    match config.mode {
        RouterMode::Shadow => (
            SHADOW_PROVIDER_ID.to_string(),
            format!("Shadow mode: Recommended {}, using OpenAI", best.provider_id),
        ),
        RouterMode::Canary if roll > config.canary_percentage / 100.0 => (
            SHADOW_PROVIDER_ID.to_string(),
            format!(
                "Canary mode: {:.2} > {}%, using OpenAI",
                roll, config.canary_percentage
            ),
        ),
        RouterMode::Canary | RouterMode::Auto => (best.provider_id.clone(), best.reasoning.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::features::{extract_features, RouteContext};
    use crate::router::providers::FALLBACK_PROVIDER_ID;

    fn features(text: &str, module: Module) -> RequestFeatures {
        extract_features(
            text,
            &RouteContext {
                module: Some(module),
                hour: Some(3),
                ..Default::default()
            },
        )
    }

    fn auto() -> RouterConfig {
        RouterConfig {
            mode: RouterMode::Auto,
            ..Default::default()
        }
    }

    #[test]
    fn test_enem_prefers_grok() {
        let registry = ProviderRegistry::default();
        let router = ModelRouter::new();
        let decision = router
            .select(&features("Gere questões de matemática", Module::Enem), &registry, &auto(), 0.5)
            .unwrap();
        assert_eq!(decision.selected_provider, FALLBACK_PROVIDER_ID);
        assert_eq!(decision.alternatives.len(), 3);
        assert_eq!(decision.fallback_chain.len(), 5);
        assert_eq!(decision.fallback_chain[0], FALLBACK_PROVIDER_ID);
    }

    #[test]
    fn test_shadow_serves_openai() {
        let registry = ProviderRegistry::default();
        let decision = ModelRouter::new()
            .select(&features("Gere questões", Module::Enem), &registry, &RouterConfig::default(), 0.0)
            .unwrap();
        assert_eq!(decision.selected_provider, SHADOW_PROVIDER_ID);
        assert_eq!(decision.recommended_provider, FALLBACK_PROVIDER_ID);
        assert!(decision.reasoning.starts_with("Shadow mode"));
    }

    #[test]
    fn test_canary_policy() {
        let best = ProviderScore {
            provider_id: "x".into(),
            score: 0.9,
            reasoning: "r".into(),
            estimated: EstimatedMetrics { latency_ms: 1, cost: 0.0, quality: 1.0 },
        };
        let config = RouterConfig {
            mode: RouterMode::Canary,
            canary_percentage: 10.0,
            ..Default::default()
        };
        assert_eq!(apply_mode_policy(&best, &config, 0.05).0, "x");
        assert_eq!(apply_mode_policy(&best, &config, 0.10).0, "x");
        assert_eq!(apply_mode_policy(&best, &config, 0.11).0, SHADOW_PROVIDER_ID);
    }

    #[test]
    fn test_json_penalty() {
        let registry = ProviderRegistry::default();
        let sonar = registry.get("perplexity-sonar").unwrap();
        let (penalty, details) = penalties(sonar, &features("x", Module::AulaInterativa), &registry);
        assert!((penalty - 0.5).abs() < 1e-9);
        assert_eq!(details, vec!["No JSON strict support"]);
    }

    #[test]
    fn test_consecutive_error_penalty_and_reliability() {
        let mut registry = ProviderRegistry::default();
        for _ in 0..3 {
            registry.record(FALLBACK_PROVIDER_ID, false, 100, 0.0);
        }
        let grok = registry.get(FALLBACK_PROVIDER_ID).unwrap().clone();
        let (penalty, _) = penalties(&grok, &features("x", Module::Professor), &registry);
        assert!((penalty - 0.6).abs() < 1e-9);
        assert_eq!(reliability_score(&grok, &registry), 0.0);
    }

    #[test]
    fn test_learning_bonus_is_bounded() {
        let mut router = ModelRouter::new();
        let f = features("explique", Module::Professor);
        for _ in 0..10 {
            router.update_learning(SHADOW_PROVIDER_ID, f.domain, f.complexity, true, Some(1.0));
        }
        assert!((router.learning_bonus(SHADOW_PROVIDER_ID, &f) - 0.1).abs() < 1e-9);

        for _ in 0..10 {
            router.update_learning("perplexity-sonar", f.domain, f.complexity, false, Some(0.0));
        }
        assert!((router.learning_bonus("perplexity-sonar", &f) + 0.1).abs() < 1e-9);
        assert_eq!(router.learning_stats().len(), 2);
    }

    #[test]
    fn test_scores_never_negative() {
        let mut registry = ProviderRegistry::default();
        for _ in 0..10 {
            registry.record("perplexity-sonar", false, 100, 0.0);
        }
        let sonar = registry.get("perplexity-sonar").unwrap().clone();
        let score = ModelRouter::new().score_provider(
            &sonar,
            &features("x", Module::AulaInterativa),
            &registry,
            &ScoreWeights::default(),
        );
        assert_eq!(score.score, 0.0);
    }

    #[test]
    fn test_no_enabled_providers() {
        let registry = ProviderRegistry::new(Vec::new());
        assert!(ModelRouter::new()
            .select(&features("x", Module::Ti), &registry, &auto(), 0.0)
            .is_none());
    }

    #[test]
    fn test_budgets() {
        let budgets = Budgets::default();
        assert_eq!(budgets.for_module(Module::AulaInterativa), 2.0);
        assert_eq!(budgets.for_module(Module::Rh), 0.5);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(RouterMode::parse("Canary"), Some(RouterMode::Canary));
        assert_eq!(RouterMode::parse("manual"), None);
    }
}
