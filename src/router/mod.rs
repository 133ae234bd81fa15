// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AI ROUTER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//!
//! Roteamento multi-provedor com modos shadow/canary/auto.
//!
//! O roteador só decide; quem chama o provedor é o fluxo de chat, que usa
//! a decisão como provedor preferido no fallback e depois reporta o
//! resultado com [`AiRouter::record_outcome`].
//!
//! ```text
//! texto ─► features ─► segurança (PII/LGPD) ─► pontuação ─► modo ─► decisão
//!                                                                  │
//!                         desligado ou sem provedores ─► fallback ◄┘
//! ```

pub mod features;
pub mod model_router;
pub mod providers;
pub mod safety;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{Complexity, Module, ProviderId};
use crate::utils::{estimate_tokens, now_millis};

pub use features::{extract_features, RequestFeatures, RouteContext, UserType};
pub use model_router::{ModelRouter, RouterConfig, RouterMode, RoutingDecision};
pub use providers::{ProviderHealth, ProviderRegistry, FALLBACK_PROVIDER_ID, SHADOW_PROVIDER_ID};
pub use safety::SafetyValidation;

/// Custo estimado da decisão de fallback (USD)
pub const FALLBACK_COST: f64 = 0.001;
/// Quantas métricas de roteamento ficam em memória
const MAX_METRICS: usize = 1000;

/// Estimativa de tokens de uma requisição
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenEstimate {
    pub input: usize,
    pub output: usize,
    pub total: usize,
}

/// Decisão entregue ao chamador
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub request_id: String,
    /// Id no catálogo (ex.: "xai-grok-4-fast")
    pub provider_id: String,
    pub provider: ProviderId,
    pub model: String,
    pub is_fallback: bool,
    pub mode: RouterMode,
    pub confidence: f64,
    pub reasoning: String,
    pub alternatives: Vec<String>,
    pub fallback_chain: Vec<String>,
    pub estimated_cost: f64,
    pub tokens: TokenEstimate,
    pub safety: SafetyValidation,
    /// Texto com PII mascarada, quando houve PII
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_text: Option<String>,
}

/// Comparação registrada no modo shadow
#[derive(Debug, Clone, Serialize)]
pub struct ShadowComparison {
    pub recommended_provider: String,
    pub actual_provider: String,
}

/// Uma entrada de métrica por decisão
#[derive(Debug, Clone, Serialize)]
pub struct RouterMetric {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub module: Module,
    pub selected_provider: String,
    pub alternatives: Vec<String>,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowComparison>,
}

/// Resumo das métricas
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterMetricsSummary {
    pub total_decisions: usize,
    pub by_provider: HashMap<String, usize>,
    pub shadow_disagreements: usize,
    pub total_estimated_cost: f64,
}

/// Resultado real de uma chamada, reportado depois da decisão
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub provider_id: String,
    pub domain: Module,
    pub complexity: Complexity,
    pub success: bool,
    pub satisfaction: Option<f64>,
    pub latency_ms: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderView {
    pub id: &'static str,
    pub provider: ProviderId,
    pub model: &'static str,
    pub enabled: bool,
    pub health: ProviderHealth,
    pub total_requests: u64,
    pub success_rate: Option<f64>,
    pub avg_latency_ms: Option<f64>,
}

/// Estado exposto por `GET /api/ai-router`
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub enabled: bool,
    pub mode: RouterMode,
    pub canary_percentage: f64,
    pub providers: Vec<ProviderView>,
    pub learning_entries: usize,
}

#[derive(Debug)]
struct RouterState {
    enabled: bool,
    config: RouterConfig,
    registry: ProviderRegistry,
    model_router: ModelRouter,
    metrics: Vec<RouterMetric>,
}

/// Roteador com estado próprio (um por `AppState`)
#[derive(Debug)]
pub struct AiRouter {
    state: Mutex<RouterState>,
}

impl Default for AiRouter {
    fn default() -> Self {
        Self::new(RouterConfig::default(), ProviderRegistry::default())
    }
}

fn generate_request_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("req_{}_{}", now_millis(), suffix)
}

fn model_of(registry: &ProviderRegistry, id: &str) -> (ProviderId, String) {
    registry
        .get(id)
        .map(|p| (p.provider, p.model.to_string()))
        .unwrap_or((ProviderId::Xai, "grok-4-fast-reasoning".to_string()))
}

impl AiRouter {
    /// Começa desligado, como no deploy inicial.
    pub fn new(config: RouterConfig, registry: ProviderRegistry) -> Self {
        Self {
            state: Mutex::new(RouterState {
                enabled: false,
                config,
                registry,
                model_router: ModelRouter::new(),
                metrics: Vec::new(),
            }),
        }
    }

    /// Catálogo restrito aos provedores com cliente configurado
    pub fn for_available(available: &[ProviderId]) -> Self {
        let mut registry = ProviderRegistry::default();
        registry.restrict_to(available);
        Self::new(RouterConfig::default(), registry)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RouterState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn enable(&self) {
        self.with_state(|s| s.enabled = true);
        log::info!("🟢 [ROUTER] AI Router habilitado");
    }

    pub fn disable(&self) {
        self.with_state(|s| s.enabled = false);
        log::info!("🔴 [ROUTER] AI Router desabilitado");
    }

    pub fn is_enabled(&self) -> bool {
        self.with_state(|s| s.enabled)
    }

    pub fn set_mode(&self, mode: RouterMode) {
        self.with_state(|s| s.config.mode = mode);
        log::info!("🔀 [ROUTER] modo: {}", mode.as_str());
    }

    /// Percentual limitado a 0..=100
    pub fn set_canary_percentage(&self, percentage: f64) -> f64 {
        let clamped = if percentage.is_nan() { 0.0 } else { percentage.clamp(0.0, 100.0) };
        self.with_state(|s| s.config.canary_percentage = clamped);
        log::info!("🐤 [ROUTER] canary: {}%", clamped);
        clamped
    }

    pub fn config(&self) -> RouterConfig {
        self.with_state(|s| s.config.clone())
    }

    pub fn route(&self, text: &str, context: &RouteContext) -> RouteDecision {
        let roll = rand::thread_rng().gen::<f64>();
        self.route_with_roll(text, context, roll)
    }

    /// Igual a [`route`](Self::route) com o sorteio do canary fixo
    pub fn route_with_roll(&self, text: &str, context: &RouteContext, roll: f64) -> RouteDecision {
        let request_id = generate_request_id();

        self.with_state(|state| {
            if !state.enabled {
                return fallback_decision(&state.registry, request_id, text, state.config.mode, None);
            }

            let features = extract_features(text, context);

            let mut pre_check = safety::validate_pre(text, context.user_type);
            let sanitized = (!pre_check.passed || pre_check.has(safety::IssueKind::Pii))
                .then(|| safety::sanitize_text(text));
            if !pre_check.issues.is_empty() {
                log::warn!("⚠️ [ROUTER] {} issue(s) de segurança no pré-processamento", pre_check.issues.len());
            }

            let Some(decision) = state
                .model_router
                .select(&features, &state.registry, &state.config, roll)
            else {
                log::warn!("⚠️ [ROUTER] nenhum provedor habilitado, usando fallback");
                return fallback_decision(
                    &state.registry,
                    request_id,
                    text,
                    state.config.mode,
                    Some("No providers available"),
                );
            };

            let budget = state.config.budgets.for_module(features.domain);
            let alert = state.config.safety_thresholds.cost_alert;
            if decision.estimated.cost > budget * alert {
                pre_check
                    .recommendations
                    .push(format!("Custo estimado acima de {:.0}% do orçamento do módulo", alert * 100.0));
            }

            let metric = RouterMetric {
                timestamp: Utc::now(),
                request_id: request_id.clone(),
                module: features.domain,
                selected_provider: decision.selected_provider.clone(),
                alternatives: decision.alternatives.iter().map(|a| a.provider_id.clone()).collect(),
                estimated_cost: decision.estimated.cost,
                estimated_latency_ms: decision.estimated.latency_ms,
                shadow: (state.config.mode == RouterMode::Shadow).then(|| ShadowComparison {
                    recommended_provider: decision.recommended_provider.clone(),
                    actual_provider: decision.selected_provider.clone(),
                }),
            };
            state.metrics.push(metric);
            if state.metrics.len() > MAX_METRICS {
                let excess = state.metrics.len() - MAX_METRICS;
                state.metrics.drain(..excess);
            }

            let (provider, model) = model_of(&state.registry, &decision.selected_provider);
            log::info!(
                "🎯 [ROUTER] {} → {} (recomendado: {}, score {:.2})",
                features.domain,
                decision.selected_provider,
                decision.recommended_provider,
                decision.confidence
            );

            let input = estimate_tokens(text);
            let output = if features.complexity == Complexity::Complex { 1000 } else { 500 };
            RouteDecision {
                request_id,
                provider_id: decision.selected_provider.clone(),
                provider,
                model,
                is_fallback: false,
                mode: state.config.mode,
                confidence: decision.confidence,
                reasoning: decision.reasoning,
                alternatives: decision.alternatives.into_iter().map(|a| a.provider_id).collect(),
                fallback_chain: decision.fallback_chain,
                estimated_cost: decision.estimated.cost,
                tokens: TokenEstimate {
                    input,
                    output,
                    total: input + output,
                },
                safety: pre_check,
                sanitized_text: sanitized,
            }
        })
    }

    /// Alimenta métricas do provedor e a tabela de aprendizado
    pub fn record_outcome(&self, outcome: &RouteOutcome) {
        self.with_state(|state| {
            state
                .registry
                .record(&outcome.provider_id, outcome.success, outcome.latency_ms, outcome.cost);
            state.model_router.update_learning(
                &outcome.provider_id,
                outcome.domain,
                outcome.complexity,
                outcome.success,
                outcome.satisfaction,
            );
        });
    }

    pub fn metrics(&self) -> Vec<RouterMetric> {
        self.with_state(|s| s.metrics.clone())
    }

    pub fn metrics_summary(&self) -> RouterMetricsSummary {
        self.with_state(|s| {
            let mut summary = RouterMetricsSummary {
                total_decisions: s.metrics.len(),
                ..Default::default()
            };
            for m in &s.metrics {
                *summary.by_provider.entry(m.selected_provider.clone()).or_insert(0) += 1;
                summary.total_estimated_cost += m.estimated_cost;
                if m
                    .shadow
                    .as_ref()
                    .is_some_and(|c| c.recommended_provider != c.actual_provider)
                {
                    summary.shadow_disagreements += 1;
                }
            }
            summary
        })
    }

    pub fn reset_metrics(&self) {
        self.with_state(|s| {
            s.metrics.clear();
            s.registry.reset_metrics();
        });
        log::info!("🧹 [ROUTER] métricas zeradas");
    }

    pub fn status(&self) -> RouterStatus {
        self.with_state(|s| RouterStatus {
            enabled: s.enabled,
            mode: s.config.mode,
            canary_percentage: s.config.canary_percentage,
            providers: s
                .registry
                .all()
                .iter()
                .map(|p| {
                    let metrics = s.registry.metrics(p.id);
                    ProviderView {
                        id: p.id,
                        provider: p.provider,
                        model: p.model,
                        enabled: p.enabled,
                        health: s.registry.health(p.id),
                        total_requests: metrics.map(|m| m.total_requests).unwrap_or(0),
                        success_rate: metrics.and_then(|m| m.success_rate()),
                        avg_latency_ms: metrics.and_then(|m| m.avg_latency_ms()),
                    }
                })
                .collect(),
            learning_entries: s.model_router.learning_stats().len(),
        })
    }
}

fn fallback_decision(
    registry: &ProviderRegistry,
    request_id: String,
    text: &str,
    mode: RouterMode,
    error: Option<&str>,
) -> RouteDecision {
    let (provider, model) = model_of(registry, FALLBACK_PROVIDER_ID);
    let input = estimate_tokens(text);
    let mut safety = SafetyValidation::clean();
    if error.is_some() {
        safety
            .recommendations
            .push("Sistema em modo fallback devido a erro".to_string());
    }
    RouteDecision {
        request_id,
        provider_id: FALLBACK_PROVIDER_ID.to_string(),
        provider,
        model,
        is_fallback: true,
        mode,
        confidence: 0.0,
        reasoning: error.unwrap_or("Router disabled").to_string(),
        alternatives: Vec::new(),
        fallback_chain: vec![FALLBACK_PROVIDER_ID.to_string()],
        estimated_cost: FALLBACK_COST,
        tokens: TokenEstimate {
            input,
            output: 0,
            total: input,
        },
        safety,
        sanitized_text: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(module: Module) -> RouteContext {
        RouteContext {
            module: Some(module),
            hour: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_router_returns_fallback() {
        let router = AiRouter::default();
        let decision = router.route("Explique frações", &ctx(Module::Professor));
        assert!(decision.is_fallback);
        assert_eq!(decision.provider_id, FALLBACK_PROVIDER_ID);
        assert_eq!(decision.provider, ProviderId::Xai);
        assert_eq!(decision.estimated_cost, FALLBACK_COST);
        assert_eq!(decision.tokens.input, 4);
        assert!(decision.request_id.starts_with("req_"));
        assert!(router.metrics().is_empty());
    }

    #[test]
    fn test_shadow_mode_records_recommendation() {
        let router = AiRouter::default();
        router.enable();
        let decision = router.route_with_roll("Gere questões de matemática", &ctx(Module::Enem), 0.5);
        assert!(!decision.is_fallback);
        assert_eq!(decision.provider_id, SHADOW_PROVIDER_ID);
        assert_eq!(decision.provider, ProviderId::OpenAi);

        let metrics = router.metrics();
        assert_eq!(metrics.len(), 1);
        let shadow = metrics[0].shadow.as_ref().unwrap();
        assert_eq!(shadow.recommended_provider, FALLBACK_PROVIDER_ID);
        assert_eq!(router.metrics_summary().shadow_disagreements, 1);
    }

    #[test]
    fn test_auto_mode_serves_selection() {
        let router = AiRouter::default();
        router.enable();
        router.set_mode(RouterMode::Auto);
        let decision = router.route_with_roll("Gere questões de matemática", &ctx(Module::Enem), 0.99);
        assert_eq!(decision.provider_id, FALLBACK_PROVIDER_ID);
        assert_eq!(decision.model, "grok-4-fast-reasoning");
        assert!(router.metrics()[0].shadow.is_none());
    }

    #[test]
    fn test_canary_percentage_is_clamped() {
        let router = AiRouter::default();
        assert_eq!(router.set_canary_percentage(150.0), 100.0);
        assert_eq!(router.set_canary_percentage(-3.0), 0.0);
        assert_eq!(router.config().canary_percentage, 0.0);
    }

    #[test]
    fn test_pii_is_sanitized() {
        let router = AiRouter::default();
        router.enable();
        let decision = router.route_with_roll("Meu CPF é 123.456.789-00, me ajude", &ctx(Module::Secretaria), 0.0);
        assert!(decision.safety.passed);
        assert_eq!(decision.sanitized_text.as_deref(), Some("Meu CPF é [CPF], me ajude"));
    }

    #[test]
    fn test_no_providers_falls_back() {
        let router = AiRouter::new(RouterConfig::default(), ProviderRegistry::new(Vec::new()));
        router.enable();
        let decision = router.route("oi", &ctx(Module::Atendimento));
        assert!(decision.is_fallback);
        assert_eq!(decision.safety.recommendations.len(), 1);
    }

    #[test]
    fn test_record_outcome_updates_status() {
        let router = AiRouter::default();
        router.record_outcome(&RouteOutcome {
            provider_id: FALLBACK_PROVIDER_ID.to_string(),
            domain: Module::Enem,
            complexity: Complexity::Simple,
            success: true,
            satisfaction: Some(0.9),
            latency_ms: 700,
            cost: 0.002,
        });
        let status = router.status();
        assert!(!status.enabled);
        assert_eq!(status.mode, RouterMode::Shadow);
        assert_eq!(status.learning_entries, 1);
        let grok = status.providers.iter().find(|p| p.id == FALLBACK_PROVIDER_ID).unwrap();
        assert_eq!(grok.total_requests, 1);
        assert_eq!(grok.health, ProviderHealth::Healthy);
    }

    #[test]
    fn test_reset_metrics() {
        let router = AiRouter::default();
        router.enable();
        router.route_with_roll("oi", &ctx(Module::Atendimento), 0.0);
        assert_eq!(router.metrics_summary().total_decisions, 1);
        router.reset_metrics();
        assert!(router.metrics().is_empty());
    }

    #[test]
    fn test_for_available_restricts_catalog() {
        let router = AiRouter::for_available(&[ProviderId::Google]);
        router.enable();
        router.set_mode(RouterMode::Auto);
        let decision = router.route_with_roll("explique frações", &ctx(Module::Professor), 0.0);
        assert_eq!(decision.provider, ProviderId::Google);
        assert_eq!(decision.fallback_chain.len(), 1);
    }
}
