// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REGISTRO DE PROVEDORES DO AI ROUTER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Capacidades estáticas (custo, latência, contexto, especialidades) e
// métricas vivas (sucesso, latência, erros consecutivos) por provedor.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::{Module, ProviderId};

/// Id do provedor usado quando o roteador está desligado ou falha
pub const FALLBACK_PROVIDER_ID: &str = "xai-grok-4-fast";
/// Id servido no modo shadow
pub const SHADOW_PROVIDER_ID: &str = "openai-gpt-4o-mini";

/// Custo em USD por 1k tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostPer1k {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCapabilities {
    pub supports_json_strict: bool,
    pub supports_tool_use: bool,
    pub supports_streaming: bool,
    pub max_context_tokens: usize,
    pub avg_latency_ms: u64,
    /// Taxa de sucesso esperada antes de haver métricas
    pub success_rate: f64,
    pub cost_per_1k: CostPer1k,
    /// "pt" ou "multilingual"
    pub language_preference: &'static str,
    pub domain_expertise: Vec<(Module, f64)>,
    pub compliance: Vec<&'static str>,
}

impl ProviderCapabilities {
    pub fn expertise_in(&self, domain: Module) -> Option<f64> {
        self.domain_expertise
            .iter()
            .find(|(m, _)| *m == domain)
            .map(|(_, confidence)| *confidence)
    }

    pub fn complies_with(&self, standard: &str) -> bool {
        self.compliance.iter().any(|c| *c == standard)
    }
}

/// Provedor + modelo conhecido pelo roteador
#[derive(Debug, Clone, Serialize)]
pub struct RouterProvider {
    pub id: &'static str,
    pub provider: ProviderId,
    pub model: &'static str,
    pub enabled: bool,
    pub capabilities: ProviderCapabilities,
}

/// Catálogo padrão
pub fn default_providers() -> Vec<RouterProvider> {
    vec![
        RouterProvider {
            id: FALLBACK_PROVIDER_ID,
            provider: ProviderId::Xai,
            model: "grok-4-fast-reasoning",
            enabled: true,
            capabilities: ProviderCapabilities {
                supports_json_strict: true,
                supports_tool_use: true,
                supports_streaming: true,
                max_context_tokens: 2_000_000,
                avg_latency_ms: 800,
                success_rate: 0.97,
                cost_per_1k: CostPer1k { input: 0.0002, output: 0.0005 },
                language_preference: "multilingual",
                domain_expertise: vec![
                    (Module::AulaInterativa, 0.92),
                    (Module::Enem, 0.9),
                    (Module::Professor, 0.88),
                ],
                compliance: vec!["SOC2"],
            },
        },
        RouterProvider {
            id: SHADOW_PROVIDER_ID,
            provider: ProviderId::OpenAi,
            model: "gpt-4o-mini",
            enabled: true,
            capabilities: ProviderCapabilities {
                supports_json_strict: true,
                supports_tool_use: true,
                supports_streaming: true,
                max_context_tokens: 128_000,
                avg_latency_ms: 1200,
                success_rate: 0.99,
                cost_per_1k: CostPer1k { input: 0.00015, output: 0.0006 },
                language_preference: "multilingual",
                domain_expertise: vec![
                    (Module::Professor, 0.85),
                    (Module::Ti, 0.85),
                    (Module::Enem, 0.8),
                ],
                compliance: vec!["GDPR", "SOC2"],
            },
        },
        RouterProvider {
            id: "google-gemini-2.0-flash",
            provider: ProviderId::Google,
            model: "gemini-2.0-flash-exp",
            enabled: true,
            capabilities: ProviderCapabilities {
                supports_json_strict: true,
                supports_tool_use: true,
                supports_streaming: true,
                max_context_tokens: 1_000_000,
                avg_latency_ms: 900,
                success_rate: 0.97,
                cost_per_1k: CostPer1k { input: 0.000075, output: 0.0003 },
                language_preference: "multilingual",
                domain_expertise: vec![(Module::ConteudoMidia, 0.9), (Module::AulaInterativa, 0.85)],
                compliance: vec!["GDPR", "ISO27001"],
            },
        },
        RouterProvider {
            id: "anthropic-claude-3-haiku",
            provider: ProviderId::Anthropic,
            model: "claude-3-haiku-20240307",
            enabled: true,
            capabilities: ProviderCapabilities {
                supports_json_strict: false,
                supports_tool_use: true,
                supports_streaming: true,
                max_context_tokens: 200_000,
                avg_latency_ms: 1000,
                success_rate: 0.98,
                cost_per_1k: CostPer1k { input: 0.00025, output: 0.00125 },
                language_preference: "multilingual",
                domain_expertise: vec![(Module::BemEstar, 0.9), (Module::Professor, 0.85)],
                compliance: vec!["GDPR", "SOC2"],
            },
        },
        RouterProvider {
            id: "perplexity-sonar",
            provider: ProviderId::Perplexity,
            model: "sonar",
            enabled: true,
            capabilities: ProviderCapabilities {
                supports_json_strict: false,
                supports_tool_use: false,
                supports_streaming: true,
                max_context_tokens: 127_000,
                avg_latency_ms: 1500,
                success_rate: 0.95,
                cost_per_1k: CostPer1k { input: 0.001, output: 0.001 },
                language_preference: "multilingual",
                domain_expertise: vec![(Module::Atendimento, 0.7)],
                compliance: vec!["SOC2"],
            },
        },
    ]
}

/// Métricas acumuladas de um provedor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub total_latency_ms: u64,
    pub total_cost: f64,
    pub error_count: u64,
    pub consecutive_errors: u32,
    pub last_used: Option<DateTime<Utc>>,
}

impl ProviderMetrics {
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_requests > 0).then(|| self.successful_requests as f64 / self.total_requests as f64)
    }

    pub fn avg_latency_ms(&self) -> Option<f64> {
        (self.total_requests > 0).then(|| self.total_latency_ms as f64 / self.total_requests as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Saúde derivada das métricas
pub fn health_of(metrics: &ProviderMetrics) -> ProviderHealth {
    let rate = metrics.success_rate().unwrap_or(1.0);
    if metrics.consecutive_errors >= 5 || rate < 0.5 {
        ProviderHealth::Unhealthy
    } else if metrics.consecutive_errors >= 2 || rate < 0.9 {
        ProviderHealth::Degraded
    } else {
        ProviderHealth::Healthy
    }
}

/// Catálogo + métricas
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<RouterProvider>,
    metrics: HashMap<&'static str, ProviderMetrics>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(default_providers())
    }
}

impl ProviderRegistry {
    pub fn new(providers: Vec<RouterProvider>) -> Self {
        let metrics = providers.iter().map(|p| (p.id, ProviderMetrics::default())).collect();
        Self { providers, metrics }
    }

    /// Habilita só os provedores com cliente configurado.
    ///
    /// Lista vazia mantém todos habilitados (roteador apenas consultivo).
    pub fn restrict_to(&mut self, available: &[ProviderId]) {
        if available.is_empty() {
            return;
        }
        for p in &mut self.providers {
            p.enabled = available.contains(&p.provider);
        }
    }

    pub fn all(&self) -> &[RouterProvider] {
        &self.providers
    }

    pub fn enabled(&self) -> Vec<&RouterProvider> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    pub fn get(&self, id: &str) -> Option<&RouterProvider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn metrics(&self, id: &str) -> Option<&ProviderMetrics> {
        self.metrics.get(id)
    }

    pub fn health(&self, id: &str) -> ProviderHealth {
        self.metrics(id).map(health_of).unwrap_or(ProviderHealth::Healthy)
    }

    /// Registra o resultado de uma chamada
    pub fn record(&mut self, id: &str, success: bool, latency_ms: u64, cost: f64) {
        let Some(metrics) = self.metrics.get_mut(id) else {
            log::warn!("⚠️ [ROUTER] métricas para provedor desconhecido: {}", id);
            return;
        };
        metrics.total_requests += 1;
        metrics.total_latency_ms += latency_ms;
        metrics.total_cost += cost;
        metrics.last_used = Some(Utc::now());
        if success {
            metrics.successful_requests += 1;
            metrics.consecutive_errors = 0;
        } else {
            metrics.error_count += 1;
            metrics.consecutive_errors += 1;
        }
    }

    pub fn reset_metrics(&mut self) {
        for metrics in self.metrics.values_mut() {
            *metrics = ProviderMetrics::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_fallback_and_shadow_ids() {
        let registry = ProviderRegistry::default();
        assert!(registry.get(FALLBACK_PROVIDER_ID).is_some());
        assert!(registry.get(SHADOW_PROVIDER_ID).is_some());
        assert_eq!(registry.enabled().len(), 5);
    }

    #[test]
    fn test_restrict_to_available() {
        let mut registry = ProviderRegistry::default();
        registry.restrict_to(&[ProviderId::OpenAi, ProviderId::Google]);
        let ids: Vec<&str> = registry.enabled().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![SHADOW_PROVIDER_ID, "google-gemini-2.0-flash"]);

        registry.restrict_to(&[]);
        assert_eq!(registry.enabled().len(), 2);
    }

    #[test]
    fn test_health_degrades_with_errors() {
        let mut registry = ProviderRegistry::default();
        let id = FALLBACK_PROVIDER_ID;
        assert_eq!(registry.health(id), ProviderHealth::Healthy);

        for _ in 0..9 {
            registry.record(id, true, 500, 0.001);
        }
        registry.record(id, false, 500, 0.0);
        registry.record(id, false, 500, 0.0);
        assert_eq!(registry.health(id), ProviderHealth::Degraded);

        for _ in 0..3 {
            registry.record(id, false, 500, 0.0);
        }
        assert_eq!(registry.health(id), ProviderHealth::Unhealthy);

        registry.record(id, true, 500, 0.0);
        assert_eq!(registry.metrics(id).unwrap().consecutive_errors, 0);
    }

    #[test]
    fn test_metrics_averages() {
        let mut registry = ProviderRegistry::default();
        registry.record(SHADOW_PROVIDER_ID, true, 1000, 0.01);
        registry.record(SHADOW_PROVIDER_ID, true, 3000, 0.01);
        let m = registry.metrics(SHADOW_PROVIDER_ID).unwrap();
        assert_eq!(m.avg_latency_ms(), Some(2000.0));
        assert_eq!(m.success_rate(), Some(1.0));
        assert!(m.last_used.is_some());

        registry.reset_metrics();
        assert_eq!(registry.metrics(SHADOW_PROVIDER_ID).unwrap().total_requests, 0);
    }

    #[test]
    fn test_capability_lookups() {
        let registry = ProviderRegistry::default();
        let grok = registry.get(FALLBACK_PROVIDER_ID).unwrap();
        assert_eq!(grok.capabilities.expertise_in(Module::Enem), Some(0.9));
        assert_eq!(grok.capabilities.expertise_in(Module::Rh), None);
        assert!(!grok.capabilities.complies_with("GDPR"));
    }
}
