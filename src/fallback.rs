// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FALLBACK ENTRE PROVEDORES DE IA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Tenta os provedores em ordem de prioridade até um responder.
//
// Saúde: um provedor que falha fica "unhealthy" e só volta a ser tentado
// depois de min(5min, falhas × 60s). Um sucesso zera as falhas.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::llm::{ChatRequest, LlmClient, LlmClients, LlmError, TokenStream};
use crate::types::{ChatMessage, Complexity, Module, ProviderId};
use crate::utils::LatencyTimer;

/// Backoff máximo para provedor com falhas
const MAX_BACKOFF: Duration = Duration::from_secs(300);
/// Backoff por falha acumulada
const BACKOFF_PER_FAILURE: Duration = Duration::from_secs(60);

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Modelos de um provedor por perfil de requisição
#[derive(Debug, Clone, Serialize)]
pub struct ModelSet {
    pub simple: &'static str,
    pub complex: &'static str,
    pub fast: &'static str,
}

impl ModelSet {
    /// Criativo e analítico usam o modelo "complex"
    pub fn for_complexity(&self, complexity: Complexity) -> &'static str {
        match complexity {
            Complexity::Simple => self.simple,
            Complexity::Fast => self.fast,
            Complexity::Complex | Complexity::Creative | Complexity::Analytical => self.complex,
        }
    }
}

/// Configuração estática de um provedor no fallback
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub name: &'static str,
    /// Menor número = maior prioridade
    pub priority: u8,
    pub models: ModelSet,
    pub timeout: Duration,
}

impl ProviderSpec {
    pub fn default_for(id: ProviderId) -> Self {
        match id {
            ProviderId::OpenAi => Self {
                id,
                name: "OpenAI",
                priority: 1,
                models: ModelSet {
                    simple: "gpt-4o-mini",
                    complex: "gpt-5-chat-latest",
                    fast: "gpt-4o-mini",
                },
                timeout: Duration::from_secs(30),
            },
            ProviderId::Google => Self {
                id,
                name: "Google Gemini",
                priority: 2,
                models: ModelSet {
                    simple: "gemini-2.0-flash-exp",
                    complex: "gemini-2.0-flash-exp",
                    fast: "gemini-2.0-flash-exp",
                },
                timeout: Duration::from_secs(45),
            },
            ProviderId::Anthropic => Self {
                id,
                name: "Anthropic Claude",
                priority: 3,
                models: ModelSet {
                    simple: "claude-3-haiku-20240307",
                    complex: "claude-3-sonnet-20240229",
                    fast: "claude-3-haiku-20240307",
                },
                timeout: Duration::from_secs(60),
            },
            ProviderId::Perplexity => Self {
                id,
                name: "Perplexity Sonar",
                priority: 4,
                models: ModelSet {
                    simple: "sonar",
                    complex: "sonar",
                    fast: "sonar",
                },
                timeout: Duration::from_secs(45),
            },
            ProviderId::Xai => Self {
                id,
                name: "xAI Grok",
                priority: 5,
                models: ModelSet {
                    simple: "grok-4-fast-reasoning",
                    complex: "grok-4-fast-reasoning",
                    fast: "grok-4-fast-reasoning",
                },
                timeout: Duration::from_secs(30),
            },
        }
    }
}

/// System prompt padrão por módulo
pub fn default_system_prompt(module: Option<Module>) -> &'static str {
    match module {
        Some(Module::Professor) => {
            "Você é um professor especializado em educação. Responda de forma clara, didática e objetiva."
        }
        Some(Module::Enem) => {
            "Você é um especialista em ENEM. Forneça explicações concisas e diretas sobre questões e conceitos do ENEM."
        }
        Some(Module::AulaInterativa) => {
            "Você é um professor criador de aulas interativas. Crie conteúdo educativo envolvente e didático."
        }
        Some(Module::Ti) => {
            "Você é um especialista em TI. Forneça soluções técnicas práticas e diretas para problemas de tecnologia."
        }
        Some(Module::Financeiro) => {
            "Você é um especialista em questões financeiras. Responda de forma clara e objetiva sobre pagamentos."
        }
        _ => "Você é um assistente educacional. Responda de forma clara, objetiva e útil.",
    }
}

/// Opções de uma execução com fallback
#[derive(Debug, Clone)]
pub struct FallbackOptions {
    pub message: String,
    pub module: Option<Module>,
    pub complexity: Complexity,
    pub system_prompt: Option<String>,
    /// Histórico anterior (sem system prompt)
    pub history: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Sobrescreve o timeout do provedor
    pub timeout: Option<Duration>,
    pub preferred_provider: Option<ProviderId>,
    pub exclude_providers: Vec<ProviderId>,
}

impl FallbackOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            module: None,
            complexity: Complexity::Simple,
            system_prompt: None,
            history: Vec::new(),
            temperature: None,
            max_tokens: None,
            timeout: None,
            preferred_provider: None,
            exclude_providers: Vec::new(),
        }
    }

    pub fn module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    pub fn complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn prefer(mut self, provider: ProviderId) -> Self {
        self.preferred_provider = Some(provider);
        self
    }

    pub fn exclude(mut self, provider: ProviderId) -> Self {
        self.exclude_providers.push(provider);
        self
    }

    pub fn history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    fn build_request(&self, model: &str) -> ChatRequest {
        let system = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(self.module).to_string());

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.message.clone()));

        ChatRequest::new(model, messages)
            .with_temperature(self.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .with_max_tokens(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS))
    }
}

/// Resultado de uma execução com fallback
#[derive(Debug, Clone, Serialize)]
pub struct FallbackResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `None` quando nenhum provedor respondeu
    pub provider: Option<ProviderId>,
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
    pub attempts: u32,
    pub fallback_chain: Vec<ProviderId>,
}

/// Stream aberto por um dos provedores
pub struct FallbackStream {
    pub provider: ProviderId,
    pub model: String,
    pub tokens: TokenStream,
    pub fallback_chain: Vec<ProviderId>,
}

#[derive(Debug, Clone, Copy)]
struct HealthStatus {
    healthy: bool,
    last_check: Instant,
    failures: u32,
}

impl HealthStatus {
    fn fresh() -> Self {
        Self {
            healthy: true,
            last_check: Instant::now(),
            failures: 0,
        }
    }

    fn backoff(&self) -> Duration {
        (BACKOFF_PER_FAILURE * self.failures).min(MAX_BACKOFF)
    }

    fn is_available_at(&self, now: Instant) -> bool {
        self.healthy || now.saturating_duration_since(self.last_check) > self.backoff()
    }
}

/// Status público de um provedor
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub name: &'static str,
    pub enabled: bool,
    pub healthy: bool,
    pub failures: u32,
    pub priority: u8,
}

struct Entry {
    spec: ProviderSpec,
    client: Arc<dyn LlmClient>,
}

/// Gerenciador de fallback entre provedores
pub struct FallbackManager {
    entries: Vec<Entry>,
    health: Mutex<HashMap<ProviderId, HealthStatus>>,
}

impl FallbackManager {
    /// Cria a partir dos clientes configurados, com specs padrão
    pub fn new(clients: &LlmClients) -> Self {
        let specs = clients
            .available()
            .into_iter()
            .filter_map(|id| clients.get(id).map(|client| (ProviderSpec::default_for(id), client)))
            .collect();
        Self::with_specs(specs)
    }

    pub fn with_specs(specs: Vec<(ProviderSpec, Arc<dyn LlmClient>)>) -> Self {
        let mut entries: Vec<Entry> = specs
            .into_iter()
            .map(|(spec, client)| Entry { spec, client })
            .collect();
        entries.sort_by_key(|e| e.spec.priority);

        let health = entries
            .iter()
            .map(|e| (e.spec.id, HealthStatus::fresh()))
            .collect();

        log::info!(
            "🤖 [AI-FALLBACK] {} provedores: {:?}",
            entries.len(),
            entries.iter().map(|e| e.spec.id.as_str()).collect::<Vec<_>>()
        );

        Self {
            entries,
            health: Mutex::new(health),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provedores configurados, em ordem de prioridade
    pub fn available(&self) -> Vec<ProviderId> {
        self.entries.iter().map(|e| e.spec.id).collect()
    }

    fn is_available_at(&self, id: ProviderId, now: Instant) -> bool {
        self.health
            .lock()
            .map(|h| h.get(&id).is_some_and(|s| s.is_available_at(now)))
            .unwrap_or(false)
    }

    /// Provedores na ordem em que serão tentados
    fn candidates_at(&self, options: &FallbackOptions, now: Instant) -> Vec<&Entry> {
        let mut candidates: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| !options.exclude_providers.contains(&e.spec.id))
            .filter(|e| self.is_available_at(e.spec.id, now))
            .collect();

        if let Some(preferred) = options.preferred_provider {
            if let Some(pos) = candidates.iter().position(|e| e.spec.id == preferred) {
                let entry = candidates.remove(pos);
                candidates.insert(0, entry);
            }
        }
        candidates
    }

    /// Ordem de tentativa atual (para diagnóstico e testes)
    pub fn attempt_order(&self, options: &FallbackOptions) -> Vec<ProviderId> {
        self.candidates_at(options, Instant::now())
            .iter()
            .map(|e| e.spec.id)
            .collect()
    }

    fn mark_healthy(&self, id: ProviderId) {
        if let Ok(mut health) = self.health.lock() {
            if let Some(status) = health.get_mut(&id) {
                status.healthy = true;
                status.failures = 0;
                status.last_check = Instant::now();
            }
        }
    }

    fn mark_unhealthy(&self, id: ProviderId) {
        if let Ok(mut health) = self.health.lock() {
            if let Some(status) = health.get_mut(&id) {
                status.healthy = false;
                status.failures += 1;
                status.last_check = Instant::now();
            }
        }
    }

    /// Executa a requisição com fallback automático
    pub async fn execute(&self, options: &FallbackOptions) -> FallbackResult {
        let timer = LatencyTimer::start("AI-FALLBACK");
        let candidates = self.candidates_at(options, Instant::now());

        if candidates.is_empty() {
            return FallbackResult {
                success: false,
                content: None,
                provider: None,
                model: None,
                error: Some("No AI providers available".to_string()),
                latency_ms: timer.elapsed_ms(),
                attempts: 0,
                fallback_chain: Vec::new(),
            };
        }

        let mut chain = Vec::with_capacity(candidates.len());
        let mut last_error: Option<LlmError> = None;

        for (attempt, entry) in candidates.iter().enumerate() {
            chain.push(entry.spec.id);
            let model = entry.spec.models.for_complexity(options.complexity);
            let request = options.build_request(model);
            let timeout = options.timeout.unwrap_or(entry.spec.timeout);

            log::info!("🎯 [AI-FALLBACK] tentativa {}: {} ({})", attempt + 1, entry.spec.name, model);

            let outcome = match tokio::time::timeout(timeout, entry.client.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match outcome {
                Ok(response) => {
                    self.mark_healthy(entry.spec.id);
                    return FallbackResult {
                        success: true,
                        content: Some(response.content),
                        provider: Some(entry.spec.id),
                        model: Some(model.to_string()),
                        error: None,
                        latency_ms: timer.elapsed_ms(),
                        attempts: (attempt + 1) as u32,
                        fallback_chain: chain,
                    };
                }
                Err(e) => {
                    log::warn!("❌ [AI-FALLBACK] {} falhou: {}", entry.spec.name, e);
                    self.mark_unhealthy(entry.spec.id);
                    last_error = Some(e);
                }
            }
        }

        let attempts = chain.len() as u32;
        FallbackResult {
            success: false,
            content: None,
            provider: None,
            model: None,
            error: Some(format!(
                "All providers failed. Last error: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            )),
            latency_ms: timer.elapsed_ms(),
            attempts,
            fallback_chain: chain,
        }
    }

    /// Abre um stream de tokens no primeiro provedor que aceitar.
    ///
    /// O fallback vale só para a abertura: erros no meio do stream
    /// chegam ao consumidor como itens `Err`.
    pub async fn open_stream(&self, options: &FallbackOptions) -> Result<FallbackStream, String> {
        let candidates = self.candidates_at(options, Instant::now());
        if candidates.is_empty() {
            return Err("No AI providers available".to_string());
        }

        let mut chain = Vec::with_capacity(candidates.len());
        let mut last_error = String::new();

        for entry in candidates {
            chain.push(entry.spec.id);
            let model = entry.spec.models.for_complexity(options.complexity);
            let request = options.build_request(model);
            let timeout = options.timeout.unwrap_or(entry.spec.timeout);

            let outcome = match tokio::time::timeout(timeout, entry.client.stream(&request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match outcome {
                Ok(tokens) => {
                    self.mark_healthy(entry.spec.id);
                    return Ok(FallbackStream {
                        provider: entry.spec.id,
                        model: model.to_string(),
                        tokens,
                        fallback_chain: chain,
                    });
                }
                Err(e) => {
                    log::warn!("❌ [AI-FALLBACK] stream {} falhou: {}", entry.spec.name, e);
                    self.mark_unhealthy(entry.spec.id);
                    last_error = e.to_string();
                }
            }
        }

        Err(format!("All providers failed. Last error: {}", last_error))
    }

    pub fn status(&self) -> Vec<ProviderStatus> {
        let health = self.health.lock().map(|h| h.clone()).unwrap_or_default();
        self.entries
            .iter()
            .map(|e| {
                let status = health.get(&e.spec.id);
                ProviderStatus {
                    id: e.spec.id,
                    name: e.spec.name,
                    enabled: true,
                    healthy: status.map(|s| s.healthy).unwrap_or(false),
                    failures: status.map(|s| s.failures).unwrap_or(0),
                    priority: e.spec.priority,
                }
            })
            .collect()
    }

    /// Força o provedor de volta ao estado saudável
    pub fn reset_provider_status(&self, id: ProviderId) {
        self.mark_healthy(id);
        log::info!("🔄 [AI-FALLBACK] status de {} resetado", id);
    }
}
