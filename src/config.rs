// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURAÇÃO DO RUNTIME, PROVEDORES E SERVIDOR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Configurações para o runtime Tokio, chaves dos provedores de LLM
// e parâmetros do servidor HTTP.
// Todas as configurações podem ser definidas via .env
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::ProviderId;

/// Lê uma variável de ambiente numérica.
///
/// Valores ausentes retornam `None`; valores inválidos geram warning e
/// também retornam `None` (o chamador mantém o padrão).
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️ [CONFIG] {}={} inválido, usando padrão", name, raw);
            None
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuração do runtime Tokio.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Número de worker threads do Tokio.
    /// Se None, usa cálculo dinâmico: min(cpu_cores, max_threads).
    pub worker_threads: Option<usize>,

    /// Número máximo de threads (limite superior para cálculo dinâmico).
    pub max_threads: usize,

    /// Número máximo de blocking threads.
    pub max_blocking_threads: usize,

    /// Nome das threads do runtime.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_threads: 16,
            max_blocking_threads: 512,
            thread_name: "hubedu".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Calcula número efetivo de worker threads.
    pub fn effective_worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(threads) => threads,
            None => std::cmp::min(num_cpus::get(), self.max_threads),
        }
    }
}

/// Carrega configuração do runtime a partir das variáveis de ambiente.
///
/// Variáveis suportadas:
/// - `HUBEDU_WORKER_THREADS` (ou `TOKIO_THREADS`): número fixo de threads
/// - `TOKIO_MAX_THREADS`: máximo para cálculo dinâmico (padrão: 16)
/// - `TOKIO_MAX_BLOCKING`: máximo de blocking threads (padrão: 512)
pub fn load_runtime_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    let threads = env_parse::<usize>("HUBEDU_WORKER_THREADS").or_else(|| env_parse::<usize>("TOKIO_THREADS"));
    if let Some(threads) = threads.filter(|t| *t > 0) {
        config.worker_threads = Some(threads);
        log::info!("📦 worker threads={} (fixo)", threads);
    }

    if let Some(max) = env_parse::<usize>("TOKIO_MAX_THREADS").filter(|t| *t > 0) {
        config.max_threads = max;
        log::info!("📦 TOKIO_MAX_THREADS={}", max);
    }

    if let Some(blocking) = env_parse::<usize>("TOKIO_MAX_BLOCKING").filter(|t| *t > 0) {
        config.max_blocking_threads = blocking;
        log::info!("📦 TOKIO_MAX_BLOCKING={}", blocking);
    }

    if config.worker_threads.is_none() {
        log::info!(
            "🔧 Tokio: {} threads (dinâmico: min({} cores, {} max))",
            config.effective_worker_threads(),
            num_cpus::get(),
            config.max_threads
        );
    }

    config
}

/// Instala panic hook que apenas loga o panic da thread.
///
/// O Tokio captura o `JoinError` da task e as demais continuam rodando.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        log::error!(
            "[PANIC] Thread {:?} ({}) at {}: {}",
            thread.id(),
            thread_name,
            location,
            message
        );
    }));
}

/// Cria o runtime Tokio com configuração customizada.
pub fn create_tokio_runtime(config: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = config.effective_worker_threads();

    log::info!(
        "🚀 Criando runtime Tokio: {} workers, {} blocking max",
        worker_threads,
        config.max_blocking_threads
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .enable_all()
        .build()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROVEDORES DE LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chaves de API dos provedores.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub google: Option<String>,
    pub anthropic: Option<String>,
    pub perplexity: Option<String>,
    pub xai: Option<String>,
}

impl ProviderKeys {
    /// Lê as chaves do ambiente.
    ///
    /// xAI aceita `GROK_API_KEY` ou `XAI_API_KEY`; Google aceita
    /// `GOOGLE_GENERATIVE_AI_API_KEY` ou `GEMINI_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            openai: env_non_empty("OPENAI_API_KEY"),
            google: env_non_empty("GOOGLE_GENERATIVE_AI_API_KEY")
                .or_else(|| env_non_empty("GEMINI_API_KEY")),
            anthropic: env_non_empty("ANTHROPIC_API_KEY"),
            perplexity: env_non_empty("PERPLEXITY_API_KEY"),
            xai: env_non_empty("GROK_API_KEY").or_else(|| env_non_empty("XAI_API_KEY")),
        }
    }

    pub fn get(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::OpenAi => self.openai.as_deref(),
            ProviderId::Google => self.google.as_deref(),
            ProviderId::Anthropic => self.anthropic.as_deref(),
            ProviderId::Perplexity => self.perplexity.as_deref(),
            ProviderId::Xai => self.xai.as_deref(),
        }
    }

    /// Provedores com chave configurada
    pub fn configured(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .iter()
            .copied()
            .filter(|p| self.get(*p).is_some())
            .collect()
    }
}

/// Endpoint OpenAI-compatible de cada provedor.
///
/// Anthropic não expõe esse formato e fica sem endpoint.
pub fn provider_base_url(provider: ProviderId) -> Option<&'static str> {
    match provider {
        ProviderId::OpenAi => Some("https://api.openai.com/v1"),
        ProviderId::Xai => Some("https://api.x.ai/v1"),
        ProviderId::Perplexity => Some("https://api.perplexity.ai"),
        ProviderId::Google => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        ProviderId::Anthropic => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SERVIDOR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Limite de requisições por IP em janela fixa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Configuração do servidor HTTP.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Token Bearer opcional para /api/*
    pub secret: Option<String>,
    /// Raiz da base local de questões ENEM
    pub enem_data_dir: PathBuf,
    /// Origens autorizadas a embutir módulos em iframe
    pub allowed_embed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Timeout das chamadas aos provedores (em streaming, intervalo máximo entre chunks)
    pub llm_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            secret: None,
            enem_data_dir: PathBuf::from("QUESTOES_ENEM/public"),
            allowed_embed_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            llm_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Carrega a partir do ambiente:
    /// - `HUBEDU_PORT` (padrão 3000)
    /// - `HUBEDU_API_SECRET`
    /// - `HUBEDU_ENEM_DATA_DIR` (padrão `QUESTOES_ENEM/public`)
    /// - `HUBEDU_ALLOWED_EMBED_ORIGINS` (lista separada por vírgula)
    /// - `HUBEDU_RATE_LIMIT_MAX` / `HUBEDU_RATE_LIMIT_WINDOW_SECS`
    /// - `HUBEDU_LLM_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("HUBEDU_PORT") {
            config.port = port;
        }
        config.secret = env_non_empty("HUBEDU_API_SECRET");
        if let Some(dir) = env_non_empty("HUBEDU_ENEM_DATA_DIR") {
            config.enem_data_dir = PathBuf::from(dir);
        }
        if let Some(origins) = env_non_empty("HUBEDU_ALLOWED_EMBED_ORIGINS") {
            config.allowed_embed_origins = parse_origin_list(&origins);
        }
        if let Some(max) = env_parse::<u32>("HUBEDU_RATE_LIMIT_MAX").filter(|m| *m > 0) {
            config.rate_limit.max_requests = max;
        }
        if let Some(secs) = env_parse::<u64>("HUBEDU_RATE_LIMIT_WINDOW_SECS").filter(|s| *s > 0) {
            config.rate_limit.window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("HUBEDU_LLM_TIMEOUT_SECS").filter(|s| *s > 0) {
            config.llm_timeout = Duration::from_secs(secs);
        }

        log::info!(
            "📦 Servidor: porta {} | ENEM em {} | {} origens de embed | rate limit {}/{}s",
            config.port,
            config.enem_data_dir.display(),
            config.allowed_embed_origins.len(),
            config.rate_limit.max_requests,
            config.rate_limit.window.as_secs()
        );

        config
    }
}

/// Divide "a.com, https://b.com" em entradas não vazias
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
