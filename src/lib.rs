//! # HubEdu.ia - Serviços de IA educacional
//!
//! Este crate implementa o núcleo dos serviços de IA da plataforma HubEdu.ia:
//! o chat que atende alunos, professores e a escola, o simulado ENEM com
//! questões oficiais e a correção de redações.
//!
//! ## Fluxo de uma mensagem
//!
//! ```text
//! mensagem ─► classificação (módulo) ─► complexidade ─► AI router
//!                                                         │
//!        conversa (contexto inteligente) ◄────────────────┤
//!                                                         ▼
//!                               fallback entre provedores (OpenAI, Gemini,
//!                               Perplexity, Grok) ─► resposta + aprendizado
//! ```
//!
//! ## Pilares
//!
//! ### 1. Classificação (`classification`)
//! Regex ordenadas por módulo, heurísticas de contexto e, para mensagens
//! longas, uma consulta curta ao LLM com timeout de 2s.
//!
//! ### 2. Roteamento (`router`, `fallback`)
//! O AI router pontua provedores por qualidade, velocidade, custo e
//! confiabilidade, com modos shadow/canary/auto e checagens de PII (LGPD).
//! O fallback manager tenta os provedores em ordem de prioridade.
//!
//! ### 3. ENEM e redação (`enem`, `redacao`)
//! Base local de questões oficiais, pontuação com estimativa TRI e correção
//! de redação pelas 5 competências.
//!
//! ### 4. Infraestrutura (`cache`, `rate_limit`, `conversation`, `embed`)
//! Cache com TTL, rate limit por IP, persistência de conversas e validação
//! de iframe.
//!
//! ## Exemplo de Uso
//!
//! ```rust,ignore
//! use hubedu::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let classifier = ModuleClassifier::local_only();
//!     let result = classifier.classify("Quero fazer um simulado do ENEM", 0).await;
//!     println!("{} ({:.2})", result.module, result.confidence);
//! }
//! ```

#![warn(rust_2018_idioms)]

/// Tipos fundamentais compartilhados por todo o sistema.
///
/// - [`Module`]: os 14 módulos do chat
/// - [`Complexity`] e [`UseCase`]: perfil da mensagem
/// - [`ProviderId`]: provedores de LLM
/// - [`EnemArea`]: áreas do ENEM
pub mod types;

/// Configuração via variáveis de ambiente.
///
/// **Runtime Tokio:**
/// - `HUBEDU_WORKER_THREADS`: threads do runtime (padrão: dinâmico)
///
/// **Provedores:**
/// - `OPENAI_API_KEY`, `GROK_API_KEY`/`XAI_API_KEY`, `PERPLEXITY_API_KEY`,
///   `GOOGLE_GENERATIVE_AI_API_KEY`, `ANTHROPIC_API_KEY`
///
/// **Servidor:**
/// - `HUBEDU_PORT`, `HUBEDU_API_SECRET`, `HUBEDU_ENEM_DATA_DIR`,
///   `HUBEDU_ALLOWED_EMBED_ORIGINS`, `HUBEDU_RATE_LIMIT_MAX`,
///   `HUBEDU_RATE_LIMIT_WINDOW_SECS`, `HUBEDU_LLM_TIMEOUT_SECS`
///
/// Também inclui o panic hook e o construtor do runtime Tokio.
pub mod config;

/// Utilitários de texto e medição de tempo.
pub mod utils;

/// Cache em memória com TTL e eviction por menor uso.
pub mod cache;

/// Rate limit por IP em janela fixa.
pub mod rate_limit;

/// Clientes de LLM.
///
/// Define a trait `LlmClient` e implementações para:
/// - APIs compatíveis com OpenAI (OpenAI, xAI, Perplexity, Gemini)
/// - Mock para testes
pub mod llm;

/// Classificação de módulo e detecção de complexidade.
pub mod classification;

/// AI router multi-provedor com checagens de segurança.
pub mod router;

/// Execução com fallback entre provedores.
pub mod fallback;

/// Embaralhamento de alternativas de quiz.
pub mod quiz;

/// Conversas persistidas e contexto inteligente.
pub mod conversation;

/// Base local ENEM, questões do simulado e pontuação.
pub mod enem;

/// Correção de redação no modelo ENEM.
pub mod redacao;

/// Validação de embed (iframe) por origem.
pub mod embed;

/// Orquestração de uma troca de chat.
pub mod chat;

/// Servidor HTTP (axum) com SSE.
#[cfg(feature = "server")]
pub mod server;

// Re-exports principais
pub use chat::ChatService;
pub use classification::ModuleClassifier;
pub use config::{
    create_tokio_runtime, install_panic_hook, load_runtime_config, ProviderKeys, RuntimeConfig,
    ServerConfig,
};
pub use fallback::FallbackManager;
pub use router::AiRouter;
pub use types::*;

/// Versão da biblioteca.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude com imports comuns para uso rápido.
///
/// ```rust,ignore
/// use hubedu::prelude::*;
/// ```
pub mod prelude {
    pub use crate::chat::{ChatInput, ChatReply, ChatService};
    pub use crate::classification::{detect_complexity, detect_use_case, Classification, ModuleClassifier};
    pub use crate::conversation::ConversationManager;
    pub use crate::enem::{calculate_score, EnemLocalDatabase, EnemQuestionService};
    pub use crate::fallback::{FallbackManager, FallbackOptions};
    pub use crate::llm::{LlmClient, LlmClients};
    pub use crate::redacao::RedacaoGrader;
    pub use crate::router::{AiRouter, RouteContext};
    pub use crate::types::*;
}
