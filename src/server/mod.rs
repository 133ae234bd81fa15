// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP SERVER - API HubEdu com SSE Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//!
//! Servidor HTTP das rotas de chat, ENEM, redação, AI router, quiz e embed.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/classify` - Classificação de módulo + complexidade
//! - `POST /api/chat` - Chat com resposta JSON
//! - `POST /api/chat/stream` - Chat com SSE (`meta`, `token`, `done`, `error`)
//! - `POST /api/enem/questions` - Questões oficiais para o simulado
//! - `GET /api/enem/exams` - Provas disponíveis na base local
//! - `POST /api/enem/score` - Pontuação do simulado
//! - `POST /api/redacao/avaliar` - Correção de redação
//! - `GET /api/redacao/temas` - Temas oficiais
//! - `GET|POST /api/ai-router` - Estado e controle do AI router
//! - `POST /api/quiz/shuffle` - Embaralhamento de alternativas
//! - `GET /api/embed/validate` - Validação de iframe
//! - `GET /QUESTOES_ENEM/public/:year/questions/:index/:file` - Imagens das questões
//!
//! ## Uso
//!
//! ```bash
//! cargo run -- --server --port=3000
//! cargo run -- --server --port=3000 --secret=minha-chave
//! ```

pub mod types;
pub mod handlers;
pub mod sse;
mod auth;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub use types::*;

use crate::chat::ChatService;
use crate::classification::ModuleClassifier;
use crate::config::ServerConfig;
use crate::conversation::ConversationManager;
use crate::embed::EmbedValidator;
use crate::enem::{EnemLocalDatabase, EnemQuestionService};
use crate::fallback::FallbackManager;
use crate::llm::LlmClients;
use crate::rate_limit::RateLimiter;
use crate::redacao::RedacaoGrader;
use crate::router::AiRouter;
use crate::types::ProviderId;

/// Modelo usado pelo classificador quando há chave OpenAI
const CLASSIFIER_MODEL: &str = "gpt-4o-mini";

/// Estado compartilhado entre todos os handlers
pub struct AppState {
    pub config: ServerConfig,
    pub classifier: Arc<ModuleClassifier>,
    pub router: Arc<AiRouter>,
    pub fallback: Arc<FallbackManager>,
    pub chat: ChatService,
    pub enem: EnemQuestionService,
    pub redacao: RedacaoGrader,
    pub embed: EmbedValidator,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    /// Monta os serviços a partir dos clientes configurados.
    pub fn new(config: ServerConfig, clients: &LlmClients) -> Self {
        let classifier = Arc::new(match clients.get(ProviderId::OpenAi) {
            Some(client) => ModuleClassifier::with_llm(client, CLASSIFIER_MODEL),
            None => ModuleClassifier::local_only(),
        });
        let router = Arc::new(AiRouter::for_available(&clients.available()));
        let fallback = Arc::new(FallbackManager::new(clients));
        let chat = ChatService::new(
            classifier.clone(),
            router.clone(),
            fallback.clone(),
            Arc::new(ConversationManager::in_memory()),
        );
        let database = Arc::new(EnemLocalDatabase::new(config.enem_data_dir.clone()));

        if clients.is_empty() {
            log::warn!("⚠️ Nenhum provedor de IA configurado: chat e redação vão falhar");
        }

        Self {
            classifier,
            router,
            fallback,
            chat,
            enem: EnemQuestionService::new(database),
            redacao: RedacaoGrader::new(clients),
            embed: EmbedValidator::new(&config.allowed_embed_origins),
            rate_limiter: RateLimiter::new(config.rate_limit),
            started_at: Instant::now(),
            config,
        }
    }

    pub fn with_redacao(mut self, grader: RedacaoGrader) -> Self {
        self.redacao = grader;
        self
    }
}

/// Monta o Router com middlewares e estado.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::{middleware, routing::{get, post}, Router};
    use tower_http::cors::CorsLayer;

    // Rotas com rate limit por IP
    let limited = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/api/redacao/avaliar", post(handlers::redacao_avaliar))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit_middleware,
        ));

    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/classify", post(handlers::classify))
        .route("/api/enem/questions", post(handlers::enem_questions))
        .route("/api/enem/exams", get(handlers::enem_exams))
        .route("/api/enem/score", post(handlers::enem_score))
        .route("/api/redacao/temas", get(handlers::redacao_temas))
        .route("/api/ai-router", get(handlers::router_status).post(handlers::router_action))
        .route("/api/quiz/shuffle", post(handlers::quiz_shuffle))
        .route("/api/embed/validate", get(handlers::embed_validate))
        .route(
            "/QUESTOES_ENEM/public/:year/questions/:index/:file",
            get(handlers::enem_image),
        )
        .merge(limited);

    // Auth middleware condicional
    let routes = if state.config.secret.is_some() {
        routes.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
    } else {
        routes
    };

    // CORS + state → Router<()> (pronto para serve)
    routes
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Inicia o servidor HTTP no endereço especificado.
///
/// Entry point chamado de main.rs quando `--server` é passado.
pub async fn start_server(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🚀 HubEdu server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
