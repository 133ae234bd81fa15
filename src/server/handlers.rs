// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ENDPOINT HANDLERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::sse;
use super::types::*;
use super::AppState;
use crate::chat::{ChatError, ChatInput};
use crate::classification::{detect_complexity, detect_use_case, route_model};
use crate::enem::{calculate_score, EnemDbError, QuestionsError, QuestionsRequest, ScoringError};
use crate::quiz::shuffle_quiz;
use crate::redacao::{official_themes, RedacaoError, Submission};
use crate::router::RouterMode;
use crate::utils::now_millis;

/// Quantas métricas recentes o GET do router devolve
const RECENT_METRICS: usize = 50;

// ── GET /health ─────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        providers: state.fallback.status(),
        enem_available: state.enem.database().is_available().await,
        cache: CacheReport {
            enem_questions: state.enem.cache_stats(),
            essay_evaluations: state.redacao.cache_stats(),
        },
    })
}

// ── POST /api/classify ──────────────────────────

pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyRequest>,
) -> Response {
    let message = body.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is required");
    }

    let classification = state.classifier.classify(message, body.history_length).await;
    let use_case = detect_use_case(message);
    let complexity = detect_complexity(message, use_case);
    let model = route_model(
        message,
        &state.fallback.available(),
        Some(use_case),
        None,
        Some(complexity),
    );

    Json(ClassifyResponse {
        classification,
        complexity,
        use_case,
        model,
        stats: state.classifier.stats(),
    })
    .into_response()
}

// ── POST /api/chat ──────────────────────────────

pub async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatInput>) -> Response {
    match state.chat.respond(&body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => chat_error(e),
    }
}

// ── POST /api/chat/stream ───────────────────────

pub async fn chat_stream(State(state): State<Arc<AppState>>, Json(body): Json<ChatInput>) -> Response {
    match state.chat.open_stream(&body).await {
        Ok(stream) => {
            log::info!("[SSE] Streaming {} via {}", stream.meta.conversation_id, stream.provider);
            sse::handle_streaming(state.clone(), stream)
        }
        Err(e) => chat_error(e),
    }
}

fn chat_error(error: ChatError) -> Response {
    match error {
        ChatError::EmptyMessage => error_response(StatusCode::BAD_REQUEST, &error.to_string()),
        ChatError::Conversation(e) => {
            error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Conversation error", &e.to_string())
        }
        ChatError::Providers(details) => {
            log::error!("❌ [CHAT] {}", details);
            error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "AI providers unavailable", &details)
        }
    }
}

// ── POST /api/enem/questions ────────────────────

pub async fn enem_questions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionsRequest>,
) -> Response {
    match state.enem.fetch(&body).await {
        Ok(response) => Json(response).into_response(),
        Err(e @ (QuestionsError::InvalidParameters | QuestionsError::UnknownArea(_))) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ QuestionsError::NoneAvailable) => error_response(StatusCode::NOT_FOUND, &e.to_string()),
    }
}

// ── GET /api/enem/exams ─────────────────────────

pub async fn enem_exams(State(state): State<Arc<AppState>>) -> Response {
    let db = state.enem.database();
    match db.get_exams().await {
        Ok(exams) => Json(ExamsResponse {
            exams,
            years: db.available_years().await,
            disciplines: db.disciplines(),
            languages: db.languages(),
        })
        .into_response(),
        Err(EnemDbError::Unavailable(path)) => {
            error_with_details(StatusCode::NOT_FOUND, "ENEM database not available", &path)
        }
        Err(e) => error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load exams", &e.to_string()),
    }
}

// ── POST /api/enem/score ────────────────────────

pub async fn enem_score(Json(body): Json<ScoreRequest>) -> Response {
    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("session_{}", now_millis()));

    match calculate_score(&session_id, &body.responses) {
        Ok(result) => Json(result).into_response(),
        Err(e @ ScoringError::NoResponses) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

// ── GET /QUESTOES_ENEM/public/:year/questions/:index/:file ──

/// Serve as imagens das questões a partir da base local
pub async fn enem_image(
    State(state): State<Arc<AppState>>,
    Path((year, index, file)): Path<(u32, String, String)>,
) -> Response {
    let safe = |segment: &str| {
        !segment.is_empty() && !segment.contains("..") && !segment.contains('/') && !segment.contains('\\')
    };
    if !safe(&index) || !safe(&file) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid path");
    }

    let path = state
        .enem
        .database()
        .base_path()
        .join(year.to_string())
        .join("questions")
        .join(&index)
        .join(&file);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            let mut response = bytes.into_response();
            if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            response
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "Image not found"),
    }
}

// ── POST /api/redacao/avaliar ───────────────────

pub async fn redacao_avaliar(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Submission>,
) -> Response {
    match state.redacao.submit(&body).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e @ (RedacaoError::MissingFields | RedacaoError::WordCount(_))) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => {
            log::error!("❌ [REDACAO] {}", e);
            error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Erro ao avaliar redação", &e.to_string())
        }
    }
}

// ── GET /api/redacao/temas ──────────────────────

pub async fn redacao_temas() -> Json<ThemesResponse> {
    let themes = official_themes();
    Json(ThemesResponse {
        total: themes.len(),
        themes,
    })
}

// ── GET /api/ai-router ──────────────────────────

pub async fn router_status(State(state): State<Arc<AppState>>) -> Json<RouterStatusResponse> {
    let metrics = state.router.metrics();
    let skip = metrics.len().saturating_sub(RECENT_METRICS);
    Json(RouterStatusResponse {
        status: state.router.status(),
        summary: state.router.metrics_summary(),
        recent_metrics: metrics.into_iter().skip(skip).collect(),
    })
}

// ── POST /api/ai-router ─────────────────────────

pub async fn router_action(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouterActionRequest>,
) -> Response {
    let router = &state.router;
    let message = match body.action.as_str() {
        "enable" => {
            router.enable();
            "AI Router enabled".to_string()
        }
        "disable" => {
            router.disable();
            "AI Router disabled".to_string()
        }
        "set_mode" => match body.mode.as_deref().and_then(RouterMode::parse) {
            Some(mode) => {
                router.set_mode(mode);
                format!("Mode set to {}", mode.as_str())
            }
            None => return error_response(StatusCode::BAD_REQUEST, "Invalid mode. Use shadow, canary or auto"),
        },
        "set_canary_percentage" => match body.percentage {
            Some(pct) => format!("Canary percentage set to {}%", router.set_canary_percentage(pct)),
            None => return error_response(StatusCode::BAD_REQUEST, "percentage is required"),
        },
        "reset_metrics" => {
            router.reset_metrics();
            "Metrics reset".to_string()
        }
        other => {
            return error_with_details(StatusCode::BAD_REQUEST, "Invalid action", other);
        }
    };

    Json(RouterActionResponse {
        success: true,
        message,
        enabled: router.is_enabled(),
    })
    .into_response()
}

// ── POST /api/quiz/shuffle ──────────────────────

pub async fn quiz_shuffle(Json(body): Json<ShuffleRequest>) -> Response {
    match shuffle_quiz(&body.questions, body.seed) {
        Ok(questions) => Json(ShuffleResponse {
            total: questions.len(),
            questions,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

// ── GET /api/embed/validate ─────────────────────

pub async fn embed_validate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmbedQuery>,
) -> Response {
    if query.module.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "module is required");
    }
    let decision = state.embed.validate(&query.module, query.origin.as_deref());
    let csp = format!("frame-ancestors {}", decision.frame_ancestors);

    let mut response = Json(decision).into_response();
    if let Ok(value) = HeaderValue::from_str(&csp) {
        response.headers_mut().insert(header::CONTENT_SECURITY_POLICY, value);
    }
    response
}

// ── Helpers ─────────────────────────────────────

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiError::new(message))).into_response()
}

fn error_with_details(status: StatusCode, message: &str, details: &str) -> Response {
    (status, Json(ApiError::new(message).with_details(details))).into_response()
}
