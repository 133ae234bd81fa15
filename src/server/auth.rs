// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AUTENTICAÇÃO E RATE LIMIT - Middlewares
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::types::ApiError;
use super::AppState;
use crate::rate_limit::{client_key, RateDecision};

/// Middleware de autenticação Bearer token.
///
/// Ativado apenas quando há secret configurado. Só rotas `/api/*` exigem
/// token; `/health` e as imagens das questões ficam públicas.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let secret = match &state.config.secret {
        Some(s) => s,
        None => return next.run(request).await,
    };

    if !request.uri().path().starts_with("/api/") {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == secret => next.run(request).await,
        _ => unauthorized_response(),
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new("Unauthorized").with_details("Provide a valid Bearer token")),
    )
        .into_response()
}

/// Limite por IP nas rotas de chat e redação
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers();
    let key = client_key(
        headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()),
        headers.get("x-real-ip").and_then(|v| v.to_str().ok()),
    );

    match state.rate_limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            log::warn!("🚦 [RATE] {} bloqueado por {}s", key, retry_after.as_secs());
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ApiError::new("Rate limit exceeded")),
            )
                .into_response();
            // arredonda para cima: nunca "retry-after: 0"
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
