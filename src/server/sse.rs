// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE STREAMING - Bridge TokenStream → Server-Sent Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
//   event: meta   → conversa, classificação, rota, provedor
//   event: token  → { "content": "..." }   (0..n)
//   event: done   → { "conversation_id", "provider", "model", "latency_ms", "chars" }
//   event: error  → { "error": "..." }     (erro no meio do stream)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use axum::response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse, Response,
};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::AppState;
use crate::chat::{ChatMeta, ChatStream};
use crate::types::ProviderId;
use crate::utils::LatencyTimer;

/// Payload interno enviado da task produtora para o stream SSE
#[derive(Debug, Clone)]
pub enum SsePayload {
    Token(String),
    Done(DonePayload),
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DonePayload {
    pub conversation_id: String,
    pub provider: ProviderId,
    pub model: String,
    pub latency_ms: u64,
    pub chars: usize,
}

#[derive(Debug, Serialize)]
struct MetaPayload<'a> {
    #[serde(flatten)]
    meta: &'a ChatMeta,
    provider: ProviderId,
    model: &'a str,
}

/// Cria a resposta SSE para um stream já aberto.
///
/// 1. Cria um canal mpsc
/// 2. Spawna a task que consome os tokens, acumula o texto e grava a conversa
/// 3. Retorna Sse<Stream> que emite `meta` e depois o que vier do canal
///
/// A task roda até o fim mesmo se o cliente desconectar, para a conversa
/// ficar completa.
pub fn handle_streaming(state: Arc<AppState>, stream: ChatStream) -> Response {
    let (tx, rx) = mpsc::channel::<SsePayload>(256);

    let meta_json = serde_json::to_string(&MetaPayload {
        meta: &stream.meta,
        provider: stream.provider,
        model: &stream.model,
    })
    .unwrap_or_default();

    tokio::spawn(produce(state, stream, tx));

    let initial = futures::stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("meta").data(meta_json))
    });

    Sse::new(initial.chain(payload_events(rx)))
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn produce(state: Arc<AppState>, stream: ChatStream, tx: mpsc::Sender<SsePayload>) {
    let timer = LatencyTimer::start("chat-stream");
    let ChatStream {
        meta,
        provider,
        model,
        mut tokens,
        pending,
    } = stream;

    let mut content = String::new();
    let mut failure = None;

    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                content.push_str(&token);
                let _ = tx.send(SsePayload::Token(token)).await;
            }
            Err(e) => {
                log::warn!("⚠️ [SSE] stream de {} interrompido: {}", provider, e);
                failure = Some(e.to_string());
                break;
            }
        }
    }

    let latency_ms = timer.elapsed_ms();
    if let Err(e) = state
        .chat
        .finish_stream(&pending, provider, &model, &content, latency_ms)
        .await
    {
        log::error!("❌ [SSE] falha ao gravar conversa {}: {}", meta.conversation_id, e);
    }

    let last = match failure {
        Some(error) => SsePayload::Error(error),
        None => SsePayload::Done(DonePayload {
            conversation_id: meta.conversation_id.clone(),
            provider,
            model,
            latency_ms,
            chars: content.chars().count(),
        }),
    };
    let _ = tx.send(last).await;
    log::info!("✅ [SSE] {} concluído em {}ms", meta.conversation_id, latency_ms);
}

fn payload_events(rx: mpsc::Receiver<SsePayload>) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).map(|payload| Ok::<_, Infallible>(to_event(&payload)))
}

fn to_event(payload: &SsePayload) -> Event {
    let (name, data) = match payload {
        SsePayload::Token(content) => ("token", serde_json::json!({ "content": content })),
        SsePayload::Done(done) => ("done", serde_json::to_value(done).unwrap_or_default()),
        SsePayload::Error(error) => ("error", serde_json::json!({ "error": error })),
    };
    Event::default().event(name).data(data.to_string())
}

