// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTE LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Trait e implementações para interação com modelos de linguagem.
// OpenAI, xAI (Grok), Perplexity e Gemini falam o mesmo formato
// `/chat/completions`, então um único cliente HTTP cobre todos.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::config::{provider_base_url, ProviderKeys};
use crate::types::{ChatMessage, ProviderId};

/// Erros que podem ocorrer ao interagir com o LLM
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(ProviderId),

    #[error("Provider {0} does not expose an OpenAI-compatible endpoint")]
    UnsupportedProvider(ProviderId),
}

impl LlmError {
    /// Falha de transporte (conexão, DNS, timeout): vale tentar de novo
    pub fn is_network(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }

    /// Quota esgotada ou rate limit do provedor
    pub fn is_quota_exceeded(&self) -> bool {
        if let LlmError::Api { status: 429, .. } = self {
            return true;
        }
        let msg = self.to_string().to_lowercase();
        msg.contains("quota")
            || msg.contains("rate limit")
            || msg.contains("limit exceeded")
            || msg.contains("too many requests")
            || msg.contains("rate_limit_exceeded")
    }

    /// Chave ausente, inválida ou sem permissão
    pub fn is_api_key_error(&self) -> bool {
        match self {
            LlmError::MissingApiKey(_) => true,
            LlmError::Api { status: 401, .. } => true,
            other => {
                let msg = other.to_string().to_lowercase();
                msg.contains("api key")
                    || msg.contains("authentication")
                    || msg.contains("unauthorized")
                    || msg.contains("invalid_api_key")
            }
        }
    }
}

/// Requisição de chat
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Conteúdo da última mensagem do usuário
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Uso de tokens reportado pelo provedor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Resposta completa do LLM
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Stream de fragmentos de texto
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

/// Trait principal para clientes LLM
///
/// Permite trocar provedores reais pelo mock nos testes.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provedor atendido por este cliente
    fn provider(&self) -> ProviderId;

    /// Uma chamada completa (sem streaming)
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Resposta em fragmentos.
    ///
    /// Padrão: resposta completa emitida como um único fragmento.
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream, LlmError> {
        let response = self.complete(request).await?;
        Ok(futures::stream::once(async move { Ok(response.content) }).boxed())
    }
}

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Extrai o maior trecho `{ ... }` de um texto livre.
///
/// Modelos costumam envolver o JSON em markdown ou prosa.
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTE OPENAI-COMPATIBLE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cliente HTTP para qualquer endpoint `/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    provider: ProviderId,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    /// `timeout` limita a conexão e a resposta completa em `complete`.
    /// Em `stream` vale como intervalo máximo entre chunks, não como
    /// duração total da resposta.
    pub fn new(
        provider: ProviderId,
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Cria o cliente usando a URL padrão do provedor
    pub fn for_provider(
        provider: ProviderId,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = provider_base_url(provider).ok_or(LlmError::UnsupportedProvider(provider))?;
        Self::new(provider, base_url, api_key, timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, LlmError> {
        let payload = WireRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        log::debug!(
            "[LLM] {} → {} ({} mensagens, stream={})",
            self.provider,
            request.model,
            request.messages.len(),
            stream
        );

        let builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload);

        let sent = if stream {
            // só a espera pelos headers; o corpo tem timeout por chunk
            tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| LlmError::Timeout)?
        } else {
            builder.timeout(self.timeout).send().await
        };
        let response = sent.map_err(map_transport_error)?;

        check_status(response).await
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.send(request, false).await?;

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.prompt_tokens + u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            usage,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream, LlmError> {
        let response = self.send(request, true).await?;
        let bytes = Box::pin(response.bytes_stream());
        let idle = self.timeout;

        let stream = futures::stream::unfold(
            (bytes, SseDecoder::default(), VecDeque::<String>::new(), false),
            move |(mut bytes, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(token) = pending.pop_front() {
                        return Some((Ok(token), (bytes, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    let next = match tokio::time::timeout(idle, bytes.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            done = true;
                            log::warn!("[LLM] stream sem dados por {:?}", idle);
                            return Some((Err(LlmError::Timeout), (bytes, decoder, pending, done)));
                        }
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            for event in decoder.push(&chunk) {
                                match event {
                                    SseEvent::Token(token) => pending.push_back(token),
                                    SseEvent::Done => done = true,
                                }
                            }
                        }
                        Some(Err(e)) => {
                            done = true;
                            let err = map_transport_error(e);
                            return Some((Err(err), (bytes, decoder, pending, done)));
                        }
                        None => done = true,
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(e.to_string())
    }
}

/// Converte respostas não-2xx em `LlmError::Api`, lendo o envelope
/// `{ "error": { "message", "code" } }` quando presente.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    Err(LlmError::Api {
        status: status.as_u16(),
        message: parse_error_body(&body),
    })
}

fn parse_error_body(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.code {
            Some(serde_json::Value::String(code)) => format!("{} [code={}]", envelope.error.message, code),
            Some(other) if !other.is_null() => format!("{} [code={}]", envelope.error.message, other),
            _ => envelope.error.message,
        },
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
}

/// Decodificador incremental de linhas `data:` de Server-Sent Events.
///
/// Guarda bytes parciais entre chunks para não quebrar caracteres UTF-8.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }

            if let Ok(chunk) = serde_json::from_str::<WireStreamChunk>(data) {
                let text: String = chunk
                    .choices
                    .into_iter()
                    .filter_map(|c| c.delta.content)
                    .collect();
                if !text.is_empty() {
                    events.push(SseEvent::Token(text));
                }
            }
        }

        events
    }
}

// ── Wire types (privados) ───────────────────────

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
}

#[derive(Deserialize)]
struct WireStreamChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REGISTRO DE CLIENTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Clientes disponíveis, um por provedor
#[derive(Clone, Default)]
pub struct LlmClients {
    clients: HashMap<ProviderId, Arc<dyn LlmClient>>,
}

impl LlmClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cria clientes HTTP para todos os provedores com chave configurada.
    ///
    /// Provedores sem endpoint compatível são ignorados com warning.
    pub fn from_keys(keys: &ProviderKeys, timeout: Duration) -> Self {
        let mut clients = Self::new();
        for provider in keys.configured() {
            let Some(key) = keys.get(provider) else { continue };
            match OpenAiCompatibleClient::for_provider(provider, key, timeout) {
                Ok(client) => {
                    log::info!("🔌 [LLM] provedor {} configurado", provider);
                    clients.insert(Arc::new(client));
                }
                Err(e) => log::warn!("⚠️ [LLM] {} ignorado: {}", provider, e),
            }
        }
        clients
    }

    pub fn insert(&mut self, client: Arc<dyn LlmClient>) {
        self.clients.insert(client.provider(), client);
    }

    pub fn with(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.insert(client);
        self
    }

    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn LlmClient>> {
        self.clients.get(&provider).cloned()
    }

    /// Provedores disponíveis, na ordem de `ProviderId::ALL`
    pub fn available(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .iter()
            .copied()
            .filter(|p| self.clients.contains_key(p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for LlmClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClients")
            .field("providers", &self.available())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO MOCK PARA TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cliente mock com respostas roteirizadas.
///
/// Respostas enfileiradas são consumidas em ordem; depois disso
/// retorna sempre `default_reply`.
pub struct MockLlmClient {
    provider: ProviderId,
    default_reply: Result<String, LlmError>,
    scripted: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            default_reply: Ok("Resposta simulada".to_string()),
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sempre responde `reply`
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Ok(reply.into());
        self
    }

    /// Sempre falha com `error`
    pub fn failing(mut self, error: LlmError) -> Self {
        self.default_reply = Err(error);
        self
    }

    /// Enfileira uma resposta ou erro para a próxima chamada
    pub fn then(self, reply: Result<String, LlmError>) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push_back(reply);
        }
        self
    }

    /// Atraso artificial antes de responder
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    async fn next_reply(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let content = self.next_reply(request).await?;
        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        let prompt_tokens = crate::utils::estimate_tokens_len(prompt_chars) as u64;
        let completion_tokens = crate::utils::estimate_tokens(&content) as u64;
        Ok(ChatResponse {
            content,
            model: request.model.clone(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    /// Emite a resposta palavra por palavra
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream, LlmError> {
        let content = self.next_reply(request).await?;
        let tokens: Vec<Result<String, LlmError>> = content
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(futures::stream::iter(tokens).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_scripted_then_default() {
        let client = MockLlmClient::new(ProviderId::OpenAi)
            .with_reply("padrão")
            .then(Ok("primeira".into()))
            .then(Err(LlmError::Timeout));
        let req = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("oi")]);

        assert_eq!(client.complete(&req).await.unwrap().content, "primeira");
        assert_eq!(client.complete(&req).await.unwrap_err(), LlmError::Timeout);
        assert_eq!(client.complete(&req).await.unwrap().content, "padrão");
        assert_eq!(client.calls(), 3);
        assert_eq!(client.last_request().unwrap().model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_mock_stream_word_by_word() {
        let client = MockLlmClient::new(ProviderId::Xai).with_reply("uma duas três");
        let req = ChatRequest::new("grok", vec![ChatMessage::user("x")]);
        let tokens: Vec<String> = client
            .stream(&req)
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens, vec!["uma ", "duas ", "três"]);
        assert_eq!(tokens.concat(), "uma duas três");
    }

    #[test]
    fn test_extract_json_object() {
        let text = "Claro! Segue:\n```json\n{\"a\": {\"b\": 1}}\n```\nAbraços";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("sem json"), None);
    }

    #[test]
    fn test_sse_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        let first = b"data: {\"choices\":[{\"delta\":{\"content\":\"Ol";
        let second = "á\"}}]}\n\ndata: [DONE]\n".as_bytes();

        assert!(decoder.push(first).is_empty());
        let events = decoder.push(second);
        assert_eq!(events, vec![SseEvent::Token("Olá".into()), SseEvent::Done]);
    }

    #[test]
    fn test_sse_decoder_skips_non_data_lines() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: ping\ndata: {\"choices\":[{\"delta\":{}}]}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_parse_error_body_envelope() {
        let body = r#"{"error":{"message":"You exceeded your current quota","code":"insufficient_quota"}}"#;
        assert_eq!(
            parse_error_body(body),
            "You exceeded your current quota [code=insufficient_quota]"
        );
        assert_eq!(parse_error_body("plain"), "plain");
    }

    #[test]
    fn test_error_classification() {
        let quota = LlmError::Api { status: 429, message: "slow down".into() };
        assert!(quota.is_quota_exceeded());
        let quota_msg = LlmError::Api { status: 400, message: "quota exceeded".into() };
        assert!(quota_msg.is_quota_exceeded());

        let key = LlmError::Api { status: 401, message: "bad".into() };
        assert!(key.is_api_key_error());
        assert!(LlmError::MissingApiKey(ProviderId::OpenAi).is_api_key_error());
        assert!(!LlmError::Timeout.is_api_key_error());

        assert!(LlmError::Network("reset".into()).is_network());
        assert!(!quota.is_network());
    }

    #[test]
    fn test_client_endpoint_and_registry() {
        let client =
            OpenAiCompatibleClient::for_provider(ProviderId::Xai, "k", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://api.x.ai/v1/chat/completions");
        assert_eq!(
            OpenAiCompatibleClient::for_provider(ProviderId::Anthropic, "k", Duration::from_secs(5))
                .unwrap_err(),
            LlmError::UnsupportedProvider(ProviderId::Anthropic)
        );

        let keys = ProviderKeys {
            openai: Some("sk".into()),
            anthropic: Some("ak".into()),
            ..Default::default()
        };
        let clients = LlmClients::from_keys(&keys, Duration::from_secs(5));
        assert_eq!(clients.available(), vec![ProviderId::OpenAi]);
    }

    /// Servidor SSE local: responde um `data:` por item de `gaps`, esperando
    /// o intervalo indicado antes de cada um, e fecha com `[DONE]`.
    async fn spawn_sse_server(gaps: Vec<Duration>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // lê headers + corpo da requisição antes de responder
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&received[..end]).to_lowercase();
                    let length = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if received.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            for (i, gap) in gaps.into_iter().enumerate() {
                tokio::time::sleep(gap).await;
                let event = format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"t{} \"}}}}]}}\n\n", i);
                if socket.write_all(event.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"data: [DONE]\n\n").await;
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_stream_outlives_request_timeout() {
        // 10 tokens a cada 100ms: ~1s no total, bem acima do timeout de 400ms
        let base = spawn_sse_server(vec![Duration::from_millis(100); 10]).await;
        let client =
            OpenAiCompatibleClient::new(ProviderId::OpenAi, &base, "k", Duration::from_millis(400)).unwrap();
        let req = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("conte uma história")]);

        let results: Vec<Result<String, LlmError>> = client.stream(&req).await.unwrap().collect().await;
        assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);
        assert_eq!(results.len(), 10);
        assert_eq!(results[9].as_ref().unwrap(), "t9 ");
    }

    #[tokio::test]
    async fn test_stream_idle_gap_times_out() {
        let base = spawn_sse_server(vec![
            Duration::from_millis(10),
            Duration::from_millis(1500),
        ])
        .await;
        let client =
            OpenAiCompatibleClient::new(ProviderId::OpenAi, &base, "k", Duration::from_millis(300)).unwrap();
        let req = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("oi")]);

        let results: Vec<Result<String, LlmError>> = client.stream(&req).await.unwrap().collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "t0 ");
        assert_eq!(results[1], Err(LlmError::Timeout));
    }
}
