// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CHAT - ORQUESTRAÇÃO DE UMA TROCA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
//   mensagem
//      │
//      ├─▶ conversa (garante + contexto inteligente)
//      ├─▶ classificação do módulo
//      ├─▶ complexidade
//      ├─▶ AI router (consultivo: provedor preferido + checagem de PII)
//      ├─▶ fallback manager (provedor preferido primeiro)
//      └─▶ persistência da resposta + aprendizado do router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::classification::{
    detect_complexity, detect_use_case, Classification, ClassificationMethod, ModuleClassifier,
};
use crate::conversation::{ConversationError, ConversationManager};
use crate::fallback::{FallbackManager, FallbackOptions, FallbackResult};
use crate::llm::TokenStream;
use crate::router::{AiRouter, RouteContext, RouteDecision, RouteOutcome};
use crate::types::{ChatMessage, ChatRole, Complexity, Module, ProviderId};

/// Usuário usado quando a requisição não informa um
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,

    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("{0}")]
    Providers(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatInput {
    pub message: String,
    #[serde(alias = "conversationId")]
    pub conversation_id: Option<String>,
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    /// Força o módulo em vez de classificar
    pub module: Option<String>,
}

/// Metadados da troca, enviados antes do conteúdo
#[derive(Debug, Clone, Serialize)]
pub struct ChatMeta {
    pub conversation_id: String,
    pub is_new_conversation: bool,
    pub classification: Classification,
    pub complexity: Complexity,
    pub route: RouteSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub request_id: String,
    pub provider_id: String,
    pub mode: crate::router::RouterMode,
    pub is_fallback: bool,
    pub estimated_cost: f64,
    pub pii_masked: bool,
}

impl From<&RouteDecision> for RouteSummary {
    fn from(d: &RouteDecision) -> Self {
        Self {
            request_id: d.request_id.clone(),
            provider_id: d.provider_id.clone(),
            mode: d.mode,
            is_fallback: d.is_fallback,
            estimated_cost: d.estimated_cost,
            pii_masked: d.sanitized_text.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub meta: ChatMeta,
    pub content: String,
    pub provider: ProviderId,
    pub model: String,
    pub latency_ms: u64,
    pub attempts: u32,
    pub fallback_chain: Vec<ProviderId>,
}

/// Estado preparado, compartilhado entre JSON e streaming
pub struct PreparedChat {
    pub meta: ChatMeta,
    user_id: String,
    decision: RouteDecision,
    options: FallbackOptions,
}

/// Stream aberto + o que é preciso para concluir a troca
pub struct ChatStream {
    pub meta: ChatMeta,
    pub provider: ProviderId,
    pub model: String,
    pub tokens: TokenStream,
    pub(crate) pending: PreparedChat,
}

pub struct ChatService {
    classifier: Arc<ModuleClassifier>,
    router: Arc<AiRouter>,
    fallback: Arc<FallbackManager>,
    conversations: Arc<ConversationManager>,
}

impl ChatService {
    pub fn new(
        classifier: Arc<ModuleClassifier>,
        router: Arc<AiRouter>,
        fallback: Arc<FallbackManager>,
        conversations: Arc<ConversationManager>,
    ) -> Self {
        Self {
            classifier,
            router,
            fallback,
            conversations,
        }
    }

    async fn classify(&self, input: &ChatInput, history_len: usize) -> Classification {
        if let Some(module) = input.module.as_deref().and_then(Module::parse) {
            return Classification {
                module,
                confidence: 1.0,
                rationale: "Módulo informado na requisição".to_string(),
                method: ClassificationMethod::Context,
                needs_images: module == Module::AulaInterativa,
            };
        }
        self.classifier.classify(&input.message, history_len).await
    }

    /// Conversa, classificação, rota e opções; grava a mensagem do usuário
    pub async fn prepare(&self, input: &ChatInput, streaming: bool) -> Result<PreparedChat, ChatError> {
        let message = input.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let user_id = input
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let requested_module = input.module.as_deref().and_then(Module::parse).unwrap_or(Module::Professor);
        let (conversation_id, is_new) = self
            .conversations
            .ensure_conversation(input.conversation_id.as_deref(), &user_id, requested_module)
            .await?;

        let context = self
            .conversations
            .intelligent_context(&conversation_id, &user_id, message, None)
            .await?;

        let classification = self.classify(input, context.len()).await;
        let complexity = detect_complexity(message, detect_use_case(message));

        let route_context = RouteContext {
            module: Some(classification.module),
            streaming,
            history_chars: context.iter().map(|m| m.content.chars().count()).sum(),
            ..Default::default()
        };
        let decision = self.router.route(message, &route_context);

        // com PII detectado, só o texto mascarado segue adiante
        let outgoing = decision.sanitized_text.clone().unwrap_or_else(|| message.to_string());

        let history: Vec<ChatMessage> = context.iter().map(|m| m.to_chat()).collect();

        let options = FallbackOptions::new(outgoing.clone())
            .module(classification.module)
            .complexity(complexity)
            .history(history)
            .prefer(decision.provider);

        self.conversations
            .add_message(
                &conversation_id,
                &user_id,
                ChatRole::User,
                &outgoing,
                Some(classification.module),
                None,
            )
            .await?;

        log::info!(
            "💬 [CHAT] {} → {} ({:.2}, {}) via {}",
            conversation_id,
            classification.module,
            classification.confidence,
            complexity,
            decision.provider_id
        );

        Ok(PreparedChat {
            meta: ChatMeta {
                conversation_id,
                is_new_conversation: is_new,
                classification,
                complexity,
                route: RouteSummary::from(&decision),
            },
            user_id,
            decision,
            options,
        })
    }

    /// Grava a resposta e informa o resultado ao router
    async fn complete_exchange(
        &self,
        prepared: &PreparedChat,
        served_by: Option<ProviderId>,
        model: Option<&str>,
        content: Option<&str>,
        latency_ms: u64,
    ) -> Result<(), ChatError> {
        self.router.record_outcome(&RouteOutcome {
            provider_id: prepared.decision.provider_id.clone(),
            domain: prepared.meta.classification.module,
            complexity: prepared.meta.complexity,
            success: served_by == Some(prepared.decision.provider),
            satisfaction: None,
            latency_ms,
            cost: prepared.decision.estimated_cost,
        });

        if let Some(content) = content.filter(|c| !c.is_empty()) {
            self.conversations
                .add_message(
                    &prepared.meta.conversation_id,
                    &prepared.user_id,
                    ChatRole::Assistant,
                    content,
                    Some(prepared.meta.classification.module),
                    model.map(str::to_string),
                )
                .await?;
        }
        Ok(())
    }

    /// Troca completa, resposta JSON
    pub async fn respond(&self, input: &ChatInput) -> Result<ChatReply, ChatError> {
        let prepared = self.prepare(input, false).await?;
        let result: FallbackResult = self.fallback.execute(&prepared.options).await;

        self.complete_exchange(
            &prepared,
            result.provider,
            result.model.as_deref(),
            result.content.as_deref(),
            result.latency_ms,
        )
        .await?;

        match (result.success, result.provider, result.content) {
            (true, Some(provider), Some(content)) => Ok(ChatReply {
                meta: prepared.meta,
                content,
                provider,
                model: result.model.unwrap_or_default(),
                latency_ms: result.latency_ms,
                attempts: result.attempts,
                fallback_chain: result.fallback_chain,
            }),
            _ => Err(ChatError::Providers(
                result.error.unwrap_or_else(|| "No AI providers available".to_string()),
            )),
        }
    }

    /// Abre o stream de tokens (fallback só na abertura)
    pub async fn open_stream(&self, input: &ChatInput) -> Result<ChatStream, ChatError> {
        let prepared = self.prepare(input, true).await?;
        match self.fallback.open_stream(&prepared.options).await {
            Ok(stream) => Ok(ChatStream {
                meta: prepared.meta.clone(),
                provider: stream.provider,
                model: stream.model,
                tokens: stream.tokens,
                pending: prepared,
            }),
            Err(e) => {
                self.complete_exchange(&prepared, None, None, None, 0).await?;
                Err(ChatError::Providers(e))
            }
        }
    }

    /// Conclui um stream: grava o texto acumulado
    pub async fn finish_stream(
        &self,
        pending: &PreparedChat,
        provider: ProviderId,
        model: &str,
        content: &str,
        latency_ms: u64,
    ) -> Result<(), ChatError> {
        self.complete_exchange(pending, Some(provider), Some(model), Some(content), latency_ms)
            .await
    }

    pub fn conversations(&self) -> &Arc<ConversationManager> {
        &self.conversations
    }
}
