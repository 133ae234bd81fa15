// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PERSISTÊNCIA DE CONVERSAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Conversas por usuário com contexto inteligente para o LLM:
//
// - Continuação (já há troca user/assistant): aviso de continuação
//   + últimas 6 mensagens não-system
// - Até 8 mensagens: todas
// - Mais que isso: mensagens relevantes (palavras-chave) ∪ últimas 5,
//   em ordem cronológica
//
// O armazenamento fica atrás de `ConversationStore`; o padrão é em memória.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache::{CacheConfig, CacheStats, TtlCache};
use crate::types::{ChatMessage, ChatRole, Module};
use crate::utils::{estimate_tokens, extract_keywords};

/// Máximo de mensagens carregadas para contexto
pub const MAX_CONTEXT_MESSAGES: usize = 20;
/// Máximo de caracteres no contexto enviado ao LLM
pub const MAX_CONTEXT_CHARS: usize = 15_000;
/// Até este tamanho o histórico vai inteiro
const SMALL_HISTORY: usize = 8;
const RECENT_ON_RELEVANCE: usize = 5;
const RECENT_ON_CONTINUATION: usize = 6;
const MAX_KEYWORDS: usize = 10;

const CONTINUATION_NOTICE: &str =
    "CONTEXTO: Esta é uma conversa em andamento. Seja direto e focado. Não repita introduções.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
}

impl ConversationMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: format!("msg-{}", Uuid::new_v4().simple()),
            tokens: Some(estimate_tokens(&content)),
            role,
            content,
            timestamp: Utc::now(),
            module: None,
            model: None,
        }
    }

    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub module: Module,
    pub messages: Vec<ConversationMessage>,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Σ ceil(chars/4) de todas as mensagens
pub fn token_count(messages: &[ConversationMessage]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Armazenamento de conversas
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Conversa `id` do usuário `user_id` (de outro usuário → None)
    async fn find(&self, id: &str, user_id: &str) -> Result<Option<Conversation>, ConversationError>;

    async fn create(&self, user_id: &str, module: Module) -> Result<Conversation, ConversationError>;

    /// Anexa a mensagem e atualiza `token_count` e `updated_at`
    async fn append(
        &self,
        id: &str,
        user_id: &str,
        message: ConversationMessage,
    ) -> Result<Conversation, ConversationError>;
}

/// Store em memória (não persiste entre reinícios)
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find(&self, id: &str, user_id: &str) -> Result<Option<Conversation>, ConversationError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(id).filter(|c| c.user_id == user_id).cloned())
    }

    async fn create(&self, user_id: &str, module: Module) -> Result<Conversation, ConversationError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module,
            messages: Vec::new(),
            token_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn append(
        &self,
        id: &str,
        user_id: &str,
        message: ConversationMessage,
    ) -> Result<Conversation, ConversationError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(id)
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;
        conversation.messages.push(message);
        conversation.token_count = token_count(&conversation.messages);
        conversation.updated_at = Utc::now();
        Ok(conversation.clone())
    }
}

/// Já existe troca user/assistant?
pub fn is_continuation(messages: &[ConversationMessage]) -> bool {
    messages.len() > 1 && messages.iter().any(|m| m.role != ChatRole::System)
}

fn is_relevant(message: &ConversationMessage, keywords: &[String]) -> bool {
    let content = message.content.to_lowercase();
    keywords.iter().any(|k| content.contains(k.as_str()))
}

/// Seleciona as mensagens de contexto para a próxima chamada.
pub fn build_context(
    messages: &[ConversationMessage],
    current_message: &str,
    continuation: bool,
) -> Vec<ConversationMessage> {
    if messages.is_empty() {
        return Vec::new();
    }

    let selected = if continuation {
        let last_system = messages.iter().rev().find(|m| m.role == ChatRole::System);
        let notice = match last_system {
            Some(system) if system.content.contains("CONTINUAÇÃO") => system.clone(),
            _ => ConversationMessage {
                id: "continuation-context".to_string(),
                module: None,
                model: Some("context".to_string()),
                ..ConversationMessage::new(ChatRole::System, CONTINUATION_NOTICE)
            },
        };

        let non_system: Vec<&ConversationMessage> =
            messages.iter().filter(|m| m.role != ChatRole::System).collect();
        let start = non_system.len().saturating_sub(RECENT_ON_CONTINUATION);

        std::iter::once(notice)
            .chain(non_system[start..].iter().map(|m| (*m).clone()))
            .collect()
    } else if messages.len() <= SMALL_HISTORY {
        messages.to_vec()
    } else {
        let keywords = extract_keywords(current_message, MAX_KEYWORDS);
        let recent_start = messages.len() - RECENT_ON_RELEVANCE;

        // índices preservam a ordem cronológica e deduplicam
        let indices: BTreeSet<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| is_relevant(m, &keywords))
            .map(|(i, _)| i)
            .chain(recent_start..messages.len())
            .collect();

        indices.into_iter().map(|i| messages[i].clone()).collect()
    };

    trim_to_budget(selected, MAX_CONTEXT_CHARS)
}

/// Remove as mensagens mais antigas até caber em `max_chars` (mantém a última)
fn trim_to_budget(mut messages: Vec<ConversationMessage>, max_chars: usize) -> Vec<ConversationMessage> {
    let mut total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    let mut drop = 0;
    while total > max_chars && drop + 1 < messages.len() {
        total -= messages[drop].content.chars().count();
        drop += 1;
    }
    if drop > 0 {
        log::debug!("✂️ [CONVERSATION] {} mensagens antigas removidas do contexto", drop);
        messages.drain(..drop);
    }
    messages
}

/// Gerenciador com cache de contexto por `conversa-usuário`
pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    context_cache: TtlCache<String, Vec<ConversationMessage>>,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self::with_cache_config(store, CacheConfig::conversation_context())
    }

    pub fn with_cache_config(store: Arc<dyn ConversationStore>, cache: CacheConfig) -> Self {
        Self {
            store,
            context_cache: TtlCache::new(cache),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryConversationStore::new()))
    }

    fn cache_key(conversation_id: &str, user_id: &str) -> String {
        format!("{}-{}", conversation_id, user_id)
    }

    /// Retorna (id, criada agora?)
    pub async fn ensure_conversation(
        &self,
        conversation_id: Option<&str>,
        user_id: &str,
        module: Module,
    ) -> Result<(String, bool), ConversationError> {
        if let Some(id) = conversation_id {
            if self.store.find(id, user_id).await?.is_some() {
                return Ok((id.to_string(), false));
            }
            log::info!("🆕 [CONVERSATION] {} não encontrada para {}, criando nova", id, user_id);
        }
        let conversation = self.store.create(user_id, module).await?;
        Ok((conversation.id, true))
    }

    /// Últimas `limit` mensagens
    pub async fn history(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, ConversationError> {
        let key = Self::cache_key(conversation_id, user_id);
        let cached = self.context_cache.get(&key);

        let messages = match cached {
            Some(messages) => messages,
            None => {
                let Some(conversation) = self.store.find(conversation_id, user_id).await? else {
                    return Ok(Vec::new());
                };
                self.context_cache.insert(key, conversation.messages.clone());
                conversation.messages
            }
        };

        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    /// Anexa mensagem; retorna o novo total de tokens da conversa
    pub async fn add_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        role: ChatRole,
        content: &str,
        module: Option<Module>,
        model: Option<String>,
    ) -> Result<usize, ConversationError> {
        let message = ConversationMessage {
            module,
            model,
            ..ConversationMessage::new(role, content)
        };
        let updated = self.store.append(conversation_id, user_id, message.clone()).await?;

        let key = Self::cache_key(conversation_id, user_id);
        if let Some(mut cached) = self.context_cache.get(&key) {
            cached.push(message);
            self.context_cache.insert(key, cached);
        }
        Ok(updated.token_count)
    }

    /// Contexto para a próxima chamada ao LLM.
    ///
    /// `continuation = None` detecta pela própria conversa.
    pub async fn intelligent_context(
        &self,
        conversation_id: &str,
        user_id: &str,
        new_message: &str,
        continuation: Option<bool>,
    ) -> Result<Vec<ConversationMessage>, ConversationError> {
        let history = self.history(conversation_id, user_id, MAX_CONTEXT_MESSAGES).await?;
        let continuation = continuation.unwrap_or_else(|| is_continuation(&history));
        Ok(build_context(&history, new_message, continuation))
    }

    pub fn clear_cache(&self, conversation_id: &str, user_id: &str) {
        self.context_cache.remove(&Self::cache_key(conversation_id, user_id));
    }

    pub fn clear_all_cache(&self) {
        self.context_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.context_cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: ChatRole, content: &str) -> ConversationMessage {
        ConversationMessage::new(role, content)
    }

    #[tokio::test]
    async fn test_ensure_conversation_creates_and_reuses() {
        let manager = ConversationManager::in_memory();
        let (id, is_new) = manager.ensure_conversation(None, "u1", Module::Professor).await.unwrap();
        assert!(is_new);

        let (same, is_new) = manager.ensure_conversation(Some(&id), "u1", Module::Professor).await.unwrap();
        assert_eq!(same, id);
        assert!(!is_new);

        // outro usuário não enxerga a conversa
        let (other, is_new) = manager.ensure_conversation(Some(&id), "u2", Module::Professor).await.unwrap();
        assert_ne!(other, id);
        assert!(is_new);
    }

    #[tokio::test]
    async fn test_add_message_counts_tokens() {
        let manager = ConversationManager::in_memory();
        let (id, _) = manager.ensure_conversation(None, "u1", Module::Enem).await.unwrap();

        let total = manager
            .add_message(&id, "u1", ChatRole::User, "abcdefgh", None, None)
            .await
            .unwrap();
        assert_eq!(total, 2);
        let total = manager
            .add_message(&id, "u1", ChatRole::Assistant, "abcde", Some(Module::Enem), Some("gpt-4o-mini".into()))
            .await
            .unwrap();
        assert_eq!(total, 4);

        let history = manager.history(&id, "u1", 20).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].model.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_add_message_to_missing_conversation() {
        let manager = ConversationManager::in_memory();
        let err = manager
            .add_message("nope", "u1", ChatRole::User, "oi", None, None)
            .await
            .unwrap_err();
        assert_eq!(err, ConversationError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_history_cache_sees_new_messages() {
        let manager = ConversationManager::in_memory();
        let (id, _) = manager.ensure_conversation(None, "u1", Module::Ti).await.unwrap();
        manager.add_message(&id, "u1", ChatRole::User, "um", None, None).await.unwrap();
        assert_eq!(manager.history(&id, "u1", 20).await.unwrap().len(), 1);

        manager.add_message(&id, "u1", ChatRole::Assistant, "dois", None, None).await.unwrap();
        manager.add_message(&id, "u1", ChatRole::User, "três", None, None).await.unwrap();
        let history = manager.history(&id, "u1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "três");

        manager.clear_all_cache();
        assert_eq!(manager.history(&id, "u1", 20).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_context_cache_is_bounded() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::for_tests()
        };
        let manager = ConversationManager::with_cache_config(Arc::new(InMemoryConversationStore::new()), config);

        let mut ids = Vec::new();
        for i in 0..4 {
            let (id, _) = manager.ensure_conversation(None, "u1", Module::Professor).await.unwrap();
            manager
                .add_message(&id, "u1", ChatRole::User, &format!("mensagem {}", i), None, None)
                .await
                .unwrap();
            manager.history(&id, "u1", 20).await.unwrap();
            ids.push(id);
        }

        let stats = manager.cache_stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.evictions >= 2);

        // conversa despejada do cache volta do store
        let first = manager.history(&ids[0], "u1", 20).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].content, "mensagem 0");
    }

    #[test]
    fn test_continuation_context() {
        let mut messages = vec![msg(ChatRole::System, "instruções")];
        for i in 0..10 {
            messages.push(msg(ChatRole::User, &format!("pergunta {}", i)));
            messages.push(msg(ChatRole::Assistant, &format!("resposta {}", i)));
        }
        assert!(is_continuation(&messages));

        let context = build_context(&messages, "nova", true);
        assert_eq!(context.len(), 7);
        assert_eq!(context[0].content, CONTINUATION_NOTICE);
        assert_eq!(context[6].content, "resposta 9");
    }

    #[test]
    fn test_small_history_goes_whole() {
        let messages: Vec<_> = (0..8).map(|i| msg(ChatRole::System, &format!("nota {}", i))).collect();
        assert_eq!(build_context(&messages, "x", false).len(), 8);
    }

    #[test]
    fn test_relevance_plus_recent() {
        let mut messages: Vec<_> = (0..12).map(|i| msg(ChatRole::User, &format!("assunto {}", i))).collect();
        messages[2].content = "falamos de fotossíntese aqui".into();

        let context = build_context(&messages, "E a fotossíntese nas plantas?", false);
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["falamos de fotossíntese aqui", "assunto 7", "assunto 8", "assunto 9", "assunto 10", "assunto 11"]
        );
    }

    #[test]
    fn test_context_respects_char_budget() {
        let big = "x".repeat(6_000);
        let messages = vec![
            msg(ChatRole::User, &big),
            msg(ChatRole::Assistant, &big),
            msg(ChatRole::User, &big),
        ];
        let context = build_context(&messages, "x", false);
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_empty_history() {
        assert!(build_context(&[], "oi", true).is_empty());
        assert!(!is_continuation(&[msg(ChatRole::User, "oi")]));
    }
}
