// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SCHEMAS API - corpos de requisição e resposta
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::classification::{Classification, ClassifierStats, ModelRoute};
use crate::fallback::ProviderStatus;
use crate::quiz::QuizQuestion;
use crate::router::{RouterMetric, RouterMetricsSummary, RouterStatus};
use crate::types::{Complexity, UseCase};

// ─────────────────────────────────────────────────
// Erro
// ─────────────────────────────────────────────────

/// Corpo uniforme de erro: `{ "error": "...", "details": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ─────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub providers: Vec<ProviderStatus>,
    pub enem_available: bool,
    pub cache: CacheReport,
}

// ─────────────────────────────────────────────────
// Classificação
// ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    #[serde(alias = "userMessage")]
    pub message: String,
    #[serde(default, alias = "historyLength")]
    pub history_length: usize,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub classification: Classification,
    pub complexity: Complexity,
    pub use_case: UseCase,
    pub model: ModelRoute,
    pub stats: ClassifierStats,
}

// ─────────────────────────────────────────────────
// ENEM
// ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRequest {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub responses: Vec<crate::enem::ItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct ExamsResponse {
    pub exams: Vec<crate::enem::database::ExamSummary>,
    pub years: Vec<u32>,
    pub disciplines: Vec<&'static str>,
    pub languages: Vec<&'static str>,
}

// ─────────────────────────────────────────────────
// Redação
// ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ThemesResponse {
    pub themes: Vec<crate::redacao::Theme>,
    pub total: usize,
}

// ─────────────────────────────────────────────────
// AI Router
// ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RouterStatusResponse {
    #[serde(flatten)]
    pub status: RouterStatus,
    pub summary: RouterMetricsSummary,
    pub recent_metrics: Vec<RouterMetric>,
}

/// Ações do `POST /api/ai-router`
#[derive(Debug, Clone, Deserialize)]
pub struct RouterActionRequest {
    pub action: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RouterActionResponse {
    pub success: bool,
    pub message: String,
    pub enabled: bool,
}

// ─────────────────────────────────────────────────
// Quiz
// ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ShuffleRequest {
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ShuffleResponse {
    pub questions: Vec<QuizQuestion>,
    pub total: usize,
}

// ─────────────────────────────────────────────────
// Embed
// ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedQuery {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub origin: Option<String>,
}

// ─────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub enem_questions: CacheStats,
    pub essay_evaluations: CacheStats,
}

