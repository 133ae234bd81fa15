// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QUESTÕES PARA O SIMULADO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Apenas questões oficiais: nada é gerado por IA. Respostas ficam 5 minutos
// em cache pela chave `{area}-{n}-{use_real}`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::database::{EnemLocalDatabase, LocalQuestion, QuestionFilters};
use super::{area_slug, discipline_name};
use crate::cache::{CacheConfig, CacheStats, TtlCache};
use crate::quiz::index_to_letter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionsError {
    #[error("Invalid parameters: area and numQuestions are required")]
    InvalidParameters,

    #[error("Unknown ENEM area: {0}")]
    UnknownArea(String),

    #[error("Nenhuma questão real do ENEM disponível. Apenas questões oficiais são permitidas.")]
    NoneAvailable,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsRequest {
    #[serde(default)]
    pub area: String,
    #[serde(default, alias = "numQuestions")]
    pub num_questions: usize,
    #[serde(default = "default_true", alias = "useRealQuestions")]
    pub use_real_questions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub id: String,
    pub subject: String,
    pub area: String,
    pub difficulty: String,
    pub year: u32,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub image_urls: Vec<String>,
}

impl From<&LocalQuestion> for QuestionItem {
    fn from(q: &LocalQuestion) -> Self {
        let mut statement = q.context.clone().unwrap_or_default();
        if !q.alternatives_introduction.is_empty() {
            if !statement.is_empty() {
                statement.push_str("\n\n");
            }
            statement.push_str(&q.alternatives_introduction);
        }

        let options = q
            .alternatives
            .iter()
            .enumerate()
            .map(|(i, alt)| {
                if alt.text.is_empty() {
                    format!("Alternativa {}", index_to_letter(i).unwrap_or('?'))
                } else {
                    alt.text.clone()
                }
            })
            .collect();

        Self {
            id: format!("local_{}_{}", q.year, q.index),
            subject: discipline_name(&q.discipline).unwrap_or(&q.discipline).to_string(),
            area: q.discipline.clone(),
            difficulty: "Médio".to_string(),
            year: q.year,
            question: statement,
            options,
            correct_answer: q.correct_alternative.clone(),
            explanation: "Explicação não disponível".to_string(),
            image_urls: q.files.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<QuestionItem>,
    pub source: String,
    pub total: usize,
}

pub struct EnemQuestionService {
    db: Arc<EnemLocalDatabase>,
    cache: TtlCache<String, QuestionsResponse>,
}

impl EnemQuestionService {
    pub fn new(db: Arc<EnemLocalDatabase>) -> Self {
        Self {
            db,
            cache: TtlCache::new(CacheConfig::enem_questions()),
        }
    }

    pub fn database(&self) -> &Arc<EnemLocalDatabase> {
        &self.db
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// `area` aceita código (MT), slug (matematica) ou "geral" (todas)
    pub async fn fetch(&self, request: &QuestionsRequest) -> Result<QuestionsResponse, QuestionsError> {
        let area = request.area.trim();
        if area.is_empty() || request.num_questions == 0 {
            return Err(QuestionsError::InvalidParameters);
        }

        let discipline = if area.eq_ignore_ascii_case("geral") {
            None
        } else {
            Some(area_slug(area).ok_or_else(|| QuestionsError::UnknownArea(area.to_string()))?)
        };

        let key = format!("{}-{}-{}", area, request.num_questions, request.use_real_questions);
        if let Some(cached) = self.cache.get(&key) {
            log::info!("📦 [ENEM] Questões em cache para {}", area);
            return Ok(cached);
        }

        let filters = QuestionFilters {
            discipline: discipline.map(str::to_string),
            limit: Some(request.num_questions),
            random: true,
            ..Default::default()
        };
        let questions = self.db.get_questions(&filters).await;

        if questions.is_empty() {
            log::warn!("❌ [ENEM] Nenhuma questão real disponível para {}", area);
            return Err(QuestionsError::NoneAvailable);
        }

        let items: Vec<QuestionItem> = questions.iter().map(QuestionItem::from).collect();
        let response = QuestionsResponse {
            total: items.len(),
            questions: items,
            source: "local".to_string(),
        };

        self.cache.insert(key, response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enem::database::fixtures;
    use tempfile::TempDir;

    fn service() -> (TempDir, EnemQuestionService) {
        let dir = TempDir::new().unwrap();
        fixtures::build(dir.path());
        let db = Arc::new(EnemLocalDatabase::new(dir.path()));
        (dir, EnemQuestionService::new(db))
    }

    fn request(area: &str, n: usize) -> QuestionsRequest {
        QuestionsRequest {
            area: area.to_string(),
            num_questions: n,
            use_real_questions: true,
        }
    }

    #[tokio::test]
    async fn test_fetch_by_area_code() {
        let (_dir, service) = service();
        let response = service.fetch(&request("MT", 5)).await.unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.source, "local");
        let item = &response.questions[0];
        assert_eq!(item.area, "matematica");
        assert_eq!(item.subject, "Matemática e suas Tecnologias");
        assert_eq!(item.options.len(), 5);
        assert_eq!(item.correct_answer, "B");
        assert!(item.question.ends_with("Assinale a alternativa correta."));
    }

    #[tokio::test]
    async fn test_fetch_geral_and_cache() {
        let (_dir, service) = service();
        let first = tokio_test::assert_ok!(service.fetch(&request("geral", 3)).await);
        assert_eq!(first.total, 3);

        let second = tokio_test::assert_ok!(service.fetch(&request("geral", 3)).await);
        assert_eq!(first, second);
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (_dir, service) = service();
        assert_eq!(
            service.fetch(&request("", 3)).await.unwrap_err(),
            QuestionsError::InvalidParameters
        );
        assert_eq!(
            service.fetch(&request("MT", 0)).await.unwrap_err(),
            QuestionsError::InvalidParameters
        );
        assert!(matches!(
            service.fetch(&request("astronomia", 3)).await.unwrap_err(),
            QuestionsError::UnknownArea(_)
        ));
    }

    #[tokio::test]
    async fn test_no_questions_available() {
        let dir = TempDir::new().unwrap();
        let service = EnemQuestionService::new(Arc::new(EnemLocalDatabase::new(dir.path())));
        assert_eq!(
            service.fetch(&request("CN", 3)).await.unwrap_err(),
            QuestionsError::NoneAvailable
        );
    }

    #[test]
    fn test_request_accepts_camel_case() {
        let req: QuestionsRequest = serde_json::from_str(r#"{"area":"CH","numQuestions":4}"#).unwrap();
        assert_eq!(req.num_questions, 4);
        assert!(req.use_real_questions);
    }
}
