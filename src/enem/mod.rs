// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ENEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// - `database`: base local de questões oficiais (arquivos JSON + imagens)
// - `questions`: montagem de listas de questões para o simulado, com cache
// - `scoring`: pontuação por área, estimativa TRI e feedback
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod database;
pub mod questions;
pub mod scoring;

pub use database::{EnemDbError, EnemLocalDatabase, LocalQuestion, QuestionFilters};
pub use questions::{EnemQuestionService, QuestionsError, QuestionsRequest, QuestionsResponse};
pub use scoring::{calculate_score, ItemResponse, ScoringError, ScoringResult};

use crate::types::EnemArea;

/// Disciplinas presentes na base local
pub const DISCIPLINES: [&str; 4] = ["ciencias-humanas", "ciencias-natureza", "linguagens", "matematica"];

/// Idiomas de língua estrangeira
pub const LANGUAGES: [&str; 2] = ["espanhol", "ingles"];

/// Código de área (CN) ou slug (ciencias-natureza) → slug da base local
pub fn area_slug(value: &str) -> Option<&'static str> {
    EnemArea::parse(value).map(|area| area.slug())
}

/// Slug → nome completo da disciplina
pub fn discipline_name(slug: &str) -> Option<&'static str> {
    EnemArea::ALL
        .iter()
        .find(|area| area.slug() == slug)
        .map(|area| area.full_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_slug_accepts_codes_and_slugs() {
        assert_eq!(area_slug("CN"), Some("ciencias-natureza"));
        assert_eq!(area_slug("mt"), Some("matematica"));
        assert_eq!(area_slug("linguagens"), Some("linguagens"));
        assert_eq!(area_slug("ciencias-humanas"), Some("ciencias-humanas"));
        assert_eq!(area_slug("astronomia"), None);
    }

    #[test]
    fn test_discipline_name() {
        assert_eq!(discipline_name("matematica"), Some("Matemática e suas Tecnologias"));
        assert_eq!(discipline_name("linguagens"), Some("Linguagens, Códigos e suas Tecnologias"));
        assert_eq!(discipline_name("x"), None);
    }

    #[test]
    fn test_every_discipline_has_a_name() {
        for slug in DISCIPLINES {
            assert!(discipline_name(slug).is_some(), "{}", slug);
        }
    }
}
