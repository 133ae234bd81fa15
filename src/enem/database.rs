// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BASE LOCAL DE QUESTÕES DO ENEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Layout em disco:
//
//   {base}/exams.json
//   {base}/{ano}/details.json                      lista de questões do ano
//   {base}/{ano}/questions/{indice}-{idioma}/      questão de língua estrangeira
//   {base}/{ano}/questions/{indice}/               demais questões
//       details.json + imagens (png, jpg, jpeg, gif, bmp, svg)
//
// Questões listadas mas ausentes no disco são puladas (com log).
// Leituras ficam 5 minutos em cache.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{DISCIPLINES, LANGUAGES};
use crate::cache::{CacheConfig, TtlCache};

/// Limite padrão de `get_questions`
pub const DEFAULT_LIMIT: usize = 20;

static IMAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(png|jpg|jpeg|gif|bmp|svg)$").expect("valid regex"));
static YEAR_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum EnemDbError {
    #[error("ENEM database not available at {0}")]
    Unavailable(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelValue {
    pub label: String,
    pub value: String,
}

/// Entrada de questão em `details.json` do ano
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRef {
    #[serde(default)]
    pub title: String,
    pub index: u32,
    pub discipline: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl QuestionRef {
    /// "null" literal conta como ausente
    fn language(&self) -> Option<&str> {
        self.language.as_deref().filter(|l| !l.is_empty() && *l != "null")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSummary {
    pub title: String,
    pub year: u32,
    #[serde(default)]
    pub disciplines: Vec<LabelValue>,
    #[serde(default)]
    pub languages: Vec<LabelValue>,
    #[serde(default)]
    pub questions: Vec<QuestionRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YearDetails {
    #[serde(default)]
    questions: Vec<QuestionRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub letter: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalQuestion {
    #[serde(default)]
    pub title: String,
    pub index: u32,
    pub year: u32,
    #[serde(default)]
    pub language: Option<String>,
    pub discipline: String,
    #[serde(default)]
    pub context: Option<String>,
    /// URLs públicas das imagens da questão
    #[serde(default)]
    pub files: Vec<String>,
    pub correct_alternative: String,
    #[serde(default)]
    pub alternatives_introduction: String,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionFilters {
    pub year: Option<u32>,
    pub discipline: Option<String>,
    pub language: Option<String>,
    pub limit: Option<usize>,
    pub random: bool,
}

/// Formato de item consumido pelo simulador
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorItem {
    pub item_id: String,
    pub area: String,
    pub year: u32,
    pub text: String,
    pub alternatives: BTreeMap<String, String>,
    pub correct_answer: String,
    pub topic: String,
    pub estimated_difficulty: String,
    pub asset_refs: Vec<String>,
    pub content_hash: String,
    pub dataset_version: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub total_years: usize,
    pub total_questions: usize,
    pub questions_by_year: BTreeMap<u32, usize>,
    pub questions_by_discipline: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Availability {
    pub listed: usize,
    pub available: usize,
    /// Percentual (0-100)
    pub rate: f64,
}

impl Availability {
    fn finish(&mut self) {
        self.rate = if self.listed > 0 {
            self.available as f64 / self.listed as f64 * 100.0
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityStats {
    pub total_years: usize,
    pub total_available_questions: usize,
    pub total_listed_questions: usize,
    pub availability_rate: f64,
    pub questions_by_year: BTreeMap<u32, Availability>,
    pub questions_by_discipline: BTreeMap<String, Availability>,
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EnemDbError> {
    let data = tokio::fs::read_to_string(path).await.map_err(|source| EnemDbError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| EnemDbError::Parse {
        path: path.display().to_string(),
        source,
    })
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Cliente da base local
pub struct EnemLocalDatabase {
    base_path: PathBuf,
    years_cache: TtlCache<String, Vec<u32>>,
    exams_cache: TtlCache<String, Vec<ExamSummary>>,
    questions_cache: TtlCache<String, Vec<LocalQuestion>>,
}

impl EnemLocalDatabase {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let config = CacheConfig {
            name: "enem-db",
            ..CacheConfig::enem_questions()
        };
        Self {
            base_path: base_path.into(),
            years_cache: TtlCache::new(config.clone()),
            exams_cache: TtlCache::new(config.clone()),
            questions_cache: TtlCache::new(config),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Diretório base e `exams.json` existem?
    pub async fn is_available(&self) -> bool {
        exists(&self.base_path).await && exists(&self.base_path.join("exams.json")).await
    }

    pub async fn get_exams(&self) -> Result<Vec<ExamSummary>, EnemDbError> {
        let key = "exams".to_string();
        if let Some(cached) = self.exams_cache.get(&key) {
            return Ok(cached);
        }
        if !self.is_available().await {
            return Err(EnemDbError::Unavailable(self.base_path.display().to_string()));
        }

        let exams: Vec<ExamSummary> = read_json(&self.base_path.join("exams.json")).await?;
        self.exams_cache.insert(key, exams.clone());
        Ok(exams)
    }

    /// Diretórios de 4 dígitos, mais recente primeiro
    pub async fn available_years(&self) -> Vec<u32> {
        let key = "available_years".to_string();
        if let Some(cached) = self.years_cache.get(&key) {
            return cached;
        }

        let mut years = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("❌ [ENEM-DB] Erro ao listar anos em {}: {}", self.base_path.display(), e);
                return years;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && YEAR_DIR.is_match(&name) {
                if let Ok(year) = name.parse() {
                    years.push(year);
                }
            }
        }

        years.sort_unstable_by(|a, b| b.cmp(a));
        self.years_cache.insert(key, years.clone());
        years
    }

    pub fn disciplines(&self) -> Vec<&'static str> {
        DISCIPLINES.to_vec()
    }

    pub fn languages(&self) -> Vec<&'static str> {
        LANGUAGES.to_vec()
    }

    async fn year_details(&self, year: u32) -> Result<YearDetails, EnemDbError> {
        read_json(&self.base_path.join(year.to_string()).join("details.json")).await
    }

    /// Diretório da questão: `{indice}-{idioma}` com fallback para `{indice}`.
    /// Só conta se houver `details.json` dentro.
    async fn question_dir(&self, year: u32, index: u32, language: Option<&str>) -> Option<PathBuf> {
        let questions = self.base_path.join(year.to_string()).join("questions");

        let mut dir = match language {
            Some(lang) => questions.join(format!("{}-{}", index, lang)),
            None => questions.join(index.to_string()),
        };
        if !exists(&dir).await {
            dir = questions.join(index.to_string());
        }

        if exists(&dir.join("details.json")).await {
            Some(dir)
        } else {
            None
        }
    }

    pub async fn question_exists(&self, year: u32, index: u32, language: Option<&str>) -> bool {
        self.question_dir(year, index, language).await.is_some()
    }

    /// Carrega uma questão e lista suas imagens
    pub async fn load_question(
        &self,
        year: u32,
        index: u32,
        language: Option<&str>,
    ) -> Result<Option<LocalQuestion>, EnemDbError> {
        let Some(dir) = self.question_dir(year, index, language).await else {
            log::debug!("⚠️ [ENEM-DB] Questão {} de {} não encontrada, pulando", index, year);
            return Ok(None);
        };

        let mut question: LocalQuestion = read_json(&dir.join("details.json")).await?;

        // `7` ou `7-ingles`, conforme o diretório resolvido
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| index.to_string());

        let mut files = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                if IMAGE_FILE.is_match(&name) {
                    files.push(format!("/QUESTOES_ENEM/public/{}/questions/{}/{}", year, dir_name, name));
                }
            }
        }
        files.sort();
        question.files = files;

        Ok(Some(question))
    }

    /// Questões de um ano, já filtradas por disciplina/idioma
    pub async fn questions_by_year(
        &self,
        year: u32,
        discipline: Option<&str>,
        language: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<LocalQuestion> {
        let key = format!(
            "questions_{}_{}_{}_{}",
            year,
            discipline.unwrap_or("*"),
            language.unwrap_or("*"),
            limit.map(|l| l.to_string()).unwrap_or_else(|| "*".into())
        );
        if let Some(cached) = self.questions_cache.get(&key) {
            return cached;
        }

        let details = match self.year_details(year).await {
            Ok(details) => details,
            Err(e) => {
                log::warn!("⚠️ [ENEM-DB] Ano {} indisponível: {}", year, e);
                return Vec::new();
            }
        };

        let refs = details.questions.iter().filter(|q| {
            discipline.map_or(true, |d| q.discipline == d) && language.map_or(true, |l| q.language() == Some(l))
        });

        let mut questions = Vec::new();
        let mut skipped = 0usize;
        for info in refs {
            match self.load_question(year, info.index, info.language()).await {
                Ok(Some(question)) => questions.push(question),
                Ok(None) => skipped += 1,
                Err(e) => {
                    log::warn!("⚠️ [ENEM-DB] Questão {} de {}: {}", info.index, year, e);
                    skipped += 1;
                }
            }
            if limit.map_or(false, |l| questions.len() >= l) {
                break;
            }
        }

        if skipped > 0 {
            log::info!("⚠️ [ENEM-DB] {} questões puladas em {}", skipped, year);
        }
        log::info!("📚 [ENEM-DB] {} questões carregadas de {}", questions.len(), year);

        self.questions_cache.insert(key, questions.clone());
        questions
    }

    /// Busca com filtros; sem ano percorre todos (mais recente primeiro)
    pub async fn get_questions(&self, filters: &QuestionFilters) -> Vec<LocalQuestion> {
        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT);
        let years = match filters.year {
            Some(year) => vec![year],
            None => self.available_years().await,
        };

        // pede a mais para compensar questões puladas
        let multiplier = if filters.year.is_some() { 2.0 } else { 1.5 };
        let per_year = (limit as f64 * multiplier).ceil() as usize;

        let mut all = Vec::new();
        for year in years {
            let found = self
                .questions_by_year(year, filters.discipline.as_deref(), filters.language.as_deref(), Some(per_year))
                .await;
            all.extend(found);
            if filters.year.is_some() && all.len() >= limit {
                break;
            }
        }

        if filters.random {
            all.shuffle(&mut rand::thread_rng());
        }
        all.truncate(limit);

        log::info!("✅ [ENEM-DB] Retornando {} questões (solicitadas: {})", all.len(), limit);
        all
    }

    pub async fn random_questions(&self, filters: &QuestionFilters) -> Vec<LocalQuestion> {
        let filters = QuestionFilters {
            random: true,
            ..filters.clone()
        };
        self.get_questions(&filters).await
    }

    /// Contagem do que está listado nos `details.json`
    pub async fn stats(&self) -> DatabaseStats {
        let years = self.available_years().await;
        let mut stats = DatabaseStats {
            total_years: years.len(),
            ..Default::default()
        };

        for year in years {
            let details = match self.year_details(year).await {
                Ok(details) => details,
                Err(e) => {
                    log::error!("❌ [ENEM-DB] Estatísticas de {}: {}", year, e);
                    continue;
                }
            };
            stats.total_questions += details.questions.len();
            stats.questions_by_year.insert(year, details.questions.len());
            for q in &details.questions {
                *stats.questions_by_discipline.entry(q.discipline.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    /// Listadas vs. realmente presentes em disco
    pub async fn availability_stats(&self) -> AvailabilityStats {
        let years = self.available_years().await;
        let mut stats = AvailabilityStats {
            total_years: years.len(),
            ..Default::default()
        };

        for year in years {
            let details = match self.year_details(year).await {
                Ok(details) => details,
                Err(e) => {
                    log::error!("❌ [ENEM-DB] Disponibilidade de {}: {}", year, e);
                    continue;
                }
            };

            let mut year_stats = Availability {
                listed: details.questions.len(),
                ..Default::default()
            };
            for q in &details.questions {
                let present = self.question_exists(year, q.index, q.language()).await;
                let discipline = stats.questions_by_discipline.entry(q.discipline.clone()).or_default();
                discipline.listed += 1;
                if present {
                    discipline.available += 1;
                    year_stats.available += 1;
                }
            }
            year_stats.finish();

            log::info!(
                "📅 [ENEM-DB] {}: {}/{} questões disponíveis ({:.1}%)",
                year,
                year_stats.available,
                year_stats.listed,
                year_stats.rate
            );

            stats.total_listed_questions += year_stats.listed;
            stats.total_available_questions += year_stats.available;
            stats.questions_by_year.insert(year, year_stats);
        }

        for discipline in stats.questions_by_discipline.values_mut() {
            discipline.finish();
        }
        stats.availability_rate = if stats.total_listed_questions > 0 {
            stats.total_available_questions as f64 / stats.total_listed_questions as f64 * 100.0
        } else {
            0.0
        };
        stats
    }

    pub fn clear_cache(&self) {
        self.years_cache.clear();
        self.exams_cache.clear();
        self.questions_cache.clear();
    }
}

/// Converte para o formato de item do simulador
pub fn to_simulator_format(question: &LocalQuestion) -> SimulatorItem {
    let alternatives = ["A", "B", "C", "D", "E"]
        .iter()
        .enumerate()
        .map(|(i, letter)| {
            let text = question
                .alternatives
                .get(i)
                .map(|a| a.text.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Alternativa {}", letter));
            (letter.to_string(), text)
        })
        .collect();

    SimulatorItem {
        item_id: format!("local_{}_{}", question.year, question.index),
        area: question.discipline.clone(),
        year: question.year,
        text: question.context.clone().unwrap_or_default(),
        alternatives,
        correct_answer: question.correct_alternative.clone(),
        topic: question.discipline.clone(),
        estimated_difficulty: "MEDIUM".to_string(),
        asset_refs: question.files.clone(),
        content_hash: format!("hash_{}_{}", question.year, question.index),
        dataset_version: "1.0".to_string(),
        metadata: serde_json::json!({}),
    }
}
