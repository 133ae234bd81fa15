// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PONTUAÇÃO DO SIMULADO ENEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Nota por área (0-950), nota total (média das 4 áreas), estimativa TRI
// aproximada com intervalo de confiança, estatísticas e feedback.
//
// A estimativa TRI é uma aproximação por faixas de acerto. A nota oficial
// depende de parâmetros do exame completo.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::types::EnemArea;
use crate::utils::now_millis;

pub const MAX_SCORE: f64 = 950.0;
pub const MIN_TRI_SCORE: f64 = 300.0;

pub const TRI_DISCLAIMER: &str = "Esta é uma estimativa baseada em dados históricos. \
A pontuação oficial do ENEM depende de parâmetros específicos do exame completo.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("No responses found for session")]
    NoResponses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

/// Resposta de um item, já com os metadados do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item_id: String,
    pub area: EnemArea,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub is_correct: bool,
    /// Segundos gastos na questão
    #[serde(default)]
    pub time_spent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub correct: usize,
    pub total: usize,
}

impl Tally {
    fn add(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn rate(&self) -> f64 {
        if self.total > 0 {
            self.correct as f64 / self.total as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaScore {
    pub raw_score: f64,
    /// 0-100
    pub percentage: f64,
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriEstimate {
    pub score: f64,
    pub confidence_interval: ConfidenceInterval,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub easy: Tally,
    pub medium: Tally,
    pub hard: Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub total_time_spent: f64,
    pub average_time_per_question: f64,
    /// Tópico → taxa de acerto (0-1)
    pub accuracy_by_topic: BTreeMap<String, f64>,
    pub difficulty_breakdown: DifficultyBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemScore {
    pub score_id: String,
    pub session_id: String,
    pub area_scores: BTreeMap<EnemArea, AreaScore>,
    pub total_score: f64,
    pub tri_estimated: TriEstimate,
    pub stats: ScoreStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreFeedback {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    /// Itens errados dos tópicos fracos, para revisão
    pub similar_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub score: EnemScore,
    pub feedback: ScoreFeedback,
}

fn area_short_name(area: EnemArea) -> &'static str {
    match area {
        EnemArea::CN => "Ciências da Natureza",
        EnemArea::CH => "Ciências Humanas",
        EnemArea::LC => "Linguagens e Códigos",
        EnemArea::MT => "Matemática",
    }
}

/// percentual × 10, com ajuste de área, limitado a 950
pub fn raw_score(percentage: f64, area: EnemArea) -> f64 {
    let base = percentage * 10.0;
    let factor = match area {
        EnemArea::MT => 1.05,
        EnemArea::CN => 1.02,
        _ => 1.0,
    };
    (base * factor).min(MAX_SCORE)
}

/// Faixas de 10 pontos percentuais, cada uma valendo 100 pontos
pub fn estimate_tri_score(percentage: f64) -> f64 {
    if percentage >= 90.0 {
        return MAX_SCORE;
    }
    for floor in (1..=8).rev() {
        let base_pct = f64::from(floor * 10);
        if percentage >= base_pct {
            let base_score = 150.0 + f64::from((floor - 1) * 100);
            return base_score + (percentage - base_pct) * 10.0;
        }
    }
    (percentage * 10.0).max(MIN_TRI_SCORE)
}

/// Margem menor com mais respostas (mínimo 20)
pub fn confidence_interval(tri_score: f64, sample_size: usize) -> ConfidenceInterval {
    let margin = (100.0 - sample_size as f64).max(20.0);
    ConfidenceInterval {
        lower: (tri_score - margin).max(MIN_TRI_SCORE),
        upper: (tri_score + margin).min(MAX_SCORE),
    }
}

pub fn area_scores(responses: &[ItemResponse]) -> BTreeMap<EnemArea, AreaScore> {
    let mut tallies: BTreeMap<EnemArea, Tally> = EnemArea::ALL.iter().map(|a| (*a, Tally::default())).collect();
    for response in responses {
        tallies.entry(response.area).or_default().add(response.is_correct);
    }

    tallies
        .into_iter()
        .map(|(area, tally)| {
            let percentage = tally.rate() * 100.0;
            (
                area,
                AreaScore {
                    raw_score: raw_score(percentage, area),
                    percentage,
                    correct: tally.correct,
                    total: tally.total,
                },
            )
        })
        .collect()
}

fn topic_tallies(responses: &[ItemResponse]) -> BTreeMap<String, Tally> {
    let mut topics: BTreeMap<String, Tally> = BTreeMap::new();
    for response in responses.iter().filter(|r| !r.topic.is_empty()) {
        topics.entry(response.topic.clone()).or_default().add(response.is_correct);
    }
    topics
}

pub fn statistics(responses: &[ItemResponse]) -> ScoreStats {
    let total_time_spent: f64 = responses.iter().map(|r| r.time_spent).sum();
    let average_time_per_question = if responses.is_empty() {
        0.0
    } else {
        total_time_spent / responses.len() as f64
    };

    let mut breakdown = DifficultyBreakdown::default();
    for response in responses {
        let tally = match response.difficulty {
            Difficulty::Easy => &mut breakdown.easy,
            Difficulty::Medium => &mut breakdown.medium,
            Difficulty::Hard => &mut breakdown.hard,
        };
        tally.add(response.is_correct);
    }

    ScoreStats {
        total_time_spent,
        average_time_per_question,
        accuracy_by_topic: topic_tallies(responses)
            .into_iter()
            .map(|(topic, tally)| (topic, tally.rate()))
            .collect(),
        difficulty_breakdown: breakdown,
    }
}

pub fn feedback(responses: &[ItemResponse], areas: &BTreeMap<EnemArea, AreaScore>) -> ScoreFeedback {
    let mut fb = ScoreFeedback::default();

    for (area, score) in areas {
        if score.percentage >= 70.0 {
            fb.strengths
                .push(format!("{}: Excelente desempenho ({:.1}%)", area, score.percentage));
        } else if score.percentage < 50.0 {
            fb.weaknesses
                .push(format!("{}: Precisa melhorar ({:.1}%)", area, score.percentage));
            fb.recommendations
                .push(format!("Foque nos estudos de {}", area_short_name(*area)));
        }
    }

    let mut review = BTreeSet::new();
    for (topic, tally) in topic_tallies(responses) {
        if tally.total >= 2 && tally.rate() < 0.5 {
            fb.weaknesses
                .push(format!("{}: {:.1}% de acerto", topic, tally.rate() * 100.0));
            review.extend(
                responses
                    .iter()
                    .filter(|r| r.topic == topic && !r.is_correct)
                    .map(|r| r.item_id.clone()),
            );
        }
    }
    fb.similar_questions = review.into_iter().collect();

    if fb.recommendations.is_empty() {
        fb.recommendations
            .push("Continue praticando para manter o bom desempenho".to_string());
    }
    fb
}

/// Calcula nota, estatísticas e feedback de uma sessão
pub fn calculate_score(session_id: &str, responses: &[ItemResponse]) -> Result<ScoringResult, ScoringError> {
    if responses.is_empty() {
        return Err(ScoringError::NoResponses);
    }

    let areas = area_scores(responses);
    let total_score = areas.values().map(|s| s.raw_score).sum::<f64>() / areas.len() as f64;

    let mean_percentage = areas.values().map(|s| s.percentage).sum::<f64>() / areas.len() as f64;
    let tri = estimate_tri_score(mean_percentage);

    let feedback = feedback(responses, &areas);
    let score = EnemScore {
        score_id: format!("score_{}", now_millis()),
        session_id: session_id.to_string(),
        total_score,
        tri_estimated: TriEstimate {
            score: tri,
            confidence_interval: confidence_interval(tri, responses.len()),
            disclaimer: TRI_DISCLAIMER.to_string(),
        },
        stats: statistics(responses),
        area_scores: areas,
    };

    log::info!(
        "📊 [ENEM] Sessão {}: total {:.1}, TRI {:.1} ({} respostas)",
        session_id,
        score.total_score,
        tri,
        responses.len()
    );

    Ok(ScoringResult { score, feedback })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(id: &str, area: EnemArea, topic: &str, correct: bool) -> ItemResponse {
        ItemResponse {
            item_id: id.to_string(),
            area,
            topic: topic.to_string(),
            difficulty: Difficulty::Medium,
            is_correct: correct,
            time_spent: 60.0,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_raw_score_area_factors() {
        assert!(approx(raw_score(50.0, EnemArea::MT), 525.0));
        assert!(approx(raw_score(50.0, EnemArea::CN), 510.0));
        assert!(approx(raw_score(50.0, EnemArea::CH), 500.0));
        assert!(approx(raw_score(100.0, EnemArea::MT), 950.0));
    }

    #[test]
    fn test_tri_bands() {
        assert!(approx(estimate_tri_score(95.0), 950.0));
        assert!(approx(estimate_tri_score(85.0), 900.0));
        assert!(approx(estimate_tri_score(50.0), 550.0));
        assert!(approx(estimate_tri_score(15.0), 200.0));
        assert!(approx(estimate_tri_score(5.0), 300.0));
    }

    #[test]
    fn test_confidence_interval() {
        let ci = confidence_interval(500.0, 10);
        assert!(approx(ci.lower, 410.0));
        assert!(approx(ci.upper, 590.0));

        let ci = confidence_interval(940.0, 150);
        assert!(approx(ci.lower, 920.0));
        assert!(approx(ci.upper, 950.0));

        let ci = confidence_interval(310.0, 90);
        assert!(approx(ci.lower, 300.0));
    }

    #[test]
    fn test_empty_session() {
        assert_eq!(calculate_score("s1", &[]).unwrap_err(), ScoringError::NoResponses);
    }

    #[test]
    fn test_full_scoring() {
        let responses = vec![
            resp("m1", EnemArea::MT, "Funções", true),
            resp("m2", EnemArea::MT, "Funções", true),
            resp("m3", EnemArea::MT, "Geometria", true),
            resp("h1", EnemArea::CH, "História do Brasil", false),
            resp("h2", EnemArea::CH, "História do Brasil", false),
            resp("h3", EnemArea::CH, "Geografia", true),
        ];
        let result = calculate_score("sessao-1", &responses).unwrap();
        let score = &result.score;

        assert!(approx(score.area_scores[&EnemArea::MT].raw_score, 950.0));
        assert_eq!(score.area_scores[&EnemArea::CH].correct, 1);
        assert_eq!(score.area_scores[&EnemArea::LC].total, 0);
        // (950 + 333.33.. + 0 + 0) / 4
        assert!(approx(score.total_score, (950.0 + 1000.0 / 3.0) / 4.0));

        assert!(approx(score.stats.total_time_spent, 360.0));
        assert!(approx(score.stats.average_time_per_question, 60.0));
        assert!(approx(score.stats.accuracy_by_topic["Funções"], 1.0));
        assert_eq!(score.stats.difficulty_breakdown.medium.total, 6);
        assert_eq!(score.tri_estimated.disclaimer, TRI_DISCLAIMER);

        let fb = &result.feedback;
        assert_eq!(fb.strengths, vec!["MT: Excelente desempenho (100.0%)".to_string()]);
        assert!(fb.weaknesses.contains(&"CH: Precisa melhorar (33.3%)".to_string()));
        assert!(fb.weaknesses.contains(&"História do Brasil: 0.0% de acerto".to_string()));
        assert!(fb.recommendations.contains(&"Foque nos estudos de Ciências Humanas".to_string()));
        assert_eq!(fb.similar_questions, vec!["h1".to_string(), "h2".to_string()]);
    }

    #[test]
    fn test_default_recommendation() {
        let responses: Vec<_> = EnemArea::ALL
            .iter()
            .map(|a| resp(&format!("{}", a), *a, "", true))
            .collect();
        let result = calculate_score("s", &responses).unwrap();
        assert_eq!(
            result.feedback.recommendations,
            vec!["Continue praticando para manter o bom desempenho".to_string()]
        );
        assert!(result.feedback.weaknesses.is_empty());
        assert!(approx(result.score.tri_estimated.score, 950.0));
    }

    #[test]
    fn test_response_deserializes_lowercase_difficulty() {
        let r: ItemResponse = serde_json::from_str(
            r#"{"item_id":"x","area":"LC","difficulty":"hard","is_correct":true}"#,
        )
        .unwrap();
        assert_eq!(r.difficulty, Difficulty::Hard);
        assert_eq!(r.time_spent, 0.0);
    }
}
