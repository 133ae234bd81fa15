// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EXTRAÇÃO DE CARACTERÍSTICAS DA REQUISIÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::classification::{classify_local, detect_complexity, detect_use_case};
use crate::types::{Complexity, Module};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Teacher,
    Admin,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl CostSensitivity {
    pub fn multiplier(&self) -> f64 {
        match self {
            CostSensitivity::Low => 0.5,
            CostSensitivity::Medium => 1.0,
            CostSensitivity::High => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Peak,
    OffPeak,
}

impl TimeOfDay {
    /// 9h às 18h (inclusive) é horário de pico
    pub fn from_hour(hour: u32) -> Self {
        if (9..=18).contains(&hour) {
            TimeOfDay::Peak
        } else {
            TimeOfDay::OffPeak
        }
    }
}

/// Contexto opcional enviado junto com o texto
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteContext {
    pub module: Option<Module>,
    pub user_type: UserType,
    pub streaming: bool,
    pub cost_sensitivity: CostSensitivity,
    /// Caracteres de histórico que irão junto no prompt
    pub history_chars: usize,
    /// Hora local (0-23); ausente → relógio do servidor
    pub hour: Option<u32>,
}

/// Características usadas na pontuação dos provedores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestFeatures {
    pub domain: Module,
    pub complexity: Complexity,
    /// "pt" ou "en"
    pub language: &'static str,
    pub requires_json_strict: bool,
    pub requires_tool_use: bool,
    pub requires_streaming: bool,
    /// Tamanho do contexto em caracteres
    pub context_length: usize,
    pub user_type: UserType,
    pub time_of_day: TimeOfDay,
    pub cost_sensitivity: CostSensitivity,
}

const PT_MARKERS: &[&str] = &["ç", "ã", "õ", "é", " que ", " não ", " de ", " para ", " uma "];
const TOOL_MARKERS: &[&str] = &["calcule", "pesquise", "busque", "consulte", "execute"];

/// Heurística simples de idioma
pub fn detect_language(text: &str) -> &'static str {
    let padded = format!(" {} ", text.to_lowercase());
    if PT_MARKERS.iter().any(|m| padded.contains(m)) {
        "pt"
    } else {
        "en"
    }
}

pub fn extract_features(text: &str, context: &RouteContext) -> RequestFeatures {
    let lower = text.to_lowercase();
    let domain = context
        .module
        .unwrap_or_else(|| classify_local(text, 0).module);
    let complexity = detect_complexity(text, detect_use_case(text));
    let hour = context.hour.unwrap_or_else(|| chrono::Local::now().hour());

    RequestFeatures {
        domain,
        complexity,
        language: detect_language(text),
        requires_json_strict: matches!(domain, Module::AulaInterativa | Module::Enem) || lower.contains("json"),
        requires_tool_use: TOOL_MARKERS.iter().any(|m| lower.contains(m)),
        requires_streaming: context.streaming,
        context_length: text.chars().count() + context.history_chars,
        user_type: context.user_type,
        time_of_day: TimeOfDay::from_hour(hour),
        cost_sensitivity: context.cost_sensitivity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("O que é fotossíntese?"), "pt");
        assert_eq!(detect_language("What is photosynthesis?"), "en");
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(TimeOfDay::from_hour(10), TimeOfDay::Peak);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Peak);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::OffPeak);
    }

    #[test]
    fn test_extract_features_from_context() {
        let ctx = RouteContext {
            module: Some(Module::AulaInterativa),
            streaming: true,
            history_chars: 100,
            hour: Some(3),
            ..Default::default()
        };
        let features = extract_features("Crie uma aula sobre vulcões", &ctx);
        assert_eq!(features.domain, Module::AulaInterativa);
        assert!(features.requires_json_strict);
        assert!(features.requires_streaming);
        assert_eq!(features.context_length, 127);
        assert_eq!(features.time_of_day, TimeOfDay::OffPeak);
    }

    #[test]
    fn test_domain_falls_back_to_local_classification() {
        let ctx = RouteContext { hour: Some(12), ..Default::default() };
        let features = extract_features("preciso do boleto da mensalidade", &ctx);
        assert_eq!(features.domain, Module::Financeiro);
        assert!(!features.requires_json_strict);
    }

    #[test]
    fn test_tool_use_markers() {
        let ctx = RouteContext { hour: Some(12), ..Default::default() };
        assert!(extract_features("calcule a média das notas", &ctx).requires_tool_use);
    }
}
