// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CAMADA DE SEGURANÇA E CONFORMIDADE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Pré-processamento: PII, tópicos sensíveis, LGPD (dados de menores).
// Pós-processamento: schema JSON por módulo, latência, custo, qualidade.
//
// Uma validação só reprova com issue de severidade crítica; as demais
// viram recomendações.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::features::UserType;
use crate::types::Module;

/// Latência acima disso gera issue de timeout
pub const MAX_LATENCY_MS: u64 = 30_000;
/// Custo por resposta acima disso gera alerta
pub const MAX_RESPONSE_COST: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Pii,
    Content,
    Compliance,
    Json,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyValidation {
    pub passed: bool,
    pub issues: Vec<SafetyIssue>,
    pub recommendations: Vec<String>,
}

impl SafetyValidation {
    fn from_issues(issues: Vec<SafetyIssue>, recommendations: Vec<String>) -> Self {
        Self {
            passed: !issues.iter().any(|i| i.severity == Severity::Critical),
            issues,
            recommendations,
        }
    }

    pub fn clean() -> Self {
        Self::from_issues(Vec::new(), Vec::new())
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static CPF: Lazy<Regex> = Lazy::new(|| re(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b"));
static CNPJ: Lazy<Regex> = Lazy::new(|| re(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b"));
static CEP: Lazy<Regex> = Lazy::new(|| re(r"\b\d{5}-?\d{3}\b"));
static EMAIL: Lazy<Regex> = Lazy::new(|| re(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"));
static PHONE: Lazy<Regex> = Lazy::new(|| re(r"\(\d{2}\)\s?\d{4,5}-?\d{4}\b"));
static CARD: Lazy<Regex> = Lazy::new(|| re(r"\b\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\b"));

const SENSITIVE_TOPICS: &[&str] = &[
    "suicídio", "suicidio", "suicide", "automutilação", "automutilacao", "self-harm", "drogas",
    "drugs", "substâncias", "violência", "violencia", "violence", "abuso", "abuse", "maus-tratos",
];

const MINOR_KEYWORDS: &[&str] = &["menor", "criança", "adolescente", "estudante", "aluno"];
const SENSITIVE_DATA_KEYWORDS: &[&str] = &["saúde", "religião", "política", "racial", "genético"];

/// Trechos de PII encontrados no texto
pub fn detect_pii(text: &str) -> Vec<String> {
    [&*CPF, &*CNPJ, &*CEP, &*EMAIL, &*PHONE, &*CARD]
        .iter()
        .flat_map(|pattern| pattern.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn detect_sensitive_topics(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    SENSITIVE_TOPICS
        .iter()
        .copied()
        .filter(|topic| lower.contains(topic))
        .collect()
}

/// Problemas de LGPD: dados de menores (só para alunos) e dados sensíveis
pub fn check_lgpd(text: &str, user_type: UserType) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let mut issues = Vec::new();
    if user_type == UserType::Student && MINOR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        issues.push("Dados de menor de idade detectados");
    }
    if SENSITIVE_DATA_KEYWORDS.iter().any(|k| lower.contains(k)) {
        issues.push("Dados sensíveis detectados");
    }
    issues
}

/// Mascara CPF, CNPJ, e-mail e telefone
pub fn sanitize_text(text: &str) -> String {
    let text = CPF.replace_all(text, "[CPF]");
    let text = CNPJ.replace_all(&text, "[CNPJ]");
    let text = EMAIL.replace_all(&text, "[EMAIL]");
    PHONE.replace_all(&text, "[TELEFONE]").into_owned()
}

pub fn validate_pre(text: &str, user_type: UserType) -> SafetyValidation {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    let pii = detect_pii(text);
    if !pii.is_empty() {
        issues.push(SafetyIssue {
            kind: IssueKind::Pii,
            severity: Severity::High,
            description: format!("PII detectado: {}", pii.join(", ")),
            suggestion: "Remover ou mascarar informações pessoais".into(),
        });
        recommendations.push("Aplicar mascaramento de PII antes do processamento".into());
    }

    let topics = detect_sensitive_topics(text);
    if !topics.is_empty() {
        issues.push(SafetyIssue {
            kind: IssueKind::Content,
            severity: Severity::Medium,
            description: format!("Tópicos sensíveis detectados: {}", topics.join(", ")),
            suggestion: "Aplicar filtros de conteúdo ou redirecionar para suporte especializado".into(),
        });
        recommendations.push("Considerar roteamento para provedor com filtros avançados".into());
    }

    let lgpd = check_lgpd(text, user_type);
    if !lgpd.is_empty() {
        issues.push(SafetyIssue {
            kind: IssueKind::Compliance,
            severity: Severity::High,
            description: format!("Problemas de conformidade LGPD: {}", lgpd.join(", ")),
            suggestion: "Garantir que dados sejam processados em jurisdição adequada".into(),
        });
        recommendations.push("Verificar residência de dados do provedor selecionado".into());
    }

    SafetyValidation::from_issues(issues, recommendations)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SCHEMAS POR MÓDULO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Módulos cuja resposta deve ser JSON com schema conhecido
pub fn expected_schema(module: Module) -> Option<Module> {
    matches!(module, Module::AulaInterativa | Module::Enem | Module::Ti).then_some(module)
}

fn require_string(obj: &Value, path: &str, field: &str, min_len: usize, errors: &mut Vec<String>) {
    match obj.get(field) {
        None => errors.push(format!("{}.{}: propriedade obrigatória", path, field)),
        Some(Value::String(s)) if s.chars().count() < min_len => errors.push(format!(
            "{}.{}: deve ter pelo menos {} caracteres",
            path, field, min_len
        )),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{}.{}: deve ser uma string", path, field)),
    }
}

fn require_array<'a>(
    obj: &'a Value,
    path: &str,
    field: &str,
    min: Option<usize>,
    max: Option<usize>,
    errors: &mut Vec<String>,
) -> Option<&'a Vec<Value>> {
    let Some(value) = obj.get(field) else {
        errors.push(format!("{}.{}: propriedade obrigatória", path, field));
        return None;
    };
    let Some(items) = value.as_array() else {
        errors.push(format!("{}.{}: deve ser um array", path, field));
        return None;
    };
    if let Some(min) = min.filter(|m| items.len() < *m) {
        errors.push(format!("{}.{}: deve ter pelo menos {} itens", path, field, min));
    }
    if let Some(max) = max.filter(|m| items.len() > *m) {
        errors.push(format!("{}.{}: deve ter no máximo {} itens", path, field, max));
    }
    Some(items)
}

fn validate_lesson(root: &Value, errors: &mut Vec<String>) {
    let Some(slides) = require_array(root, "", "slides", Some(1), Some(9), errors) else { return };
    for (i, slide) in slides.iter().enumerate() {
        let path = format!(".slides[{}]", i);
        require_string(slide, &path, "titulo", 1, errors);
        require_string(slide, &path, "conteudo", 1, errors);
        if let Some(kind) = slide.get("tipo") {
            let allowed = ["introducao", "desenvolvimento", "interativo", "resumo"];
            if !kind.as_str().is_some_and(|k| allowed.contains(&k)) {
                errors.push(format!("{}.tipo: deve ser um dos valores: {}", path, allowed.join(", ")));
            }
        }
    }
}

fn validate_enem(root: &Value, errors: &mut Vec<String>) {
    let Some(questions) = require_array(root, "", "questoes", None, None, errors) else { return };
    for (i, q) in questions.iter().enumerate() {
        let path = format!(".questoes[{}]", i);
        require_string(q, &path, "enunciado", 10, errors);
        require_string(q, &path, "explicacao", 10, errors);
        if let Some(alts) = require_array(q, &path, "alternativas", Some(5), Some(5), errors) {
            if alts.iter().any(|a| a.as_str().map_or(true, str::is_empty)) {
                errors.push(format!("{}.alternativas: itens devem ser strings não vazias", path));
            }
        }
        match q.get("resposta").and_then(Value::as_str) {
            Some("A" | "B" | "C" | "D" | "E") => {}
            Some(_) => errors.push(format!("{}.resposta: deve ser um dos valores: A, B, C, D, E", path)),
            None => errors.push(format!("{}.resposta: propriedade obrigatória", path)),
        }
    }
}

fn validate_ti(root: &Value, errors: &mut Vec<String>) {
    require_string(root, "", "solucao", 1, errors);
}

/// Valida `content` contra o schema do módulo. Sem schema → válido.
pub fn validate_schema(content: &str, module: Module) -> Result<(), Vec<String>> {
    if expected_schema(module).is_none() {
        return Ok(());
    }
    let root: Value = serde_json::from_str(content).map_err(|_| vec!["JSON inválido".to_string()])?;
    if !root.is_object() {
        return Err(vec![": deve ser um objeto".to_string()]);
    }

    let mut errors = Vec::new();
    match module {
        Module::AulaInterativa => validate_lesson(&root, &mut errors),
        Module::Enem => validate_enem(&root, &mut errors),
        Module::Ti => validate_ti(&root, &mut errors),
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Problemas de qualidade evidentes na resposta
pub fn response_quality_issues(content: &str) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if content.trim().is_empty() {
        issues.push("Resposta vazia");
    }
    if content.contains("[PLACEHOLDER]") || content.contains("[TODO]") {
        issues.push("Contém placeholders não resolvidos");
    }
    if content.contains("ERROR:") || content.contains("FALHA:") {
        issues.push("Contém mensagens de erro");
    }
    if content.chars().count() < 10 {
        issues.push("Resposta muito curta");
    }
    issues
}

pub fn validate_post(content: &str, latency_ms: u64, cost: f64, schema: Option<Module>) -> SafetyValidation {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(Err(errors)) = schema.map(|m| validate_schema(content, m)) {
        issues.push(SafetyIssue {
            kind: IssueKind::Json,
            severity: Severity::High,
            description: format!("JSON inválido: {}", errors.join(", ")),
            suggestion: "Regenerar resposta com schema correto".into(),
        });
        recommendations.push("Retry com provedor alternativo ou ajuste de parâmetros".into());
    }

    if latency_ms > MAX_LATENCY_MS {
        issues.push(SafetyIssue {
            kind: IssueKind::Timeout,
            severity: Severity::Medium,
            description: format!("Resposta muito lenta: {}ms", latency_ms),
            suggestion: "Considerar provedor mais rápido para próximas requisições".into(),
        });
        recommendations.push("Ajustar pesos de roteamento para priorizar velocidade".into());
    }

    if cost > MAX_RESPONSE_COST {
        issues.push(SafetyIssue {
            kind: IssueKind::Content,
            severity: Severity::Low,
            description: format!("Custo alto: ${:.4}", cost),
            suggestion: "Considerar provedor mais econômico para tarefas similares".into(),
        });
        recommendations.push("Ajustar orçamento ou seleção de provedor".into());
    }

    let quality = response_quality_issues(content);
    if !quality.is_empty() {
        issues.push(SafetyIssue {
            kind: IssueKind::Content,
            severity: Severity::Medium,
            description: format!("Problemas de qualidade: {}", quality.join(", ")),
            suggestion: "Revisar prompt ou considerar provedor alternativo".into(),
        });
        recommendations.push("Ajustar parâmetros de geração ou seleção de modelo".into());
    }

    SafetyValidation::from_issues(issues, recommendations)
}
