// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIPOS COMPARTILHADOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Enums e estruturas usados por vários módulos:
// - Module: categoria de atendimento (professor, enem, ti, ...)
// - Complexity / UseCase: perfil da mensagem para escolha de modelo
// - ProviderId: provedores de LLM suportados
// - EnemArea: áreas do conhecimento do ENEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categoria de atendimento para a qual uma mensagem é encaminhada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Tutor de disciplinas escolares
    Professor,
    /// Simulados e questões do ENEM
    Enem,
    /// Geração de aulas com slides
    AulaInterativa,
    /// Suporte técnico
    Ti,
    /// Boletos, mensalidades, pagamentos
    Financeiro,
    /// Recursos humanos da escola
    Rh,
    /// Conteúdo para redes sociais
    SocialMedia,
    /// Apoio socioemocional
    BemEstar,
    /// Coordenação pedagógica
    Coordenacao,
    /// Matrículas, documentos e declarações
    Secretaria,
    /// Produção de vídeos, imagens e materiais
    ConteudoMidia,
    /// Recepção geral
    Atendimento,
    /// Correção de redação
    Redacao,
    /// Aula expandida (roteiro longo)
    AulaExpandida,
}

impl Module {
    /// Todos os módulos, na ordem de declaração
    pub const ALL: [Module; 14] = [
        Module::Professor,
        Module::Enem,
        Module::AulaInterativa,
        Module::Ti,
        Module::Financeiro,
        Module::Rh,
        Module::SocialMedia,
        Module::BemEstar,
        Module::Coordenacao,
        Module::Secretaria,
        Module::ConteudoMidia,
        Module::Atendimento,
        Module::Redacao,
        Module::AulaExpandida,
    ];

    /// Nome canônico em snake_case
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Professor => "professor",
            Module::Enem => "enem",
            Module::AulaInterativa => "aula_interativa",
            Module::Ti => "ti",
            Module::Financeiro => "financeiro",
            Module::Rh => "rh",
            Module::SocialMedia => "social_media",
            Module::BemEstar => "bem_estar",
            Module::Coordenacao => "coordenacao",
            Module::Secretaria => "secretaria",
            Module::ConteudoMidia => "conteudo_midia",
            Module::Atendimento => "atendimento",
            Module::Redacao => "redacao",
            Module::AulaExpandida => "aula_expandida",
        }
    }

    /// Converte texto livre em módulo.
    ///
    /// Case-insensitive; aceita hífens no lugar de underscores
    /// ("aula-interativa" → AulaInterativa).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|m| m.as_str() == normalized)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexidade estimada de uma mensagem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Complex,
    Fast,
    Creative,
    Analytical,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Complex => "complex",
            Complexity::Fast => "fast",
            Complexity::Creative => "creative",
            Complexity::Analytical => "analytical",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caso de uso detectado a partir das palavras-chave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    Chat,
    Education,
    Analysis,
    Creative,
    Technical,
    Research,
    WebSearch,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::Chat => "chat",
            UseCase::Education => "education",
            UseCase::Analysis => "analysis",
            UseCase::Creative => "creative",
            UseCase::Technical => "technical",
            UseCase::Research => "research",
            UseCase::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provedores de LLM suportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    Google,
    Anthropic,
    Perplexity,
    Xai,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::OpenAi,
        ProviderId::Google,
        ProviderId::Anthropic,
        ProviderId::Perplexity,
        ProviderId::Xai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Google => "google",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Perplexity => "perplexity",
            ProviderId::Xai => "xai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderId::OpenAi),
            "google" | "gemini" => Some(ProviderId::Google),
            "anthropic" | "claude" => Some(ProviderId::Anthropic),
            "perplexity" => Some(ProviderId::Perplexity),
            "xai" | "grok" => Some(ProviderId::Xai),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Área do conhecimento do ENEM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemArea {
    /// Ciências da Natureza
    CN,
    /// Ciências Humanas
    CH,
    /// Linguagens e Códigos
    LC,
    /// Matemática
    MT,
}

impl EnemArea {
    pub const ALL: [EnemArea; 4] = [EnemArea::CN, EnemArea::CH, EnemArea::LC, EnemArea::MT];

    pub fn code(&self) -> &'static str {
        match self {
            EnemArea::CN => "CN",
            EnemArea::CH => "CH",
            EnemArea::LC => "LC",
            EnemArea::MT => "MT",
        }
    }

    /// Slug usado nos arquivos de dados (`discipline` em details.json)
    pub fn slug(&self) -> &'static str {
        match self {
            EnemArea::CN => "ciencias-natureza",
            EnemArea::CH => "ciencias-humanas",
            EnemArea::LC => "linguagens",
            EnemArea::MT => "matematica",
        }
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            EnemArea::CN => "Ciências da Natureza e suas Tecnologias",
            EnemArea::CH => "Ciências Humanas e suas Tecnologias",
            EnemArea::LC => "Linguagens, Códigos e suas Tecnologias",
            EnemArea::MT => "Matemática e suas Tecnologias",
        }
    }

    /// Aceita código (CN), slug (ciencias-natureza) ou nome curto (natureza)
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_lowercase();
        match v.as_str() {
            "cn" | "ciencias-natureza" | "natureza" | "ciencias_natureza" => Some(EnemArea::CN),
            "ch" | "ciencias-humanas" | "humanas" | "ciencias_humanas" => Some(EnemArea::CH),
            "lc" | "linguagens" => Some(EnemArea::LC),
            "mt" | "matematica" | "matemática" => Some(EnemArea::MT),
            _ => None,
        }
    }
}

impl fmt::Display for EnemArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Papel de uma mensagem em uma conversa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// Mensagem trocada com o LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_parse() {
        assert_eq!(Module::parse("ENEM"), Some(Module::Enem));
        assert_eq!(Module::parse("aula-interativa"), Some(Module::AulaInterativa));
        assert_eq!(Module::parse(" bem_estar "), Some(Module::BemEstar));
        assert_eq!(Module::parse("desconhecido"), None);
    }

    #[test]
    fn test_module_serde_snake_case() {
        let json = serde_json::to_string(&Module::ConteudoMidia).unwrap();
        assert_eq!(json, "\"conteudo_midia\"");
        let back: Module = serde_json::from_str("\"social_media\"").unwrap();
        assert_eq!(back, Module::SocialMedia);
    }

    #[test]
    fn test_module_all_round_trips_names() {
        for m in Module::ALL {
            assert_eq!(Module::parse(m.as_str()), Some(m));
        }
    }

    #[test]
    fn test_enem_area_parse() {
        assert_eq!(EnemArea::parse("mt"), Some(EnemArea::MT));
        assert_eq!(EnemArea::parse("ciencias-humanas"), Some(EnemArea::CH));
        assert_eq!(EnemArea::parse("natureza"), Some(EnemArea::CN));
        assert_eq!(EnemArea::parse("xx"), None);
    }

    #[test]
    fn test_provider_parse_aliases() {
        assert_eq!(ProviderId::parse("grok"), Some(ProviderId::Xai));
        assert_eq!(ProviderId::parse("Gemini"), Some(ProviderId::Google));
        assert_eq!(ProviderId::parse("nope"), None);
    }
}
