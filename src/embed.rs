// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// VALIDAÇÃO DE EMBED (IFRAME)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Decide se um módulo pode ser embutido a partir de uma origem e monta o
// valor de `frame-ancestors` da CSP.
//
// Origens configuradas aceitam três formas:
//   https://escola.com.br     esquema + host (+ porta) exatos
//   escola.com.br             host exato, http ou https
//   *.escola.com.br           qualquer subdomínio (não o domínio raiz)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::Module;

/// Módulos que podem ser embutidos em sites de escolas parceiras
pub const EMBEDDABLE_MODULES: [Module; 4] = [Module::Enem, Module::Redacao, Module::Professor, Module::AulaInterativa];

#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginPattern {
    Exact { scheme: String, host: String, port: Option<u16> },
    Host(String),
    Wildcard(String),
}

impl OriginPattern {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches('/').to_lowercase();
        if raw.is_empty() {
            return None;
        }
        if let Some(domain) = raw.strip_prefix("*.") {
            return (!domain.is_empty()).then(|| OriginPattern::Wildcard(domain.to_string()));
        }
        if raw.contains("://") {
            let url = Url::parse(&raw).ok()?;
            return Some(OriginPattern::Exact {
                scheme: url.scheme().to_string(),
                host: url.host_str()?.to_string(),
                port: url.port(),
            });
        }
        Some(OriginPattern::Host(raw))
    }

    fn matches(&self, origin: &Url) -> bool {
        let Some(host) = origin.host_str() else {
            return false;
        };
        match self {
            OriginPattern::Exact { scheme, host: h, port } => {
                origin.scheme() == scheme && host == h && origin.port() == *port
            }
            OriginPattern::Host(h) => host == h,
            OriginPattern::Wildcard(domain) => host
                .strip_suffix(domain.as_str())
                .map_or(false, |prefix| prefix.ends_with('.') && prefix.len() > 1),
        }
    }

    /// Forma usada em `frame-ancestors`
    fn csp_source(&self) -> String {
        match self {
            OriginPattern::Exact { scheme, host, port } => match port {
                Some(p) => format!("{}://{}:{}", scheme, host, p),
                None => format!("{}://{}", scheme, host),
            },
            OriginPattern::Host(h) => format!("https://{} http://{}", h, h),
            OriginPattern::Wildcard(d) => format!("https://*.{}", d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedDecision {
    pub allowed: bool,
    pub reason: String,
    /// Valor da diretiva CSP `frame-ancestors`
    pub frame_ancestors: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmbedValidator {
    patterns: Vec<OriginPattern>,
}

impl EmbedValidator {
    pub fn new<S: AsRef<str>>(allowed_origins: &[S]) -> Self {
        let patterns = allowed_origins
            .iter()
            .filter_map(|raw| {
                let parsed = OriginPattern::parse(raw.as_ref());
                if parsed.is_none() {
                    log::warn!("⚠️ [EMBED] Origem inválida ignorada: {}", raw.as_ref());
                }
                parsed
            })
            .collect();
        Self { patterns }
    }

    pub fn is_embeddable(module: Module) -> bool {
        EMBEDDABLE_MODULES.contains(&module)
    }

    pub fn frame_ancestors(&self) -> String {
        std::iter::once("'self'".to_string())
            .chain(self.patterns.iter().map(OriginPattern::csp_source))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn decision(&self, allowed: bool, reason: impl Into<String>) -> EmbedDecision {
        EmbedDecision {
            allowed,
            reason: reason.into(),
            frame_ancestors: if allowed {
                self.frame_ancestors()
            } else {
                "'none'".to_string()
            },
        }
    }

    /// Sem `origin` (acesso direto) só o módulo é verificado
    pub fn validate(&self, module: &str, origin: Option<&str>) -> EmbedDecision {
        let Some(parsed) = Module::parse(module) else {
            return self.decision(false, format!("Módulo desconhecido: {}", module));
        };
        if !Self::is_embeddable(parsed) {
            return self.decision(false, format!("Módulo {} não pode ser embutido", parsed));
        }

        let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) else {
            return self.decision(true, "Acesso direto");
        };

        let url = match Url::parse(origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(_) => return self.decision(false, "Origem deve usar http ou https"),
            Err(_) => return self.decision(false, format!("Origem inválida: {}", origin)),
        };

        if self.patterns.is_empty() {
            return self.decision(false, "Nenhuma origem de embed configurada");
        }

        if self.patterns.iter().any(|p| p.matches(&url)) {
            log::debug!("✅ [EMBED] {} liberado para {}", parsed, origin);
            self.decision(true, "Origem autorizada")
        } else {
            log::warn!("🚫 [EMBED] {} bloqueado para {}", parsed, origin);
            self.decision(false, format!("Origem não autorizada: {}", origin))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> EmbedValidator {
        EmbedValidator::new(&["https://portal.escola.com.br", "colegio.edu.br", "*.rede.org", "http://localhost:3001"])
    }

    #[test]
    fn test_exact_origin() {
        let v = validator();
        assert!(v.validate("enem", Some("https://portal.escola.com.br")).allowed);
        assert!(!v.validate("enem", Some("http://portal.escola.com.br")).allowed);
        assert!(v.validate("enem", Some("http://localhost:3001")).allowed);
        assert!(!v.validate("enem", Some("http://localhost:3000")).allowed);
    }

    #[test]
    fn test_host_and_wildcard() {
        let v = validator();
        assert!(v.validate("redacao", Some("http://colegio.edu.br")).allowed);
        assert!(v.validate("redacao", Some("https://sp.rede.org")).allowed);
        assert!(!v.validate("redacao", Some("https://rede.org")).allowed);
        assert!(!v.validate("redacao", Some("https://falsarede.org")).allowed);
    }

    #[test]
    fn test_module_rules() {
        let v = validator();
        let d = v.validate("financeiro", Some("https://portal.escola.com.br"));
        assert!(!d.allowed);
        assert_eq!(d.frame_ancestors, "'none'");
        assert!(!v.validate("inexistente", None).allowed);
        assert!(v.validate("aula_interativa", None).allowed);
    }

    #[test]
    fn test_bad_origins() {
        let v = validator();
        assert!(!v.validate("enem", Some("ftp://colegio.edu.br")).allowed);
        assert!(!v.validate("enem", Some("não é url")).allowed);
        assert!(!EmbedValidator::default().validate("enem", Some("https://x.com")).allowed);
    }

    #[test]
    fn test_frame_ancestors_value() {
        let d = validator().validate("professor", Some("https://portal.escola.com.br"));
        assert_eq!(
            d.frame_ancestors,
            "'self' https://portal.escola.com.br https://colegio.edu.br http://colegio.edu.br https://*.rede.org http://localhost:3001"
        );
    }
}
