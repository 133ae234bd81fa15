// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RATE LIMITER POR IP (JANELA FIXA)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Contador em memória por cliente. Não é durável entre instâncias.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Resultado de uma verificação
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Rate limiter de janela fixa por chave (IP)
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Registra uma requisição no instante `now`.
    ///
    /// Janelas vencidas são removidas a cada chamada. Uma chave sem janela
    /// ativa abre uma nova com contagem 1.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        windows.retain(|_, w| w.reset_at > now);

        match windows.get_mut(key) {
            Some(window) if window.count >= self.config.max_requests => {
                log::warn!("🚫 [RATE] limite atingido para {}", key);
                RateDecision::Limited {
                    retry_after: window.reset_at.saturating_duration_since(now),
                }
            }
            Some(window) => {
                window.count += 1;
                RateDecision::Allowed {
                    remaining: self.config.max_requests - window.count,
                }
            }
            None => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.config.window,
                    },
                );
                RateDecision::Allowed {
                    remaining: self.config.max_requests.saturating_sub(1),
                }
            }
        }
    }

    /// Número de chaves com janela ativa
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

/// Chave do cliente a partir dos headers de proxy.
///
/// Usa o primeiro IP de `x-forwarded-for`, depois `x-real-ip`,
/// e "unknown" quando nenhum está presente.
pub fn client_key(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn test_rejects_eleventh_request_in_window() {
        let limiter = limiter(10, 60);
        let now = Instant::now();
        for i in 0..10 {
            assert!(limiter.check_at("1.2.3.4", now).is_allowed(), "req {}", i + 1);
        }
        assert!(!limiter.check_at("1.2.3.4", now).is_allowed());
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        assert_eq!(limiter.check_at("ip", now), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("ip", now), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("ip", now), RateDecision::Allowed { remaining: 0 });
    }

    #[test]
    fn test_new_window_after_expiry() {
        let limiter = limiter(1, 10);
        let start = Instant::now();
        assert!(limiter.check_at("ip", start).is_allowed());
        assert!(!limiter.check_at("ip", start + Duration::from_secs(5)).is_allowed());
        assert!(limiter.check_at("ip", start + Duration::from_secs(11)).is_allowed());
    }

    #[test]
    fn test_retry_after_reflects_window() {
        let limiter = limiter(1, 60);
        let start = Instant::now();
        limiter.check_at("ip", start);
        match limiter.check_at("ip", start + Duration::from_secs(20)) {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40))
            }
            other => panic!("esperava Limited, veio {:?}", other),
        }
    }

    #[test]
    fn test_clients_are_independent_and_swept() {
        let limiter = limiter(1, 10);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_allowed());
        assert!(limiter.check_at("b", start).is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
        limiter.check_at("c", start + Duration::from_secs(30));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_client_key() {
        assert_eq!(client_key(Some("10.0.0.1, 172.16.0.1"), None), "10.0.0.1");
        assert_eq!(client_key(None, Some("192.168.0.9")), "192.168.0.9");
        assert_eq!(client_key(Some(" "), None), "unknown");
        assert_eq!(client_key(None, None), "unknown");
    }
}
