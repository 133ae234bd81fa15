// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIMING UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Medição de latência de chamadas a provedores e rotas.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Timer de latência com rótulo para logs
#[derive(Debug)]
pub struct LatencyTimer {
    start: Instant,
    label: String,
}

impl LatencyTimer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Para o timer e loga a latência
    pub fn stop_and_log(self) -> u64 {
        let elapsed = self.elapsed_ms();
        log::info!("⏱️ [{}] {}ms", self.label, elapsed);
        elapsed
    }
}

/// Epoch em milissegundos
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
