use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::task::{Interval, Requeue};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_FAST_REQUEUE_MS: u64 = 500;
const DEFAULT_PHASE_REQUEUE_MS: u64 = 100;
const DEFAULT_POLL_REQUEUE_SECS: u64 = 3;
const DEFAULT_ERROR_BACKOFF_SECS: u64 = 5;
const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30;

/// Lee una variable de entorno y la parsea; si falta o no parsea usa el default.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Configuración del controller (todas las claves salen del entorno).
#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: String,
    pub workers: usize,
    /// Reintento tras un conflicto de concurrencia optimista.
    pub fast_requeue: Duration,
    /// Intervalo después de que una fase avanzó.
    pub phase_requeue: Duration,
    /// Intervalo mientras una fase espera trabajo externo.
    pub poll_requeue: Duration,
    /// Reintento tras un reconcile fallido (p.ej. plan no listo).
    pub error_backoff: Duration,
    pub resync_interval: Duration,
    pub tracing_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            workers: DEFAULT_WORKERS,
            fast_requeue: Duration::from_millis(DEFAULT_FAST_REQUEUE_MS),
            phase_requeue: Duration::from_millis(DEFAULT_PHASE_REQUEUE_MS),
            poll_requeue: Duration::from_secs(DEFAULT_POLL_REQUEUE_SECS),
            error_backoff: Duration::from_secs(DEFAULT_ERROR_BACKOFF_SECS),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            tracing_enabled: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            addr: env_or("CONTROLLER_ADDR", DEFAULT_ADDR.to_string()),
            workers: env_or("CONTROLLER_WORKERS", DEFAULT_WORKERS).max(1),
            fast_requeue: Duration::from_millis(env_or("FAST_REQUEUE_MS", DEFAULT_FAST_REQUEUE_MS)),
            phase_requeue: Duration::from_millis(env_or(
                "PHASE_REQUEUE_MS",
                DEFAULT_PHASE_REQUEUE_MS,
            )),
            poll_requeue: Duration::from_secs(env_or("POLL_REQUEUE_SECS", DEFAULT_POLL_REQUEUE_SECS)),
            error_backoff: Duration::from_secs(env_or(
                "ERROR_BACKOFF_SECS",
                DEFAULT_ERROR_BACKOFF_SECS,
            )),
            resync_interval: Duration::from_secs(env_or(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            )),
            tracing_enabled: env_or("TRACING_ENABLED", false),
        }
    }

    /// Traduce una directiva de requeue a un delay concreto (None = no reencolar).
    pub fn requeue_delay(&self, requeue: Requeue) -> Option<Duration> {
        match requeue {
            Requeue::Never => None,
            Requeue::Fast => Some(self.fast_requeue),
            Requeue::After(Interval::Step) => Some(self.phase_requeue),
            Requeue::After(Interval::Poll) => Some(self.poll_requeue),
        }
    }
}
