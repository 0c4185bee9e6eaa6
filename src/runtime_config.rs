//! # Runtime configuration
//!
//! Coroutine runtime settings read from the environment at startup.
//!
//! ### `PANELWEB_STACK_SIZE`
//!
//! Stack size for request coroutines. Decimal (`16384`) or hexadecimal
//! (`0x4000`). Default: `0x4000`.
//!
//! ### `PANELWEB_WORKERS`
//!
//! Number of `may` worker threads. Default: `1`, which keeps the whole
//! server on one cooperative scheduler the way the panel firmware runs it.
//!
//! ```bash
//! PANELWEB_STACK_SIZE=0x8000 panelweb serve --config panelweb.yaml
//! ```

use std::env;
use tracing::info;

pub const DEFAULT_STACK_SIZE: usize = 0x4000;
pub const DEFAULT_WORKERS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    pub workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_values(
            env::var("PANELWEB_STACK_SIZE").ok().as_deref(),
            env::var("PANELWEB_WORKERS").ok().as_deref(),
        )
    }

    fn from_values(stack: Option<&str>, workers: Option<&str>) -> Self {
        let stack_size = stack
            .and_then(parse_size)
            .unwrap_or(DEFAULT_STACK_SIZE);
        let workers = workers
            .and_then(|w| w.trim().parse().ok())
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_WORKERS);
        RuntimeConfig {
            stack_size,
            workers,
        }
    }

    /// Apply to the global `may` scheduler. Call before the server starts.
    pub fn apply(&self) {
        may::config()
            .set_stack_size(self.stack_size)
            .set_workers(self.workers);
        info!(
            stack_size = self.stack_size,
            workers = self.workers,
            "coroutine runtime configured"
        );
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_and_decimal_stack_sizes() {
        assert_eq!(RuntimeConfig::from_values(Some("0x8000"), None).stack_size, 0x8000);
        assert_eq!(RuntimeConfig::from_values(Some("32768"), None).stack_size, 32768);
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let cfg = RuntimeConfig::from_values(Some("big"), Some("0"));
        assert_eq!(cfg, RuntimeConfig::default());
    }
}
