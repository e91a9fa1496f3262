//! Process-environment configuration layer.
//!
//! The environment is read exactly once, when the facade is constructed; the
//! strategies themselves never touch it.

use crate::strategy::StrategyKind;
use log::warn;

pub const ENV_ALGORITHM: &str = "ASSIGNMENT_ALGORITHM";
pub const ENV_TIMEOUT: &str = "ASSIGNMENT_TIMEOUT";
pub const ENV_FALLBACK: &str = "ASSIGNMENT_FALLBACK";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Snapshot of the assignment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub strategy: StrategyKind,
    pub timeout_seconds: u64,
    pub fallback_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            strategy: StrategyKind::CpSat,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            fallback_enabled: true,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Malformed values are not errors; they fall back to the defaults with a
    /// warning, so a typo in a deployment environment never takes the service
    /// down.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = ServiceConfig::default();

        if let Some(raw) = lookup(ENV_ALGORITHM) {
            match StrategyKind::from_name(&raw) {
                Some(kind) => config.strategy = kind,
                None => warn!(
                    "Unknown {} value {:?}, using default strategy {}",
                    ENV_ALGORITHM,
                    raw,
                    config.strategy.canonical_name()
                ),
            }
        }

        if let Some(raw) = lookup(ENV_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(seconds) => config.timeout_seconds = seconds,
                Err(_) => warn!(
                    "Could not parse {} value {:?}, using default of {}s",
                    ENV_TIMEOUT, raw, config.timeout_seconds
                ),
            }
        }

        if let Some(raw) = lookup(ENV_FALLBACK) {
            match raw.trim().to_lowercase().as_str() {
                "true" => config.fallback_enabled = true,
                "false" => config.fallback_enabled = false,
                _ => warn!(
                    "Could not parse {} value {:?}, keeping fallback {}",
                    ENV_FALLBACK, raw, config.fallback_enabled
                ),
            }
        }

        config
    }
}
