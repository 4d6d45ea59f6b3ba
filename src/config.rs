//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::engagement::CompletenessRule;
use crate::error::ConfigError;

/// Decision-engine configuration.
///
/// Thresholds are fixed for the lifetime of a session: one engine instance
/// is built at startup and shared by every turn.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Confidence at or above which a session is judged a scam.
    pub scam_threshold: f64,
    /// Lower bound of the CAUTIOUS tier.
    pub cautious_threshold: f64,
    /// Lower bound of the AGGRESSIVE tier.
    pub aggressive_threshold: f64,
    /// Confidence assigned by the instant-scam fast path.
    pub instant_scam_confidence: f64,
    /// Confidence assigned by the instant-safe fast path.
    pub low_safe_confidence: f64,
    /// Cap on the indicator boost added to the oracle's estimate.
    pub max_indicator_boost: f64,
    pub max_turns_cautious: u32,
    pub max_turns_aggressive: u32,
    pub max_duration: Duration,
    /// Turns without new intelligence before the session is declared stale.
    pub stale_threshold: u32,
    pub completeness: CompletenessRule,
    /// Cap on free-form labeled entries per session.
    pub max_other_labeled: usize,
    /// Recent history messages passed to oracles.
    pub history_window: usize,
    pub oracle_timeout: Duration,
    pub oracle_max_attempts: u32,
    pub store_max_attempts: u32,
    /// Indicator audit entries kept per session.
    pub audit_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scam_threshold: 0.6,
            cautious_threshold: 0.6,
            aggressive_threshold: 0.85,
            instant_scam_confidence: 0.95,
            low_safe_confidence: 0.05,
            max_indicator_boost: 0.15,
            max_turns_cautious: 10,
            max_turns_aggressive: 15,
            max_duration: Duration::from_secs(30 * 60),
            stale_threshold: 4,
            completeness: CompletenessRule::default(),
            max_other_labeled: 5,
            history_window: 6,
            oracle_timeout: Duration::from_secs(8),
            oracle_max_attempts: 2,
            store_max_attempts: 3,
            audit_cap: 100,
        }
    }
}

impl EngineConfig {
    /// Build from `HONEYPOT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let completeness = match std::env::var("HONEYPOT_COMPLETE_WHEN") {
            Ok(raw) => raw.parse()?,
            Err(_) => d.completeness.clone(),
        };

        let config = Self {
            scam_threshold: env_parse("HONEYPOT_SCAM_THRESHOLD", d.scam_threshold),
            cautious_threshold: env_parse("HONEYPOT_CAUTIOUS_THRESHOLD", d.cautious_threshold),
            aggressive_threshold: env_parse(
                "HONEYPOT_AGGRESSIVE_THRESHOLD",
                d.aggressive_threshold,
            ),
            instant_scam_confidence: env_parse(
                "HONEYPOT_INSTANT_SCAM_CONFIDENCE",
                d.instant_scam_confidence,
            ),
            low_safe_confidence: env_parse("HONEYPOT_LOW_SAFE_CONFIDENCE", d.low_safe_confidence),
            max_indicator_boost: env_parse("HONEYPOT_MAX_INDICATOR_BOOST", d.max_indicator_boost),
            max_turns_cautious: env_parse("HONEYPOT_MAX_TURNS_CAUTIOUS", d.max_turns_cautious),
            max_turns_aggressive: env_parse(
                "HONEYPOT_MAX_TURNS_AGGRESSIVE",
                d.max_turns_aggressive,
            ),
            max_duration: Duration::from_secs(env_parse(
                "HONEYPOT_MAX_DURATION_SECS",
                d.max_duration.as_secs(),
            )),
            stale_threshold: env_parse("HONEYPOT_STALE_THRESHOLD", d.stale_threshold),
            completeness,
            max_other_labeled: env_parse("HONEYPOT_MAX_OTHER_LABELED", d.max_other_labeled),
            history_window: env_parse("HONEYPOT_HISTORY_WINDOW", d.history_window),
            oracle_timeout: Duration::from_millis(env_parse(
                "HONEYPOT_ORACLE_TIMEOUT_MS",
                d.oracle_timeout.as_millis() as u64,
            )),
            oracle_max_attempts: env_parse("HONEYPOT_ORACLE_MAX_ATTEMPTS", d.oracle_max_attempts),
            store_max_attempts: env_parse("HONEYPOT_STORE_MAX_ATTEMPTS", d.store_max_attempts),
            audit_cap: env_parse("HONEYPOT_AUDIT_CAP", d.audit_cap),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check threshold ordering and limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cautious_threshold > 0.0
            && self.cautious_threshold < self.aggressive_threshold
            && self.aggressive_threshold < 1.0)
        {
            return Err(invalid(
                "cautious_threshold/aggressive_threshold",
                format!(
                    "need 0 < cautious ({}) < aggressive ({}) < 1",
                    self.cautious_threshold, self.aggressive_threshold
                ),
            ));
        }
        if !(self.scam_threshold > 0.0 && self.scam_threshold <= 1.0) {
            return Err(invalid("scam_threshold", "must be in (0, 1]"));
        }
        for (key, value) in [
            ("instant_scam_confidence", self.instant_scam_confidence),
            ("low_safe_confidence", self.low_safe_confidence),
            ("max_indicator_boost", self.max_indicator_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, "must be in [0, 1]"));
            }
        }
        if self.max_turns_cautious == 0 || self.max_turns_aggressive == 0 {
            return Err(invalid("max_turns", "per-mode turn limits must be >= 1"));
        }
        if self.oracle_max_attempts == 0 || self.store_max_attempts == 0 {
            return Err(invalid("max_attempts", "attempt limits must be >= 1"));
        }
        Ok(())
    }
}

/// Binary/server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Session database path. `None` keeps sessions in memory.
    pub db_path: Option<String>,
    pub model: String,
    pub api_key: SecretString,
    /// Endpoint that receives the final report of each terminated session.
    pub callback_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".into()))?;

        Ok(Self {
            port: env_parse("HONEYPOT_PORT", 8080),
            db_path: std::env::var("HONEYPOT_DB_PATH").ok(),
            model: std::env::var("HONEYPOT_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            api_key: SecretString::from(api_key),
            callback_url: std::env::var("HONEYPOT_CALLBACK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cautious_threshold < config.aggressive_threshold);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = EngineConfig {
            cautious_threshold: 0.9,
            aggressive_threshold: 0.8,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_aggressive_at_one() {
        let config = EngineConfig {
            aggressive_threshold: 1.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = EngineConfig {
            store_max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
