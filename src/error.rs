//! Error types for the honeypot engine.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Failures of an external oracle call.
///
/// None of these ever reach the caller of `process_turn`; the pipeline logs
/// them and takes the deterministic fallback path.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle {oracle} timed out after {timeout:?}")]
    Timeout { oracle: String, timeout: Duration },

    #[error("Oracle {oracle} unavailable: {reason}")]
    Unavailable { oracle: String, reason: String },

    #[error("Oracle {oracle} returned malformed output: {reason}")]
    Malformed { oracle: String, reason: String },

    #[error("Oracle {oracle} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        oracle: String,
        attempts: u32,
        last: String,
    },
}

/// Errors surfaced by the turn pipeline to its caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Session {session_id} kept conflicting after {attempts} write attempts; retry the turn")]
    StoreConflict { session_id: String, attempts: u32 },

    #[error("Session store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid turn request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    /// Whether the caller should retry the whole turn.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreConflict { .. })
    }
}

/// Delivery failures of the final intelligence report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report delivery to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Report rejected by {url} with HTTP {status}")]
    Rejected { url: String, status: u16 },
}
