//! Core error types.
//!
//! Nothing in the decision layer is fatal to the host. These errors only
//! surface while wiring the core up (configuration, HTTP client); once running,
//! probe failures degrade to "unavailable" and gating failures to "unmet".

/// Errors that can occur while building the core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {var}: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("invalid number for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Why a single probe was judged unavailable.
///
/// Never escapes [`crate::probe::SourceValidator::validate`]; it exists so the
/// failure can be logged before it is downgraded to `false`.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed body: {0}")]
    MalformedBody(String),
}
