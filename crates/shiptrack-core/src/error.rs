use thiserror::Error;

/// Validation and contract errors exposed by `shiptrack-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("tracking identifier cannot be empty")]
    EmptyIdentifier,
    #[error("tracking identifier length {len} is below min {min}")]
    IdentifierTooShort { len: usize, min: usize },
    #[error("tracking identifier length {len} exceeds max {max}")]
    IdentifierTooLong { len: usize, max: usize },
    #[error("tracking identifier contains invalid character '{ch}' at index {index}")]
    IdentifierInvalidChar { ch: char, index: usize },

    #[error("invalid identifier type '{value}', expected one of container, booking, bol, vessel")]
    InvalidIdentifierType { value: String },
    #[error("invalid cost tier '{value}', expected one of free, freemium, paid")]
    InvalidCostTier { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("provider '{name}' reliability {value} must be within [0, 1]")]
    ReliabilityOutOfRange { name: String, value: f64 },
    #[error("provider name cannot be empty")]
    EmptyProviderName,
    #[error("provider '{name}' must support at least one identifier type")]
    NoSupportedTypes { name: String },
    #[error("provider '{name}' rate limit must be greater than zero")]
    ZeroRateLimit { name: String },

    #[error("invalid value '{value}' for configuration key {key}")]
    InvalidConfig { key: String, value: String },
    #[error("unknown provider '{name}'")]
    UnknownProvider { name: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
