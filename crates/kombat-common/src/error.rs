//! Error types for the Kombat crates.

use thiserror::Error;

/// Top-level error type for Kombat operations.
#[derive(Debug, Error)]
pub enum KombatError {
    /// Hitbox table errors
    #[error("Hitbox error: {0}")]
    Hitbox(#[from] HitboxError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading the hitbox authoring file.
#[derive(Debug, Error)]
pub enum HitboxError {
    /// File could not be read
    #[error("failed to read hitbox file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON or has the wrong top-level shape
    #[error("failed to parse hitbox file: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is valid but not shaped as character -> clip -> frame
    #[error("unexpected hitbox file layout: {0}")]
    Layout(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML could not be produced
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type alias for Kombat operations.
pub type KombatResult<T> = Result<T, KombatError>;
