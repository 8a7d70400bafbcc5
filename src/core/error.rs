//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by engine components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No effect with this name exists in the catalog.
    #[error("unknown effect: {0}")]
    UnknownEffect(String),
    /// Arguments do not satisfy the effect's schema.
    #[error("invalid arguments for effect `{effect}`: {reason}")]
    InvalidArguments {
        /// Effect being launched.
        effect: String,
        /// First schema violation found.
        reason: String,
    },
    /// The execution unit could not be created.
    #[error("launch error: {0}")]
    Launch(String),
    /// A bulk stop is in progress; the caller may retry afterwards.
    #[error("engine busy: bulk stop in progress")]
    Busy,
    /// The engine was shut down and accepts no new effects.
    #[error("engine shut down")]
    ShutDown,
    /// Catalog source failure with context.
    #[error("catalog error: {0}")]
    Catalog(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
