use thiserror::Error;

/// Unified result type for the nearfield crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration mistakes surfaced while resolving targets and contexts.
///
/// These are raised synchronously by the normalizer. `Session` catches them
/// during boot and logs them instead of propagating, leaving the session
/// inert but reboot-able.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target is required")]
    TargetRequired,
    #[error("target not found, was looking for `{0}`")]
    TargetNotFound(String),
    #[error("context not found, was looking for `{0}`")]
    ContextNotFound(String),
    #[error("no targets found")]
    NoTargets,
}
