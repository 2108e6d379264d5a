//! Error types for the emotion fusion engine.

/// Top-level error type for the fusion and tracking system.
#[derive(Debug, thiserror::Error)]
pub enum EmotionError {
    /// A capture source (camera/microphone) cannot be acquired.
    #[error("capture source unavailable: {0}")]
    SourceUnavailable(String),

    /// A modality classifier failed or timed out.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Fusion was invoked with zero modality results.
    #[error("no modality input available for fusion")]
    NoInput,

    /// A capture device is already claimed by another session.
    #[error("capture device busy: {0}")]
    ResourceBusy(String),

    /// Operation against an unknown or expired session.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EmotionError>;
