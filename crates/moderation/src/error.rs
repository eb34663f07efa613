//! Error types for the moderation engine

use thiserror::Error;

/// Result type for moderation operations
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Errors that can occur inside the moderation engine.
///
/// None of these ever propagate out of [`crate::ScoringEngine::score`];
/// every scoring stage degrades to "contributes nothing" on failure. They
/// surface only from explicit setup and maintenance entry points.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A detector stage failed
    #[error("Detector '{stage}' failed: {message}")]
    Detector {
        stage: &'static str,
        message: String,
    },

    /// Classifier training error
    #[error("Training error: {0}")]
    Training(String),

    /// Remote inference error
    #[error("Inference error: {0}")]
    Inference(String),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
