//! Engine error types.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested engine's dependencies are not installed in this build.
    #[error("Engine '{engine}' not available. {hint}")]
    Unavailable { engine: String, hint: String },

    /// The engine ran and failed; the message is recorded verbatim on the task.
    #[error("{0}")]
    Failed(String),

    /// The engine finished without producing the required Markdown artifact.
    #[error("Engine '{0}' produced no markdown output")]
    NoOutput(String),

    #[error("Invalid engine options: {0}")]
    InvalidOptions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
