use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Everything that can end a download session early.
///
/// `Transport` and `PrematureEndOfStream` display the same generic text the
/// operator sees; the detail is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("download failed")]
    Transport { detail: String },

    #[error("malformed progress frame `{line}`: {reason}")]
    MalformedFrame { line: String, reason: String },

    #[error("{0}")]
    ServerReported(String),

    #[error("download failed")]
    PrematureEndOfStream,
}

impl DownloadError {
    pub fn transport(detail: impl ToString) -> Self {
        DownloadError::Transport {
            detail: detail.to_string(),
        }
    }
}
