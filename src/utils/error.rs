use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Network failure, unexpected status, or an undecodable body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend understood the request and refused it.
    #[error("Rejected: {reason}")]
    Rejected { reason: String },

    /// Non-success status carrying the server's own explanation.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        message: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl AppError {
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }

    /// Text shown to the user in a notification. Server-provided reasons are
    /// passed through verbatim; anything else collapses to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AppError::Rejected { reason } if !reason.trim().is_empty() => reason.clone(),
            AppError::Server { message, .. } if !message.trim().is_empty() => message.clone(),
            AppError::NotFound {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
