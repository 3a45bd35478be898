use thiserror::Error;

/// Core error types shared by the persistence crates
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },

    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl CoreError {
    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Check if this error was caused by caller-supplied data
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidResource { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
