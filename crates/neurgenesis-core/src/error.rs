//! Error types for Neurgenesis

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("identity error: {provider} - {message}")]
    Identity { provider: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound(id.into())
    }

    pub fn identity(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Identity {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
