use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaTabError {
    #[error("event listener strategy needs at least one event name")]
    EmptyEventNames,

    #[error("invalid {field} pattern for site {site}: {message}")]
    InvalidPattern {
        site: String,
        field: &'static str,
        message: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("wire encoding error: {0}")]
    Wire(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
