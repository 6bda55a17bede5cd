/// Core error type.
///
/// Adapter crates should map their specific errors into this type so the
/// pipeline can handle failures consistently (validation vs transport).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown log category '{name}' (expected one of: messages, members, channels, roles, voice, presence)")]
    InvalidCategory { name: String },

    #[error("failed to persist tenant config: {0}")]
    ConfigPersistence(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
