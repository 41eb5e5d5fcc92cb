use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid gate configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Gate runtime is no longer running")]
    RuntimeClosed,
}

pub type Result<T> = std::result::Result<T, GateError>;
