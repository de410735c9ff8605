use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScfError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type ScfResult<T> = Result<T, ScfError>;
