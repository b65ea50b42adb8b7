use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThinkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("File error: {0}")]
    FileError(String),

    #[error("Argument error: {0}")]
    ArgumentError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ThinkerError {
    fn from(err: config::ConfigError) -> Self {
        ThinkerError::ConfigError(err.to_string())
    }
}
