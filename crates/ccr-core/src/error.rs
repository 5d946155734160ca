#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
