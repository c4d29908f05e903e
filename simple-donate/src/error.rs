//! Error types for the donation flow.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Validation(#[from] paynl_client::ValidationError),

    #[error("Unable to create payment: {0}")]
    Gateway(#[from] paynl_client::Error),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid bank id: {0}")]
    InvalidBankId(String),

    #[error("Gateway returned no redirect URL")]
    MissingRedirect,

    #[error("Usage: {0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
