//! Error types for the gateway client.

use crate::codec::CodecError;

/// Malformed configuration or caller input.
///
/// Raised before any network traffic and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid program id")]
    ProgramId,

    #[error("Invalid website id")]
    WebsiteId,

    #[error("Invalid website location id")]
    WebsiteLocationId,

    #[error("Invalid account id")]
    AccountId,

    #[error("Invalid token")]
    Token,

    #[error("Invalid emailaddress: {0}")]
    EmailAddress(String),

    #[error("Invalid handshake")]
    Handshake,

    #[error("Amount in cents cannot be negative or 0")]
    Amount,

    #[error("Invalid payment profile id")]
    PaymentProfileId,

    #[error("Invalid bank id")]
    BankId,

    #[error("A bank id is required for payment profile {0}")]
    MissingBankId(u32),

    #[error("Invalid external order: longer than {max} characters")]
    ExternalOrder { max: usize },

    #[error("Invalid exchange url: {0}")]
    ExchangeUrl(String),

    #[error("Invalid return url: {0}")]
    ReturnUrl(String),

    #[error("Invalid payment session id")]
    PaymentSessionId,

    #[error("Invalid base url: {0}")]
    BaseUrl(String),

    #[error("Retry budget must allow at least one attempt")]
    RetryBudget,
}

/// Errors surfaced by [`GatewayClient`](crate::GatewayClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The gateway answered, but not with the shape the operation expects.
    #[error("Unexpected response from Pay.nl @ {function}: {detail}")]
    Protocol { function: String, detail: String },

    /// Network failure or communication error that survived the retry budget.
    #[error("Communication with Pay.nl failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// Well-formed refusal from the gateway.
    #[error("Error: {message}")]
    GatewayRejection { status: Option<u16>, message: String },
}

impl Error {
    pub(crate) fn protocol(function: &str, detail: impl Into<String>) -> Self {
        Error::Protocol {
            function: function.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn codec(function: &str, err: CodecError) -> Self {
        Error::protocol(function, err.to_string())
    }

    /// Whether the failure is transport-class.
    ///
    /// Only these are retried by the request primitive; validation, protocol
    /// and gateway rejections fail immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
