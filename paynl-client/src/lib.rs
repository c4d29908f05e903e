//! Pay.nl REST client
//!
//! Logs in with a merchant token, keeps the session handshake, and exposes the
//! calls a donation form needs: active payment profiles, iDEAL banks,
//! transaction creation and status lookups.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod request;
pub mod transport;
mod validate;

pub use client::{GatewayClient, GatewayClientBuilder, ScopedFuture};
pub use config::{ClientConfig, ClientSettings, RetryPolicy};
pub use error::{Error, Result, ValidationError};
pub use models::{
    Bank, PaymentProfiles, PaymentStatus, Record, TransactionRequest, TransactionRequestBuilder,
    TransactionResult, IDEAL_PAYMENT_PROFILE_ID,
};
pub use report::{LogNotifier, Notifier};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
