//! Gateway client: login handshake, business operations and the request
//! primitive they all share.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::codec;
use crate::config::ClientConfig;
use crate::error::{Error, Result, ValidationError};
use crate::models::{
    Bank, PaymentProfiles, PaymentStatus, Record, TransactionRequest, TransactionResult,
    PAYMENT_METHOD_FILTER,
};
use crate::report::{ErrorReporter, LogNotifier, Notifier};
use crate::request::{endpoint_url, ApiVersion, RequestArgs};
use crate::transport::{Credentials, HttpRequest, ReqwestTransport, Transport};
use crate::validate::{MIN_HANDSHAKE_LEN, MIN_PAYMENT_SESSION_ID_LEN};

const CLASS_VERSION: &str = "1.0";
const HANDSHAKE_USER: &str = "pptCHandshake";
const UNKNOWN_COMMUNICATIONS_ERROR: &str = "Unknown communications error";

const LOGIN: &str = "Authentication/loginByToken";
const LOGOUT: &str = "Authentication/logout";
const ACTIVE_PAYMENT_PROFILES: &str = "WebsiteLocation/getActivePaymentProfiles";
const STATUS_BY_SESSION: &str = "Transaction/getStatusByPaymentSessionId";
const BANKS: &str = "Transaction/getBanks";
const CREATE: &str = "Transaction/create";

/// Future returned by the closure given to [`GatewayClient::scoped`].
pub type ScopedFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Session credential returned by the login call.
#[derive(Clone, PartialEq, Eq)]
struct Handshake(String);

impl Handshake {
    fn parse(value: &str) -> std::result::Result<Self, ValidationError> {
        if value.len() < MIN_HANDSHAKE_LEN {
            return Err(ValidationError::Handshake);
        }
        Ok(Self(value.to_string()))
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            username: HANDSHAKE_USER.to_string(),
            password: self.0.clone(),
        }
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handshake(<redacted>)")
    }
}

/// Configures transport and notifier before logging in.
pub struct GatewayClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    notifier: Arc<dyn Notifier>,
}

impl GatewayClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Log in and return an authenticated client.
    pub async fn connect(self) -> Result<GatewayClient> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let reporter = ErrorReporter::new(self.config.email_addresses().to_vec(), self.notifier);

        if self.config.debug() {
            tracing::debug!("{} transport available - Session initialized", transport.name());
        }

        let mut client = GatewayClient {
            config: self.config,
            transport,
            reporter,
            handshake: None,
        };
        let handshake = client.reported(client.login().await)?;
        client.handshake = Some(handshake);
        Ok(client)
    }

    /// Log in, run `f`, and log out on every exit path.
    pub async fn scoped<T, F>(self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c GatewayClient) -> ScopedFuture<'c, T>,
    {
        let client = self.connect().await?;
        let result = f(&client).await;
        client.logout().await;
        result
    }
}

/// Authenticated Pay.nl REST client.
///
/// A value of this type only exists after a successful login; [`logout`]
/// consumes it. If it is dropped without logging out, a best-effort logout is
/// scheduled on the current tokio runtime.
///
/// [`logout`]: GatewayClient::logout
pub struct GatewayClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    reporter: ErrorReporter,
    handshake: Option<Handshake>,
}

impl GatewayClient {
    pub fn builder(config: ClientConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            config,
            transport: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Log in with the default transport.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::builder(config).connect().await
    }

    /// Log in with the default transport, run `f`, then log out.
    pub async fn scoped<T, F>(config: ClientConfig, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c GatewayClient) -> ScopedFuture<'c, T>,
    {
        Self::builder(config).scoped(f).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// End the session. Failures are logged and otherwise ignored.
    pub async fn logout(mut self) {
        let result = self.call(ApiVersion::V2, LOGOUT, &RequestArgs::new()).await;
        self.handshake = None;
        match result {
            Ok(_) => tracing::debug!("Logged out from Pay.nl"),
            Err(e) => tracing::warn!("Logout failed (ignored): {}", e),
        }
    }

    /// Payment profiles active for this website location.
    pub async fn active_payment_profiles(&self) -> Result<PaymentProfiles> {
        let args = RequestArgs::new()
            .with("programId", self.config.program_id())
            .with("websiteId", self.config.website_id())
            .with("websiteLocationId", self.config.website_location_id())
            .with("paymentMethodId", PAYMENT_METHOD_FILTER);

        let result = async {
            let value = self.call(ApiVersion::V1, ACTIVE_PAYMENT_PROFILES, &args).await?;
            PaymentProfiles::from_response(ACTIVE_PAYMENT_PROFILES, value)
        }
        .await;
        self.reported(result)
    }

    /// Status of the payment session the gateway redirected back with.
    pub async fn payment_status(&self, payment_session_id: &str) -> Result<PaymentStatus> {
        let result = async {
            if payment_session_id.len() < MIN_PAYMENT_SESSION_ID_LEN {
                return Err(Error::from(ValidationError::PaymentSessionId));
            }
            let args = RequestArgs::new().with("paymentSessionId", payment_session_id);
            let value = self.call(ApiVersion::V1, STATUS_BY_SESSION, &args).await?;
            PaymentStatus::from_response(STATUS_BY_SESSION, &value)
        }
        .await;
        self.reported(result)
    }

    /// iDEAL issuer banks, in gateway order.
    pub async fn ideal_banks(&self) -> Result<Vec<Bank>> {
        let result = async {
            let value = self.call(ApiVersion::V1, BANKS, &RequestArgs::new()).await?;
            Bank::list_from_response(BANKS, &value)
        }
        .await;
        self.reported(result)
    }

    /// Start a transaction; the result carries the URL to redirect the
    /// customer to.
    pub async fn create_transaction(&self, request: &TransactionRequest) -> Result<TransactionResult> {
        let args = self.transaction_args(request);
        let result = async {
            let value = self.call(ApiVersion::V1, CREATE, &args).await?;
            let record: Record = match value {
                Value::Object(map) if map.contains_key("result") => map,
                _ => return Err(Error::protocol(CREATE, "missing 'result'")),
            };
            if record.get("result").and_then(Value::as_str) == Some("FALSE") {
                return Err(Error::GatewayRejection {
                    status: None,
                    message: "Unable to create new session due to error".to_string(),
                });
            }
            Ok(TransactionResult::from_record(record))
        }
        .await;
        self.reported(result)
    }

    fn transaction_args(&self, request: &TransactionRequest) -> RequestArgs {
        let mut args = request.extra().clone();
        args.set("amount", request.amount())
            .set("programId", self.config.program_id())
            .set("websiteId", self.config.website_id())
            .set("websiteLocationId", self.config.website_location_id())
            .set("paymentProfileId", request.payment_profile_id())
            .set("ipAddress", request.ip_address())
            .set("orderReturnUrl", request.return_url().unwrap_or_default());

        if self.config.test_mode() {
            tracing::debug!("Testmode has been started");
            args.set("testMode", "1");
        }
        if let Some(bank_id) = request.bank_id() {
            args.set("bankId", bank_id);
        }
        if let Some(reference) = request.external_order() {
            args.set("object", reference);
            if !args.contains("orderDesc") {
                args.set("orderDesc", format!("Order {}", reference));
            }
        }
        if let Some(url) = request.exchange_url().filter(|u| u.len() > 5) {
            args.set("orderExchangeUrl", url);
        }
        args
    }

    async fn login(&self) -> Result<Handshake> {
        let timestamp = chrono::Utc::now().timestamp();
        let args = RequestArgs::new()
            .with("accountId", self.config.account_id())
            .with("token", login_token(self.config.token(), timestamp));

        let value = self.call(ApiVersion::V2, LOGIN, &args).await?;
        let raw = value
            .as_object()
            .and_then(|map| map.get("result"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol(LOGIN, "missing 'result'"))?;

        let handshake = Handshake::parse(raw)?;
        tracing::info!(account_id = self.config.account_id(), "Logged in to Pay.nl");
        Ok(handshake)
    }

    /// Request primitive: one GET per attempt, bounded by the retry policy.
    ///
    /// Transport failures and status > 400 without a gateway `error` field
    /// are retried. A status > 400 carrying an `error` field fails at once.
    async fn call(&self, version: ApiVersion, function: &str, args: &RequestArgs) -> Result<Value> {
        let url = endpoint_url(self.config.base_url(), version, function, args);
        if self.config.debug() && function != LOGOUT {
            tracing::debug!(url = %url, "Calling Pay.nl via {}", self.transport.name());
        }

        let request = HttpRequest {
            url,
            credentials: self.handshake.as_ref().map(Handshake::credentials),
            user_agent: format!(
                "PPT Class version {} (for program {})",
                CLASS_VERSION,
                self.config.program_id()
            ),
            timeout: self.config.timeout(),
        };

        let policy = self.config.retry();
        let mut last_error = String::new();

        for attempt in 1..=policy.max_attempts {
            match self.transport.get(&request).await {
                Ok(response) if response.status > 400 => {
                    let (gateway_error, message) = describe_failure(&response.body);
                    if gateway_error {
                        return Err(Error::GatewayRejection {
                            status: Some(response.status),
                            message,
                        });
                    }
                    last_error = format!("{} (HTTP {})", message, response.status);
                }
                Ok(response) => {
                    let value =
                        codec::decode_bytes(&response.body).map_err(|e| Error::codec(function, e))?;
                    if self.config.debug() {
                        tracing::debug!(function = %function, result = %value, "Pay.nl response");
                    }
                    return Ok(value);
                }
                Err(e) => last_error = e.to_string(),
            }

            tracing::warn!(
                attempt,
                max_attempts = policy.max_attempts,
                function = %function,
                error = %last_error,
                "Pay.nl request failed"
            );
            if attempt < policy.max_attempts && !policy.delay.is_zero() {
                tokio::time::sleep(policy.delay).await;
            }
        }

        Err(Error::Transport {
            attempts: policy.max_attempts,
            message: last_error,
        })
    }

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            self.reporter.report(&e.to_string());
        }
        result
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        let Some(handshake) = self.handshake.take() else {
            return;
        };
        let request = HttpRequest {
            url: endpoint_url(
                self.config.base_url(),
                ApiVersion::V2,
                LOGOUT,
                &RequestArgs::new(),
            ),
            credentials: Some(handshake.credentials()),
            user_agent: format!(
                "PPT Class version {} (for program {})",
                CLASS_VERSION,
                self.config.program_id()
            ),
            timeout: self.config.timeout(),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = self.transport.clone();
                handle.spawn(async move {
                    if let Err(e) = transport.get(&request).await {
                        tracing::debug!("Background logout failed (ignored): {}", e);
                    }
                });
            }
            Err(_) => tracing::debug!("Client dropped outside a runtime, session left to expire"),
        }
    }
}

/// One-time login token: hex SHA-1 of the API token followed by the Unix time.
fn login_token(token: &str, timestamp: i64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(token.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns whether the body carried a gateway `error`, and the message to surface.
fn describe_failure(body: &[u8]) -> (bool, String) {
    match codec::decode_bytes(body) {
        Ok(Value::Object(map)) if !map.is_empty() => match map.get("error") {
            Some(Value::String(message)) => (true, message.clone()),
            Some(other) => (true, other.to_string()),
            None => (
                false,
                format!("{} - Unable to retrieve error", UNKNOWN_COMMUNICATIONS_ERROR),
            ),
        },
        _ => (false, UNKNOWN_COMMUNICATIONS_ERROR.to_string()),
    }
}
