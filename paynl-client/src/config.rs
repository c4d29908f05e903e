//! Merchant configuration for the gateway client.
//!
//! [`ClientSettings`] is the raw, deserializable form (what a config file or
//! environment provides). [`ClientConfig::new`] validates it once; a
//! `ClientConfig` value is therefore always well-formed and never changes
//! after construction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ValidationError;
use crate::validate::{is_email_address, is_http_url, MIN_TOKEN_LEN};

pub const DEFAULT_BASE_URL: &str = "https://rest-api.pay.nl";

/// Raw merchant settings, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    pub program_id: i64,
    pub website_id: i64,
    pub website_location_id: i64,
    pub account_id: i64,
    pub token: String,
    /// Addresses notified about critical errors. Accepts a list or a
    /// comma-separated string.
    #[serde(default, deserialize_with = "string_or_list")]
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per request, the first one included.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    250
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::List(list) => list,
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Bounded retry for the request primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts; the first attempt consumes one unit.
    pub max_attempts: u32,
    /// Fixed pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            delay: Duration::from_millis(default_retry_delay_ms()),
        }
    }
}

/// Validated, immutable merchant configuration.
#[derive(Clone)]
pub struct ClientConfig {
    program_id: u32,
    website_id: u32,
    website_location_id: u32,
    account_id: u32,
    token: String,
    email_addresses: Vec<String>,
    test_mode: bool,
    debug: bool,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClientConfig {
    /// Validate raw settings.
    ///
    /// Fails on the first invalid field; nothing is sent over the network.
    pub fn new(settings: ClientSettings) -> Result<Self, ValidationError> {
        let program_id = non_negative_id(settings.program_id, ValidationError::ProgramId)?;
        let website_id = non_negative_id(settings.website_id, ValidationError::WebsiteId)?;
        let website_location_id = non_negative_id(
            settings.website_location_id,
            ValidationError::WebsiteLocationId,
        )?;

        if settings.email_addresses.is_empty() {
            return Err(ValidationError::EmailAddress(String::new()));
        }
        if let Some(bad) = settings
            .email_addresses
            .iter()
            .find(|addr| !is_email_address(addr))
        {
            return Err(ValidationError::EmailAddress(bad.clone()));
        }

        let account_id = non_negative_id(settings.account_id, ValidationError::AccountId)?;

        if settings.token.len() < MIN_TOKEN_LEN {
            return Err(ValidationError::Token);
        }

        let base_url = settings.base_url.trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(ValidationError::BaseUrl(settings.base_url));
        }

        if settings.retry_attempts == 0 {
            return Err(ValidationError::RetryBudget);
        }

        Ok(Self {
            program_id,
            website_id,
            website_location_id,
            account_id,
            token: settings.token,
            email_addresses: settings.email_addresses,
            test_mode: settings.test_mode,
            debug: settings.debug,
            base_url,
            timeout: Duration::from_secs(settings.timeout_secs),
            retry: RetryPolicy {
                max_attempts: settings.retry_attempts,
                delay: Duration::from_millis(settings.retry_delay_ms),
            },
        })
    }

    pub fn program_id(&self) -> u32 {
        self.program_id
    }

    pub fn website_id(&self) -> u32 {
        self.website_id
    }

    pub fn website_location_id(&self) -> u32 {
        self.website_location_id
    }

    pub fn account_id(&self) -> u32 {
        self.account_id
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub fn email_addresses(&self) -> &[String] {
        &self.email_addresses
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

// The token never ends up in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("program_id", &self.program_id)
            .field("website_id", &self.website_id)
            .field("website_location_id", &self.website_location_id)
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .field("email_addresses", &self.email_addresses)
            .field("test_mode", &self.test_mode)
            .field("debug", &self.debug)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

fn non_negative_id(value: i64, err: ValidationError) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| err)
}
