//! Field validators shared by the configuration and request builders.

use std::sync::LazyLock;

use regex::Regex;

pub const MIN_TOKEN_LEN: usize = 10;
pub const MIN_HANDSHAKE_LEN: usize = 10;
pub const MAX_EXTERNAL_ORDER_LEN: usize = 25;
pub const MIN_PAYMENT_SESSION_ID_LEN: usize = 5;

static MAILBOX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[_a-z0-9-]+(\.[_a-z0-9-]+)*@[a-z0-9-]+(\.[a-z0-9-]+)*(\.[a-z]{2,3})$")
        .map_err(|e| tracing::error!("Invalid mailbox regex: {}", e))
        .ok()
});

static HTTP_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://[a-z0-9-]+(\.[a-z0-9-]+)*(:[0-9]+)?(/.*)?$")
        .map_err(|e| tracing::error!("Invalid url regex: {}", e))
        .ok()
});

/// Lower-case mailbox check, as the gateway's notification service accepts it.
pub fn is_email_address(value: &str) -> bool {
    MAILBOX.as_ref().is_some_and(|re| re.is_match(value))
}

/// `http(s)://host[:port][/path]`
pub fn is_http_url(value: &str) -> bool {
    HTTP_URL.as_ref().is_some_and(|re| re.is_match(value))
}
