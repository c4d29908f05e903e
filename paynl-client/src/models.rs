//! Request and response types for gateway operations.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result, ValidationError};
use crate::request::{ArgValue, RequestArgs};
use crate::validate::{is_http_url, MAX_EXTERNAL_ORDER_LEN};

/// Flat decoded gateway map.
pub type Record = Map<String, Value>;

/// Payment method id of iDEAL, the redirect-bank method.
pub const IDEAL_PAYMENT_METHOD_ID: &str = "10";

/// Payment profile id that needs a bank selection before redirecting.
pub const IDEAL_PAYMENT_PROFILE_ID: u32 = 10;

/// Payment method filter sent with `getActivePaymentProfiles`.
pub const PAYMENT_METHOD_FILTER: u32 = 4;

const DEFAULT_IP_ADDRESS: &str = "127.0.0.1";

// ============================================================================
// Transaction creation
// ============================================================================

/// Validated input for `Transaction/create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    amount: u64,
    payment_profile_id: u32,
    bank_id: Option<u32>,
    external_order: Option<String>,
    exchange_url: Option<String>,
    return_url: Option<String>,
    ip_address: String,
    extra: RequestArgs,
}

impl TransactionRequest {
    /// Start a request for `amount` minor currency units (cents).
    pub fn builder(amount: i64, payment_profile_id: i64) -> TransactionRequestBuilder {
        TransactionRequestBuilder {
            amount,
            payment_profile_id,
            bank_id: None,
            external_order: None,
            exchange_url: None,
            return_url: None,
            ip_address: None,
            extra: RequestArgs::new(),
        }
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn payment_profile_id(&self) -> u32 {
        self.payment_profile_id
    }

    pub fn bank_id(&self) -> Option<u32> {
        self.bank_id
    }

    pub fn external_order(&self) -> Option<&str> {
        self.external_order.as_deref()
    }

    pub fn exchange_url(&self) -> Option<&str> {
        self.exchange_url.as_deref()
    }

    pub fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn extra(&self) -> &RequestArgs {
        &self.extra
    }
}

/// Collects transaction fields; everything is checked in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TransactionRequestBuilder {
    amount: i64,
    payment_profile_id: i64,
    bank_id: Option<i64>,
    external_order: Option<String>,
    exchange_url: Option<String>,
    return_url: Option<String>,
    ip_address: Option<String>,
    extra: RequestArgs,
}

impl TransactionRequestBuilder {
    pub fn bank_id(mut self, bank_id: i64) -> Self {
        self.bank_id = Some(bank_id);
        self
    }

    /// Merchant-side order reference, at most 25 characters. Empty means none.
    pub fn external_order(mut self, reference: impl Into<String>) -> Self {
        self.external_order = Some(reference.into());
        self
    }

    pub fn exchange_url(mut self, url: impl Into<String>) -> Self {
        self.exchange_url = Some(url.into());
        self
    }

    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Pass-through setting, e.g. `extra1` or `orderDesc`.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.extra.set(key, value);
        self
    }

    pub fn build(self) -> std::result::Result<TransactionRequest, ValidationError> {
        if self.amount <= 0 {
            return Err(ValidationError::Amount);
        }
        let amount = self.amount as u64;

        let payment_profile_id = u32::try_from(self.payment_profile_id)
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ValidationError::PaymentProfileId)?;

        let bank_id = self
            .bank_id
            .map(|id| u32::try_from(id).map_err(|_| ValidationError::BankId))
            .transpose()?;
        if payment_profile_id == IDEAL_PAYMENT_PROFILE_ID && bank_id.is_none() {
            return Err(ValidationError::MissingBankId(payment_profile_id));
        }

        let external_order = self.external_order.filter(|r| !r.is_empty());
        if let Some(ref reference) = external_order {
            if reference.chars().count() > MAX_EXTERNAL_ORDER_LEN {
                return Err(ValidationError::ExternalOrder {
                    max: MAX_EXTERNAL_ORDER_LEN,
                });
            }
        }

        if let Some(ref url) = self.exchange_url {
            if !is_http_url(url) {
                return Err(ValidationError::ExchangeUrl(url.clone()));
            }
        }
        if let Some(ref url) = self.return_url {
            if !is_http_url(url) {
                return Err(ValidationError::ReturnUrl(url.clone()));
            }
        }

        Ok(TransactionRequest {
            amount,
            payment_profile_id,
            bank_id,
            external_order,
            exchange_url: self.exchange_url,
            return_url: self.return_url,
            ip_address: self
                .ip_address
                .filter(|ip| !ip.is_empty())
                .unwrap_or_else(|| DEFAULT_IP_ADDRESS.to_string()),
            extra: self.extra,
        })
    }
}

/// What `Transaction/create` hands back, minus its internal fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransactionResult {
    fields: Record,
}

impl TransactionResult {
    /// Fields stripped before the result reaches the caller.
    pub const INTERNAL_FIELDS: [&'static str; 2] = ["entranceCode", "result"];

    pub(crate) fn from_record(mut fields: Record) -> Self {
        for key in Self::INTERNAL_FIELDS {
            fields.remove(key);
        }
        Self { fields }
    }

    /// Where the customer's browser must go to complete the payment.
    pub fn issuer_url(&self) -> Option<&str> {
        self.fields.get("issuerUrl").and_then(Value::as_str)
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.fields
            .get("transactionId")
            .or_else(|| self.fields.get("paymentSessionId"))
            .and_then(scalar_to_string)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn into_fields(self) -> Record {
        self.fields
    }
}

// ============================================================================
// Status lookups
// ============================================================================

/// Status of a payment session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatus {
    pub status: String,
    pub amount: Option<i64>,
    pub stats_added: Option<String>,
    /// Customer details, when the gateway includes them.
    pub customer: Record,
}

impl PaymentStatus {
    pub const PAID: &'static str = "PAID";

    pub(crate) fn from_response(function: &str, value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::protocol(function, "response is not an array"))?;
        if !map.contains_key("result") {
            return Err(Error::protocol(function, "missing 'result'"));
        }
        let status = map
            .get("statusAction")
            .and_then(scalar_to_string)
            .ok_or_else(|| Error::protocol(function, "missing 'statusAction'"))?;

        Ok(Self {
            status,
            amount: map.get("amount").and_then(scalar_to_i64),
            stats_added: map.get("statsAdded").and_then(scalar_to_string),
            customer: map
                .get("customer")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn is_paid(&self) -> bool {
        self.status == Self::PAID
    }

    /// One flat map: `status`, `amount`, `statsAdded`, then customer fields.
    ///
    /// Customer fields never overwrite the three status keys.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("status".to_string(), Value::String(self.status.clone()));
        record.insert(
            "amount".to_string(),
            self.amount.map(Value::from).unwrap_or(Value::Null),
        );
        record.insert(
            "statsAdded".to_string(),
            self.stats_added
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        for (key, value) in &self.customer {
            if !record.contains_key(key) {
                record.insert(key.clone(), value.clone());
            }
        }
        record
    }
}

// ============================================================================
// Reference data
// ============================================================================

/// An iDEAL issuer bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bank {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
}

impl Bank {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            id: map.get("id").and_then(scalar_to_string)?,
            name: map
                .get("name")
                .and_then(scalar_to_string)
                .unwrap_or_default(),
            icon: map.get("icon").and_then(scalar_to_string),
        })
    }

    pub(crate) fn list_from_response(function: &str, value: &Value) -> Result<Vec<Self>> {
        let entries = value
            .as_object()
            .ok_or_else(|| Error::protocol(function, "response is not an array"))?;
        entries
            .values()
            .map(|entry| {
                Bank::from_value(entry)
                    .ok_or_else(|| Error::protocol(function, "bank entry without 'id'"))
            })
            .collect()
    }
}

/// Active payment profiles of a website location, as the gateway nests them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PaymentProfiles(Value);

impl PaymentProfiles {
    pub(crate) fn from_response(function: &str, value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::protocol(function, "response is not an array"));
        }
        Ok(Self(value))
    }

    /// Whether a bank list must be offered: true iff the iDEAL payment method
    /// id appears anywhere in the structure, nested maps included.
    pub fn offers_bank_selection(&self) -> bool {
        contains_value(&self.0, IDEAL_PAYMENT_METHOD_ID)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for PaymentProfiles {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// Compares scalars by their text. Booleans become "1" or "", so a `true` flag
// never matches an id the way a loose PHP comparison would.
fn contains_value(haystack: &Value, needle: &str) -> bool {
    match haystack {
        Value::Object(map) => map.values().any(|v| contains_value(v, needle)),
        Value::Array(items) => items.iter().any(|v| contains_value(v, needle)),
        other => scalar_to_string(other).as_deref() == Some(needle),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "" }.to_string()),
        _ => None,
    }
}

fn scalar_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let request = TransactionRequest::builder(1000, 5).build().unwrap();
        assert_eq!(request.amount(), 1000);
        assert_eq!(request.payment_profile_id(), 5);
        assert_eq!(request.bank_id(), None);
        assert_eq!(request.ip_address(), "127.0.0.1");
        assert!(request.extra().is_empty());
    }

    #[test]
    fn test_builder_rejects_non_positive_amount() {
        for amount in [0, -1, -1000] {
            assert_eq!(
                TransactionRequest::builder(amount, 5).build().unwrap_err(),
                ValidationError::Amount
            );
        }
    }

    #[test]
    fn test_builder_rejects_invalid_profile() {
        assert_eq!(
            TransactionRequest::builder(1000, 0).build().unwrap_err(),
            ValidationError::PaymentProfileId
        );
        assert_eq!(
            TransactionRequest::builder(1000, -3).build().unwrap_err(),
            ValidationError::PaymentProfileId
        );
    }

    #[test]
    fn test_external_order_length_limit() {
        let exactly_25 = "A".repeat(25);
        let request = TransactionRequest::builder(1000, 5)
            .external_order(exactly_25.clone())
            .build()
            .unwrap();
        assert_eq!(request.external_order(), Some(exactly_25.as_str()));

        let err = TransactionRequest::builder(1000, 5)
            .external_order("A".repeat(26))
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::ExternalOrder { max: 25 });
    }

    #[test]
    fn test_empty_external_order_is_absent() {
        let request = TransactionRequest::builder(1000, 5)
            .external_order("")
            .build()
            .unwrap();
        assert_eq!(request.external_order(), None);
    }

    #[test]
    fn test_urls_must_be_http() {
        let err = TransactionRequest::builder(1000, 5)
            .exchange_url("ftp://example.org/exchange")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::ExchangeUrl(_)));

        let err = TransactionRequest::builder(1000, 5)
            .return_url("javascript:alert(1)")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::ReturnUrl(_)));

        let request = TransactionRequest::builder(1000, 5)
            .exchange_url("https://example.org/exchange")
            .return_url("https://example.org:8443/thanks")
            .build()
            .unwrap();
        assert_eq!(request.return_url(), Some("https://example.org:8443/thanks"));
    }

    #[test]
    fn test_ideal_profile_requires_bank() {
        let err = TransactionRequest::builder(1000, 10).build().unwrap_err();
        assert_eq!(err, ValidationError::MissingBankId(10));

        let request = TransactionRequest::builder(1000, 10)
            .bank_id(1)
            .build()
            .unwrap();
        assert_eq!(request.bank_id(), Some(1));

        assert_eq!(
            TransactionRequest::builder(1000, 10)
                .bank_id(-1)
                .build()
                .unwrap_err(),
            ValidationError::BankId
        );
    }

    #[test]
    fn test_transaction_result_strips_internal_fields() {
        let record = json!({
            "result": "OK",
            "issuerUrl": "https://pay.example/x",
            "entranceCode": "E1",
            "transactionId": "1234567X",
        })
        .as_object()
        .cloned()
        .unwrap();
        let result = TransactionResult::from_record(record);
        assert_eq!(result.issuer_url(), Some("https://pay.example/x"));
        assert_eq!(result.transaction_id().as_deref(), Some("1234567X"));
        assert!(result.get("result").is_none());
        assert!(result.get("entranceCode").is_none());
    }

    #[test]
    fn test_payment_status_merges_customer_without_overwriting() {
        let value = json!({
            "result": "1",
            "statusAction": "PAID",
            "amount": "1000",
            "statsAdded": "2013-05-01 12:00:00",
            "customer": {
                "status": "should-not-win",
                "amount": 1,
                "name": "J. Jansen",
                "email": "jansen@example.org",
            },
        });
        let status =
            PaymentStatus::from_response("Transaction/getStatusByPaymentSessionId", &value)
                .unwrap();
        assert!(status.is_paid());
        assert_eq!(status.amount, Some(1000));

        let record = status.to_record();
        assert_eq!(record["status"], "PAID");
        assert_eq!(record["amount"], 1000);
        assert_eq!(record["statsAdded"], "2013-05-01 12:00:00");
        assert_eq!(record["name"], "J. Jansen");
        assert_eq!(record["email"], "jansen@example.org");
    }

    #[test]
    fn test_payment_status_without_customer() {
        let value = json!({"result": "1", "statusAction": "CANCEL", "amount": 250});
        let status = PaymentStatus::from_response("f", &value).unwrap();
        assert!(!status.is_paid());
        assert!(status.customer.is_empty());
        assert_eq!(status.to_record().len(), 3);
    }

    #[test]
    fn test_payment_status_requires_result_key() {
        let value = json!({"statusAction": "PAID"});
        assert!(matches!(
            PaymentStatus::from_response("f", &value),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_bank_list_preserves_order() {
        let value = json!({
            "0": {"id": "1", "name": "ABN Amro", "icon": "https://static.example/abn.png"},
            "1": {"id": 2, "name": "ING"},
        });
        let banks = Bank::list_from_response("Transaction/getBanks", &value).unwrap();
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].name, "ABN Amro");
        assert_eq!(banks[1].id, "2");
        assert_eq!(banks[1].icon, None);
    }

    #[test]
    fn test_bank_list_must_be_list_shaped() {
        assert!(Bank::list_from_response("f", &json!("FALSE")).is_err());
        assert!(Bank::list_from_response("f", &json!({"0": {"name": "no id"}})).is_err());
    }

    #[test]
    fn test_bank_selection_detected_in_nested_profiles() {
        let nested = PaymentProfiles::from(json!({
            "0": {
                "id": "1",
                "name": "Bank transfer",
                "paymentMethod": {"id": "4", "options": {"method": "10"}},
            },
        }));
        assert!(nested.offers_bank_selection());

        let numeric = PaymentProfiles::from(json!({"0": {"paymentMethodId": 10}}));
        assert!(numeric.offers_bank_selection());
    }

    #[test]
    fn test_bank_selection_absent() {
        let profiles = PaymentProfiles::from(json!({
            "0": {"id": "136", "paymentMethodId": "4", "name": "Overboeking 10 dagen"},
            "1": {"id": "100", "paymentMethodId": "11"},
        }));
        assert!(!profiles.offers_bank_selection());
        assert!(!PaymentProfiles::from(json!({})).offers_bank_selection());
    }

    #[test]
    fn test_bank_selection_ignores_boolean_flags() {
        let profiles = PaymentProfiles::from(json!({
            "0": {"id": "613", "name": "PayPal", "active": true},
        }));
        assert!(!profiles.offers_bank_selection());
    }
}
