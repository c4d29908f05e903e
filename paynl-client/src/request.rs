//! Argument maps and URL assembly for gateway calls.

use std::fmt;

use url::form_urlencoded::byte_serialize;

/// API version segment of the REST path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Scalar(String),
    /// Sent as `key[0]=..&key[1]=..`.
    List(Vec<String>),
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Scalar(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Scalar(value.to_string())
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Scalar(value.to_string())
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(value: Vec<String>) -> Self {
        ArgValue::List(value)
    }
}

/// Ordered argument map.
///
/// Setting an existing key replaces the value in place, so the key keeps its
/// existing position in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestArgs {
    entries: Vec<(String, ArgValue)>,
}

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as a query string without the leading `?`.
    ///
    /// Keys go out verbatim; values are form-urlencoded (space becomes `+`).
    pub fn to_query(&self) -> String {
        let mut parts = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            match value {
                ArgValue::Scalar(v) => parts.push(format!("{}={}", key, encode(v))),
                ArgValue::List(items) => {
                    for (index, v) in items.iter().enumerate() {
                        parts.push(format!("{}[{}]={}", key, index, encode(v)));
                    }
                }
            }
        }
        parts.join("&")
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for RequestArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = RequestArgs::new();
        for (k, v) in iter {
            args.set(k, v);
        }
        args
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// `{base}/{version}/{Namespace/Function}/array_serialize/[?query]`
pub fn endpoint_url(base: &str, version: ApiVersion, function: &str, args: &RequestArgs) -> String {
    let mut url = format!(
        "{}/{}/{}/array_serialize/",
        base.trim_end_matches('/'),
        version,
        function
    );
    if !args.is_empty() {
        url.push('?');
        url.push_str(&args.to_query());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_without_arguments() {
        let url = endpoint_url(
            "https://rest-api.pay.nl/",
            ApiVersion::V1,
            "Transaction/getBanks",
            &RequestArgs::new(),
        );
        assert_eq!(url, "https://rest-api.pay.nl/v1/Transaction/getBanks/array_serialize/");
    }

    #[test]
    fn test_endpoint_url_with_arguments() {
        let args = RequestArgs::new()
            .with("accountId", 42u32)
            .with("token", "abc");
        let url = endpoint_url(
            "https://rest-api.pay.nl",
            ApiVersion::V2,
            "Authentication/loginByToken",
            &args,
        );
        assert_eq!(
            url,
            "https://rest-api.pay.nl/v2/Authentication/loginByToken/array_serialize/?accountId=42&token=abc"
        );
    }

    #[test]
    fn test_list_arguments_are_indexed() {
        let args = RequestArgs::new()
            .with("amount", 1000u64)
            .with(
                "extra",
                vec!["first".to_string(), "second value".to_string()],
            )
            .with("object", "ref-1");
        assert_eq!(
            args.to_query(),
            "amount=1000&extra[0]=first&extra[1]=second+value&object=ref-1"
        );
    }

    #[test]
    fn test_values_are_form_encoded() {
        let args = RequestArgs::new()
            .with("orderReturnUrl", "https://example.org/donate?x=1&y=2")
            .with("orderDesc", "Order 2024/01 €");
        assert_eq!(
            args.to_query(),
            "orderReturnUrl=https%3A%2F%2Fexample.org%2Fdonate%3Fx%3D1%26y%3D2\
             &orderDesc=Order+2024%2F01+%E2%82%AC"
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut args = RequestArgs::new().with("a", "1").with("b", "2");
        args.set("a", "3");
        assert_eq!(args.to_query(), "a=3&b=2");
        assert!(args.contains("b"));
        assert!(!args.contains("c"));
    }

    #[test]
    fn test_collect_from_pairs() {
        let args: RequestArgs = vec![("extra1", "Donation"), ("extra2", "web")]
            .into_iter()
            .collect();
        assert_eq!(args.get("extra1"), Some(&ArgValue::Scalar("Donation".to_string())));
        assert_eq!(args.iter().count(), 2);
    }
}
