//! Configuration for the donation flow.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use paynl_client::{ClientConfig, ClientSettings, ValidationError};
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Merchant identifiers and client tuning for the Pay.nl API.
    pub gateway: ClientSettings,
    #[serde(default)]
    pub widget: WidgetConfig,
}

/// What the donation form says and where the gateway reports back.
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetConfig {
    /// Sent along with each transaction as `extra1`.
    #[serde(default = "default_description")]
    pub description: String,
    /// Server-to-server status callback. When unset the URL registered with
    /// Pay.nl is used.
    #[serde(default)]
    pub exchange_url: Option<String>,
    #[serde(default = "default_thanks")]
    pub thanks: String,
    #[serde(default = "default_sorry")]
    pub sorry: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            description: default_description(),
            exchange_url: None,
            thanks: default_thanks(),
            sorry: default_sorry(),
        }
    }
}

// Default values
fn default_description() -> String {
    "Donation".to_string()
}
fn default_thanks() -> String {
    "Thank you for your donation!".to_string()
}
fn default_sorry() -> String {
    "Sorry, your donation was not completed.".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (DONATE__SECTION__KEY format)
    /// 2. donate.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("widget.description", default_description())?
            .set_default("widget.thanks", default_thanks())?
            .set_default("widget.sorry", default_sorry())?
            .add_source(File::with_name("donate").required(false))
            .add_source(
                Environment::with_prefix("DONATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validated client configuration; fails before any network call.
    pub fn client_config(&self) -> Result<ClientConfig, ValidationError> {
        ClientConfig::new(self.gateway.clone())
    }
}
