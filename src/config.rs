//! Client configuration: credentials and endpoint selection.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Production endpoint of the Off-Amazon Payments service.
pub const PRODUCTION_URL: &str = "https://mws.amazonservices.com/OffAmazonPayments/2013-01-01";
/// Sandbox endpoint of the Off-Amazon Payments service.
pub const SANDBOX_URL: &str = "https://mws.amazonservices.com/OffAmazonPayments_Sandbox/2013-01-01";

/// Credentials and endpoint selection, captured once per client instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MWS seller (merchant) id
    pub seller_id: String,

    /// AWS access key id
    pub access_key: String,

    /// AWS secret key used as the HMAC signing key
    pub secret_key: String,

    /// Use the sandbox endpoint instead of production
    #[serde(default)]
    pub sandbox: bool,
}

impl Config {
    /// Creates a configuration from its four required parts.
    pub fn new(
        seller_id: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        sandbox: bool,
    ) -> Self {
        Self {
            seller_id: seller_id.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            sandbox,
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration from MWS_SELLER_ID, MWS_ACCESS_KEY,
    /// MWS_SECRET_KEY, and MWS_SANDBOX.
    ///
    /// MWS_SANDBOX accepts the same truthy values as the CLI flag
    /// (`1`/`t`/`true`/`y`/`yes`, case-insensitive); anything else, or an
    /// unset variable, selects production.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).with_context(|| format!("Missing environment variable: {name}"))
        };

        let sandbox = std::env::var("MWS_SANDBOX")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "t" | "true" | "y" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            seller_id: var("MWS_SELLER_ID")?,
            access_key: var("MWS_ACCESS_KEY")?,
            secret_key: var("MWS_SECRET_KEY")?,
            sandbox,
        })
    }

    /// Returns the service endpoint the sandbox flag selects.
    pub fn service_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_URL
        } else {
            PRODUCTION_URL
        }
    }
}
