//! Client configuration.

use crate::classifier::{NotFoundRegistry, NotFoundSignature};
use std::time::Duration;
use url::Url;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://api.xero.com/api.xro/2.0";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("xero-http/", env!("CARGO_PKG_VERSION"));

/// Xero client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) api_host: String,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: String,
    pub(crate) access_token: Option<String>,
    pub(crate) tenant_id: Option<String>,
    pub(crate) not_found: NotFoundRegistry,
}

impl Config {
    /// Get the API host.
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Get the bearer token sent with every request, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Get the `xero-tenant-id` sent with every request, if any.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Get the 404 signatures used when classifying responses.
    pub fn not_found_registry(&self) -> &NotFoundRegistry {
        &self.not_found
    }
}

/// Builder for the Xero client.
#[derive(Debug, Default)]
pub struct XeroBuilder {
    api_host: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    access_token: Option<String>,
    tenant_id: Option<String>,
    not_found: Option<NotFoundRegistry>,
}

impl XeroBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API host.
    pub fn api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set an already-acquired OAuth2 access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the tenant (organisation) id.
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Replace the 404 signature table.
    pub fn not_found_registry(mut self, registry: NotFoundRegistry) -> Self {
        self.not_found = Some(registry);
        self
    }

    /// Add a 404 signature on top of the current table.
    pub fn not_found_signature(mut self, signature: NotFoundSignature) -> Self {
        let registry = self.not_found.take().unwrap_or_default();
        self.not_found = Some(registry.register(signature));
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(self) -> Result<Config, crate::Error> {
        let api_host = self.api_host.unwrap_or_else(|| DEFAULT_API_HOST.into());
        let url = Url::parse(&api_host)
            .map_err(|e| crate::Error::Config(format!("invalid api_host {api_host:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(crate::Error::Config(format!(
                "api_host must be http or https, got {}",
                url.scheme()
            )));
        }

        if matches!(self.access_token.as_deref(), Some("")) {
            return Err(crate::Error::Config("access_token cannot be empty".into()));
        }
        if matches!(self.tenant_id.as_deref(), Some("")) {
            return Err(crate::Error::Config("tenant_id cannot be empty".into()));
        }

        Ok(Config {
            api_host: api_host.trim_end_matches('/').to_string(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            access_token: self.access_token,
            tenant_id: self.tenant_id,
            not_found: self.not_found.unwrap_or_default(),
        })
    }
}
