//! HTTP layer for the Xero accounting API.
//!
//! Every response is classified into either the raw success body or a
//! specific [`ApiError`]: XML API faults, entity not-found errors, the
//! OAuth problem reports carried on 401/503 responses, and 429 rate limits.
//!
//! # Example
//!
//! ```rust,no_run
//! use xero_http::{ApiError, Xero};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xero_http::Error> {
//!     let client = Xero::builder()
//!         .access_token("eyJhbGciOi...")
//!         .tenant_id("tenant-id")
//!         .build()?;
//!
//!     match client.get("Invoices").await {
//!         Ok(xml) => println!("{}", String::from_utf8_lossy(&xml)),
//!         Err(err) => match err.api() {
//!             Some(ApiError::RateLimitExceeded { .. }) => {
//!                 println!("retry in {:?}", err.api().and_then(ApiError::retry_after));
//!             }
//!             _ => return Err(err),
//!         },
//!     }
//!
//!     Ok(())
//! }
//! ```

mod classifier;
mod config;
mod error;
pub mod parser;
mod transport;

pub(crate) use transport::HttpTransport;

pub use classifier::{
    classify, NotFoundRegistry, NotFoundSignature, Outcome, ResponseClassifier,
    NONCE_USED, RATE_LIMIT_ADVICE, UNEXPECTED_TOKEN,
};
pub use config::{Config, XeroBuilder, DEFAULT_API_HOST, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use error::{ApiError, Error};

use reqwest::Method;

/// Xero API client.
#[derive(Debug)]
pub struct Xero {
    config: Config,
    transport: HttpTransport,
}

impl Xero {
    /// Create a new builder.
    pub fn builder() -> XeroBuilder {
        XeroBuilder::new()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        self.transport.endpoint(path)
    }

    /// GET an API path, e.g. `Invoices`.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, Error> {
        self.transport.send(Method::GET, path, None).await
    }

    /// PUT an XML document to an API path.
    pub async fn put(&self, path: &str, xml: impl Into<String>) -> Result<Vec<u8>, Error> {
        self.transport.send(Method::PUT, path, Some(xml.into())).await
    }

    /// POST an XML document to an API path.
    pub async fn post(&self, path: &str, xml: impl Into<String>) -> Result<Vec<u8>, Error> {
        self.transport.send(Method::POST, path, Some(xml.into())).await
    }
}

impl XeroBuilder {
    /// Build the Xero client.
    pub fn build(self) -> Result<Xero, Error> {
        let config = self.build_config()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Xero { config, transport })
    }
}
