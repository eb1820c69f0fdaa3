//! HTTP transport that runs every response through the classifier.

use crate::classifier::ResponseClassifier;
use crate::config::Config;
use crate::Error;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use tracing::{debug, warn};

const XML: &str = "application/xml";
const TENANT_HEADER: &str = "xero-tenant-id";

/// HTTP transport for the Xero API.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_host: String,
    classifier: ResponseClassifier,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .build()?;

        Ok(Self {
            client,
            api_host: config.api_host().to_string(),
            classifier: ResponseClassifier::new(config.not_found_registry().clone()),
        })
    }

    /// Full URL for an API path such as `Invoices`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_host, path.trim_start_matches('/'))
    }

    /// Send a request and classify the response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<Vec<u8>, Error> {
        let endpoint = self.endpoint(path);
        debug!(method = %method, endpoint = %endpoint, "sending request");

        let mut request = self.client.request(method, &endpoint);
        if let Some(xml) = body {
            request = request.header(CONTENT_TYPE, XML).body(xml);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        match self.classifier.classify(status, &headers, &body, &endpoint) {
            Ok(body) => {
                debug!(status, bytes = body.len(), "request succeeded");
                Ok(body)
            }
            Err(error) => {
                warn!(status, endpoint = %endpoint, error = %error, "API request failed");
                Err(error.into())
            }
        }
    }
}

fn default_headers(config: &Config) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(XML));
    headers.insert(USER_AGENT, header_value("user_agent", config.user_agent())?);

    if let Some(token) = config.access_token() {
        let mut value = header_value("access_token", &format!("Bearer {token}"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    if let Some(tenant_id) = config.tenant_id() {
        headers.insert(TENANT_HEADER, header_value("tenant_id", tenant_id)?);
    }

    Ok(headers)
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config(format!("{field} is not a valid header value")))
}
