//! HTTP transport implementation using reqwest.

use std::time::Duration;

use http::HeaderMap;
use reqwest::blocking::Client;

use crate::error::StreamResult;
use crate::transport::{RangeTransport, TransportResponse};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Total deadline per request including the body, in seconds (default: none).
    pub timeout_secs: Option<u64>,
    /// Connection timeout in seconds (default: 30).
    pub connect_timeout_secs: u64,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            connect_timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Blocking HTTP transport backed by a pooled [`reqwest`] client.
///
/// Each call to [`RangeTransport::get`] is an independent request; the
/// client's connection pool is shared by all workers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> StreamResult<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates a transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_config(config: &HttpConfig) -> StreamResult<Self> {
        let mut client_builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(config.timeout_secs.map(Duration::from_secs));

        if let Some(ref ua) = config.user_agent {
            client_builder = client_builder.user_agent(ua.clone());
        } else {
            client_builder =
                client_builder.user_agent(concat!("rangestream/", env!("CARGO_PKG_VERSION")));
        }

        Ok(Self {
            client: client_builder.build()?,
        })
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl RangeTransport for HttpTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> StreamResult<TransportResponse> {
        let response = self.client.get(url).headers(headers.clone()).send()?;

        Ok(TransportResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HttpConfig::default();
        assert!(config.timeout_secs.is_none());
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn test_builds_with_custom_agent() {
        let config = HttpConfig {
            timeout_secs: Some(5),
            user_agent: Some("test-agent".into()),
            ..Default::default()
        };
        assert!(HttpTransport::with_config(&config).is_ok());
    }
}
