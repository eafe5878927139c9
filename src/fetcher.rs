//! Relay fetcher: one HTTP GET, optionally routed through a relay endpoint.
//!
//! A relay receives the real target as a typed [`RelayRequest`] serialized into
//! its query string (`?url=<target>&headers=<json>`) and performs the fetch on our
//! behalf. No retry happens here; callers decide.

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::utils::upgrade_to_https;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// A relay endpoint
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Relay(Url);

impl Relay {
    /// Parse a relay endpoint URL
    pub fn parse(endpoint: &str) -> std::result::Result<Self, FetchError> {
        Url::parse(endpoint)
            .map(Relay)
            .map_err(|e| FetchError::InvalidUrl {
                url: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// Endpoint URL
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// The request a relay performs on our behalf
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    /// Target URL
    pub url: String,
    /// Headers the relay attaches to the target request
    pub headers: BTreeMap<String, String>,
}

impl RelayRequest {
    /// Relay endpoint URL carrying this request in its query string
    pub fn to_relay_url(&self, relay: &Relay) -> Url {
        // A map of strings always serializes
        let headers = serde_json::to_string(&self.headers).unwrap_or_else(|_| "{}".to_string());
        let mut url = relay.0.clone();
        url.query_pairs_mut()
            .append_pair("url", &self.url)
            .append_pair("headers", &headers);
        url
    }
}

/// Per-request options
#[derive(Clone, Copy, Debug)]
pub struct FetchOptions {
    /// Attach the configured credential headers
    pub credentialed: bool,
    /// Whole-request timeout, body included
    pub timeout: Duration,
}

/// Response of a successful fetch
#[derive(Clone, Debug, Default)]
pub struct Fetched {
    /// Response body
    pub body: Vec<u8>,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
}

impl Fetched {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Abstraction over HTTP fetching, enabling testability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, through `relay` when given
    async fn fetch(
        &self,
        url: &str,
        relay: Option<&Relay>,
        options: FetchOptions,
    ) -> std::result::Result<Fetched, FetchError>;
}

/// Production [`Fetcher`] backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
    upgrade_insecure: bool,
    credential_headers: BTreeMap<String, String>,
}

impl HttpFetcher {
    /// Build a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build().map_err(|e| Error::Config {
            message: format!("failed to build HTTP client: {e}"),
            key: Some("fetch.user_agent".to_string()),
        })?;
        Ok(Self {
            client,
            upgrade_insecure: config.upgrade_insecure,
            credential_headers: config.credential_headers.clone(),
        })
    }

    /// Final request URL and the headers to send directly
    fn plan(
        &self,
        url: &str,
        relay: Option<&Relay>,
        credentialed: bool,
    ) -> std::result::Result<(Url, BTreeMap<String, String>), FetchError> {
        let target = if self.upgrade_insecure {
            upgrade_to_https(url)
        } else {
            url.into()
        };
        let target = Url::parse(&target).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let headers = if credentialed {
            self.credential_headers.clone()
        } else {
            BTreeMap::new()
        };

        Ok(match relay {
            Some(relay) => {
                let request = RelayRequest {
                    url: target.into(),
                    headers,
                };
                (request.to_relay_url(relay), BTreeMap::new())
            }
            None => (target, headers),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        relay: Option<&Relay>,
        options: FetchOptions,
    ) -> std::result::Result<Fetched, FetchError> {
        let (request_url, headers) = self.plan(url, relay, options.credentialed)?;

        let mut request = self
            .client
            .get(request_url.clone())
            .timeout(options.timeout);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let transport = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout: options.timeout,
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let exchange = async {
            let response = request.send().await.map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await.map_err(transport)?;
            Ok(Fetched {
                body: body.to_vec(),
                content_type,
            })
        };

        match tokio::time::timeout(options.timeout, exchange).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::debug!(url = %url, relay = ?relay.map(Relay::to_string), error = %e, "fetch failed");
                }
                result
            }
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: options.timeout,
            }),
        }
    }
}
