//! REST sink backed by a blocking `reqwest` client.

use super::{HttpMethod, MetadataRequest, MetadataSink};
use crate::{Error, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

/// Sends metadata requests to `<base_url>/api/<entity>`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    base_url: String,
}

impl HttpSink {
    /// # Errors
    /// Returns [`Error::InvalidInput`] for a base URL without an http(s)
    /// scheme, or [`Error::Request`] if the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "metadata backend URL must start with http:// or https://: '{base_url}'"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &MetadataRequest) -> String {
        format!("{}{}", self.base_url, request.endpoint())
    }
}

impl MetadataSink for HttpSink {
    fn send(&self, request: &MetadataRequest) -> Result<Value> {
        let url = self.url_for(request);
        log::debug!("{} {url}", request.method());

        let builder = match request.method() {
            HttpMethod::Get => self.client.get(&url).query(request.params()),
            HttpMethod::Post => {
                let body = request.body().cloned().unwrap_or(Value::Null);
                self.client.post(&url).json(&body)
            }
        };

        let response = builder.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::Connection(format!("{url}: {e}"))
            } else {
                Error::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("{} {url} answered {status}", request.method());
            return Err(Error::Request(format!(
                "{} {url} answered {status}",
                request.method()
            )));
        }

        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Request(format!("invalid JSON from {url}: {e}")))
    }
}
