//! HTTP transport shared by providers and address sources
//!
//! Requests advertise gzip and the body is run through
//! [`decode_body`](crate::decoder::decode_body) before being returned, so
//! callers always receive plain bytes ready for [`JsonView`](crate::decoder::JsonView).

use crate::decoder::decode_body;
use crate::error::{Error, Result};
use reqwest::header::ACCEPT_ENCODING;
use serde::Serialize;
use std::time::Duration;

/// Client-level timeout; bounds how long an abandoned worker can linger
pub const BACKSTOP_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin reqwest wrapper that maps failures onto the error taxonomy
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Label used in provider errors (e.g., "dnspod")
    name: &'static str,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given user agent
    pub fn new(name: &'static str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BACKSTOP_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { name, client })
    }

    /// GET `url`, returning the decoded body
    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(transport = self.name, "GET {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, "gzip")
            .send()
            .await?;
        self.read_body(response).await
    }

    /// POST a form-encoded body to `url`, returning the decoded body
    pub async fn post_form<F>(&self, url: &str, form: &F) -> Result<Vec<u8>>
    where
        F: Serialize + ?Sized,
    {
        tracing::debug!(transport = self.name, "POST {}", url);
        let response = self
            .client
            .post(url)
            .header(ACCEPT_ENCODING, "gzip")
            .form(form)
            .send()
            .await?;
        self.read_body(response).await
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                self.name,
                format!("HTTP status {}", status),
            ));
        }

        let body = response.bytes().await?;
        Ok(decode_body(body.to_vec())?)
    }
}
