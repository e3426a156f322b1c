//! HTTP transport seam for webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::DeliveryError;

/// Header carrying the hex-encoded HMAC-SHA256 envelope signature.
pub const SIGNATURE_HEADER: &str = "x-amp-signature";

/// Header naming the event, so receivers can route before parsing.
pub const EVENT_HEADER: &str = "x-amp-event";

/// Posts webhook payloads. Abstracted so delivery logic is testable
/// without a network and swappable for instrumented clients.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `body` as JSON to `url` with the given extra headers.
    /// Returns the HTTP status code on any completed exchange;
    /// transport failures and timeouts are errors.
    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &[u8],
    ) -> std::result::Result<u16, DeliveryError>;
}

/// reqwest-backed transport with a per-attempt timeout.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &[u8],
    ) -> std::result::Result<u16, DeliveryError> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_vec())
            .timeout(self.timeout);

        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        Ok(response.status().as_u16())
    }
}
