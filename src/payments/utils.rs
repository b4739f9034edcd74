use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// How a request authenticates against the provider.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    Basic { username: &'a str, password: &'a str },
    Bearer(&'a str),
}

/// A provider response that made it back over the wire, successful or not.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Thin reqwest wrapper shared by provider integrations. One attempt per call.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, timeout })
    }

    /// Send a request and hand back status and body. Only transport failures are errors.
    pub async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Option<Auth<'_>>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<RawResponse> {
        let mut request = self.client.request(method, url).timeout(self.timeout);

        match auth {
            Some(Auth::Basic { username, password }) => {
                request = request.basic_auth(username, Some(password));
            }
            Some(Auth::Bearer(token)) => {
                request = request.bearer_auth(token);
            }
            None => {}
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "provider request failed");
            PaymentError::NetworkError {
                message: format!("provider request failed: {}", e),
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            warn!(url = %url, status, error = %e, "provider response body could not be read");
            PaymentError::NetworkError {
                message: format!("reading provider response failed: {}", e),
            }
        })?;
        Ok(RawResponse { status, body })
    }
}
