use crate::config::MpesaConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::StkPushGateway;
use crate::payments::types::{AccessTokenResponse, StkPushRequest};
use crate::payments::utils::{Auth, PaymentHttpClient, RawResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

pub const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
pub const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";

/// Safaricom Daraja client.
pub struct MpesaProvider {
    config: MpesaConfig,
    http: PaymentHttpClient,
}

impl MpesaProvider {
    pub fn new(config: MpesaConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl StkPushGateway for MpesaProvider {
    async fn fetch_access_token(&self) -> PaymentResult<String> {
        let response = self
            .http
            .send(
                reqwest::Method::GET,
                &self.endpoint(TOKEN_PATH),
                Some(Auth::Basic {
                    username: &self.config.consumer_key,
                    password: &self.config.consumer_secret,
                }),
                None,
            )
            .await
            .map_err(|e| PaymentError::AuthError {
                message: e.to_string(),
                status: None,
            })?;

        if !response.is_success() {
            warn!(status = response.status, "mpesa token endpoint rejected credentials");
            return Err(PaymentError::AuthError {
                message: format!("HTTP {}: {}", response.status, response.body),
                status: Some(response.status),
            });
        }

        let token: AccessTokenResponse =
            serde_json::from_str(&response.body).map_err(|e| PaymentError::AuthError {
                message: format!("invalid token response: {}", e),
                status: Some(response.status),
            })?;

        if token.access_token.trim().is_empty() {
            return Err(PaymentError::AuthError {
                message: "empty access_token".to_string(),
                status: Some(response.status),
            });
        }

        Ok(token.access_token)
    }

    async fn submit_stk_push(
        &self,
        access_token: &str,
        request: &StkPushRequest,
    ) -> PaymentResult<RawResponse> {
        let payload = serde_json::to_value(request).map_err(|e| PaymentError::ValidationError {
            message: format!("unserializable request: {}", e),
            field: None,
        })?;

        let response = self
            .http
            .send(
                reqwest::Method::POST,
                &self.endpoint(STK_PUSH_PATH),
                Some(Auth::Bearer(access_token)),
                Some(&payload),
            )
            .await?;

        info!(status = response.status, "mpesa stk push answered");
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "mpesa"
    }
}
