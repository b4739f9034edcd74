//! STK push issuing: validate, authenticate, sign and submit one push request.

use crate::config::MpesaConfig;
use crate::logging::mask_phone;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::StkPushGateway;
use crate::payments::types::{
    stk_password, stk_timestamp, validate_amount, IssueOutcome, PhoneNumber, StkPushAck,
    StkPushRequest,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

pub const PROVIDER_REJECTED: &str = "provider rejected request";

impl From<PaymentError> for IssueOutcome {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ValidationError { message, .. } => IssueOutcome::error(message, None),
            PaymentError::UpstreamError { message, body, .. } => IssueOutcome::error(message, body),
            other => IssueOutcome::error(other.to_string(), None),
        }
    }
}

pub struct PaymentIssuer {
    gateway: Arc<dyn StkPushGateway>,
    config: MpesaConfig,
}

impl PaymentIssuer {
    pub fn new(gateway: Arc<dyn StkPushGateway>, config: MpesaConfig) -> Self {
        Self { gateway, config }
    }

    /// Never fails; every problem is reported in the outcome.
    pub async fn issue(&self, phone: &str, amount: i64) -> IssueOutcome {
        self.issue_at(phone, amount, Utc::now()).await
    }

    pub async fn issue_at(&self, phone: &str, amount: i64, now: DateTime<Utc>) -> IssueOutcome {
        match self.try_issue_at(phone, amount, now).await {
            Ok(response) => IssueOutcome::Sent { response },
            Err(err) => err.into(),
        }
    }

    /// Same flow as `issue`, keeping the error type so callers can map it to a status code.
    pub async fn try_issue(&self, phone: &str, amount: i64) -> PaymentResult<JsonValue> {
        self.try_issue_at(phone, amount, Utc::now()).await
    }

    pub async fn try_issue_at(
        &self,
        phone: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> PaymentResult<JsonValue> {
        // Validation happens before any network call
        let phone = PhoneNumber::parse(phone)?;
        let amount = validate_amount(amount)?;

        let token = self.gateway.fetch_access_token().await.map_err(|e| {
            warn!(provider = self.gateway.name(), error = %e, "access token request failed");
            e
        })?;

        let request = self.build_request(&phone, amount, now);
        let response = self.gateway.submit_stk_push(&token, &request).await?;

        if !response.is_success() {
            warn!(
                phone = %mask_phone(phone.as_str()),
                status = response.status,
                "stk push returned non-success status"
            );
            return Err(PaymentError::UpstreamError {
                provider: self.gateway.name().to_string(),
                message: format!("HTTP {}", response.status),
                provider_code: None,
                http_status: Some(response.status),
                body: Some(response.body),
            });
        }

        let body = response.json();
        let ack = body
            .as_ref()
            .and_then(|value| serde_json::from_value::<StkPushAck>(value.clone()).ok());

        match (body, ack) {
            (Some(body), Some(ack)) if ack.is_accepted() => {
                info!(
                    phone = %mask_phone(phone.as_str()),
                    amount,
                    checkout_request_id = ?ack.checkout_request_id,
                    "stk push accepted"
                );
                Ok(body)
            }
            (_, ack) => {
                let provider_code = ack.and_then(|a| a.response_code);
                warn!(
                    phone = %mask_phone(phone.as_str()),
                    response_code = ?provider_code,
                    "stk push rejected by provider"
                );
                Err(PaymentError::UpstreamError {
                    provider: self.gateway.name().to_string(),
                    message: PROVIDER_REJECTED.to_string(),
                    provider_code,
                    http_status: Some(response.status),
                    body: Some(response.body),
                })
            }
        }
    }

    fn build_request(&self, phone: &PhoneNumber, amount: u64, now: DateTime<Utc>) -> StkPushRequest {
        let timestamp = stk_timestamp(now);
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);

        StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: self.config.transaction_type.clone(),
            amount,
            party_a: phone.to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference: self.config.account_reference.clone(),
            transaction_desc: self.config.transaction_desc.clone(),
        }
    }
}
