use crate::payments::error::PaymentResult;
use crate::payments::types::StkPushRequest;
use crate::payments::utils::RawResponse;
use async_trait::async_trait;

/// The two provider endpoints the issuer talks to.
#[async_trait]
pub trait StkPushGateway: Send + Sync {
    /// Client-credentials token. Any failure is `PaymentError::AuthError`.
    async fn fetch_access_token(&self) -> PaymentResult<String>;

    /// POST the push request. Returns whatever the provider answered;
    /// `Err` only when no response was received.
    async fn submit_stk_push(
        &self,
        access_token: &str,
        request: &StkPushRequest,
    ) -> PaymentResult<RawResponse>;

    fn name(&self) -> &'static str;
}
