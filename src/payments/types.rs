use crate::payments::error::PaymentError;
use base64::Engine;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Daraja validates timestamps in East Africa Time.
pub const EAT_OFFSET_SECS: i32 = 3 * 3600;

pub const INVALID_PHONE: &str = "invalid phone";
pub const INVALID_AMOUNT: &str = "invalid amount";

/// A Safaricom MSISDN in national format: `254` followed by nine digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(value: &str) -> Result<Self, PaymentError> {
        let value = value.trim();
        let valid = value.len() == 12
            && value.starts_with("254")
            && value.chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(PaymentError::ValidationError {
                message: INVALID_PHONE.to_string(),
                field: Some("phone".to_string()),
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn validate_amount(amount: i64) -> Result<u64, PaymentError> {
    if amount <= 0 {
        return Err(PaymentError::ValidationError {
            message: INVALID_AMOUNT.to_string(),
            field: Some("amount".to_string()),
        });
    }
    Ok(amount as u64)
}

/// `YYYYMMDDHHMMSS` in East Africa Time.
pub fn stk_timestamp<Tz: TimeZone>(now: DateTime<Tz>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.naive_utc().format("%Y%m%d%H%M%S").to_string(),
    }
}

/// base64(shortcode + passkey + timestamp)
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Fields of the synchronous STK push acknowledgement we act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushAck {
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

impl StkPushAck {
    pub fn is_accepted(&self) -> bool {
        self.response_code.as_deref().map(str::trim) == Some("0")
    }
}

/// Normalized result of an issue attempt. Serialized as
/// `{"status":"sent","response":{..}}` or `{"status":"error","error":"..","details":..}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueOutcome {
    Sent {
        response: JsonValue,
    },
    Error {
        error: String,
        #[serde(default)]
        details: Option<String>,
    },
}

impl IssueOutcome {
    pub fn error(error: impl Into<String>, details: Option<String>) -> Self {
        IssueOutcome::Error {
            error: error.into(),
            details,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, IssueOutcome::Sent { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            IssueOutcome::Error { error, .. } => Some(error),
            IssueOutcome::Sent { .. } => None,
        }
    }
}
