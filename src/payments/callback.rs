//! STK push result callbacks.
//!
//! The provider posts `{"Body":{"stkCallback":{...}}}`. Metadata arrives as a list of
//! `{"Name": .., "Value": ..}` pairs whose order is not guaranteed, so every field is
//! looked up by name and a missing name is simply absent.

use base64::{engine::general_purpose::STANDARD, Engine};
use bigdecimal::BigDecimal;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const ITEM_AMOUNT: &str = "Amount";
pub const ITEM_RECEIPT: &str = "MpesaReceiptNumber";
pub const ITEM_TRANSACTION_DATE: &str = "TransactionDate";
pub const ITEM_PHONE: &str = "PhoneNumber";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Extracted view of one callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCallback {
    pub result_code: i64,
    pub result_desc: Option<String>,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    metadata: HashMap<String, JsonValue>,
}

impl ParsedCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// Metadata value by name, stringified.
    pub fn item(&self, name: &str) -> Option<String> {
        self.metadata.get(name).and_then(stringify)
    }

    pub fn phone(&self) -> Option<String> {
        self.item(ITEM_PHONE)
    }

    pub fn receipt(&self) -> Option<String> {
        self.item(ITEM_RECEIPT)
    }

    pub fn transaction_date(&self) -> Option<String> {
        self.item(ITEM_TRANSACTION_DATE)
    }

    pub fn amount(&self) -> Option<BigDecimal> {
        self.item(ITEM_AMOUNT)
            .and_then(|raw| BigDecimal::from_str(&raw).ok())
    }
}

fn stringify(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn optional_string(node: &JsonValue, key: &str) -> Option<String> {
    node.get(key).and_then(stringify)
}

fn result_code(node: &JsonValue) -> Result<i64, CallbackParseError> {
    let raw = node
        .get("ResultCode")
        .ok_or(CallbackParseError::MissingField("Body.stkCallback.ResultCode"))?;

    match raw {
        JsonValue::Number(n) => n.as_i64().ok_or_else(|| CallbackParseError::InvalidField {
            field: "ResultCode",
            reason: format!("{} is not an integer", n),
        }),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| CallbackParseError::InvalidField {
                field: "ResultCode",
                reason: format!("{:?} is not an integer", s),
            }),
        other => Err(CallbackParseError::InvalidField {
            field: "ResultCode",
            reason: format!("unexpected type: {}", other),
        }),
    }
}

/// Parse a raw request body. Non-JSON bodies fail with `InvalidJson`.
pub fn parse_body(body: &[u8]) -> Result<JsonValue, CallbackParseError> {
    serde_json::from_slice(body).map_err(|e| CallbackParseError::InvalidJson(e.to_string()))
}

/// Verbatim copy of a body that is not JSON: a string when it is UTF-8, otherwise
/// `{"base64": ..}` over the exact bytes.
pub fn raw_payload(body: &[u8]) -> JsonValue {
    match std::str::from_utf8(body) {
        Ok(text) => JsonValue::String(text.to_string()),
        Err(_) => json!({ "base64": STANDARD.encode(body) }),
    }
}

pub fn parse_callback(payload: &JsonValue) -> Result<ParsedCallback, CallbackParseError> {
    let stk = payload
        .get("Body")
        .and_then(|body| body.get("stkCallback"))
        .filter(|node| node.is_object())
        .ok_or(CallbackParseError::MissingField("Body.stkCallback"))?;

    let result_code = result_code(stk)?;

    let mut metadata = HashMap::new();
    let items = stk
        .get("CallbackMetadata")
        .and_then(|meta| meta.get("Item"))
        .and_then(|items| items.as_array());
    if let Some(items) = items {
        for item in items {
            let name = item.get("Name").and_then(|n| n.as_str());
            let value = item.get("Value");
            if let (Some(name), Some(value)) = (name, value) {
                metadata.insert(name.to_string(), value.clone());
            }
        }
    }

    Ok(ParsedCallback {
        result_code,
        result_desc: optional_string(stk, "ResultDesc"),
        merchant_request_id: optional_string(stk, "MerchantRequestID"),
        checkout_request_id: optional_string(stk, "CheckoutRequestID"),
        metadata,
    })
}
