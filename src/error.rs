//! Unified error handling for the read endpoints
//!
//! Layer errors (payments validation, database) fold into `AppError`, which knows its HTTP
//! status, machine-readable code and client-facing message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidPhone,
    InvalidAmount,
    ValidationError,
    DatabaseError,
    PaymentProviderError,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// A request field failed validation
    Validation { field: String, reason: String },
    /// Store read or write failed
    Database { message: String, is_retryable: bool },
    /// Token or STK push call failed
    PaymentProvider { message: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Validation { .. } => 400,
            AppErrorKind::Database { .. } => 500,
            AppErrorKind::PaymentProvider { .. } => 502,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation { field, .. } => match field.as_str() {
                "phone" => ErrorCode::InvalidPhone,
                "amount" => ErrorCode::InvalidAmount,
                _ => ErrorCode::ValidationError,
            },
            AppErrorKind::Database { .. } => ErrorCode::DatabaseError,
            AppErrorKind::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
        }
    }

    /// Message safe to show a client; database detail stays in the logs.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { reason, .. } => reason.clone(),
            AppErrorKind::Database { .. } => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::PaymentProvider { message } => {
                format!("Payment provider (mpesa) error: {}", message)
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Database { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// From<DatabaseError> lives in database/error.rs, From<PaymentError> in payments/error.rs

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_phone_maps_to_400() {
        let error = AppError::new(AppErrorKind::Validation {
            field: "phone".to_string(),
            reason: "invalid phone".to_string(),
        });

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InvalidPhone);
        assert_eq!(error.user_message(), "invalid phone");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_provider_error_maps_to_502() {
        let error = AppError::new(AppErrorKind::PaymentProvider {
            message: "Token request failed: 401".to_string(),
        });

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::PaymentProviderError);
        assert!(error.user_message().contains("mpesa"));
    }

    #[test]
    fn test_database_error_hides_detail_and_keeps_retryability() {
        let error = AppError::new(AppErrorKind::Database {
            message: "pool timed out".to_string(),
            is_retryable: true,
        })
        .with_request_id("req_1");

        assert_eq!(error.status_code(), 500);
        assert!(error.is_retryable());
        assert!(!error.user_message().contains("pool"));
        assert_eq!(error.request_id.as_deref(), Some("req_1"));
    }

    #[test]
    fn test_error_codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_value(ErrorCode::InvalidPhone).unwrap(),
            "INVALID_PHONE"
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::PaymentProviderError).unwrap(),
            "PAYMENT_PROVIDER_ERROR"
        );
    }
}
