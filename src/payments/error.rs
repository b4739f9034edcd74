use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Token request failed: {message}")]
    AuthError {
        message: String,
        status: Option<u16>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    UpstreamError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        http_status: Option<u16>,
        body: Option<String>,
    },
}

impl PaymentError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::AuthError { .. } => 502,
            PaymentError::NetworkError { .. } => 502,
            PaymentError::UpstreamError { .. } => 502,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind};

        let kind = match err {
            PaymentError::ValidationError { message, field } => AppErrorKind::Validation {
                field: field.unwrap_or_else(|| "request".to_string()),
                reason: message,
            },
            other => AppErrorKind::PaymentProvider {
                message: other.to_string(),
            },
        };

        AppError::new(kind)
    }
}
