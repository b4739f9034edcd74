use crate::config::EmailConfig;
use crate::logging::mask_phone;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub const PAYMENT_ALERT_SUBJECT: &str = "M-PESA Payment Received";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMTP configuration error: {0}")]
    Config(String),
    #[error("Email sending failed: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
    #[error("Message building failed: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Address parsing failed: {0}")]
    Address(#[from] lettre::address::AddressError),
}

/// What an operator is told about a successful payment.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentAlert {
    pub phone: Option<String>,
    pub amount: Option<BigDecimal>,
    pub receipt: Option<String>,
    pub status: String,
    pub transaction_date: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl PaymentAlert {
    pub fn text_body(&self) -> String {
        format!(
            "A payment was received.\n\n\
             Phone: {}\n\
             Amount: {}\n\
             Receipt: {}\n\
             Status: {}\n\
             Transaction date: {}\n\
             Received at: {}\n",
            or_dash(&self.phone),
            or_dash(&self.amount),
            or_dash(&self.receipt),
            self.status,
            or_dash(&self.transaction_date),
            self.received_at.to_rfc3339(),
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            r#"<html>
<body style="font-family: Arial, sans-serif;">
  <h2>{subject}</h2>
  <table cellpadding="4">
    <tr><td><strong>Phone</strong></td><td>{phone}</td></tr>
    <tr><td><strong>Amount</strong></td><td>{amount}</td></tr>
    <tr><td><strong>Receipt</strong></td><td>{receipt}</td></tr>
    <tr><td><strong>Status</strong></td><td>{status}</td></tr>
    <tr><td><strong>Transaction date</strong></td><td>{date}</td></tr>
    <tr><td><strong>Received at</strong></td><td>{received}</td></tr>
  </table>
</body>
</html>"#,
            subject = PAYMENT_ALERT_SUBJECT,
            phone = or_dash(&self.phone),
            amount = or_dash(&self.amount),
            receipt = or_dash(&self.receipt),
            status = self.status,
            date = or_dash(&self.transaction_date),
            received = self.received_at.to_rfc3339(),
        )
    }
}

fn or_dash<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn notify_payment(&self, alert: &PaymentAlert) -> Result<(), NotifyError>;
}

/// Sends alerts over SMTP with STARTTLS.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    recipient: String,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Config(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            mailer,
            from: format!("{} <{}>", config.from_name, config.username),
            recipient: config.recipient.clone(),
        })
    }

    fn build_message(&self, alert: &PaymentAlert) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(self.recipient.parse()?)
            .subject(PAYMENT_ALERT_SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(alert.text_body()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(alert.html_body()),
                    ),
            )?;
        Ok(message)
    }
}

#[async_trait]
impl PaymentNotifier for EmailNotifier {
    async fn notify_payment(&self, alert: &PaymentAlert) -> Result<(), NotifyError> {
        let message = self.build_message(alert)?;
        self.mailer.send(message).await?;
        info!(
            recipient = %self.recipient,
            receipt = ?alert.receipt,
            "payment alert email sent"
        );
        Ok(())
    }
}

/// Fallback when no SMTP settings are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl PaymentNotifier for LogNotifier {
    async fn notify_payment(&self, alert: &PaymentAlert) -> Result<(), NotifyError> {
        info!(
            phone = %alert.phone.as_deref().map(mask_phone).unwrap_or_default(),
            amount = %or_dash(&alert.amount),
            receipt = ?alert.receipt,
            transaction_date = ?alert.transaction_date,
            "🔔 NOTIFICATION: payment received"
        );
        Ok(())
    }
}
