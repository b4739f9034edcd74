//! Services module for business logic and integrations

pub mod callback_service;
pub mod notification;
pub mod payment_issuer;
pub mod subscription;

pub use callback_service::{CallbackAck, CallbackService};
pub use notification::{EmailNotifier, LogNotifier, PaymentAlert, PaymentNotifier};
pub use payment_issuer::PaymentIssuer;
pub use subscription::{SubscriptionService, SubscriptionStatus};
