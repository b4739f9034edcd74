//! Listener side of the callback store.
//!
//! Every delivery is persisted exactly once and acknowledged, whatever its shape. Side effects
//! (alert email, subscription extension) run only for successful payments that were stored, and
//! their failures never reach the provider.

use crate::database::callback_repository::{
    CallbackRecord, CallbackStatus, CallbackStore, NewCallbackRecord,
};
use crate::logging::mask_phone;
use crate::payments::callback::{parse_body, parse_callback, raw_payload, ParsedCallback};
use crate::services::notification::{PaymentAlert, PaymentNotifier};
use crate::services::subscription::SubscriptionService;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Body returned to the provider for every delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

pub struct CallbackService {
    store: Arc<dyn CallbackStore>,
    notifier: Arc<dyn PaymentNotifier>,
    subscriptions: Arc<SubscriptionService>,
}

impl CallbackService {
    pub fn new(
        store: Arc<dyn CallbackStore>,
        notifier: Arc<dyn PaymentNotifier>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Self {
        Self {
            store,
            notifier,
            subscriptions,
        }
    }

    pub async fn ingest(&self, raw_body: &[u8]) -> CallbackAck {
        let (payload, parsed) = match parse_body(raw_body) {
            Ok(payload) => {
                let parsed = parse_callback(&payload);
                (payload, parsed)
            }
            Err(e) => (raw_payload(raw_body), Err(e)),
        };

        let stored = match parsed {
            Ok(callback) => {
                let record = new_record(&callback, payload.clone());
                match self.store.record(record).await {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        // Extracted columns can be refused (numeric overflow); keep the raw body
                        warn!(error = %e, "extracted callback rejected by store; storing raw body");
                        let reason = format!("store rejected extracted fields: {}", e);
                        self.record_unparsed(payload, reason).await
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "callback payload could not be parsed; storing raw body");
                self.record_unparsed(payload, e.to_string()).await
            }
        };

        let Some(stored) = stored else {
            return CallbackAck::accepted();
        };

        info!(
            id = stored.id,
            status = %stored.status,
            receipt = ?stored.mpesa_receipt,
            "callback recorded"
        );

        if stored.status == CallbackStatus::Success {
            self.after_success(&stored).await;
        }

        CallbackAck::accepted()
    }

    async fn record_unparsed(&self, payload: JsonValue, reason: String) -> Option<CallbackRecord> {
        match self
            .store
            .record(NewCallbackRecord::unparsed(payload, reason))
            .await
        {
            Ok(stored) => Some(stored),
            Err(e) => {
                error!(error = %e, "failed to persist callback");
                None
            }
        }
    }

    async fn after_success(&self, stored: &CallbackRecord) {
        let alert = PaymentAlert {
            phone: stored.phone.clone(),
            amount: stored.amount.clone(),
            receipt: stored.mpesa_receipt.clone(),
            status: stored.status.to_string(),
            transaction_date: stored.transaction_date.clone(),
            received_at: stored.received_at,
        };

        if let Err(e) = self.notifier.notify_payment(&alert).await {
            error!(id = stored.id, error = %e, "payment notification failed");
        }

        if let Some(phone) = stored.phone.as_deref() {
            if let Err(e) = self.subscriptions.extend_for_payment(phone).await {
                error!(
                    id = stored.id,
                    phone = %mask_phone(phone),
                    error = %e,
                    "subscription extension failed"
                );
            }
        }
    }
}

fn new_record(callback: &ParsedCallback, payload: JsonValue) -> NewCallbackRecord {
    NewCallbackRecord {
        status: CallbackStatus::from_result_code(callback.result_code),
        result_code: Some(callback.result_code),
        result_desc: callback.result_desc.clone(),
        merchant_request_id: callback.merchant_request_id.clone(),
        checkout_request_id: callback.checkout_request_id.clone(),
        phone: callback.phone(),
        amount: callback.amount(),
        mpesa_receipt: callback.receipt(),
        transaction_date: callback.transaction_date(),
        payload,
        processing_error: None,
    }
}
