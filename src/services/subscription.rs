//! Paid access windows keyed by phone number.

use crate::config::SubscriptionConfig;
use crate::database::error::DatabaseError;
use crate::database::subscription_repository::{Subscription, SubscriptionStore};
use crate::logging::mask_phone;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub phone: String,
    pub active: bool,
    pub subscribed_until: Option<NaiveDate>,
}

pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    config: SubscriptionConfig,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>, config: SubscriptionConfig) -> Self {
        Self { store, config }
    }

    /// Price charged by the subscribe flow.
    pub fn price(&self) -> i64 {
        self.config.price
    }

    /// Grant `days` of access from today.
    pub async fn extend_for_payment(&self, phone: &str) -> Result<Subscription, DatabaseError> {
        self.extend_from(phone, Utc::now().date_naive()).await
    }

    pub async fn extend_from(
        &self,
        phone: &str,
        today: NaiveDate,
    ) -> Result<Subscription, DatabaseError> {
        let until = today + Duration::days(self.config.days);
        let subscription = self.store.activate(phone, until).await?;
        info!(
            phone = %mask_phone(phone),
            subscribed_until = %subscription.subscribed_until,
            "subscription extended"
        );
        Ok(subscription)
    }

    pub async fn status(&self, phone: &str) -> Result<SubscriptionStatus, DatabaseError> {
        self.status_on(phone, Utc::now().date_naive()).await
    }

    pub async fn status_on(
        &self,
        phone: &str,
        today: NaiveDate,
    ) -> Result<SubscriptionStatus, DatabaseError> {
        let found = self.store.find(phone).await?;
        Ok(SubscriptionStatus {
            phone: phone.to_string(),
            active: found.as_ref().is_some_and(|s| s.is_active_on(today)),
            subscribed_until: found.map(|s| s.subscribed_until),
        })
    }
}
