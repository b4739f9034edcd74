//! Process-local stores used when `SKIP_EXTERNALS` is set and by tests.

use crate::database::callback_repository::{
    CallbackFilter, CallbackRecord, CallbackStore, NewCallbackRecord,
};
use crate::database::error::DatabaseError;
use crate::database::subscription_repository::{Subscription, SubscriptionStore};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only callback history. Ids are assigned monotonically from 1.
#[derive(Default, Clone)]
pub struct InMemoryCallbackStore {
    records: Arc<RwLock<Vec<CallbackRecord>>>,
}

impl InMemoryCallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CallbackStore for InMemoryCallbackStore {
    async fn record(&self, record: NewCallbackRecord) -> Result<CallbackRecord, DatabaseError> {
        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |last| last.id + 1);
        let stored = record.into_record(id, Utc::now());
        records.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, filter: &CallbackFilter) -> Result<Vec<CallbackRecord>, DatabaseError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .take(filter.effective_limit() as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn activate(
        &self,
        phone: &str,
        until: NaiveDate,
    ) -> Result<Subscription, DatabaseError> {
        let mut subscriptions = self.subscriptions.write().await;
        let entry = subscriptions
            .entry(phone.to_string())
            .or_insert_with(|| Subscription {
                phone: phone.to_string(),
                subscribed_until: until,
                updated_at: Utc::now(),
            });
        entry.subscribed_until = entry.subscribed_until.max(until);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn find(&self, phone: &str) -> Result<Option<Subscription>, DatabaseError> {
        Ok(self.subscriptions.read().await.get(phone).cloned())
    }
}
