use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Subscription {
    pub phone: String,
    pub subscribed_until: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active through the end of `subscribed_until`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.subscribed_until >= day
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Upsert the expiry date for a phone. Never shortens an existing subscription.
    async fn activate(
        &self,
        phone: &str,
        until: NaiveDate,
    ) -> Result<Subscription, DatabaseError>;

    async fn find(&self, phone: &str) -> Result<Option<Subscription>, DatabaseError>;
}

pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionRepository {
    async fn activate(
        &self,
        phone: &str,
        until: NaiveDate,
    ) -> Result<Subscription, DatabaseError> {
        sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscriptions (phone, subscribed_until, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (phone) DO UPDATE
             SET subscribed_until = GREATEST(subscriptions.subscribed_until, EXCLUDED.subscribed_until),
                 updated_at = NOW()
             RETURNING phone, subscribed_until, updated_at",
        )
        .bind(phone)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("upsert subscriptions"))
    }

    async fn find(&self, phone: &str) -> Result<Option<Subscription>, DatabaseError> {
        sqlx::query_as::<_, Subscription>(
            "SELECT phone, subscribed_until, updated_at FROM subscriptions WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("select subscriptions"))
    }
}
