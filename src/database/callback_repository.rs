use crate::database::error::DatabaseError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;

/// Largest window a history read may return.
pub const MAX_QUERY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Success,
    Failed,
    /// The payload did not have the expected shape; only the raw body is kept.
    Unparsed,
}

impl CallbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackStatus::Success => "success",
            CallbackStatus::Failed => "failed",
            CallbackStatus::Unparsed => "unparsed",
        }
    }

    pub fn from_result_code(code: i64) -> Self {
        if code == 0 {
            CallbackStatus::Success
        } else {
            CallbackStatus::Failed
        }
    }
}

impl fmt::Display for CallbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CallbackStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(CallbackStatus::Success),
            "failed" => Ok(CallbackStatus::Failed),
            "unparsed" => Ok(CallbackStatus::Unparsed),
            other => Err(format!("unknown callback status: {}", other)),
        }
    }
}

impl TryFrom<String> for CallbackStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A persisted callback. Never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CallbackRecord {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: CallbackStatus,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub phone: Option<String>,
    pub amount: Option<BigDecimal>,
    pub mpesa_receipt: Option<String>,
    pub transaction_date: Option<String>,
    pub payload: JsonValue,
    pub processing_error: Option<String>,
}

/// Everything about a callback except what the store assigns (id, received_at).
#[derive(Debug, Clone, PartialEq)]
pub struct NewCallbackRecord {
    pub status: CallbackStatus,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub phone: Option<String>,
    pub amount: Option<BigDecimal>,
    pub mpesa_receipt: Option<String>,
    pub transaction_date: Option<String>,
    pub payload: JsonValue,
    pub processing_error: Option<String>,
}

impl NewCallbackRecord {
    /// Raw body only, for payloads that could not be extracted.
    pub fn unparsed(payload: JsonValue, processing_error: impl Into<String>) -> Self {
        Self {
            status: CallbackStatus::Unparsed,
            result_code: None,
            result_desc: None,
            merchant_request_id: None,
            checkout_request_id: None,
            phone: None,
            amount: None,
            mpesa_receipt: None,
            transaction_date: None,
            payload,
            processing_error: Some(processing_error.into()),
        }
    }

    /// Postgres rejects NUL in TEXT and JSONB; it is kept as the literal `\u0000`.
    pub fn escape_nul(self) -> Self {
        let text = |v: Option<String>| v.map(|s| escape_nul_str(&s));
        Self {
            result_desc: text(self.result_desc),
            merchant_request_id: text(self.merchant_request_id),
            checkout_request_id: text(self.checkout_request_id),
            phone: text(self.phone),
            mpesa_receipt: text(self.mpesa_receipt),
            transaction_date: text(self.transaction_date),
            payload: escape_nul_json(self.payload),
            processing_error: text(self.processing_error),
            ..self
        }
    }

    pub fn into_record(self, id: i64, received_at: DateTime<Utc>) -> CallbackRecord {
        CallbackRecord {
            id,
            received_at,
            status: self.status,
            result_code: self.result_code,
            result_desc: self.result_desc,
            merchant_request_id: self.merchant_request_id,
            checkout_request_id: self.checkout_request_id,
            phone: self.phone,
            amount: self.amount,
            mpesa_receipt: self.mpesa_receipt,
            transaction_date: self.transaction_date,
            payload: self.payload,
            processing_error: self.processing_error,
        }
    }
}

fn escape_nul_str(value: &str) -> String {
    value.replace('\0', "\\u0000")
}

fn escape_nul_json(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(escape_nul_str(&s)),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(escape_nul_json).collect()),
        JsonValue::Object(map) => JsonValue::Object(
            map.into_iter()
                .map(|(k, v)| (escape_nul_str(&k), escape_nul_json(v)))
                .collect(),
        ),
        other => other,
    }
}

/// History read filter. Substring matches are case-sensitive; empty strings are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackFilter {
    pub txn: Option<String>,
    pub phone: Option<String>,
    pub limit: Option<i64>,
}

impl CallbackFilter {
    pub fn txn(&self) -> Option<&str> {
        self.txn.as_deref().filter(|s| !s.is_empty())
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|s| !s.is_empty())
    }

    /// Requested limit clamped to `0..=MAX_QUERY_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(MAX_QUERY_LIMIT)
            .clamp(0, MAX_QUERY_LIMIT)
    }

    pub fn matches(&self, record: &CallbackRecord) -> bool {
        fn contains(field: &Option<String>, needle: Option<&str>) -> bool {
            match needle {
                None => true,
                Some(needle) => field.as_deref().is_some_and(|v| v.contains(needle)),
            }
        }

        contains(&record.mpesa_receipt, self.txn()) && contains(&record.phone, self.phone())
    }
}

/// Single owner of the callback schema.
#[async_trait]
pub trait CallbackStore: Send + Sync {
    /// Insert one record atomically.
    async fn record(&self, record: NewCallbackRecord) -> Result<CallbackRecord, DatabaseError>;

    /// Most recent first, at most `filter.effective_limit()` rows.
    async fn query(&self, filter: &CallbackFilter) -> Result<Vec<CallbackRecord>, DatabaseError>;
}

const CALLBACK_COLUMNS: &str = "id, received_at, status, result_code, result_desc, \
     merchant_request_id, checkout_request_id, phone, amount, mpesa_receipt, \
     transaction_date, payload, processing_error";

/// Postgres-backed callback history
pub struct PgCallbackRepository {
    pool: PgPool,
}

impl PgCallbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallbackStore for PgCallbackRepository {
    async fn record(&self, record: NewCallbackRecord) -> Result<CallbackRecord, DatabaseError> {
        let record = record.escape_nul();
        let sql = format!(
            "INSERT INTO mpesa_callbacks
             (status, result_code, result_desc, merchant_request_id, checkout_request_id,
              phone, amount, mpesa_receipt, transaction_date, payload, processing_error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {}",
            CALLBACK_COLUMNS
        );

        sqlx::query_as::<_, CallbackRecord>(&sql)
            .bind(record.status.as_str())
            .bind(record.result_code)
            .bind(record.result_desc)
            .bind(record.merchant_request_id)
            .bind(record.checkout_request_id)
            .bind(record.phone)
            .bind(record.amount)
            .bind(record.mpesa_receipt)
            .bind(record.transaction_date)
            .bind(record.payload)
            .bind(record.processing_error)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e).with_context("insert mpesa_callbacks"))
    }

    async fn query(&self, filter: &CallbackFilter) -> Result<Vec<CallbackRecord>, DatabaseError> {
        // strpos is case-sensitive; NULL fields never match a bound needle
        let sql = format!(
            "SELECT {}
             FROM mpesa_callbacks
             WHERE ($1::TEXT IS NULL OR strpos(mpesa_receipt, $1) > 0)
               AND ($2::TEXT IS NULL OR strpos(phone, $2) > 0)
             ORDER BY id DESC
             LIMIT $3",
            CALLBACK_COLUMNS
        );

        sqlx::query_as::<_, CallbackRecord>(&sql)
            .bind(filter.txn())
            .bind(filter.phone())
            .bind(filter.effective_limit())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e).with_context("select mpesa_callbacks"))
    }
}
