use thiserror::Error;

/// Database failure categories
#[derive(Debug, Clone, Error)]
pub enum DatabaseErrorKind {
    #[error("Database connection pool exhausted")]
    PoolExhausted,
    #[error("Row not found")]
    NotFound,
    #[error("Duplicate value for {constraint}")]
    UniqueConstraintViolation { constraint: String },
    #[error("Database query failed: {message}")]
    QueryError { message: String },
    #[error("Database connection error: {message}")]
    ConnectionError { message: String },
    #[error("Database migration failed: {message}")]
    MigrationError { message: String },
    #[error("Unknown database error: {message}")]
    Unknown { message: String },
}

#[derive(Debug, Clone, Error)]
#[error("{kind}{}", context_suffix(.context))]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Names the statement that failed.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Pool and connection failures may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        )
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        let kind = match error {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound,
            sqlx::Error::PoolTimedOut => DatabaseErrorKind::PoolExhausted,
            sqlx::Error::PoolClosed => DatabaseErrorKind::ConnectionError {
                message: "pool is closed".to_string(),
            },
            sqlx::Error::Io(e) => DatabaseErrorKind::ConnectionError {
                message: e.to_string(),
            },
            // 23505 = unique_violation
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                DatabaseErrorKind::UniqueConstraintViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::Database(db) => DatabaseErrorKind::QueryError {
                message: db.message().to_string(),
            },
            other => DatabaseErrorKind::Unknown {
                message: other.to_string(),
            },
        };
        Self::new(kind)
    }
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::new(DatabaseErrorKind::MigrationError {
            message: error.to_string(),
        })
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind};

        AppError::new(AppErrorKind::Database {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(matches!(err.kind, DatabaseErrorKind::PoolExhausted));
    }

    #[test]
    fn context_is_appended_to_display() {
        let err = DatabaseError::new(DatabaseErrorKind::QueryError {
            message: "syntax error".to_string(),
        });
        assert_eq!(err.to_string(), "Database query failed: syntax error");

        let err = err.with_context("insert mpesa_callbacks");
        assert_eq!(
            err.to_string(),
            "Database query failed: syntax error (insert mpesa_callbacks)"
        );
        assert!(!err.is_retryable());
    }
}
