use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error returned by every service operation and HTTP handler.
///
/// Client-caused failures (validation, conflicts, missing rows) carry a
/// message that is returned verbatim. Infrastructure failures are logged
/// and surfaced with a generic message; `Retryable` marks the ones a
/// caller may safely retry because the transaction rolled back in full.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("x-company-code required")]
    MissingTenantCode,

    #[error("invalid company code: {0:?}")]
    InvalidTenantCode(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Retryable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    /// Whether the failure left no trace and the same request may be resent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Retryable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MissingTenantCode | AppError::InvalidTenantCode(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Retryable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Postgres SQLSTATE codes that get a dedicated mapping.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";
const UNDEFINED_TABLE: &str = "42P01";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        classify_sqlx_error(&err).unwrap_or(AppError::Database(err))
    }
}

/// True when the statement hit a unique index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

fn classify_sqlx_error(err: &sqlx::Error) -> Option<AppError> {
    match err {
        sqlx::Error::RowNotFound => Some(AppError::NotFound("record not found".to_string())),
        sqlx::Error::PoolTimedOut => Some(AppError::Retryable("database pool exhausted".to_string())),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
            Some(AppError::Retryable("database connection lost".to_string()))
        }
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            match code.as_deref() {
                Some(UNIQUE_VIOLATION) => Some(AppError::Conflict(match db_err.constraint() {
                    Some(constraint) => format!("duplicate value violates {}", constraint),
                    None => "duplicate value".to_string(),
                })),
                Some(NUMERIC_VALUE_OUT_OF_RANGE) => Some(AppError::Validation(
                    "numeric value out of range".to_string(),
                )),
                Some(CHECK_VIOLATION) => Some(AppError::Conflict(db_err.message().to_string())),
                Some(UNDEFINED_TABLE) => Some(AppError::NotFound(
                    "company tables are not provisioned".to_string(),
                )),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                    Some(AppError::Retryable("concurrent update, retry the request".to_string()))
                }
                Some(QUERY_CANCELED) => Some(AppError::Retryable("statement timed out".to_string())),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Failure of a single stock adjustment.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error("stock would go negative for product {product_id} (on hand {on_hand}, change {delta})")]
    NegativeStock {
        product_id: i64,
        on_hand: Decimal,
        delta: Decimal,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::ProductNotFound(_) => AppError::NotFound(err.to_string()),
            StockError::NegativeStock { .. } => AppError::Conflict(err.to_string()),
            StockError::Database(e) => AppError::from(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "is_false")]
    retryable: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Database(e) => {
                error!(error = %e, "Database error");
                "Server Error".to_string()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "Internal error");
                "Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: message,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingTenantCode.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_stock_errors_convert() {
        let missing: AppError = StockError::ProductNotFound(7).into();
        assert!(matches!(missing, AppError::NotFound(ref m) if m == "product 7 not found"));

        let negative: AppError = StockError::NegativeStock {
            product_id: 3,
            on_hand: dec!(2),
            delta: dec!(-5),
        }
        .into();
        assert_eq!(negative.status_code(), StatusCode::CONFLICT);
        assert!(negative.to_string().contains("stock would go negative for product 3"));
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_numeric_overflow_is_a_validation_error() {
        let err: AppError = crate::test_support::db_error("22003").into();
        assert!(matches!(err, AppError::Validation(ref m) if m == "numeric value out of range"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unique_violation_detection() {
        let duplicate = crate::test_support::db_error("23505");
        assert!(is_unique_violation(&duplicate));
        assert!(matches!(AppError::from(duplicate), AppError::Conflict(_)));
        assert!(!is_unique_violation(&crate::test_support::db_error("23514")));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
