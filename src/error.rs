//! Error codes and API response structures
//!
//! `ErrorCode` is the wire-level taxonomy (u16 codes, HTTP status mapping,
//! canned messages). `AppError` carries a code plus a human-readable message
//! and renders as the standard `ApiResponse` envelope. `ServiceError` bridges
//! infrastructure errors (sqlx, storage) and business errors so handlers can
//! use `?` without per-call `map_err` boilerplate.

use axum::Json;
use axum::response::IntoResponse;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error code enum
///
/// Codes are u16 for efficient serialization and cross-language clients:
/// - 0xxx: general
/// - 4xxx: event / inventory
/// - 5xxx: payment / gateway
/// - 9xxx: system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 4xxx: Event / inventory ====================
    /// Event not found
    EventNotFound = 4001,
    /// Advisory availability check failed at attempt creation
    EventUnavailable = 4002,
    /// Event has payment attempts and cannot be deleted
    EventHasAttempts = 4003,
    /// Authoritative capacity check failed at commit time
    CapacityExceeded = 4004,

    // ==================== 5xxx: Payment ====================
    /// Payment attempt not found
    PaymentNotFound = 5001,
    /// Illegal state transition on a terminal payment attempt
    PaymentConflict = 5002,
    /// Gateway reports the intent has not succeeded
    PaymentNotSucceeded = 5003,
    /// Payment gateway call failed
    GatewayError = 5101,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            ErrorCode::EventNotFound => "Event not found",
            ErrorCode::EventUnavailable => "Not enough tickets available",
            ErrorCode::EventHasAttempts => "Event has payment attempts and cannot be deleted",
            ErrorCode::CapacityExceeded => "Ticket capacity exceeded",

            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::PaymentConflict => "Payment is already settled",
            ErrorCode::PaymentNotSucceeded => "Payment has not succeeded",
            ErrorCode::GatewayError => "Payment gateway error",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }

    /// HTTP status code for this error
    pub const fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound | ErrorCode::EventNotFound | ErrorCode::PaymentNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::EventUnavailable
            | ErrorCode::EventHasAttempts
            | ErrorCode::CapacityExceeded
            | ErrorCode::PaymentConflict => StatusCode::CONFLICT,
            ErrorCode::PaymentNotSucceeded => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::Unknown
            | ErrorCode::InternalError
            | ErrorCode::DatabaseError
            | ErrorCode::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),

            4001 => Ok(ErrorCode::EventNotFound),
            4002 => Ok(ErrorCode::EventUnavailable),
            4003 => Ok(ErrorCode::EventHasAttempts),
            4004 => Ok(ErrorCode::CapacityExceeded),

            5001 => Ok(ErrorCode::PaymentNotFound),
            5002 => Ok(ErrorCode::PaymentConflict),
            5003 => Ok(ErrorCode::PaymentNotSucceeded),
            5101 => Ok(ErrorCode::GatewayError),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Application error with structured error code
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

/// Unified API response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Error code (0 for success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Create an error response from an AppError
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();
        let body = ApiResponse::error(&self);
        (status, Json(body)).into_response()
    }
}

/// Service-layer error — only two variants.
///
/// - `Db`: database/infrastructure errors (auto-logged, mapped to 500)
/// - `App`: business-rule errors (transparent pass-through to the client)
#[derive(Debug)]
pub enum ServiceError {
    Db(BoxError),
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Db(Box::new(e))
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Unknown.code(), 1);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::EventNotFound.code(), 4001);
        assert_eq!(ErrorCode::EventUnavailable.code(), 4002);
        assert_eq!(ErrorCode::CapacityExceeded.code(), 4004);
        assert_eq!(ErrorCode::PaymentNotFound.code(), 5001);
        assert_eq!(ErrorCode::PaymentConflict.code(), 5002);
        assert_eq!(ErrorCode::GatewayError.code(), 5101);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            ErrorCode::EventNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::EventUnavailable.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::CapacityExceeded.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::PaymentNotSucceeded.http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(ErrorCode::GatewayError.http_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_try_from() {
        assert_eq!(ErrorCode::try_from(4004), Ok(ErrorCode::CapacityExceeded));
        assert_eq!(ErrorCode::try_from(5001), Ok(ErrorCode::PaymentNotFound));
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
    }

    #[test]
    fn test_app_error_messages() {
        let err = AppError::new(ErrorCode::EventUnavailable);
        assert_eq!(err.message, "Not enough tickets available");

        let err = AppError::validation("quantity must be positive");
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(format!("{err}"), "quantity must be positive");
    }

    #[test]
    fn test_api_response_error_serialization() {
        let err = AppError::new(ErrorCode::CapacityExceeded);
        let body = serde_json::to_string(&ApiResponse::error(&err)).unwrap();
        assert!(body.contains("\"code\":4004"));
        assert!(body.contains("Ticket capacity exceeded"));
    }

    #[test]
    fn test_service_error_to_app_error() {
        let err: ServiceError = AppError::new(ErrorCode::PaymentNotFound).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::PaymentNotFound);

        let err: ServiceError = sqlx::Error::RowNotFound.into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
    }
}
