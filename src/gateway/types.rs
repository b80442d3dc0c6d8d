//! Response envelope and error mapping for the HTTP surface
//!
//! Every endpoint answers the same `{code, msg, data}` shape: code 0 with
//! data on success, a stable non-zero code with no data on failure. Domain
//! errors convert into [`ApiError`] through `From` impls so handlers stay a
//! thin match over their service call.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::events::IngestError;
use crate::issuance::TransitionError;
use crate::ledger::LedgerError;

/// Stable wire-level error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const MISSING_IDEMPOTENCY_KEY: i32 = 1002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4041;
    pub const CONFLICT: i32 = 4091;
    pub const PRECONDITION_FAILED: i32 = 4221;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

/// The `{code, msg, data}` envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

/// Dataless error envelope
fn envelope(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
    ApiResponse {
        code,
        msg: msg.into(),
        data: None,
    }
}

/// What every handler returns: a status-tagged envelope either way.
pub type ApiResult<T> =
    Result<(StatusCode, Json<ApiResponse<T>>), (StatusCode, Json<ApiResponse<()>>)>;

fn respond<T: Serialize>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiResponse::success(data))))
}

/// 200 OK
#[inline]
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    respond(StatusCode::OK, data)
}

/// 201 CREATED
#[inline]
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    respond(StatusCode::CREATED, data)
}

/// One API failure: HTTP status, wire code, human-readable message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error_codes::CONFLICT, msg)
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            error_codes::PRECONDITION_FAILED,
            msg,
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    /// Database failures split by retryability: pool exhaustion and lost
    /// connections are transient (503, same idempotency key retries safely),
    /// anything else is internal.
    pub fn db_error(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::service_unavailable(
                    "Database temporarily unavailable, retry with the same Idempotency-Key",
                )
            }
            sqlx::Error::RowNotFound => Self::not_found("Not found"),
            other => Self::internal(format!("Database error: {other}")),
        }
    }

    /// Fold into the handler error arm of [`ApiResult`].
    pub fn into_err<T>(self) -> ApiResult<T> {
        let ApiError {
            status,
            code,
            message,
        } = self;
        Err((status, Json(envelope(code, message))))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(envelope(self.code, self.message))).into_response()
    }
}

impl From<ApiError> for (StatusCode, Json<ApiResponse<()>>) {
    fn from(err: ApiError) -> Self {
        (err.status, Json(envelope(err.code, err.message)))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::db_error(e)
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match err.http_status() {
            400 => error_codes::INVALID_PARAMETER,
            404 => error_codes::NOT_FOUND,
            409 => error_codes::CONFLICT,
            _ => error_codes::INTERNAL_ERROR,
        };
        match &err {
            TransitionError::Database(e) => {
                tracing::error!(error = %e, "transition database error");
            }
            TransitionError::Ledger(e) => {
                tracing::error!(error = %e, "transition ledger error");
            }
            _ => {}
        }
        ApiError::new(status, code, err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(e) => ApiError::db_error(e),
            LedgerError::BudgetNotFound => ApiError::not_found("Budget not found"),
            LedgerError::InvalidAmount => ApiError::bad_request("Amount must be positive"),
            LedgerError::HardCapExceeded => {
                ApiError::precondition("Top-up would push balance over the hard cap")
            }
            LedgerError::MissingReserve(_) | LedgerError::ReleaseAfterCharge(_) => {
                ApiError::conflict(err.to_string())
            }
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Database(e) => ApiError::db_error(e),
            IngestError::CustomerNotFound => ApiError::not_found("Customer not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_db_errors_are_503() {
        let err = ApiError::db_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, error_codes::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_transition_error_mapping() {
        let err: ApiError = TransitionError::NotFound.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = TransitionError::CodeMismatch.into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = TransitionError::CredentialsRequired.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
