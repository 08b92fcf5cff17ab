use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ApiResponse;

/// Domain errors surfaced by the API.
///
/// NotFound / SlotConflict / Validation are expected and recoverable: the
/// caller gets a corrective message and may retry with different input.
/// Persistence means the store itself failed; it is logged and answered
/// generically, with no automatic retry.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Operating on an id that does not exist. Carries the user-facing
    /// name of the missing resource.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A non-cancelled booking or a break block already occupies the
    /// (technician, date, time) cell.
    #[error("slot conflict: {employee_id} at {date} {time}")]
    SlotConflict {
        employee_id: String,
        date: String,
        time: String,
    },

    /// Malformed or missing input. The message is shown to the user as-is.
    #[error("validation: {0}")]
    Validation(String),

    /// Missing or invalid session token.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but the profile's role does not allow the operation.
    #[error("forbidden")]
    Forbidden,

    #[error("persistence failure")]
    Persistence(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("ไม่พบ{what}")),
            ApiError::SlotConflict {
                employee_id,
                date,
                time,
            } => {
                tracing::warn!(
                    "slot conflict rejected: employee={} cell={} {}",
                    employee_id,
                    date,
                    time
                );
                (
                    StatusCode::CONFLICT,
                    "ช่วงเวลานี้ถูกจองแล้ว กรุณาเลือกเวลาอื่น".to_string(),
                )
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "กรุณาเข้าสู่ระบบก่อนใช้งาน".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "ไม่มีสิทธิ์เข้าถึงส่วนนี้".to_string()),
            ApiError::Persistence(e) => {
                tracing::error!("store operation failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "เกิดข้อผิดพลาดภายในระบบ กรุณาลองใหม่อีกครั้ง".to_string(),
                )
            }
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

// ── Tests ──
