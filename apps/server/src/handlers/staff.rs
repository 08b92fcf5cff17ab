use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::{availability, booking, models::*, notify, slots, AppState};

use super::client::{booking_detail_select, fetch_booking_detail, require_profile, require_user};

/// Technicians and admins may manage the schedule.
async fn require_staff(headers: &HeaderMap, state: &AppState) -> ApiResult<UserProfile> {
    let user = require_user(headers, state)?;
    let profile = require_profile(state, &user.uid).await?;
    if !profile.role.is_staff() {
        return Err(ApiError::Forbidden);
    }
    Ok(profile)
}

/// GET /api/staff/schedule?date= — the caller's own day over the slot grid:
/// bookings that are pending, confirmed or completed, plus breaks.
pub async fn day_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<ApiResponse<Vec<availability::ScheduleSlot>>>> {
    let profile = require_staff(&headers, &state).await?;
    if chrono::NaiveDate::parse_from_str(&query.date, "%Y-%m-%d").is_err() {
        return Err(ApiError::Validation("รูปแบบวันที่ไม่ถูกต้อง".into()));
    }

    let sql = format!(
        "{} WHERE b.employee_id = ? AND b.date = ? AND b.status != 'cancelled'
         ORDER BY b.time ASC",
        booking_detail_select()
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&sql)
        .bind(&profile.uid)
        .bind(&query.date)
        .fetch_all(&state.db)
        .await?;
    let blocks = sqlx::query_as::<_, AvailabilityBlock>(
        "SELECT * FROM availability_blocks WHERE employee_id = ? AND date = ?",
    )
    .bind(&profile.uid)
    .bind(&query.date)
    .fetch_all(&state.db)
    .await?;

    let schedule = availability::technician_day_schedule(bookings, blocks);
    Ok(Json(ApiResponse::success(schedule)))
}

/// POST /api/staff/walkins — book an in-person customer into the caller's
/// own column. Created directly as confirmed with no deposit.
pub async fn create_walk_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<WalkInRequest>,
) -> ApiResult<Json<ApiResponse<BookingDetail>>> {
    let profile = require_staff(&headers, &state).await?;

    slots::validate_cell(&body.date, &body.time)?;
    if body.customer_name.trim().is_empty() {
        return Err(ApiError::Validation("กรุณากรอกชื่อลูกค้า".into()));
    }
    let service_exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM services WHERE id = ?")
        .bind(body.service_id)
        .fetch_one(&state.db)
        .await?;
    if !service_exists {
        return Err(ApiError::NotFound("บริการ"));
    }

    let booking_id = booking::create_walk_in(&state.db, &profile.uid, &body).await?;
    let detail = fetch_booking_detail(&state, booking_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// POST /api/staff/bookings/{id}/confirm — payment proof checked out.
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    require_staff(&headers, &state).await?;
    let updated = booking::transition(&state.db, id, BookingStatus::Confirmed, None).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/staff/bookings/{id}/complete — finalize with the price actually
/// charged; defaults to the service list price.
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<CompleteBookingRequest>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    require_staff(&headers, &state).await?;
    if matches!(body.final_price, Some(p) if p < 0) {
        return Err(ApiError::Validation("ราคาสุดท้ายต้องไม่ติดลบ".into()));
    }
    let updated =
        booking::transition(&state.db, id, BookingStatus::Completed, body.final_price).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/staff/bookings/{id}/cancel — frees the slot immediately.
/// The deposit is not refunded.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    require_staff(&headers, &state).await?;
    let updated = booking::transition(&state.db, id, BookingStatus::Cancelled, None).await?;

    // Tell the customer over LINE if we know who they are.
    if let Some(customer_id) = &updated.customer_id {
        let line_id: Option<String> =
            sqlx::query_scalar("SELECT line_id FROM users WHERE uid = ?")
                .bind(customer_id)
                .fetch_optional(&state.db)
                .await?;
        if let Some(line_id) = line_id {
            let message = format!(
                "ขออภัยค่ะ การจองของคุณวันที่ {} เวลา {} ถูกยกเลิกโดยทางร้าน\nกรุณาเลือกเวลาใหม่อีกครั้งนะคะ 🙏",
                updated.date, updated.time
            );
            notify::push_message(&state.line_token, &line_id, &message).await;
        }
    }

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/staff/bookings/{id} — hard removal (cleanup, not a status
/// change). The payment record stays behind.
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<&'static str>>> {
    require_staff(&headers, &state).await?;
    booking::delete(&state.db, id).await?;
    Ok(Json(ApiResponse::success("ลบการจองแล้ว")))
}

/// POST /api/staff/blocks — block one of the caller's own slots as a break.
pub async fn create_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBlockRequest>,
) -> ApiResult<Json<ApiResponse<AvailabilityBlock>>> {
    let profile = require_staff(&headers, &state).await?;
    slots::validate_cell(&body.date, &body.time)?;

    let block_id = booking::create_block(&state.db, &profile.uid, &body.date, &body.time).await?;
    let block =
        sqlx::query_as::<_, AvailabilityBlock>("SELECT * FROM availability_blocks WHERE id = ?")
            .bind(block_id)
            .fetch_one(&state.db)
            .await?;
    Ok(Json(ApiResponse::success(block)))
}

/// DELETE /api/staff/blocks/{id} — reopen a blocked slot.
pub async fn remove_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<&'static str>>> {
    require_staff(&headers, &state).await?;
    booking::remove_block(&state.db, id).await?;
    Ok(Json(ApiResponse::success("เปิดช่วงเวลาแล้ว")))
}
