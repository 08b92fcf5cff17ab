use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::{auth, availability, booking, models::*, notify, slots, AppState};

// ── Shared booking query (used by staff.rs and admin.rs too) ──

/// Joined booking detail. The LEFT JOIN with COALESCE keeps bookings
/// renderable after their service was deleted.
pub fn booking_detail_select() -> String {
    format!(
        "SELECT b.id, b.customer_id, b.customer_name, b.service_id,
                COALESCE(s.name, '{placeholder}') AS service_name,
                COALESCE(s.price, 0) AS service_price,
                b.employee_id, b.date, b.time, b.status, b.deposit, b.final_price,
                b.booking_type, b.created_at,
                COALESCE(b.final_price, COALESCE(s.price, 0)) AS charge_total
         FROM bookings b
         LEFT JOIN services s ON s.id = b.service_id",
        placeholder = DELETED_SERVICE_NAME
    )
}

// ── Shared auth helpers ──

/// Extract the session identity from the Authorization header.
pub fn require_user(headers: &HeaderMap, state: &AppState) -> ApiResult<SessionUser> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    auth::extract_session_from_header(auth_header, &state.auth_secret).ok_or(ApiError::Unauthorized)
}

/// Load the stored profile for an attested uid. The profile carries the
/// authoritative role; the token never does.
pub async fn require_profile(state: &AppState, uid: &str) -> ApiResult<UserProfile> {
    sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = ?")
        .bind(uid)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::Unauthorized)
}

pub async fn fetch_booking_detail(state: &AppState, id: i64) -> ApiResult<BookingDetail> {
    let query = format!("{} WHERE b.id = ?", booking_detail_select());
    sqlx::query_as::<_, BookingDetail>(&query)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("การจอง"))
}

// ── Endpoints ──

/// GET /api/services — the service catalog.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<Vec<Service>>>> {
    let services = sqlx::query_as::<_, Service>(
        "SELECT id, name, category, description, price, duration_min, image
         FROM services ORDER BY category ASC, name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(services)))
}

/// GET /api/availability?date=YYYY-MM-DD — aggregate per-slot busy map for
/// customers who have not picked a technician yet.
pub async fn day_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<ApiResponse<Vec<availability::SlotStatus>>>> {
    if chrono::NaiveDate::parse_from_str(&query.date, "%Y-%m-%d").is_err() {
        return Err(ApiError::Validation("รูปแบบวันที่ไม่ถูกต้อง".into()));
    }

    let bookings = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE date = ?")
        .bind(&query.date)
        .fetch_all(&state.db)
        .await?;
    let blocks =
        sqlx::query_as::<_, AvailabilityBlock>("SELECT * FROM availability_blocks WHERE date = ?")
            .bind(&query.date)
            .fetch_all(&state.db)
            .await?;
    let technician_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role IN ('technician', 'admin')")
            .fetch_one(&state.db)
            .await?;

    let status = availability::aggregate_day_status(
        &bookings,
        &blocks,
        &query.date,
        technician_count as usize,
    );
    Ok(Json(ApiResponse::success(status)))
}

/// GET /api/availability/technicians?date=&time= — technicians still free at
/// an exact cell, offered once the customer picked a slot.
pub async fn free_technicians(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TechniciansQuery>,
) -> ApiResult<Json<ApiResponse<Vec<UserProfile>>>> {
    slots::validate_cell(&query.date, &query.time)?;

    let employees =
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE role != 'customer'")
            .fetch_all(&state.db)
            .await?;
    let bookings = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE date = ?")
        .bind(&query.date)
        .fetch_all(&state.db)
        .await?;
    let blocks =
        sqlx::query_as::<_, AvailabilityBlock>("SELECT * FROM availability_blocks WHERE date = ?")
            .bind(&query.date)
            .fetch_all(&state.db)
            .await?;

    let free: Vec<UserProfile> =
        availability::free_technicians(&employees, &bookings, &blocks, &query.date, &query.time)
            .into_iter()
            .cloned()
            .collect();
    Ok(Json(ApiResponse::success(free)))
}

/// POST /api/bookings — online booking with deposit proof. Booking and
/// payment are committed in one transaction behind the conflict guard.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> ApiResult<Json<ApiResponse<BookingDetail>>> {
    let user = require_user(&headers, &state)?;
    let profile = require_profile(&state, &user.uid).await?;

    slots::validate_cell(&body.date, &body.time)?;
    if body.proof_image_url.trim().is_empty() {
        return Err(ApiError::Validation("กรุณาแนบสลิปการโอนเงิน".into()));
    }
    if body.payment_channel.trim().is_empty() {
        return Err(ApiError::Validation("กรุณาระบุช่องทางการชำระเงิน".into()));
    }

    let technician =
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = ?")
            .bind(&body.employee_id)
            .fetch_optional(&state.db)
            .await?;
    match technician {
        Some(t) if t.role.is_staff() => {}
        _ => return Err(ApiError::Validation("กรุณาเลือกช่างที่ให้บริการ".into())),
    }

    let service = sqlx::query_as::<_, Service>(
        "SELECT id, name, category, description, price, duration_min, image
         FROM services WHERE id = ?",
    )
    .bind(body.service_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("บริการ"))?;

    // Denormalized display name: the stored profile wins, the auth
    // provider's name fills in for profiles that never set one.
    let customer_name = if profile.name.trim().is_empty() {
        &user.name
    } else {
        &profile.name
    };

    let booking_id =
        booking::create_online(&state.db, &user.uid, customer_name, &service, &body).await?;
    let detail = fetch_booking_detail(&state, booking_id).await?;

    let message = format!(
        "🔔 การจองใหม่\n👤 {}\n💅 {}\n📅 {} เวลา {}\n💰 มัดจำ {} ฿",
        detail.customer_name, detail.service_name, detail.date, detail.time, detail.deposit
    );
    notify::push_message(&state.line_token, &state.admin_line_id, &message).await;

    Ok(Json(ApiResponse::success(detail)))
}

/// GET /api/bookings/my — the caller's own bookings, newest day first.
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Vec<BookingDetail>>>> {
    let user = require_user(&headers, &state)?;

    let query = format!(
        "{} WHERE b.customer_id = ? ORDER BY b.date DESC, b.time DESC",
        booking_detail_select()
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&query)
        .bind(&user.uid)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(bookings)))
}
