use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::{booking, models::*, reports, AppState};

use super::client::{booking_detail_select, require_profile, require_user};

async fn require_admin(headers: &HeaderMap, state: &AppState) -> ApiResult<UserProfile> {
    let user = require_user(headers, state)?;
    let profile = require_profile(state, &user.uid).await?;
    if !profile.role.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Ok(profile)
}

// ── Bookings ──

/// GET /api/admin/bookings?status=&q= — review queue. `q` matches the
/// customer or service name, case-insensitively.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<BookingDetail>>>> {
    require_admin(&headers, &state).await?;

    let bookings = if let Some(status) = query.status {
        let sql = format!(
            "{} WHERE b.status = ? ORDER BY b.date ASC, b.time ASC",
            booking_detail_select()
        );
        sqlx::query_as::<_, BookingDetail>(&sql)
            .bind(status)
            .fetch_all(&state.db)
            .await?
    } else {
        let sql = format!("{} ORDER BY b.date ASC, b.time ASC", booking_detail_select());
        sqlx::query_as::<_, BookingDetail>(&sql)
            .fetch_all(&state.db)
            .await?
    };

    let bookings = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => {
            let needle = q.to_lowercase();
            bookings
                .into_iter()
                .filter(|b| {
                    b.customer_name.to_lowercase().contains(&needle)
                        || b.service_name.to_lowercase().contains(&needle)
                })
                .collect()
        }
        _ => bookings,
    };

    Ok(Json(ApiResponse::success(bookings)))
}

/// PUT /api/admin/bookings/{id}/status — same state machine as the staff
/// endpoints; an optional final price applies only when completing.
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBookingStatusRequest>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    require_admin(&headers, &state).await?;
    let updated = booking::transition(&state.db, id, body.status, body.final_price).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/admin/bookings/{id}
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<&'static str>>> {
    require_admin(&headers, &state).await?;
    booking::delete(&state.db, id).await?;
    Ok(Json(ApiResponse::success("ลบการจองแล้ว")))
}

// ── Payments ──

/// GET /api/admin/payments?booking_id= — deposit records for proof review.
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PaymentsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Payment>>>> {
    require_admin(&headers, &state).await?;

    let payments = if let Some(booking_id) = query.booking_id {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE booking_id = ?")
            .bind(booking_id)
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY id DESC")
            .fetch_all(&state.db)
            .await?
    };

    Ok(Json(ApiResponse::success(payments)))
}

/// PUT /api/admin/payments/{id}/verification — mark a transfer slip as
/// verified or rejected after review.
pub async fn set_payment_verification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<VerificationRequest>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    require_admin(&headers, &state).await?;

    let result = sqlx::query("UPDATE payments SET verification_status = ? WHERE id = ?")
        .bind(body.status)
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("รายการชำระเงิน"));
    }

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(payment)))
}

// ── Reports ──

/// GET /api/admin/reports?from=&to= — revenue and booking statistics over an
/// inclusive date range.
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<ApiResponse<reports::ReportSummary>>> {
    require_admin(&headers, &state).await?;

    let from = chrono::NaiveDate::parse_from_str(&query.from, "%Y-%m-%d");
    let to = chrono::NaiveDate::parse_from_str(&query.to, "%Y-%m-%d");
    match (from, to) {
        (Ok(f), Ok(t)) if f <= t => {}
        _ => return Err(ApiError::Validation("ช่วงวันที่ไม่ถูกต้อง".into())),
    }

    let sql = format!("{} ORDER BY b.date ASC", booking_detail_select());
    let bookings = sqlx::query_as::<_, BookingDetail>(&sql)
        .fetch_all(&state.db)
        .await?;
    let employees =
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE role != 'customer'")
            .fetch_all(&state.db)
            .await?;

    let summary = reports::summarize(&bookings, &employees, &query.from, &query.to);
    Ok(Json(ApiResponse::success(summary)))
}

// ── Users ──

/// GET /api/admin/users?role= — customers or staff.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<UsersQuery>,
) -> ApiResult<Json<ApiResponse<Vec<UserProfile>>>> {
    require_admin(&headers, &state).await?;

    let users = if let Some(role) = &query.role {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE role = ? ORDER BY name ASC")
            .bind(role)
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users ORDER BY name ASC")
            .fetch_all(&state.db)
            .await?
    };

    Ok(Json(ApiResponse::success(users)))
}

/// POST /api/admin/users — create a profile keyed by the identity the auth
/// provider issued. Role is fixed here; later edits touch profile fields
/// only.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserProfile>>> {
    require_admin(&headers, &state).await?;

    if body.uid.trim().is_empty() {
        return Err(ApiError::Validation("ต้องระบุรหัสผู้ใช้จากระบบยืนยันตัวตน".into()));
    }
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM users WHERE uid = ?")
        .bind(&body.uid)
        .fetch_one(&state.db)
        .await?;
    if exists {
        return Err(ApiError::Validation("มีผู้ใช้นี้อยู่แล้ว".into()));
    }

    sqlx::query(
        "INSERT INTO users (uid, email, name, phone, line_id, profile_picture, role, position)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&body.uid)
    .bind(&body.email)
    .bind(&body.name)
    .bind(&body.phone)
    .bind(&body.line_id)
    .bind(&body.profile_picture)
    .bind(body.role.as_str())
    .bind(body.role.position())
    .execute(&state.db)
    .await?;

    let user = sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = ?")
        .bind(&body.uid)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PUT /api/admin/users/{uid} — profile edits. The role itself never
/// changes; position is the one employee field the admin may adjust.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uid): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserProfile>>> {
    require_admin(&headers, &state).await?;

    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM users WHERE uid = ?")
        .bind(&uid)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::NotFound("ผู้ใช้"));
    }

    if let Some(email) = &body.email {
        sqlx::query("UPDATE users SET email = ? WHERE uid = ?")
            .bind(email)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }
    if let Some(name) = &body.name {
        sqlx::query("UPDATE users SET name = ? WHERE uid = ?")
            .bind(name)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }
    if let Some(phone) = &body.phone {
        sqlx::query("UPDATE users SET phone = ? WHERE uid = ?")
            .bind(phone)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }
    if let Some(line_id) = &body.line_id {
        sqlx::query("UPDATE users SET line_id = ? WHERE uid = ?")
            .bind(line_id)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }
    if let Some(picture) = &body.profile_picture {
        sqlx::query("UPDATE users SET profile_picture = ? WHERE uid = ?")
            .bind(picture)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }
    if let Some(position) = &body.position {
        sqlx::query("UPDATE users SET position = ? WHERE uid = ? AND role != 'customer'")
            .bind(position)
            .bind(&uid)
            .execute(&state.db)
            .await?;
    }

    let user = sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = ?")
        .bind(&uid)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /api/admin/users/{uid}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<ApiResponse<&'static str>>> {
    require_admin(&headers, &state).await?;

    let result = sqlx::query("DELETE FROM users WHERE uid = ?")
        .bind(&uid)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("ผู้ใช้"));
    }
    Ok(Json(ApiResponse::success("ลบผู้ใช้แล้ว")))
}

// ── Services ──

/// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> ApiResult<Json<ApiResponse<Service>>> {
    require_admin(&headers, &state).await?;

    if body.price < 0 || body.duration_min <= 0 {
        return Err(ApiError::Validation("ราคาหรือระยะเวลาไม่ถูกต้อง".into()));
    }

    let id = sqlx::query(
        "INSERT INTO services (name, category, description, price, duration_min, image)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&body.name)
    .bind(&body.category)
    .bind(body.description.as_deref().unwrap_or(""))
    .bind(body.price)
    .bind(body.duration_min)
    .bind(body.image.as_deref().unwrap_or(""))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(service)))
}

/// PUT /api/admin/services/{id}
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ApiResponse<Service>>> {
    require_admin(&headers, &state).await?;

    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM services WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::NotFound("บริการ"));
    }

    if let Some(name) = &body.name {
        sqlx::query("UPDATE services SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&state.db)
            .await?;
    }
    if let Some(category) = &body.category {
        sqlx::query("UPDATE services SET category = ? WHERE id = ?")
            .bind(category)
            .bind(id)
            .execute(&state.db)
            .await?;
    }
    if let Some(description) = &body.description {
        sqlx::query("UPDATE services SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(&state.db)
            .await?;
    }
    if let Some(price) = body.price {
        sqlx::query("UPDATE services SET price = ? WHERE id = ?")
            .bind(price)
            .bind(id)
            .execute(&state.db)
            .await?;
    }
    if let Some(duration) = body.duration_min {
        sqlx::query("UPDATE services SET duration_min = ? WHERE id = ?")
            .bind(duration)
            .bind(id)
            .execute(&state.db)
            .await?;
    }
    if let Some(image) = &body.image {
        sqlx::query("UPDATE services SET image = ? WHERE id = ?")
            .bind(image)
            .bind(id)
            .execute(&state.db)
            .await?;
    }

    let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::success(service)))
}

/// DELETE /api/admin/services/{id} — existing bookings keep rendering via
/// the placeholder snapshot.
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<&'static str>>> {
    require_admin(&headers, &state).await?;

    let result = sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("บริการ"));
    }
    Ok(Json(ApiResponse::success("ลบบริการแล้ว")))
}
