//! Booking lifecycle and the conflict guard.
//!
//! Slot occupancy is re-checked inside the same write transaction that
//! inserts the booking, so two clients racing for the same free-looking
//! cell cannot both commit. The availability endpoints are advisory; this
//! module is the authority.

use chrono::{FixedOffset, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, BookingStatus, CreateBookingRequest, Service, WalkInRequest};

/// Shop timezone offset (Indochina Time, UTC+7).
const ICT_OFFSET_SECS: i32 = 7 * 3600;

/// Flat deposit charged on every online booking, in baht.
pub const DEPOSIT_FLAT: i64 = 150;

/// Services whose name carries this marker are training courses and take a
/// half-price deposit instead of the flat amount.
pub const COURSE_MARKER: &str = "คอร์สเรียน";

pub fn bangkok_now() -> chrono::DateTime<FixedOffset> {
    let ict = FixedOffset::east_opt(ICT_OFFSET_SECS).unwrap();
    Utc::now().with_timezone(&ict)
}

fn bangkok_timestamp() -> String {
    bangkok_now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Deposit captured at creation. Fixed for the life of the booking.
pub fn deposit_for(service: &Service) -> i64 {
    if service.name.contains(COURSE_MARKER) {
        service.price / 2
    } else {
        DEPOSIT_FLAT
    }
}

/// The status machine: pending → confirmed | cancelled,
/// confirmed → completed | cancelled; completed and cancelled are terminal.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
    )
}

/// Conflict guard: does any non-cancelled booking or break block already
/// claim this (technician, date, time) cell? Must run on the transaction
/// that performs the subsequent insert.
pub async fn slot_occupied(
    conn: &mut SqliteConnection,
    employee_id: &str,
    date: &str,
    time: &str,
) -> Result<bool, sqlx::Error> {
    let bookings: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings
         WHERE employee_id = ? AND date = ? AND time = ? AND status != 'cancelled'",
    )
    .bind(employee_id)
    .bind(date)
    .bind(time)
    .fetch_one(&mut *conn)
    .await?;

    let blocks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM availability_blocks
         WHERE employee_id = ? AND date = ? AND time = ?",
    )
    .bind(employee_id)
    .bind(date)
    .bind(time)
    .fetch_one(&mut *conn)
    .await?;

    Ok(bookings + blocks > 0)
}

/// Online creation: booking (`pending`) and its payment record are one
/// atomic write. Either both rows exist afterwards or neither does.
pub async fn create_online(
    pool: &SqlitePool,
    customer_id: &str,
    customer_name: &str,
    service: &Service,
    req: &CreateBookingRequest,
) -> ApiResult<i64> {
    let mut tx = pool.begin().await?;

    if slot_occupied(&mut tx, &req.employee_id, &req.date, &req.time).await? {
        return Err(ApiError::SlotConflict {
            employee_id: req.employee_id.clone(),
            date: req.date.clone(),
            time: req.time.clone(),
        });
    }

    let deposit = deposit_for(service);
    let booking_id = sqlx::query(
        "INSERT INTO bookings (customer_id, customer_name, service_id, employee_id,
                               date, time, status, deposit, booking_type, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, 'online', ?)",
    )
    .bind(customer_id)
    .bind(customer_name)
    .bind(service.id)
    .bind(&req.employee_id)
    .bind(&req.date)
    .bind(&req.time)
    .bind(deposit)
    .bind(bangkok_timestamp())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query(
        "INSERT INTO payments (booking_id, payment_channel, amount, proof_image_url, verification_status)
         VALUES (?, ?, ?, ?, 'pending')",
    )
    .bind(booking_id)
    .bind(&req.payment_channel)
    .bind(deposit)
    .bind(&req.proof_image_url)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(booking_id)
}

/// Walk-in creation by staff: goes straight to `confirmed`, no deposit and
/// no payment record. Same guard as the online path.
pub async fn create_walk_in(
    pool: &SqlitePool,
    employee_id: &str,
    req: &WalkInRequest,
) -> ApiResult<i64> {
    let mut tx = pool.begin().await?;

    if slot_occupied(&mut tx, employee_id, &req.date, &req.time).await? {
        return Err(ApiError::SlotConflict {
            employee_id: employee_id.to_string(),
            date: req.date.clone(),
            time: req.time.clone(),
        });
    }

    let booking_id = sqlx::query(
        "INSERT INTO bookings (customer_id, customer_name, service_id, employee_id,
                               date, time, status, deposit, booking_type, created_at)
         VALUES (NULL, ?, ?, ?, ?, ?, 'confirmed', 0, 'walk-in', ?)",
    )
    .bind(&req.customer_name)
    .bind(req.service_id)
    .bind(employee_id)
    .bind(&req.date)
    .bind(&req.time)
    .bind(bangkok_timestamp())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;
    Ok(booking_id)
}

/// Move a booking through the status machine. `final_price` is only legal
/// when completing; when omitted there, the service list price is charged.
pub async fn transition(
    pool: &SqlitePool,
    booking_id: i64,
    to: BookingStatus,
    final_price: Option<i64>,
) -> ApiResult<Booking> {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("การจอง"))?;

    if !can_transition(booking.status, to) {
        return Err(ApiError::Validation(format!(
            "ไม่สามารถเปลี่ยนสถานะจาก {} เป็น {}",
            booking.status.as_str(),
            to.as_str()
        )));
    }
    if final_price.is_some() && to != BookingStatus::Completed {
        return Err(ApiError::Validation(
            "กำหนดราคาสุดท้ายได้เฉพาะเมื่อปิดงานเสร็จสิ้น".into(),
        ));
    }

    if to == BookingStatus::Completed {
        let list_price: i64 = sqlx::query_scalar(
            "SELECT COALESCE((SELECT price FROM services WHERE id = ?), 0)",
        )
        .bind(booking.service_id)
        .fetch_one(pool)
        .await?;
        let charged = final_price.unwrap_or(list_price);

        sqlx::query("UPDATE bookings SET status = 'completed', final_price = ? WHERE id = ?")
            .bind(charged)
            .bind(booking_id)
            .execute(pool)
            .await?;
    } else {
        sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
            .bind(to)
            .bind(booking_id)
            .execute(pool)
            .await?;
    }

    let updated = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_one(pool)
        .await?;
    Ok(updated)
}

/// Hard delete. The paired payment row is kept as the money audit trail.
pub async fn delete(pool: &SqlitePool, booking_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(booking_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("การจอง"));
    }
    Ok(())
}

/// A break occupies its cell exactly like a booking, so it passes through
/// the same guard.
pub async fn create_block(
    pool: &SqlitePool,
    employee_id: &str,
    date: &str,
    time: &str,
) -> ApiResult<i64> {
    let mut tx = pool.begin().await?;

    if slot_occupied(&mut tx, employee_id, date, time).await? {
        return Err(ApiError::SlotConflict {
            employee_id: employee_id.to_string(),
            date: date.to_string(),
            time: time.to_string(),
        });
    }

    let block_id = sqlx::query(
        "INSERT INTO availability_blocks (employee_id, date, time, block_type)
         VALUES (?, ?, ?, 'break')",
    )
    .bind(employee_id)
    .bind(date)
    .bind(time)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;
    Ok(block_id)
}

pub async fn remove_block(pool: &SqlitePool, block_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM availability_blocks WHERE id = ?")
        .bind(block_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("ช่วงพัก"));
    }
    Ok(())
}

// ── Tests ──
