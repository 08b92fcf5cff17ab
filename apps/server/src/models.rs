use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

// ── Database models ──

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: i64,
    pub duration_min: i64,
    pub image: String,
}

/// Placeholder name resolved when a booking references a service that was
/// deleted. Lookups must never fail on a missing foreign key.
pub const DELETED_SERVICE_NAME: &str = "Deleted Service";

/// User role. The only structural difference between a customer and an
/// employee is the employee's position, so the position lives inside the
/// variant instead of a nullable field on the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Customer,
    Technician { position: String },
    Admin { position: String },
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Technician { .. } => "technician",
            Role::Admin { .. } => "admin",
        }
    }

    pub fn position(&self) -> Option<&str> {
        match self {
            Role::Customer => None,
            Role::Technician { position } | Role::Admin { position } => Some(position),
        }
    }

    /// Technicians and admins both work the schedule.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Customer)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin { .. })
    }

    pub fn from_parts(role: &str, position: Option<String>) -> Option<Self> {
        match role {
            "customer" => Some(Role::Customer),
            "technician" => Some(Role::Technician {
                position: position.unwrap_or_default(),
            }),
            "admin" => Some(Role::Admin {
                position: position.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub line_id: String,
    pub profile_picture: String,
    #[serde(flatten)]
    pub role: Role,
}

impl sqlx::FromRow<'_, SqliteRow> for UserProfile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role_str: String = row.try_get("role")?;
        let position: Option<String> = row.try_get("position")?;
        let role =
            Role::from_parts(&role_str, position).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "role".into(),
                source: format!("unknown role '{role_str}'").into(),
            })?;
        Ok(Self {
            uid: row.try_get("uid")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            line_id: row.try_get("line_id")?,
            profile_picture: row.try_get("profile_picture")?,
            role,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum BookingType {
    Online,
    WalkIn,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub service_id: i64,
    pub employee_id: String,
    pub date: String,
    pub time: String,
    pub status: BookingStatus,
    pub deposit: i64,
    pub final_price: Option<i64>,
    #[serde(rename = "type")]
    pub booking_type: BookingType,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub payment_channel: String,
    pub amount: i64,
    pub proof_image_url: Option<String>,
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AvailabilityBlock {
    pub id: i64,
    pub employee_id: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "type")]
    pub block_type: String,
}

/// Booking joined with its service snapshot at read time. A deleted service
/// resolves to the placeholder name with price 0 instead of failing the join.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingDetail {
    pub id: i64,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub service_id: i64,
    pub service_name: String,
    pub service_price: i64,
    pub employee_id: String,
    pub date: String,
    pub time: String,
    pub status: BookingStatus,
    pub deposit: i64,
    pub final_price: Option<i64>,
    #[serde(rename = "type")]
    pub booking_type: BookingType,
    pub created_at: String,
    /// What the receipt charges: final price once completed, list price before.
    pub charge_total: i64,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: i64,
    pub employee_id: String,
    pub date: String,
    pub time: String,
    pub payment_channel: String,
    pub proof_image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct WalkInRequest {
    pub customer_name: String,
    pub service_id: i64,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteBookingRequest {
    pub final_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
    pub final_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct TechniciansQuery {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub booking_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub status: VerificationStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub line_id: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(flatten)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub line_id: Option<String>,
    pub profile_picture: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_min: i64,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub duration_min: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Session auth ──

/// Identity attested by the external auth provider's signed token.
/// Only the uid is trusted; the role always comes from the stored profile.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub uid: String,
    pub name: String,
}

// ── Tests ──
