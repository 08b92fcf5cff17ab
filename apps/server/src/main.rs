mod auth;
mod availability;
mod booking;
mod db;
mod error;
mod handlers;
mod line_layer;
mod models;
mod notify;
mod rate_limit;
mod reports;
mod slots;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rate_limit::{
    rate_limit_admin, rate_limit_auth, rate_limit_booking, rate_limit_public, rate_limit_staff,
    RateLimitConfig, RateLimiter,
};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub auth_secret: String,
    pub line_token: String,
    pub admin_line_id: String,
    pub started_at: Instant,
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Required env vars (read before tracing so LineLayer can use them) ──
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:chailai.db?mode=rwc".into());
    let auth_secret =
        std::env::var("AUTH_SHARED_SECRET").expect("AUTH_SHARED_SECRET must be set");

    // ── Optional env vars ──
    let line_token = std::env::var("LINE_CHANNEL_TOKEN").unwrap_or_default();
    let admin_line_id = std::env::var("ADMIN_LINE_ID").unwrap_or_default();
    let webapp_url = std::env::var("WEBAPP_URL").unwrap_or_default();
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());

    // ── Tracing: console + optional LINE error notifications ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let fmt_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if !line_token.is_empty() && !admin_line_id.is_empty() {
        let push_layer = line_layer::LineLayer::new(line_token.clone(), admin_line_id.clone());
        registry.with(push_layer).init();
    } else {
        registry.init();
        tracing::warn!("LINE_CHANNEL_TOKEN not set — notifications disabled");
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    db::run_migrations(&pool).await?;

    let state = Arc::new(AppState {
        db: pool,
        auth_secret,
        line_token,
        admin_line_id,
        started_at: Instant::now(),
    });

    // ── Rate limiter ──
    let rate_limiter = RateLimiter::new();
    rate_limiter.add_tier(
        "public",
        RateLimitConfig {
            max_requests: 60,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter.add_tier(
        "auth",
        RateLimitConfig {
            max_requests: 30,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter.add_tier(
        "booking",
        RateLimitConfig {
            max_requests: 5,
            window: Duration::from_secs(300),
        },
    );
    rate_limiter.add_tier(
        "staff",
        RateLimitConfig {
            max_requests: 60,
            window: Duration::from_secs(60),
        },
    );
    rate_limiter.add_tier(
        "admin",
        RateLimitConfig {
            max_requests: 120,
            window: Duration::from_secs(60),
        },
    );

    // ── Background task: cleanup stale rate limit entries ──
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    // ── CORS: whitelist WEBAPP_URL when configured, otherwise allow any ──
    let cors = if !webapp_url.is_empty() {
        let origins: Vec<axum::http::HeaderValue> = vec![
            webapp_url.parse().expect("WEBAPP_URL must be a valid URL"),
            "http://localhost:5173".parse().unwrap(), // Vite dev server
        ];
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // ── Router (tiers with per-group rate limits) ──

    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only endpoints (no auth, 60 req/min)
    let public_routes = Router::new()
        .route("/api/services", get(handlers::client::list_services))
        .route("/api/availability", get(handlers::client::day_availability))
        .route(
            "/api/availability/technicians",
            get(handlers::client::free_technicians),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_public));

    // 3. Booking creation: strictest limit (5 req/5min)
    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::client::create_booking))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_booking));

    // 4. Auth: authenticated customer endpoints (30 req/min)
    let auth_routes = Router::new()
        .route("/api/bookings/my", get(handlers::client::my_bookings))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_auth));

    // 5. Staff: technician schedule management (60 req/min)
    let staff_routes = Router::new()
        .route("/api/staff/schedule", get(handlers::staff::day_schedule))
        .route("/api/staff/walkins", post(handlers::staff::create_walk_in))
        .route(
            "/api/staff/bookings/{id}/confirm",
            post(handlers::staff::confirm_booking),
        )
        .route(
            "/api/staff/bookings/{id}/complete",
            post(handlers::staff::complete_booking),
        )
        .route(
            "/api/staff/bookings/{id}/cancel",
            post(handlers::staff::cancel_booking),
        )
        .route(
            "/api/staff/bookings/{id}",
            delete(handlers::staff::delete_booking),
        )
        .route("/api/staff/blocks", post(handlers::staff::create_block))
        .route(
            "/api/staff/blocks/{id}",
            delete(handlers::staff::remove_block),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_staff));

    // 6. Admin: dashboard endpoints (120 req/min)
    let admin_routes = Router::new()
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/{id}/status",
            put(handlers::admin::update_booking_status),
        )
        .route(
            "/api/admin/bookings/{id}",
            delete(handlers::admin::delete_booking),
        )
        .route("/api/admin/payments", get(handlers::admin::list_payments))
        .route(
            "/api/admin/payments/{id}/verification",
            put(handlers::admin::set_payment_verification),
        )
        .route("/api/admin/reports", get(handlers::admin::report_summary))
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/users", post(handlers::admin::create_user))
        .route("/api/admin/users/{uid}", put(handlers::admin::update_user))
        .route(
            "/api/admin/users/{uid}",
            delete(handlers::admin::delete_user),
        )
        .route(
            "/api/admin/services",
            post(handlers::admin::create_service),
        )
        .route(
            "/api/admin/services/{id}",
            put(handlers::admin::update_service),
        )
        .route(
            "/api/admin/services/{id}",
            delete(handlers::admin::delete_service),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_admin));

    let app = Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(auth_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("ChaiLai booking server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
