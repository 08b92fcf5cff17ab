//! Custom tracing layer that pushes ERROR-level events to the shop admin
//! over the LINE Messaging API.
//!
//! - Rate limited: at most one push per `MIN_INTERVAL`
//! - Deduplicated: identical messages are suppressed for `DEDUP_WINDOW`
//! - Non-blocking: the HTTP call is spawned onto the Tokio runtime

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Minimum interval between pushes (cascading errors must not spam the shop
/// owner's phone).
const MIN_INTERVAL: Duration = Duration::from_secs(10);
/// Window during which a repeated identical error stays silent.
const DEDUP_WINDOW: Duration = Duration::from_secs(60);

// ── Layer ──

/// A `tracing` layer that forwards ERROR events to one LINE user.
pub struct LineLayer {
    channel_token: String,
    admin_line_id: String,
    http: reqwest::Client,
    state: Mutex<LayerState>,
}

struct LayerState {
    last_sent: Instant,
    /// (hash, inserted_at) of recently pushed error messages.
    recent: Vec<(u64, Instant)>,
}

impl LineLayer {
    pub fn new(channel_token: String, admin_line_id: String) -> Self {
        Self {
            channel_token,
            admin_line_id,
            http: reqwest::Client::new(),
            state: Mutex::new(LayerState {
                // allow the first message immediately
                last_sent: Instant::now() - MIN_INTERVAL,
                recent: Vec::new(),
            }),
        }
    }

    /// Rate-limit + dedup decision for one message hash.
    fn should_send(&self, hash: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        state
            .recent
            .retain(|(_, ts)| now.duration_since(*ts) < DEDUP_WINDOW);

        let is_dup = state.recent.iter().any(|(h, _)| *h == hash);
        let too_soon = now.duration_since(state.last_sent) < MIN_INTERVAL;
        if is_dup || too_soon {
            return false;
        }

        state.last_sent = now;
        state.recent.push((hash, now));
        true
    }
}

impl<S: Subscriber> Layer<S> for LineLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.message();

        let target = event.metadata().target();
        let file = event.metadata().file().unwrap_or("?");
        let line = event
            .metadata()
            .line()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".into());
        let now_utc = chrono::Utc::now().format("%H:%M:%S UTC");

        let text = format!(
            "🚨 Server Error\n{message}\n— {target} ({file}:{line})\n{now_utc}"
        );

        let hash = {
            let mut h = DefaultHasher::new();
            message.hash(&mut h);
            h.finish()
        };
        if !self.should_send(hash) {
            return;
        }

        let client = self.http.clone();
        let token = self.channel_token.clone();
        let to = self.admin_line_id.clone();

        tokio::spawn(async move {
            let _ = client
                .post("https://api.line.me/v2/bot/message/push")
                .bearer_auth(&token)
                .json(&serde_json::json!({
                    "to": to,
                    "messages": [{ "type": "text", "text": text }]
                }))
                .send()
                .await;
        });
    }
}

// ── Field visitor ──

/// Collects the `message` field plus any structured fields from an event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    fn message(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let extras: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if self.message.is_empty() {
            extras.join(", ")
        } else {
            format!("{} ({})", self.message, extras.join(", "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let val = format!("{:?}", value);
        if field.name() == "message" {
            self.message = val;
        } else {
            self.fields.push((field.name().to_string(), val));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layer() -> LineLayer {
        LineLayer::new("fake-token".into(), "U0000000000000000".into())
    }

    #[test]
    fn test_first_message_allowed() {
        let layer = make_layer();
        assert!(layer.should_send(111));
    }

    #[test]
    fn test_rate_limit_suppresses_followup() {
        let layer = make_layer();
        assert!(layer.should_send(111));
        // Different error, but still inside the rate-limit interval
        assert!(!layer.should_send(222));
    }

    #[test]
    fn test_dedup_suppresses_identical() {
        let layer = make_layer();
        assert!(layer.should_send(111));

        // Fast-forward past the rate limit only
        layer.state.lock().unwrap().last_sent = Instant::now() - MIN_INTERVAL;

        assert!(!layer.should_send(111));
    }

    #[test]
    fn test_distinct_errors_allowed_after_interval() {
        let layer = make_layer();
        assert!(layer.should_send(111));

        layer.state.lock().unwrap().last_sent = Instant::now() - MIN_INTERVAL;

        assert!(layer.should_send(222));
    }

    #[test]
    fn test_dedup_expires() {
        let layer = make_layer();
        assert!(layer.should_send(111));

        {
            let mut state = layer.state.lock().unwrap();
            state.last_sent = Instant::now() - MIN_INTERVAL;
            state.recent.clear();
            state
                .recent
                .push((111, Instant::now() - DEDUP_WINDOW - Duration::from_secs(1)));
        }

        assert!(layer.should_send(111));
    }

    #[test]
    fn test_visitor_message_only() {
        let mut v = MessageVisitor::default();
        v.message = "booking insert failed".into();
        assert_eq!(v.message(), "booking insert failed");
    }

    #[test]
    fn test_visitor_message_with_fields() {
        let mut v = MessageVisitor::default();
        v.message = "store error".into();
        v.fields.push(("booking_id".into(), "42".into()));
        assert_eq!(v.message(), "store error (booking_id=42)");
    }

    #[test]
    fn test_visitor_fields_only() {
        let v = MessageVisitor {
            message: String::new(),
            fields: vec![("error".into(), "timeout".into())],
        };
        assert_eq!(v.message(), "error=timeout");
    }
}
