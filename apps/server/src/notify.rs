//! Fire-and-forget LINE pushes. Failures are logged, never propagated:
//! a booking must not fail because a notification did.

/// Push a text message to a LINE user (customer or the shop admin).
pub async fn push_message(channel_token: &str, to: &str, text: &str) {
    if channel_token.is_empty() || to.is_empty() {
        return;
    }

    let client = reqwest::Client::new();
    let result = client
        .post("https://api.line.me/v2/bot/message/push")
        .bearer_auth(channel_token)
        .json(&serde_json::json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }]
        }))
        .send()
        .await;

    match result {
        Ok(resp) if !resp.status().is_success() => {
            tracing::warn!("LINE push rejected: {}", resp.status());
        }
        Err(e) => {
            tracing::warn!("LINE push failed: {}", e);
        }
        _ => {}
    }
}
