use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::models::SessionUser;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a session token before it's considered expired (24 hours).
const MAX_TOKEN_AGE_SECS: i64 = 86400;

/// Validates a signed session token from the external auth provider and
/// extracts the attested identity.
///
/// The token is a urlencoded string of `uid`, `name`, `auth_date` and `sig`,
/// where `sig` is hex(HMAC-SHA256(secret_key, data_check_string)) over the
/// remaining pairs sorted by key and joined with newlines, and secret_key is
/// HMAC-SHA256("SessionToken", shared_secret).
pub fn validate_session_token(token: &str, shared_secret: &str) -> Option<SessionUser> {
    let params: BTreeMap<String, String> = url::form_urlencoded::parse(token.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let sig = params.get("sig")?;

    // Reject stale tokens (replay protection)
    if let Some(auth_date_str) = params.get("auth_date") {
        if let Ok(auth_date) = auth_date_str.parse::<i64>() {
            let now = chrono::Utc::now().timestamp();
            if (now - auth_date) > MAX_TOKEN_AGE_SECS {
                tracing::warn!(
                    "session token expired: auth_date={}, age={}s",
                    auth_date,
                    now - auth_date
                );
                return None;
            }
        }
    }

    let data_check_string = check_string(&params);

    let mut secret_mac =
        HmacSha256::new_from_slice(b"SessionToken").expect("HMAC can take key of any size");
    secret_mac.update(shared_secret.as_bytes());
    let secret_key = secret_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key).expect("HMAC can take key of any size");
    mac.update(data_check_string.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != *sig {
        tracing::warn!("session token signature mismatch");
        return None;
    }

    let uid = params.get("uid")?.clone();
    if uid.is_empty() {
        return None;
    }
    let name = params.get("name").cloned().unwrap_or_default();

    Some(SessionUser { uid, name })
}

/// Sorted `key=value` pairs joined with newlines, excluding the signature.
fn check_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| k.as_str() != "sig")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the session user from the Authorization header.
/// Header format: `session <token>`
pub fn extract_session_from_header(auth_header: &str, shared_secret: &str) -> Option<SessionUser> {
    let token = auth_header.strip_prefix("session ")?;
    validate_session_token(token, shared_secret)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a correctly signed token the way the auth provider would.
    fn sign_token(uid: &str, name: &str, auth_date: i64, secret: &str) -> String {
        let mut params = BTreeMap::new();
        params.insert("uid".to_string(), uid.to_string());
        params.insert("name".to_string(), name.to_string());
        params.insert("auth_date".to_string(), auth_date.to_string());

        let mut secret_mac = HmacSha256::new_from_slice(b"SessionToken").unwrap();
        secret_mac.update(secret.as_bytes());
        let secret_key = secret_mac.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&secret_key).unwrap();
        mac.update(check_string(&params).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());

        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("uid", uid)
            .append_pair("name", name)
            .append_pair("auth_date", &auth_date.to_string())
            .append_pair("sig", &sig)
            .finish()
    }

    #[test]
    fn test_valid_token_round_trip() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_token("cust-42", "Nok", now, "topsecret");
        let user = validate_session_token(&token, "topsecret").unwrap();
        assert_eq!(user.uid, "cust-42");
        assert_eq!(user.name, "Nok");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_token("cust-42", "Nok", now, "topsecret");
        assert!(validate_session_token(&token, "othersecret").is_none());
    }

    #[test]
    fn test_tampered_uid_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_token("cust-42", "Nok", now, "topsecret");
        let tampered = token.replace("cust-42", "cust-43");
        assert!(validate_session_token(&tampered, "topsecret").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let stale = chrono::Utc::now().timestamp() - MAX_TOKEN_AGE_SECS - 60;
        let token = sign_token("cust-42", "Nok", stale, "topsecret");
        assert!(validate_session_token(&token, "topsecret").is_none());
    }

    #[test]
    fn test_header_prefix_required() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_token("cust-42", "Nok", now, "topsecret");
        assert!(extract_session_from_header(&token, "topsecret").is_none());
        let with_prefix = format!("session {token}");
        assert!(extract_session_from_header(&with_prefix, "topsecret").is_some());
    }
}
