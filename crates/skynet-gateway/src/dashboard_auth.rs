//! Dashboard bearer-token auth.
//!
//! Every `/api/*` route (and the `/ws/messages` upgrade, via a query param
//! instead of a header) is gated by a `DashboardToken`. Tokens are minted in
//! plaintext once, via `skynet-gateway dashboard-token mint <label>`, then
//! stored only as a SHA-256 hash — verification re-hashes the presented
//! value and looks up the hash.

use axum::http::{HeaderMap, StatusCode};
use sha2::{Digest, Sha256};

use skynet_memory::MemoryManager;

use crate::app::AppState;

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Check the `Authorization: Bearer <token>` header against the store.
/// Returns `401` on anything but an exact match against an enabled token.
pub fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let raw = extract_bearer(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    verify_dashboard_token(&state.memory, raw)
}

/// Same check, for the WebSocket upgrade where the token travels as a query
/// parameter because some clients can't set headers during the handshake.
pub fn check_auth_query(state: &AppState, token: Option<&str>) -> Result<(), StatusCode> {
    let raw = token.ok_or(StatusCode::UNAUTHORIZED)?;
    verify_dashboard_token(&state.memory, raw)
}

/// Hash `raw` and look it up directly against `memory`, independent of
/// `AppState` — lets auth be exercised in tests without a full bridge.
pub fn verify_dashboard_token(memory: &MemoryManager, raw: &str) -> Result<(), StatusCode> {
    let hash = hash_token(raw);
    match memory.verify_dashboard_token(&hash) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_memory() -> (MemoryManager, String) {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let memory = MemoryManager::new(conn).unwrap();
        let raw = uuid::Uuid::new_v4().to_string();
        let hash = hash_token(&raw);
        memory.create_dashboard_token("t1", &hash).unwrap();
        (memory, raw)
    }

    fn bearer_headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(axum::http::header::AUTHORIZATION, v.parse().unwrap());
        }
        headers
    }

    #[test]
    fn correct_bearer_token_succeeds() {
        let (memory, raw) = seeded_memory();
        let headers = bearer_headers(Some(&format!("Bearer {raw}")));
        let raw_token = extract_bearer(&headers).unwrap();
        assert!(verify_dashboard_token(&memory, raw_token).is_ok());
    }

    #[test]
    fn wrong_bearer_token_is_unauthorized() {
        let (memory, _raw) = seeded_memory();
        let headers = bearer_headers(Some("Bearer wrong-token"));
        let raw_token = extract_bearer(&headers).unwrap();
        assert_eq!(verify_dashboard_token(&memory, raw_token), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = bearer_headers(None);
        assert_eq!(extract_bearer(&headers), None);
    }
}
