//! Minimal JWT claim inspection
//!
//! Bearer tokens issued for the runtime are JWTs. The client never verifies
//! signatures; it only reads the `exp` claim so it can decide when a token
//! should be replaced. Decoding accepts URL-safe and standard base64 with or
//! without padding, since issuers differ on both.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a token's claims could not be read
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("token has no payload segment")]
    MissingPayload,
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Current wall-clock time as fractional seconds since the Unix epoch
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Decode the claims object from the middle segment of a JWT
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, JwtError> {
    let payload = token.split('.').nth(1).ok_or(JwtError::MissingPayload)?;
    let payload = payload.trim().trim_end_matches('=');

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(payload))?;

    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(claims) => Ok(claims),
        _ => Err(JwtError::NotAnObject),
    }
}

/// Read the `exp` claim, if the token carries a numeric one
pub fn expiry_claim(token: &str) -> Option<f64> {
    decode_claims(token)
        .ok()?
        .get("exp")
        .and_then(Value::as_f64)
}

/// Whether `token` is expired at `now`
///
/// A token whose claims cannot be decoded counts as expired so callers fetch
/// a replacement instead of sending something the server will reject. A
/// decodable token without an `exp` claim never expires.
pub fn is_token_expired_at(token: &str, now: f64) -> bool {
    match decode_claims(token) {
        Ok(claims) => match claims.get("exp").and_then(Value::as_f64) {
            Some(exp) if now >= exp => {
                warn!(
                    "Bearer token expired (exp: {}, now: {:.0})",
                    exp, now
                );
                true
            }
            _ => false,
        },
        Err(e) => {
            debug!("Could not decode bearer token claims, treating as expired: {}", e);
            true
        }
    }
}

/// Whether `token` is expired right now
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, now_epoch_secs())
}

#[cfg(test)]
pub(crate) fn make_token(claims: &Value) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, body)
}
