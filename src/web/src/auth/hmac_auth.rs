use axum::http::HeaderMap;
use core::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const MAX_SKEW_MS: i64 = 5 * 60 * 1000;

/// Server-to-server HMAC gate. The signed message is
/// `timestamp + "." + raw_body_bytes`; the `user_id` field embedded in
/// the body is trusted only after this verification succeeds.
pub fn verify_hmac_request(secret: Option<&str>, headers: &HeaderMap, raw_body: &[u8]) -> AppResult<()> {
    let secret = secret.ok_or_else(|| AppError::auth("server authentication is not configured"))?;

    let timestamp_header = headers
        .get("x-brain-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::auth("missing X-Brain-Timestamp header"))?;

    let signature_header = headers
        .get("x-brain-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::auth("missing X-Brain-Signature header"))?;

    let timestamp: i64 = timestamp_header
        .parse()
        .map_err(|_| AppError::auth("malformed X-Brain-Timestamp header"))?;

    let now = chrono::Utc::now().timestamp_millis();
    if (now - timestamp).abs() > MAX_SKEW_MS {
        return Err(AppError::auth("request timestamp is outside the allowed window"));
    }

    let expected_hex = signature_header
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::auth("malformed X-Brain-Signature header"))?;
    let expected_bytes = hex::decode(expected_hex).map_err(|_| AppError::auth("malformed signature encoding"))?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| AppError::infra("invalid hmac key"))?;
    mac.update(timestamp_header.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let computed = mac.finalize().into_bytes();

    if computed.as_slice().ct_eq(&expected_bytes).unwrap_u8() != 1 {
        return Err(AppError::auth("signature mismatch"));
    }

    Ok(())
}
