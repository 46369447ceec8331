//! Airtable webhook signature verification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-airtable-signature";

type HmacSha256 = Hmac<Sha256>;

/// Verifies that `signature` is base64(HMAC-SHA256(`secret`, `body`)).
///
/// The MAC comparison runs in constant time.
///
/// # Errors
///
/// Returns a [`WebhookError`] describing why the delivery was rejected.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| WebhookError::MalformedSignature)?;

    keyed_mac(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| WebhookError::SignatureMismatch)
}

/// Computes the signature Airtable would send for `body`.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidKey`] if `secret` cannot key the MAC.
/// HMAC accepts keys of any length, so this does not happen for SHA-256.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    let mac = keyed_mac(secret, body)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn keyed_mac(secret: &[u8], body: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::InvalidKey)?;
    mac.update(body);
    Ok(mac)
}
