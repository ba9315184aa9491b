//! Signed cookie values.
//!
//! Values are signed as `<value>.<signature>` where the signature is the
//! unpadded base64 HMAC-SHA256 of the value keyed with the organization's
//! `secret_key`, the format of the `cookie-signature` package.

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs `value` with `secret`.
#[must_use]
pub fn sign(value: &str, secret: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return value.to_string();
    };
    mac.update(value.as_bytes());
    let signature = STANDARD_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{value}.{signature}")
}

/// Verifies a signed value and returns the original value.
///
/// Returns `None` when the signature is missing or does not match.
#[must_use]
pub fn unsign(signed: &str, secret: &str) -> Option<String> {
    let (value, signature) = signed.rsplit_once('.')?;
    let provided = STANDARD_NO_PAD.decode(signature).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(value.as_bytes());

    // Constant-time comparison
    mac.verify_slice(&provided).ok()?;
    Some(value.to_string())
}
