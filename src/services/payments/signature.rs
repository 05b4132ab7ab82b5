use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 over the concatenated parts.
pub(crate) fn hmac_sha256_hex(secret: &str, parts: &[&[u8]]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    for part in parts {
        mac.update(part);
    }
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Plain `hex(hmac(secret, body))` check shared by vendors that sign the body
/// alone. Signature hex is compared case-insensitively.
pub(crate) fn verify_body_hmac(secret: Option<&str>, signature: Option<&str>, body: &[u8]) -> bool {
    let (Some(secret), Some(signature)) = (secret.filter(|s| !s.is_empty()), signature) else {
        return false;
    };
    match hmac_sha256_hex(secret, &[body]) {
        Some(expected) => constant_time_eq(&expected, &signature.trim().to_ascii_lowercase()),
        None => false,
    }
}
