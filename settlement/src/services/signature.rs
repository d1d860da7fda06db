// settlement/src/services/signature.rs

//! Webhook authenticity: hex HMAC-SHA512 of the raw request body, keyed with the
//! gateway secret, carried in the `x-paystack-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha512;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
  // HMAC accepts keys of any length.
  let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
    Ok(mac) => mac,
    Err(_) => return String::new(),
  };
  mac.update(payload);
  hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of `signature_hex` against the expected MAC of `payload`.
pub fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
  let Ok(provided) = hex::decode(signature_hex.trim()) else {
    return false;
  };
  let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(payload);
  mac.verify_slice(&provided).is_ok()
}
