//! One-way hashing for passwords and access tokens.

use std::fmt::Write;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ServiceError, ServiceResult};

type HmacSha256 = Hmac<Sha256>;

/// Shared HMAC key. Publicly known: this server is for practice only.
const SECRET: &[u8] = b"This is not a production server";

/// HMAC-SHA256 of `input` under the shared secret, hex-encoded.
pub fn hash(input: &str) -> ServiceResult<String> {
    let mut mac = HmacSha256::new_from_slice(SECRET)
        .map_err(|err| ServiceError::Internal(format!("hmac key rejected: {}", err)))?;
    mac.update(input.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    }))
}
