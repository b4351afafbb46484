//! Per-request randomness and wall-clock markers for the signer.

use chrono::Utc;
use rand::{rngs::OsRng, Rng};
use uuid::Uuid;

/// Nonce length the app uses.
pub const DEFAULT_NONCE_LENGTH: usize = 16;

const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Current Unix time in milliseconds.
pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Random string of uppercase letters and digits drawn from the OS CSPRNG.
pub fn nonce(length: usize) -> String {
    let mut rng = OsRng;

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..NONCE_ALPHABET.len());
            NONCE_ALPHABET[idx] as char
        })
        .collect()
}

pub fn default_nonce() -> String {
    nonce(DEFAULT_NONCE_LENGTH)
}

/// Fresh identifier for `transactionNumber` / `request_no`: a UUIDv4 as 32 hex chars.
pub fn request_id() -> String {
    Uuid::new_v4().simple().to_string()
}
