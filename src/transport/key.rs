use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

/// Length of a generated key, in characters.
pub const KEY_LENGTH: usize = 20;

/// Generate a short URL-safe identifier usable as both a correlation key and
/// a partition key.
///
/// 15 bytes of a v4 UUID encode to exactly 20 base64url characters and keep
/// at least 114 random bits.
pub fn new_key() -> String {
    let uuid = Uuid::new_v4();
    URL_SAFE_NO_PAD.encode(&uuid.as_bytes()[..15])
}
