//! Deterministic signing keys for tests.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use vms_gateway::auth::TokenCodec;
use vms_gateway::config::DEFAULT_SESSION_KEY_ID;

/// Key id every test server signs under.
pub const TEST_KEY_ID: &str = DEFAULT_SESSION_KEY_ID;

/// Deterministic 32-byte Ed25519 seed derived from `tag`.
///
/// Different tags yield different keys; the same tag always yields the same key.
pub fn test_seed(tag: u8) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for (i, byte) in seed.iter_mut().enumerate() {
        *byte = tag.wrapping_mul(31).wrapping_add(i as u8);
    }
    seed
}

/// Seed the test server is configured with.
pub fn server_seed() -> [u8; 32] {
    test_seed(1)
}

/// `SESSION_SIGNING_KEY` value for the test server.
pub fn server_signing_key_b64() -> String {
    STANDARD.encode(server_seed())
}

/// Codec holding the test server's key.
pub fn server_codec() -> TokenCodec {
    TokenCodec::new(&server_seed(), TEST_KEY_ID, Duration::from_secs(300))
        .expect("test seed is a valid Ed25519 seed")
}

/// Codec with a different key under the same key id.
///
/// Tokens from this codec look well-formed but fail signature verification.
pub fn forged_codec() -> TokenCodec {
    TokenCodec::new(&test_seed(2), TEST_KEY_ID, Duration::from_secs(300))
        .expect("test seed is a valid Ed25519 seed")
}
