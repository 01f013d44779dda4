//! Usage: Anti-forgery state value for one authorization handshake.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

const NONCE_BYTES: usize = 16;

pub(crate) fn generate_nonce() -> String {
    let mut random = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut random);
    STANDARD.encode(random)
}
