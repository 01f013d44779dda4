//! Usage: Bearer-token redaction for logs and constant-time comparison of state nonces.

use subtle::ConstantTimeEq;

const VISIBLE_HEAD: usize = 6;
const VISIBLE_TAIL: usize = 4;
const MAX_STARS: usize = 8;

/// `ya29.a0AfB_byC123456` -> `ya29.a...3456`. Short values are starred out entirely.
pub(crate) fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.trim().chars().collect();
    if chars.len() <= VISIBLE_HEAD + VISIBLE_TAIL {
        return "*".repeat(chars.len().min(MAX_STARS));
    }
    let head: String = chars[..VISIBLE_HEAD].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE_TAIL..].iter().collect();
    format!("{head}...{tail}")
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
