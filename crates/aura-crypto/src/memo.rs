//! # Payment Memos
//!
//! Each locked deal gets a short random memo that the buyer embeds in the
//! payment transaction. 6 random bytes encode to 8 URL-safe characters,
//! ~2.8 trillion combinations; the store's unique index catches the rare
//! collision and the caller retries.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Memo length in characters.
pub const MEMO_LEN: usize = 8;

/// Generate a cryptographically random 8-character URL-safe memo.
pub fn generate_memo() -> String {
    let mut bytes = [0u8; 6];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
