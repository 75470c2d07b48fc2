//! Cache key derivation for transcription requests.

use sha2::{Digest, Sha256};

/// Derives the cache key from the uploaded audio and its textual hints.
///
/// Deterministic over (audio bytes, prompt, language). Hint fields are
/// length-delimited so `("ab", "c")` and `("a", "bc")` cannot collide.
pub fn fingerprint(audio: &[u8], prompt: Option<&str>, language: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(audio);
    for hint in [prompt, language] {
        let value = hint.unwrap_or("");
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
