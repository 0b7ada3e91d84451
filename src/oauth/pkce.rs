use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// `N` random bytes from the thread CSPRNG, base64url without padding.
#[must_use]
pub(crate) fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE code verifier: 48 random bytes, 64 URL-safe characters (RFC 7636 allows 43-128).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token::<48>()
}

/// S256 challenge: `BASE64URL(SHA256(verifier))`.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// CSRF-binding `state` value: 16 random bytes, 22 URL-safe characters.
#[must_use]
pub fn generate_state() -> String {
    random_token::<16>()
}

/// Compare an issued and a returned `state` without early exit on the first
/// differing byte.
#[must_use]
pub fn states_match(issued: &str, returned: &str) -> bool {
    let (a, b) = (issued.as_bytes(), returned.as_bytes());
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
