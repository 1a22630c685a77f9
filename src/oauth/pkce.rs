//! PKCE (RFC 7636) verifier and S256 challenge.
//!
//! The verifier is 64 characters drawn uniformly from the unreserved alphabet
//! using the operating-system CSPRNG. Random bytes at or above the largest
//! multiple of 66 that fits in a byte are rejected, so every character is
//! equally likely.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Characters allowed in a code verifier (`[A-Za-z0-9-._~]`).
pub const VERIFIER_ALPHABET: &[u8; 66] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of every generated verifier.
pub const VERIFIER_LENGTH: usize = 64;

/// The only challenge method this crate emits.
pub const CHALLENGE_METHOD: &str = "S256";

// 3 * 66; bytes >= this would bias the low indices.
const REJECTION_BOUND: u8 = 198;

/// Generate a fresh code verifier.
///
/// Fails only when the OS random source cannot be read.
pub fn generate_verifier() -> Result<String, AuthError> {
    let mut verifier = String::with_capacity(VERIFIER_LENGTH);
    let mut buf = [0u8; VERIFIER_LENGTH];

    while verifier.len() < VERIFIER_LENGTH {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| AuthError::EntropyUnavailable(e.to_string()))?;

        for byte in buf {
            if verifier.len() == VERIFIER_LENGTH {
                break;
            }
            if byte < REJECTION_BOUND {
                let idx = usize::from(byte) % VERIFIER_ALPHABET.len();
                verifier.push(char::from(VERIFIER_ALPHABET[idx]));
            }
        }
    }

    Ok(verifier)
}

/// BASE64URL(SHA256(verifier)) with padding stripped.
pub fn derive_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
