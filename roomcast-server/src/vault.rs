//! Password salting, hashing, and verification for room credentials.
//!
//! Rooms never store a plaintext password: each gets a fresh 32-byte random
//! salt and a PBKDF2-HMAC-SHA256 digest. The iteration count is deliberately
//! high so offline brute force stays expensive. Verification re-derives with
//! the stored salt and compares digests in constant time.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Length of the per-room random salt in bytes.
pub const SALT_LEN: usize = 32;

/// Length of the derived digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// A salted password digest stored with a room.
#[derive(Debug, Clone)]
pub struct PasswordRecord {
    salt: [u8; SALT_LEN],
    digest: [u8; DIGEST_LEN],
}

impl PasswordRecord {
    /// Derives a record from a plaintext password with a fresh random salt.
    ///
    /// The plaintext is not retained after this call returns.
    #[must_use]
    pub fn derive(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let digest = derive_digest(password, &salt);
        Self { salt, digest }
    }

    /// Checks a candidate password against the stored digest.
    ///
    /// Re-derives with the stored salt and compares in constant time.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        let candidate_digest = derive_digest(candidate, &self.salt);
        candidate_digest.ct_eq(&self.digest).into()
    }

    /// Returns the stored salt.
    #[must_use]
    pub const fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }
}

fn derive_digest(password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut digest);
    digest
}
