//! Password hashing and verification.
//!
//! Two-stage salted scrypt: the per-credential salt is stored next to the
//! hash, the site-wide pepper is not. Compromise of the credential store alone
//! is insufficient for an offline attack; the pepper must also leak.

use rand::RngCore;
use rand::rngs::OsRng;

use campuskit_core::{AuthError, AuthResult};

pub use scrypt::Params;

/// Per-credential salt length in bytes (hex-encoded for storage).
pub const SALT_BYTES: usize = 32;

const DIGEST_BYTES: usize = 32;

/// Deterministic, salted, two-stage password hasher.
///
/// `digest = scrypt(hex(scrypt(password, salt)), pepper)`, both stages with
/// fixed 32-byte output, hex-encoded.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
    params: Params,
}

impl PasswordHasher {
    /// Production-strength parameters.
    pub fn new(pepper: impl Into<String>) -> Self {
        Self::with_params(pepper, Params::recommended())
    }

    /// Explicit parameters. Tests use cheap parameters; the derivation is
    /// parameter-independent apart from cost.
    pub fn with_params(pepper: impl Into<String>, params: Params) -> Self {
        Self {
            pepper: pepper.into(),
            params,
        }
    }

    /// Hash `password` under the per-credential `salt` and the site pepper.
    pub fn hash(&self, password: &str, salt: &str) -> AuthResult<String> {
        let first = self.derive(password.as_bytes(), salt.as_bytes())?;
        let second = self.derive(hex::encode(first).as_bytes(), self.pepper.as_bytes())?;
        Ok(hex::encode(second))
    }

    /// Check `password` against a stored digest. Derivation errors verify as
    /// false rather than surfacing detail to login paths.
    pub fn verify(&self, password: &str, salt: &str, digest: &str) -> bool {
        match self.hash(password, salt) {
            Ok(computed) => eq_digest(&computed, digest),
            Err(_) => false,
        }
    }

    /// Fresh cryptographically random salt, hex-encoded.
    ///
    /// Generated per credential and regenerated on every password change;
    /// salts are never reused.
    pub fn generate_salt() -> String {
        let mut bytes = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn derive(&self, input: &[u8], salt: &[u8]) -> AuthResult<[u8; DIGEST_BYTES]> {
        let mut out = [0u8; DIGEST_BYTES];
        scrypt::scrypt(input, salt, &self.params, &mut out)
            .map_err(|e| AuthError::internal(format!("scrypt derivation failed: {e}")))?;
        Ok(out)
    }
}

impl core::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Never expose the pepper.
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

/// Compare two fixed-length hex digests without short-circuiting.
///
/// Both inputs are already KDF outputs, so timing on the comparison cannot be
/// turned into a guess oracle on the password; the non-short-circuit fold is
/// defense in depth.
fn eq_digest(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cheap() -> PasswordHasher {
        PasswordHasher::with_params("unit-test-pepper", Params::new(8, 8, 1, 32).unwrap())
    }

    #[test]
    fn round_trip_verifies() {
        let hasher = cheap();
        let salt = PasswordHasher::generate_salt();
        let digest = hasher.hash("correct horse", &salt).unwrap();

        assert!(hasher.verify("correct horse", &salt, &digest));
        assert!(!hasher.verify("correct hors", &salt, &digest));
    }

    #[test]
    fn digest_depends_on_salt() {
        let hasher = cheap();
        let a = hasher.hash("pw", &PasswordHasher::generate_salt()).unwrap();
        let b = hasher.hash("pw", &PasswordHasher::generate_salt()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_depends_on_pepper() {
        let salt = PasswordHasher::generate_salt();
        let params = Params::new(8, 8, 1, 32).unwrap();
        let a = PasswordHasher::with_params("pepper-a", params).hash("pw", &salt).unwrap();
        let b = PasswordHasher::with_params("pepper-b", params).hash("pw", &salt).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salts_are_unique_and_sized() {
        let a = PasswordHasher::generate_salt();
        let b = PasswordHasher::generate_salt();
        assert_eq!(a.len(), SALT_BYTES * 2);
        assert_ne!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn any_password_round_trips(password in "[ -~]{1,40}") {
            let hasher = cheap();
            let salt = PasswordHasher::generate_salt();
            let digest = hasher.hash(&password, &salt).unwrap();
            prop_assert!(hasher.verify(&password, &salt, &digest));
        }

        #[test]
        fn different_password_fails(a in "[a-z]{4,16}", b in "[A-Z]{4,16}") {
            let hasher = cheap();
            let salt = PasswordHasher::generate_salt();
            let digest = hasher.hash(&a, &salt).unwrap();
            prop_assert!(!hasher.verify(&b, &salt, &digest));
        }
    }
}
