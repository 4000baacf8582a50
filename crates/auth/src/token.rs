//! Token issuance and verification.
//!
//! Two independent layers over two independent key rings:
//!
//! - **sign/verify**: HS256 JWT carrying `{sub, account_id, iat, exp, iss}`,
//!   signed with the newest signing key, verified newest-first across the ring;
//! - **encrypt/decrypt**: AES-256-GCM envelope over `JSON({data, issuer})`,
//!   giving holders an opaque wire value and binding issuer intent.
//!
//! Bearer tokens and capability tokens are both "sign, then envelope"; the
//! outer layer keeps claims opaque in transit while the inner signature stays
//! the authoritative, independently-rotatable proof of integrity.

use std::sync::Arc;
use std::time::Duration;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use campuskit_core::{AccountId, AuthConfig, AuthError, AuthResult, DenyReason};

use crate::keyring::{KeyPurpose, KeyRing, Secret};

const NONCE_BYTES: usize = 12;

/// Marks a signed token as redeemable for one specific action instead of
/// bearer authentication. A bearer token can never stand in for a capability
/// and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    ResetPassword,
    Invite,
}

/// Signed claims. `kind` is absent for ordinary bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Login identity (email).
    pub sub: String,

    /// Owning account.
    pub account_id: AccountId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CapabilityKind>,

    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Serialize)]
struct EnvelopeSealed<'a, T: Serialize> {
    data: &'a T,
    issuer: &'a str,
}

#[derive(Deserialize)]
struct EnvelopeOpened<T> {
    data: T,
    issuer: String,
}

/// Issues and verifies signed tokens and opaque envelopes for one issuer.
#[derive(Debug, Clone)]
pub struct TokenService {
    issuer: String,
    ttl: Duration,
    signing: Arc<KeyRing>,
    envelope: Arc<KeyRing>,
}

impl TokenService {
    pub fn new(
        issuer: impl Into<String>,
        ttl: Duration,
        signing: Arc<KeyRing>,
        envelope: Arc<KeyRing>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            ttl,
            signing,
            envelope,
        }
    }

    /// Build from validated startup configuration with freshly seeded rings.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.issuer.clone(),
            config.token_ttl,
            Arc::new(KeyRing::new(KeyPurpose::Signing)),
            Arc::new(KeyRing::new(KeyPurpose::Envelope)),
        ))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Rings, for handing to a [`crate::keyring::KeyRotator`].
    pub fn rings(&self) -> Vec<Arc<KeyRing>> {
        vec![self.signing.clone(), self.envelope.clone()]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Signed layer
    // ─────────────────────────────────────────────────────────────────────

    /// Sign claims with the newest signing key.
    pub fn sign(
        &self,
        identity: &str,
        account_id: AccountId,
        kind: Option<CapabilityKind>,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::internal(format!("token ttl out of range: {e}")))?;

        let claims = TokenClaims {
            sub: identity.to_string(),
            account_id,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        let key = EncodingKey::from_secret(self.signing.newest().as_bytes());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| AuthError::internal(format!("token signing failed: {e}")))
    }

    /// Verify a signed token against the ring, newest key first.
    ///
    /// Signature, expiry, and issuer must all check out under a single key;
    /// otherwise the caller gets one typed failure with no detail about which
    /// check failed.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        for key in self.signing.keys_newest_first() {
            let decoding = DecodingKey::from_secret(key.as_bytes());
            if let Ok(data) = jsonwebtoken::decode::<TokenClaims>(token, &decoding, &validation) {
                return Ok(data.claims);
            }
        }

        Err(AuthError::Unauthorized(DenyReason::InvalidToken))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Envelope layer
    // ─────────────────────────────────────────────────────────────────────

    /// Seal `data` under the newest envelope key.
    pub fn encrypt<T: Serialize>(&self, data: &T) -> AuthResult<String> {
        self.encrypt_with(data, &self.envelope.newest())
    }

    /// Seal `data` under an explicit key. Wire form: `base64(nonce || ciphertext)`.
    pub fn encrypt_with<T: Serialize>(&self, data: &T, key: &Secret) -> AuthResult<String> {
        let plain = serde_json::to_vec(&EnvelopeSealed {
            data,
            issuer: &self.issuer,
        })
        .map_err(|e| AuthError::internal(format!("envelope serialization failed: {e}")))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plain.as_slice())
            .map_err(|_| AuthError::internal("envelope encryption failed"))?;

        let mut wire = nonce.to_vec();
        wire.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(wire))
    }

    /// Open an envelope, trying the full ring newest-first.
    pub fn decrypt<T: DeserializeOwned>(&self, opaque: &str) -> AuthResult<T> {
        self.decrypt_with(opaque, &self.envelope.keys_newest_first())
    }

    /// Open an envelope with an explicit key list.
    ///
    /// An issuer mismatch inside a successfully decrypted envelope is reported
    /// as the same `CannotDecrypt` as a wrong key — the failure mode must not
    /// act as an oracle for which layer rejected the value.
    pub fn decrypt_with<T: DeserializeOwned>(
        &self,
        opaque: &str,
        keys: &[Secret],
    ) -> AuthResult<T> {
        let wire = URL_SAFE_NO_PAD
            .decode(opaque)
            .map_err(|_| AuthError::Unauthorized(DenyReason::CannotDecrypt))?;
        if wire.len() <= NONCE_BYTES {
            return Err(AuthError::Unauthorized(DenyReason::CannotDecrypt));
        }
        let (nonce, ciphertext) = wire.split_at(NONCE_BYTES);
        let nonce = Nonce::from_slice(nonce);

        for key in keys {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
            let Ok(plain) = cipher.decrypt(nonce, ciphertext) else {
                continue;
            };
            let Ok(opened) = serde_json::from_slice::<EnvelopeOpened<T>>(&plain) else {
                continue;
            };
            if opened.issuer == self.issuer {
                return Ok(opened.data);
            }
        }

        Err(AuthError::Unauthorized(DenyReason::CannotDecrypt))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Double-wrapped bearer/capability values
    // ─────────────────────────────────────────────────────────────────────

    /// Sign and envelope-wrap: the opaque value clients carry.
    pub fn issue(
        &self,
        identity: &str,
        account_id: AccountId,
        kind: Option<CapabilityKind>,
    ) -> AuthResult<String> {
        let signed = self.sign(identity, account_id, kind)?;
        self.encrypt(&signed)
    }

    /// Unwrap and verify an opaque value back into claims.
    pub fn open(&self, opaque: &str) -> AuthResult<TokenClaims> {
        let signed: String = self.decrypt(opaque)?;
        self.verify(&signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::KeyPurpose;

    fn service(issuer: &str, ttl: Duration) -> TokenService {
        TokenService::new(
            issuer,
            ttl,
            Arc::new(KeyRing::new(KeyPurpose::Signing)),
            Arc::new(KeyRing::new(KeyPurpose::Envelope)),
        )
    }

    fn day() -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }

    #[test]
    fn from_config_validates_first() {
        let mut config = AuthConfig {
            pepper: "site-pepper".to_string(),
            ..AuthConfig::default()
        };
        let tokens = TokenService::from_config(&config).unwrap();
        assert_eq!(tokens.issuer(), "campuskit");

        // Rotation faster than the TTL would strand still-valid tokens.
        config.rotation_interval = Duration::from_secs(60);
        assert!(TokenService::from_config(&config).is_err());
    }

    #[test]
    fn sign_verify_round_trip() {
        let tokens = service("campuskit", day());
        let account = AccountId::new();
        let signed = tokens.sign("alice@example.com", account, None).unwrap();
        let claims = tokens.verify(&signed).unwrap();

        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.account_id, account);
        assert_eq!(claims.kind, None);
        assert_eq!(claims.iss, "campuskit");
    }

    #[test]
    fn verify_survives_one_rotation_but_not_two() {
        let tokens = service("campuskit", day());
        let signed = tokens.sign("alice@example.com", AccountId::new(), None).unwrap();

        tokens.signing.rotate();
        assert!(tokens.verify(&signed).is_ok());

        tokens.signing.rotate();
        assert_eq!(
            tokens.verify(&signed),
            Err(AuthError::Unauthorized(DenyReason::InvalidToken))
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service("campuskit", Duration::ZERO);
        let signed = tokens.sign("alice@example.com", AccountId::new(), None).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(tokens.verify(&signed).is_err());
    }

    #[test]
    fn issuer_is_part_of_the_signed_contract() {
        let a = service("issuer-a", day());
        // Same signing key, different issuer expectation.
        let b = TokenService::new("issuer-b", day(), a.signing.clone(), a.envelope.clone());

        let signed = a.sign("alice@example.com", AccountId::new(), None).unwrap();
        assert!(a.verify(&signed).is_ok());
        assert!(b.verify(&signed).is_err());
    }

    #[test]
    fn envelope_round_trip() {
        let tokens = service("campuskit", day());
        let opaque = tokens.encrypt(&"payload".to_string()).unwrap();
        let opened: String = tokens.decrypt(&opaque).unwrap();
        assert_eq!(opened, "payload");
    }

    #[test]
    fn envelope_binds_issuer() {
        let a = service("issuer-a", day());
        let b = TokenService::new("issuer-b", day(), a.signing.clone(), a.envelope.clone());

        let opaque = a.encrypt(&"payload".to_string()).unwrap();
        // Same key ring; only the embedded issuer differs.
        assert_eq!(
            b.decrypt::<String>(&opaque),
            Err(AuthError::Unauthorized(DenyReason::CannotDecrypt))
        );
    }

    #[test]
    fn envelope_survives_one_rotation_but_not_two() {
        let tokens = service("campuskit", day());
        let opaque = tokens.encrypt(&42u32).unwrap();

        tokens.envelope.rotate();
        assert_eq!(tokens.decrypt::<u32>(&opaque), Ok(42));

        tokens.envelope.rotate();
        assert!(tokens.decrypt::<u32>(&opaque).is_err());
    }

    #[test]
    fn garbage_opaque_values_fail_closed() {
        let tokens = service("campuskit", day());
        for junk in ["", "!!!", "aGVsbG8"] {
            assert_eq!(
                tokens.open(junk),
                Err(AuthError::Unauthorized(DenyReason::CannotDecrypt))
            );
        }
    }

    #[test]
    fn issue_open_round_trip_preserves_kind() {
        let tokens = service("campuskit", day());
        let opaque = tokens
            .issue("alice@example.com", AccountId::new(), Some(CapabilityKind::ResetPassword))
            .unwrap();
        let claims = tokens.open(&opaque).unwrap();
        assert_eq!(claims.kind, Some(CapabilityKind::ResetPassword));
    }
}
