//! Bearer tokens identifying the calling user.
//!
//! ## Token Format
//!
//! - 16 bytes: user id
//! - 8 bytes: issue time (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 over the preceding 24 bytes
//!
//! Total: 56 bytes, base64url-encoded without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const PAYLOAD_LEN: usize = 24;
const TOKEN_LEN: usize = PAYLOAD_LEN + 32;

/// Tolerated clock skew for tokens issued "in the future".
const MAX_SKEW_MS: i64 = 5 * 60 * 1000;

#[derive(Clone)]
pub(crate) struct TokenIssuer {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub(crate) fn new(secret: &[u8], ttl: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            ttl,
        })
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn issue(&self, user_id: Uuid) -> String {
        self.issue_at(user_id, Utc::now())
    }

    fn issue_at(&self, user_id: Uuid, at: DateTime<Utc>) -> String {
        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(user_id.as_bytes());
        token.extend_from_slice(&at.timestamp_millis().to_be_bytes());
        let signature = self.sign(&token);
        token.extend_from_slice(&signature);
        URL_SAFE_NO_PAD.encode(token)
    }

    /// The user a token was issued to, if it is well-formed, correctly
    /// signed and not expired.
    pub(crate) fn verify(&self, token: &str) -> Option<Uuid> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        if bytes.len() != TOKEN_LEN {
            return None;
        }
        let (payload, signature) = bytes.split_at(PAYLOAD_LEN);

        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(signature).ok()?;

        let user_id = Uuid::from_slice(&payload[..16]).ok()?;
        let issued_ms = i64::from_be_bytes(payload[16..].try_into().ok()?);
        let now_ms = now.timestamp_millis();
        if issued_ms > now_ms + MAX_SKEW_MS {
            return None;
        }
        if now_ms - issued_ms > self.ttl.num_milliseconds() {
            tracing::debug!(user = %user_id, "token expired");
            return None;
        }
        Some(user_id)
    }

    /// Resolve an `Authorization` header value to a caller.
    pub(crate) fn authenticate(&self, header: Option<&str>) -> Option<Uuid> {
        let value = header?.trim();
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        self.verify(token)
    }

    fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const SECRET: &[u8] = b"test-secret-key-that-is-32-bytes!";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::hours(1)).unwrap()
    }

    #[test]
    fn issue_and_verify() {
        let issuer = issuer();
        let user = Uuid::new_v4();
        let token = issuer.issue(user);
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), TOKEN_LEN);
        assert_eq!(issuer.verify(&token), Some(user));
    }

    #[test]
    fn reject_tampered_token() {
        let issuer = issuer();
        let token = issuer.issue(Uuid::new_v4());
        let mut bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
        bytes[0] ^= 0xff;
        let forged = URL_SAFE_NO_PAD.encode(bytes);
        assert_eq!(issuer.verify(&forged), None);
    }

    #[test]
    fn reject_other_secret() {
        let token = issuer().issue(Uuid::new_v4());
        let other = TokenIssuer::new(b"another-secret-key-of-32-bytes!!", Duration::hours(1)).unwrap();
        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn reject_expired() {
        let issuer = issuer();
        let user = Uuid::new_v4();
        let issued = Utc::now() - Duration::hours(2);
        let token = issuer.issue_at(user, issued);
        assert_eq!(issuer.verify(&token), None);
        assert_eq!(
            issuer.verify_at(&token, issued + Duration::minutes(59)),
            Some(user)
        );
    }

    #[test]
    fn reject_far_future() {
        let issuer = issuer();
        let token = issuer.issue_at(Uuid::new_v4(), Utc::now() + Duration::hours(1));
        assert_eq!(issuer.verify(&token), None);
    }

    #[test]
    fn reject_garbage() {
        let issuer = issuer();
        assert_eq!(issuer.verify(""), None);
        assert_eq!(issuer.verify("not base64 at all!"), None);
        assert_eq!(issuer.verify(&URL_SAFE_NO_PAD.encode([0u8; 10])), None);
    }

    #[test]
    fn authorization_header() {
        let issuer = issuer();
        let user = Uuid::new_v4();
        let token = issuer.issue(user);

        assert_eq!(issuer.authenticate(Some(&format!("Bearer {token}"))), Some(user));
        assert_eq!(issuer.authenticate(Some(&format!("bearer {token}"))), Some(user));
        assert_eq!(issuer.authenticate(Some(&format!("Basic {token}"))), None);
        assert_eq!(issuer.authenticate(Some(&token)), None);
        assert_eq!(issuer.authenticate(None), None);
    }
}
