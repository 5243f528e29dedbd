//! Minting and verifying login state and session tokens.
//!
//! Session tokens are RS256 JWTs: the private key signs, the public key
//! verifies. Only RS256 is ever accepted; a token whose header names any
//! other algorithm is refused before its signature is looked at.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use skygate_core::TeamId;
use std::fmt;

use crate::error::{SessionTokenError, StateError};
use crate::identity::Identity;
use crate::state::{StateCodec, StateRequest, StateVersion, random_hex};

/// The only algorithm session tokens are signed or verified with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

const CSRF_TOKEN_BYTES: usize = 32;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Upstream user name.
    pub sub: String,
    pub team_name: String,
    pub team_id: TeamId,
    pub is_admin: bool,
    /// CSRF token the client must echo on unsafe cookie-authenticated requests.
    pub csrf: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues state tokens and session tokens, and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    state_codec: StateCodec,
    expiry: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer from PEM-encoded RSA key material.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError::InvalidKey` if either key cannot be parsed.
    pub fn from_rsa_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        state_codec: StateCodec,
        expiry: Duration,
    ) -> Result<Self, SessionTokenError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| SessionTokenError::InvalidKey {
                reason: format!("signing key: {e}"),
            })?;
        let decoding_key =
            DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| SessionTokenError::InvalidKey {
                reason: format!("verification key: {e}"),
            })?;
        Ok(Self {
            encoding_key,
            decoding_key,
            state_codec,
            expiry,
        })
    }

    /// Returns how long issued tokens stay valid.
    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    #[must_use]
    pub fn state_codec(&self) -> &StateCodec {
        &self.state_codec
    }

    /// Mints an encoded state token for a login that starts now.
    ///
    /// # Errors
    ///
    /// Returns a `StateError` if no nonce could be generated.
    pub fn issue_state(
        &self,
        version: StateVersion,
        request: &StateRequest,
    ) -> Result<String, StateError> {
        self.issue_state_at(version, request, Utc::now())
    }

    /// Mints an encoded state token as if issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns a `StateError` if no nonce could be generated.
    pub fn issue_state_at(
        &self,
        version: StateVersion,
        request: &StateRequest,
        now: DateTime<Utc>,
    ) -> Result<String, StateError> {
        let payload = StateCodec::new_payload(version, request, now)?;
        self.state_codec.encode(&payload)
    }

    /// Generates a fresh CSRF token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError::Entropy` if the system RNG fails.
    pub fn generate_csrf_token(&self) -> Result<String, SessionTokenError> {
        random_hex(CSRF_TOKEN_BYTES).map_err(|e| SessionTokenError::Entropy {
            reason: e.to_string(),
        })
    }

    /// Signs a session token for an authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns `SessionTokenError::AnonymousIdentity` for an unauthenticated
    /// identity, or `SessionTokenError::Signing` if signing fails.
    pub fn issue_session(&self, identity: &Identity) -> Result<String, SessionTokenError> {
        self.issue_session_at(identity, Utc::now())
    }

    /// Signs a session token as if issued at `now`.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::issue_session`].
    pub fn issue_session_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<String, SessionTokenError> {
        if !identity.is_authenticated() {
            return Err(SessionTokenError::AnonymousIdentity);
        }

        let claims = SessionClaims {
            sub: identity.user_name().to_string(),
            team_name: identity.team_name().to_string(),
            team_id: identity.team_id(),
            is_admin: identity.is_admin(),
            csrf: identity.csrf_token().to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.expiry)
                .ok_or_else(|| SessionTokenError::Signing {
                    reason: "session expiry is out of range".to_string(),
                })?
                .timestamp(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            SessionTokenError::Signing {
                reason: e.to_string(),
            }
        })
    }

    /// Verifies a session token and returns the identity it carries.
    ///
    /// # Errors
    ///
    /// Returns `Expired`, `BadSignature`, `WrongAlgorithm`, or `Malformed`.
    /// Callers should treat all of them as "unauthenticated".
    pub fn verify_session(&self, token: &str) -> Result<Identity, SessionTokenError> {
        let header = decode_header(token).map_err(|e| SessionTokenError::Malformed {
            reason: e.to_string(),
        })?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(SessionTokenError::WrongAlgorithm {
                found: format!("{:?}", header.alg),
            });
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                ErrorKind::InvalidSignature => SessionTokenError::BadSignature,
                ErrorKind::InvalidAlgorithm => SessionTokenError::WrongAlgorithm {
                    found: format!("{:?}", header.alg),
                },
                _ => SessionTokenError::Malformed {
                    reason: e.to_string(),
                },
            },
        )?;

        let claims = data.claims;
        Ok(Identity::from_parts(
            claims.team_name,
            claims.team_id,
            claims.is_admin,
            claims.sub,
            claims.csrf,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::Team;
    use std::collections::HashMap;

    const PRIVATE_KEY: &str = include_str!("../testdata/session_key.pem");
    const PUBLIC_KEY: &str = include_str!("../testdata/session_key.pub.pem");
    const OTHER_PRIVATE_KEY: &str = include_str!("../testdata/other_key.pem");
    const OTHER_PUBLIC_KEY: &str = include_str!("../testdata/other_key.pub.pem");

    fn issuer_with(private: &str, public: &str) -> TokenIssuer {
        let codec = StateCodec::new(b"0123456789abcdef0123456789abcdef").expect("codec");
        TokenIssuer::from_rsa_pem(
            private.as_bytes(),
            public.as_bytes(),
            codec,
            Duration::hours(1),
        )
        .expect("issuer")
    }

    fn issuer() -> TokenIssuer {
        issuer_with(PRIVATE_KEY, PUBLIC_KEY)
    }

    fn identity(issuer: &TokenIssuer) -> Identity {
        let team = Team::new(TeamId::new(42), "some-team".to_string(), false, HashMap::new());
        let csrf = issuer.generate_csrf_token().expect("csrf");
        Identity::authenticated(&team, "alice".to_string(), csrf)
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let codec = StateCodec::new(b"0123456789abcdef0123456789abcdef").expect("codec");
        let issuer = TokenIssuer::from_rsa_pem(
            PRIVATE_KEY.as_bytes(),
            PUBLIC_KEY.as_bytes(),
            codec,
            Duration::days(100_000_000_000),
        )
        .expect("issuer");
        let err = issuer.issue_session(&identity(&issuer)).unwrap_err();
        assert!(matches!(err, SessionTokenError::Signing { .. }));
    }

    #[test]
    fn session_round_trips_identity() {
        let issuer = issuer();
        let identity = identity(&issuer);
        let token = issuer.issue_session(&identity).expect("issue");
        let verified = issuer.verify_session(&token).expect("verify");

        assert_eq!(verified, identity);
        assert!(verified.is_authenticated());
        assert_eq!(verified.csrf_token().len(), CSRF_TOKEN_BYTES * 2);
    }

    #[test]
    fn anonymous_identity_gets_no_session() {
        let issuer = issuer();
        assert_eq!(
            issuer.issue_session(&Identity::anonymous()).unwrap_err(),
            SessionTokenError::AnonymousIdentity
        );
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let signer = issuer_with(OTHER_PRIVATE_KEY, OTHER_PUBLIC_KEY);
        let token = signer.issue_session(&identity(&signer)).expect("issue");

        assert_eq!(
            issuer().verify_session(&token).unwrap_err(),
            SessionTokenError::BadSignature
        );
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let issuer = issuer();
        let issued = Utc::now() - Duration::hours(2);
        let token = issuer
            .issue_session_at(&identity(&issuer), issued)
            .expect("issue");

        assert_eq!(
            issuer.verify_session(&token).unwrap_err(),
            SessionTokenError::Expired
        );
    }

    #[test]
    fn symmetric_token_keyed_with_public_key_is_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "mallory".to_string(),
            team_name: "main".to_string(),
            team_id: TeamId::new(1),
            is_admin: true,
            csrf: String::new(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(PUBLIC_KEY.as_bytes()),
        )
        .expect("forge");

        assert!(matches!(
            issuer.verify_session(&forged),
            Err(SessionTokenError::WrongAlgorithm { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer();
        for input in ["", "not-a-jwt", "a.b.c"] {
            let err = issuer.verify_session(input).unwrap_err();
            assert!(
                matches!(err, SessionTokenError::Malformed { .. }),
                "input {input:?} gave {err:?}"
            );
            assert!(err.is_unauthenticated());
        }
    }

    #[test]
    fn tampered_claims_fail_signature() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let issuer = issuer();
        let token = issuer.issue_session(&identity(&issuer)).expect("issue");
        let parts: Vec<&str> = token.split('.').collect();
        let mut claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).expect("base64"))
                .expect("json");
        claims["team_name"] = serde_json::Value::String("main".to_string());
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("json"));
        let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

        assert_eq!(
            issuer.verify_session(&forged).unwrap_err(),
            SessionTokenError::BadSignature
        );
    }

    #[test]
    fn invalid_key_material_is_reported() {
        let codec = StateCodec::new(b"0123456789abcdef0123456789abcdef").expect("codec");
        let err = TokenIssuer::from_rsa_pem(b"nope", PUBLIC_KEY.as_bytes(), codec, Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, SessionTokenError::InvalidKey { .. }));
    }

    #[test]
    fn issued_state_decodes_with_issuer_codec() {
        let issuer = issuer();
        let request = StateRequest {
            team: "main".to_string(),
            provider: "github".to_string(),
            redirect: None,
        };
        let token = issuer
            .issue_state(StateVersion::V2, &request)
            .expect("state");
        let payload = issuer.state_codec().decode(&token).expect("decode");
        assert_eq!(payload.version(), StateVersion::V2);
        assert!(!StateCodec::is_expired(&payload, Utc::now(), issuer.expiry()));
    }
}
