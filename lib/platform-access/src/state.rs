//! The OAuth `state` parameter.
//!
//! A state token is minted when a login begins, carried through the
//! provider's redirect unmodified, and checked when the provider sends the
//! browser back. It is the only artifact of an in-flight login: nothing is
//! stored server-side, so any instance can finish a login another one began.
//!
//! Two payload shapes coexist so a protocol migration never strands logins
//! that are already in flight:
//! - V1 carries only an issue time and a nonce
//! - V2 adds the post-login redirect and binds the team and provider
//!
//! Both are serialized as JSON and authenticated with HMAC-SHA256. The wire
//! form is `base64url(json) "." base64url(tag)` without padding.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::StateError;

type HmacSha256 = Hmac<Sha256>;

/// Longest state token accepted for decoding.
pub const MAX_STATE_LEN: usize = 4096;

/// Shortest accepted state secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

const NONCE_BYTES: usize = 16;

/// Protocol version of a state token, selected by the route that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateVersion {
    V1,
    V2,
}

impl fmt::Display for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// Legacy state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateV1 {
    /// Issue time, seconds since the Unix epoch.
    pub iat: i64,
    pub nonce: String,
}

/// Current state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateV2 {
    /// Version discriminator, always 2.
    pub v: u8,
    /// Issue time, seconds since the Unix epoch.
    pub iat: i64,
    pub nonce: String,
    /// Where to send the browser after a successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    pub team: String,
    pub provider: String,
}

/// A decoded state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePayload {
    V1(StateV1),
    V2(StateV2),
}

impl StatePayload {
    /// Returns the protocol version of this payload.
    #[must_use]
    pub fn version(&self) -> StateVersion {
        match self {
            Self::V1(_) => StateVersion::V1,
            Self::V2(_) => StateVersion::V2,
        }
    }

    /// Returns the raw issue time in epoch seconds.
    #[must_use]
    pub fn issued_at(&self) -> i64 {
        match self {
            Self::V1(p) => p.iat,
            Self::V2(p) => p.iat,
        }
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        match self {
            Self::V1(p) => &p.nonce,
            Self::V2(p) => &p.nonce,
        }
    }

    /// Returns the embedded post-login redirect. V1 never carries one.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::V1(_) => None,
            Self::V2(p) => p.redirect.as_deref(),
        }
    }

    /// Returns true when this payload may complete a login for the given
    /// team and provider. V1 payloads carry no binding.
    #[must_use]
    pub fn is_bound_to(&self, team: &str, provider: &str) -> bool {
        match self {
            Self::V1(_) => true,
            Self::V2(p) => p.team == team && p.provider == provider,
        }
    }
}

/// What a login begin asks the state token to remember.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateRequest {
    pub team: String,
    pub provider: String,
    pub redirect: Option<String>,
}

/// Encodes, authenticates, and decodes state tokens.
#[derive(Clone)]
pub struct StateCodec {
    mac: HmacSha256,
}

impl fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCodec").finish_non_exhaustive()
    }
}

impl StateCodec {
    /// Creates a codec keyed with the given secret.
    ///
    /// # Errors
    ///
    /// Returns `StateError::InvalidSecret` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8]) -> Result<Self, StateError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(StateError::InvalidSecret {
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|e| StateError::InvalidSecret {
            reason: e.to_string(),
        })?;
        Ok(Self { mac })
    }

    /// Builds a fresh payload of the requested version.
    ///
    /// V1 has no room for a redirect or binding; those request fields are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Entropy` if no nonce could be generated.
    pub fn new_payload(
        version: StateVersion,
        request: &StateRequest,
        now: DateTime<Utc>,
    ) -> Result<StatePayload, StateError> {
        let nonce = random_hex(NONCE_BYTES).map_err(|e| StateError::Entropy {
            reason: e.to_string(),
        })?;
        let iat = now.timestamp();
        Ok(match version {
            StateVersion::V1 => StatePayload::V1(StateV1 { iat, nonce }),
            StateVersion::V2 => StatePayload::V2(StateV2 {
                v: 2,
                iat,
                nonce,
                redirect: request.redirect.clone(),
                team: request.team.clone(),
                provider: request.provider.clone(),
            }),
        })
    }

    /// Serializes and tags a payload.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Invalid` if the payload cannot be serialized.
    pub fn encode(&self, payload: &StatePayload) -> Result<String, StateError> {
        let json = match payload {
            StatePayload::V1(p) => serde_json::to_vec(p),
            StatePayload::V2(p) => serde_json::to_vec(p),
        }
        .map_err(|_| StateError::Invalid {
            reason: "unserializable payload",
        })?;

        let mut mac = self.mac.clone();
        mac.update(&json);
        let tag = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&json),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Verifies and parses a state token.
    ///
    /// The tag is checked before the payload is parsed, so unauthenticated
    /// bytes never reach the JSON parser.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Invalid` for any structural or cryptographic
    /// failure.
    pub fn decode(&self, token: &str) -> Result<StatePayload, StateError> {
        if token.is_empty() || token.len() > MAX_STATE_LEN {
            return Err(StateError::Invalid {
                reason: "bad length",
            });
        }

        let (body, tag) = token.split_once('.').ok_or(StateError::Invalid {
            reason: "missing tag",
        })?;
        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| StateError::Invalid {
                reason: "payload is not base64url",
            })?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| StateError::Invalid {
                reason: "tag is not base64url",
            })?;

        let mut mac = self.mac.clone();
        mac.update(&json);
        mac.verify_slice(&tag).map_err(|_| StateError::Invalid {
            reason: "tag mismatch",
        })?;

        let value: serde_json::Value =
            serde_json::from_slice(&json).map_err(|_| StateError::Invalid {
                reason: "payload is not json",
            })?;

        match value.get("v").map(serde_json::Value::as_u64) {
            None => serde_json::from_value(value)
                .map(StatePayload::V1)
                .map_err(|_| StateError::Invalid {
                    reason: "malformed v1 payload",
                }),
            Some(Some(2)) => serde_json::from_value(value)
                .map(StatePayload::V2)
                .map_err(|_| StateError::Invalid {
                    reason: "malformed v2 payload",
                }),
            Some(_) => Err(StateError::Invalid {
                reason: "unknown version",
            }),
        }
    }

    /// Decodes a state token and checks that the route may accept its version.
    ///
    /// A V1 route accepts only V1 payloads. A V2 route accepts V2 payloads,
    /// and V1 payloads only when `allow_legacy` is set.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Invalid` on decode failure and
    /// `StateError::VersionMismatch` when the route refuses the version.
    pub fn decode_for_route(
        &self,
        token: &str,
        route: StateVersion,
        allow_legacy: bool,
    ) -> Result<StatePayload, StateError> {
        let payload = self.decode(token)?;
        let accepted = match (route, payload.version()) {
            (StateVersion::V1, StateVersion::V1) | (StateVersion::V2, StateVersion::V2) => true,
            (StateVersion::V2, StateVersion::V1) => allow_legacy,
            (StateVersion::V1, StateVersion::V2) => false,
        };
        if !accepted {
            return Err(StateError::VersionMismatch {
                route,
                found: payload.version(),
            });
        }
        Ok(payload)
    }

    /// Returns true once more than `max_age` has passed since issue.
    ///
    /// An issue time that cannot be represented counts as expired.
    #[must_use]
    pub fn is_expired(payload: &StatePayload, now: DateTime<Utc>, max_age: Duration) -> bool {
        match DateTime::<Utc>::from_timestamp(payload.issued_at(), 0) {
            Some(issued_at) => now - issued_at > max_age,
            None => true,
        }
    }
}

/// Returns `len` random bytes from the operating system, hex encoded.
pub(crate) fn random_hex(len: usize) -> Result<String, getrandom::Error> {
    let mut buf = vec![0u8; len];
    getrandom::fill(&mut buf)?;
    Ok(hex::encode(buf))
}
