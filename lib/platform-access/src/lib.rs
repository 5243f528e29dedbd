//! Login state, session tokens, and identity resolution for skygate.
//!
//! This crate provides:
//! - OAuth state tokens (`StateCodec`, `StatePayload`) in the V1 and V2 formats
//! - Session token minting and verification (`TokenIssuer`)
//! - The per-request caller identity (`Identity`)
//! - Teams, their login allow-lists, and the `TeamFactory` collaborator
//! - Identity provider capabilities and per-team resolution (`ProviderResolver`)
//! - Login flow configuration (`AuthConfig`, `ProviderConfig`)
//!
//! # Example
//!
//! ```
//! use skygate_platform_access::{StateCodec, StateRequest, StateVersion};
//! use chrono::Utc;
//!
//! let codec = StateCodec::new(b"an-hmac-secret-of-some-length").unwrap();
//! let request = StateRequest {
//!     team: "main".to_string(),
//!     provider: "github".to_string(),
//!     redirect: Some("/teams/main/pipelines".to_string()),
//! };
//! let payload = StateCodec::new_payload(StateVersion::V2, &request, Utc::now()).unwrap();
//! let token = codec.encode(&payload).unwrap();
//!
//! let decoded = codec
//!     .decode_for_route(&token, StateVersion::V2, false)
//!     .unwrap();
//! assert!(decoded.is_bound_to("main", "github"));
//! assert_eq!(decoded.redirect(), Some("/teams/main/pipelines"));
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod provider;
pub mod state;
pub mod team;
pub mod token;

pub use config::{AuthConfig, ProviderConfig};
pub use error::{ProviderError, ResolveError, SessionTokenError, StateError, TeamLookupError};
pub use identity::Identity;
pub use provider::{IdentityProvider, ProviderRegistry, ProviderResolver, ResolvedProvider};
pub use state::{StateCodec, StatePayload, StateRequest, StateV1, StateV2, StateVersion};
pub use team::{Team, TeamAuthConfig, TeamFactory, UpstreamIdentity};
pub use token::{SessionClaims, TokenIssuer};
