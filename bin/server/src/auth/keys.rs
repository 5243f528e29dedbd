//! Loading token key material at startup.

use rootcause::prelude::Report;
use skygate_platform_access::{AuthConfig, SessionTokenError, StateCodec, StateError, TokenIssuer};
use std::fmt;

/// Errors from assembling the token issuer.
#[derive(Debug)]
pub enum KeyError {
    /// A lifetime or timeout is out of range.
    Config { details: String },
    /// A key file could not be read.
    Read { path: String, details: String },
    /// The state secret was rejected.
    StateSecret(StateError),
    /// The RSA key material was rejected.
    SessionKey(SessionTokenError),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid auth configuration: {details}"),
            Self::Read { path, details } => write!(f, "failed to read '{path}': {details}"),
            Self::StateSecret(e) => write!(f, "{e}"),
            Self::SessionKey(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for KeyError {}

fn read_pem(path: &str) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|e| KeyError::Read {
        path: path.to_string(),
        details: e.to_string(),
    })
}

/// Builds the token issuer from the configured key files and state secret.
///
/// # Errors
///
/// Returns a `KeyError` if the configuration is out of range, a key file is
/// unreadable, or any key material is invalid.
pub fn load_token_issuer(config: &AuthConfig) -> Result<TokenIssuer, Report<KeyError>> {
    config.validate().map_err(|problems| KeyError::Config {
        details: problems.join("; "),
    })?;
    let private_pem = read_pem(&config.signing_key_path)?;
    let public_pem = read_pem(&config.verification_key_path)?;
    let codec = StateCodec::new(config.state_secret.as_bytes()).map_err(KeyError::StateSecret)?;
    let issuer = TokenIssuer::from_rsa_pem(&private_pem, &public_pem, codec, config.expiry())
        .map_err(KeyError::SessionKey)?;
    Ok(issuer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PRIVATE_KEY, PUBLIC_KEY};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    fn config_for(private: &NamedTempFile, public: &NamedTempFile, secret: &str) -> AuthConfig {
        AuthConfig::new(
            private.path().display().to_string(),
            public.path().display().to_string(),
            secret.to_string(),
        )
    }

    #[test]
    fn loads_issuer_from_key_files() {
        let private = pem_file(PRIVATE_KEY);
        let public = pem_file(PUBLIC_KEY);
        let issuer = load_token_issuer(&config_for(&private, &public, "0123456789abcdef"))
            .expect("issuer");
        assert_eq!(issuer.expiry(), chrono::Duration::hours(24));
    }

    #[test]
    fn missing_key_file_is_reported() {
        let public = pem_file(PUBLIC_KEY);
        let config = AuthConfig::new(
            "/nonexistent/session.pem".to_string(),
            public.path().display().to_string(),
            "0123456789abcdef".to_string(),
        );
        let err = load_token_issuer(&config).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/session.pem"));
    }

    #[test]
    fn overlong_expiry_is_rejected_before_keys_are_read() {
        let config = AuthConfig {
            expire_minutes: 200_000_000_000,
            ..AuthConfig::new(
                "/nonexistent/session.pem".to_string(),
                "/nonexistent/session.pub.pem".to_string(),
                "0123456789abcdef".to_string(),
            )
        };
        let err = load_token_issuer(&config).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("expire_minutes"));
    }

    #[test]
    fn negative_expiry_is_rejected() {
        let private = pem_file(PRIVATE_KEY);
        let public = pem_file(PUBLIC_KEY);
        let config = AuthConfig {
            expire_minutes: -1,
            ..config_for(&private, &public, "0123456789abcdef")
        };
        assert!(load_token_issuer(&config).is_err());
    }

    #[test]
    fn short_state_secret_is_rejected() {
        let private = pem_file(PRIVATE_KEY);
        let public = pem_file(PUBLIC_KEY);
        assert!(load_token_issuer(&config_for(&private, &public, "short")).is_err());
    }
}
