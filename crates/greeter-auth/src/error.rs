use greeter_session::SessionError;
use thiserror::Error;

/// Token issuing and validation errors.
///
/// Validation failures are never retried and all of them must map to the same
/// unauthorized outcome at the HTTP layer; the distinction below exists for
/// logs and tests, not for clients.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token cannot be decoded at all.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signature did not verify against the expected secret.
    #[error("invalid token signature")]
    BadSignature,

    /// The embedded expiry has elapsed.
    #[error("token expired")]
    Expired,

    /// The session id is no longer live in the session store. Covers both
    /// explicit logout and passive TTL expiry.
    #[error("token revoked")]
    Revoked,

    /// Signing algorithm outside the accepted HMAC family.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Logout asked for a session the store does not know.
    #[error("unknown session")]
    UnknownSession,

    /// Session store failure.
    #[error("session store error: {0}")]
    Session(#[from] SessionError),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm("algorithm rejected".to_string())
            }
            _ => AuthError::Malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::Expired.to_string(), "token expired");
        assert_eq!(AuthError::Revoked.to_string(), "token revoked");
        assert_eq!(
            AuthError::Malformed("bad".to_string()).to_string(),
            "malformed token: bad"
        );
    }

    #[test]
    fn test_from_jsonwebtoken() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::BadSignature));

        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::Expired));
    }
}
