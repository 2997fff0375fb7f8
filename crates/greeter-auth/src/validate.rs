//! Token validation: signature, expiry, then liveness.
//!
//! Every check runs against the session store, not just the signature. A
//! perfectly signed, unexpired token is still rejected once its session id
//! has been revoked or has aged out, and the caller cannot tell which.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use greeter_session::SessionStore;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::claims::{AccessClaims, RefreshClaims};
use crate::error::AuthError;

/// Algorithms a presented token may claim. Tokens are minted with HS256;
/// anything outside the HMAC family is rejected before verification.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Verifies presented tokens against signing secrets and the session store.
pub struct TokenValidator {
    access_secret: String,
    refresh_secret: String,
    sessions: Arc<dyn SessionStore>,
}

impl TokenValidator {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            sessions,
        }
    }

    /// Validate an access token end to end.
    ///
    /// Order: decode and verify the signature, check expiry, then require the
    /// session id to still be live. The last step is what makes logout take
    /// effect immediately.
    pub async fn validate(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = decode_hmac(token, &self.access_secret)?;
        check_expiry(claims.exp)?;

        match self.sessions.get(&claims.access_uuid).await? {
            Some(_) => Ok(claims),
            None => {
                debug!(user_id = claims.user_id, "access session not live");
                Err(AuthError::Revoked)
            }
        }
    }

    /// Validate a refresh token against the refresh trust domain.
    pub async fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = decode_hmac(token, &self.refresh_secret)?;
        check_expiry(claims.exp)?;

        match self.sessions.get(&claims.refresh_uuid).await? {
            Some(_) => Ok(claims),
            None => {
                debug!(user_id = claims.user_id, "refresh session not live");
                Err(AuthError::Revoked)
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <base64(token)>` header.
pub fn token_from_header(header: &str) -> Result<String, AuthError> {
    let encoded = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::Malformed("missing bearer scheme".to_string()))?;
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| AuthError::Malformed(format!("bad base64 in header: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| AuthError::Malformed("token is not valid utf-8".to_string()))
}

fn decode_hmac<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AuthError> {
    let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    // Expiry is checked separately so the cutoff is exact, without the
    // library's default leeway.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.validate_exp = false;

    let data = decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

fn check_expiry(exp: i64) -> Result<(), AuthError> {
    if exp <= Utc::now().timestamp() {
        return Err(AuthError::Expired);
    }
    Ok(())
}
