//! Token issuing: one access/refresh pair per successful login.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use greeter_session::SessionStore;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tracing::debug;
use uuid::Uuid;

use crate::claims::{AccessClaims, RefreshClaims};
use crate::error::AuthError;

/// Signing material and validity windows for both token classes.
///
/// The two secrets must differ: an access token must never verify against the
/// refresh trust domain or vice versa.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

/// The product of one successful authentication.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub user_id: u64,

    pub access_token: String,
    pub access_uuid: String,
    /// Unix seconds.
    pub access_expires: i64,

    pub refresh_token: String,
    pub refresh_uuid: String,
    /// Unix seconds.
    pub refresh_expires: i64,
}

/// Mints token pairs and owns their session-store records.
pub struct TokenIssuer {
    config: TokenConfig,
    sessions: Arc<dyn SessionStore>,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self { config, sessions }
    }

    /// Mint a fresh access/refresh pair for an authenticated user.
    ///
    /// Both session identifiers are random v4 UUIDs. This only builds and
    /// signs the credentials; nothing is recorded server-side until
    /// [`TokenIssuer::create_auth`] succeeds.
    pub fn create_token(&self, user_id: u64) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();

        let access_uuid = Uuid::new_v4().to_string();
        let access_expires = now + self.config.access_ttl.as_secs() as i64;
        let access_claims = AccessClaims {
            access_uuid: access_uuid.clone(),
            user_id,
            exp: access_expires,
        };
        let access_token = sign(&access_claims, &self.config.access_secret)?;

        let refresh_uuid = Uuid::new_v4().to_string();
        let refresh_expires = now + self.config.refresh_ttl.as_secs() as i64;
        let refresh_claims = RefreshClaims {
            refresh_uuid: refresh_uuid.clone(),
            user_id,
            exp: refresh_expires,
        };
        let refresh_token = sign(&refresh_claims, &self.config.refresh_secret)?;

        Ok(TokenPair {
            user_id,
            access_token,
            access_uuid,
            access_expires,
            refresh_token,
            refresh_uuid,
            refresh_expires,
        })
    }

    /// Record both sessions of a freshly minted pair.
    ///
    /// Must follow a successful `create_token`. If this fails the caller must
    /// not hand the tokens out: without session records they could never be
    /// validated or revoked.
    pub async fn create_auth(&self, pair: &TokenPair) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();

        self.sessions
            .put(&pair.access_uuid, pair.user_id, remaining(pair.access_expires, now))
            .await?;
        self.sessions
            .put(&pair.refresh_uuid, pair.user_id, remaining(pair.refresh_expires, now))
            .await?;

        debug!(user_id = pair.user_id, "session records created");
        Ok(())
    }

    /// Revoke one session id, returning its previous owner.
    ///
    /// Deleting the access session id makes the access token unusable
    /// immediately; the refresh session id is an independent key and needs
    /// its own call if full logout is wanted.
    pub async fn delete_auth(&self, session_id: &str) -> Result<u64, AuthError> {
        self.sessions
            .remove(session_id)
            .await?
            .ok_or(AuthError::UnknownSession)
    }

    /// Logout with a validated access token: revokes its session.
    pub async fn logout(&self, claims: &AccessClaims) -> Result<u64, AuthError> {
        self.delete_auth(&claims.access_uuid).await
    }
}

fn sign<T: serde::Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}

fn remaining(expires: i64, now: i64) -> Duration {
    Duration::from_secs((expires - now).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_session::MemorySessionStore;

    fn issuer() -> TokenIssuer {
        let config = TokenConfig {
            access_secret: "access-secret".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_secret: "refresh-secret".to_string(),
            refresh_ttl: Duration::from_secs(604_800),
        };
        TokenIssuer::new(config, Arc::new(MemorySessionStore::default()))
    }

    #[tokio::test]
    async fn test_create_token_shapes() {
        let issuer = issuer();
        let pair = issuer.create_token(7).unwrap();

        assert_eq!(pair.user_id, 7);
        assert_ne!(pair.access_uuid, pair.refresh_uuid);
        assert_ne!(pair.access_token, pair.refresh_token);
        assert!(pair.access_expires < pair.refresh_expires);
        // Compact JWS: three dot-separated segments
        assert_eq!(pair.access_token.split('.').count(), 3);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique_per_login() {
        let issuer = issuer();
        let first = issuer.create_token(7).unwrap();
        let second = issuer.create_token(7).unwrap();

        assert_ne!(first.access_uuid, second.access_uuid);
        assert_ne!(first.refresh_uuid, second.refresh_uuid);
    }

    #[tokio::test]
    async fn test_create_auth_records_both_sessions() {
        let issuer = issuer();
        let pair = issuer.create_token(7).unwrap();
        issuer.create_auth(&pair).await.unwrap();

        assert_eq!(issuer.delete_auth(&pair.access_uuid).await.unwrap(), 7);
        assert_eq!(issuer.delete_auth(&pair.refresh_uuid).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_delete_auth_unknown_session() {
        let issuer = issuer();
        assert!(matches!(
            issuer.delete_auth("no-such-session").await,
            Err(AuthError::UnknownSession)
        ));
    }
}
