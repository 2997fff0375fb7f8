//! Typed token claims.
//!
//! Each token class has a concrete claims struct produced by a single decode
//! step; callers never probe a dynamic claims map.

use serde::{Deserialize, Serialize};

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Session identifier; must be live in the session store.
    pub access_uuid: String,
    /// Subject user id.
    pub user_id: u64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Claims embedded in a refresh token.
///
/// Signed with a different secret than access tokens: possession of one never
/// grants the other's trust domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Session identifier; must be live in the session store.
    pub refresh_uuid: String,
    /// Subject user id.
    pub user_id: u64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}
