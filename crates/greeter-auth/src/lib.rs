//! # Greeter Auth - Token Lifecycle
//!
//! Issues and validates the access/refresh token pairs that guard the
//! greeting endpoints.
//!
//! Tokens are HS256-signed JWTs. Each token embeds a random session id whose
//! presence in the session store is checked on every validation, so logout
//! and TTL expiry both revoke a token immediately regardless of its embedded
//! expiry. Access and refresh tokens are signed with distinct secrets and
//! never cross trust domains.

mod claims;
mod error;
mod tokens;
mod validate;

pub use claims::{AccessClaims, RefreshClaims};
pub use error::AuthError;
pub use tokens::{TokenConfig, TokenIssuer, TokenPair};
pub use validate::{token_from_header, TokenValidator};
