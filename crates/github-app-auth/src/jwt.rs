//! GitHub App JWT signing
//!
//! The App proves its identity with a short-lived RS256 JWT signed by its
//! private key. `iat` is backdated by [`JWT_CLOCK_SKEW_SECS`] and `exp`
//! sits [`JWT_LIFETIME_SECS`] after that, inside GitHub's ten minute cap.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::constants::{JWT_CLOCK_SKEW_SECS, JWT_LIFETIME_SECS};
use crate::error::{Error, Result};

/// Payload of an App JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: u64,
    pub exp: u64,
    /// App id
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: &str, now: u64) -> Self {
        let iat = now.saturating_sub(JWT_CLOCK_SKEW_SECS);
        Self {
            iat,
            exp: iat + JWT_LIFETIME_SECS,
            iss: app_id.to_owned(),
        }
    }
}

/// Sign an App JWT for `app_id` with the PEM private key `secret`.
pub fn sign_app_jwt(app_id: &str, secret: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    sign_app_jwt_at(app_id, secret, now)
}

/// [`sign_app_jwt`] with an explicit clock, in unix seconds.
pub fn sign_app_jwt_at(app_id: &str, secret: &str, now: u64) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(secret.as_bytes())
        .map_err(|e| Error::Signing(format!("unusable RSA private key: {e}")))?;

    jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &AppClaims::new(app_id, now),
        &key,
    )
    .map_err(|e| Error::Signing(e.to_string()))
}
