//! Error types for cipher, signing and token exchange operations

/// Errors from GitHub App authentication operations.
///
/// `Clone` so a single exchange outcome can be handed to every caller that
/// joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("JWT signing failed: {0}")]
    Signing(String),

    #[error("installation lookup failed: {message}")]
    InstallationLookup {
        status: Option<u16>,
        message: String,
    },

    #[error("access token creation failed: {message}")]
    AccessToken {
        status: Option<u16>,
        message: String,
    },

    /// GitHub returned 401. Every cached credential must be discarded.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl Error {
    /// HTTP status of the failed exchange call, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::InstallationLookup { status, .. } | Error::AccessToken { status, .. } => *status,
            Error::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// GitHub answers 422 when the App is calling too fast.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(422)
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
