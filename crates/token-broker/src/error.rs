//! Error types for broker operations

/// Errors from `TokenBroker::get_token()` and the `AuthState` facade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No cached token and no signing key. Prompt for the key.
    #[error("not authenticated: no cached token and no App signing key")]
    NotAuthenticated,

    #[error(transparent)]
    Auth(#[from] github_app_auth::Error),
}

impl Error {
    /// GitHub rejected the credentials. The session has already been wiped
    /// and the caller must re-authenticate.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Auth(e) if e.is_unauthorized())
    }

    /// A lookup or creation failure that may succeed on a later call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Auth(
                github_app_auth::Error::InstallationLookup { .. }
                    | github_app_auth::Error::AccessToken { .. }
            )
        )
    }
}

/// Result alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
