//! GitHub App protocol constants
//!
//! Public values only. The App signing key and the at-rest cipher
//! passphrase are supplied at runtime and never appear here.

/// Default REST API base URL
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Media type GitHub recommends for REST requests
pub const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// Pinned REST API version header value
pub const API_VERSION: &str = "2022-11-28";

/// GitHub rejects requests without a User-Agent
pub const USER_AGENT: &str = concat!("github-app-auth/", env!("CARGO_PKG_VERSION"));

/// Backdate `iat` to absorb clock skew between this host and GitHub.
pub const JWT_CLOCK_SKEW_SECS: u64 = 60;

/// JWT lifetime measured from the backdated `iat`. GitHub caps App JWTs at
/// ten minutes from issue, so `exp` lands eight minutes after signing.
pub const JWT_LIFETIME_SECS: u64 = 540;

/// Session storage key for the raw installation token
pub const TOKEN_STORAGE_KEY: &str = "github_token";

/// Session storage key for the encrypted signing key blob
pub const SECRET_STORAGE_KEY: &str = "encrypted_pem";
