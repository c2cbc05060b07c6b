//! GitHub App authentication primitives
//!
//! Everything needed to turn an App's long-lived RSA key into a scoped
//! installation token without the key ever leaving the client:
//!
//! 1. `cipher` encrypts the key for at-rest session storage
//! 2. `credentials::CredentialStore` caches the encrypted key and the token
//! 3. `jwt::sign_app_jwt()` signs the short-lived App assertion
//! 4. `api::installation_id()` resolves the installation for a repository
//! 5. `api::create_installation_token()` mints the bearer token
//!
//! Orchestration (cache checks, request coalescing, invalidation) lives in
//! the `token-broker` crate.

pub mod api;
pub mod cipher;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod storage;

pub use api::{create_installation_token, installation_id};
pub use constants::*;
pub use credentials::CredentialStore;
pub use error::{Error, Result};
pub use jwt::{AppClaims, sign_app_jwt, sign_app_jwt_at};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
