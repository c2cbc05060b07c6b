//! Installation token broker for GitHub Apps
//!
//! Turns the App signing key held by a client session into installation
//! tokens, caching both and wiping both when GitHub answers 401.
//!
//! Session lifecycle:
//! 1. `AuthState::init()` restores the encrypted key from session storage
//! 2. User enters a key via `AuthState::set_secret()` (encrypted, persisted)
//! 3. `AuthState::get_token()` returns the cached token or runs one exchange
//!    (concurrent misses share it)
//! 4. Any 401 (from the exchange or reported via `UnauthorizedHandle`)
//!    clears token and key and flips status to unauthenticated
//! 5. `AuthState::clear()` logs out

pub mod auth_state;
pub mod broker;
pub mod error;
pub mod metrics;
pub mod session;

pub use auth_state::{AuthState, UnauthorizedHandle};
pub use broker::{BrokerConfig, TokenBroker};
pub use error::{Error, Result};
pub use session::{AuthEvent, ExchangeStep, SessionContext};
