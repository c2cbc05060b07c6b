//! Types shared by the GitHub App broker crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
