//! Configuration and I/O error types

use thiserror::Error;

/// Errors raised while loading front-end configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_context() {
        let err = Error::Config("app.id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: app.id must not be empty"
        );
    }

    #[test]
    fn io_error_converts_via_from() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "app-token.toml").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }
}
