//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "app-token")]
#[command(version, about = "GitHub App installation token tool", long_about = None)]
pub struct Cli {
    /// Config file (overrides CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Encrypt and store the App signing key
    Login {
        /// PEM file holding the App's RSA private key
        #[arg(long)]
        key_file: PathBuf,

        /// Keep the key in memory for this process only
        #[arg(long = "no-persist", action = clap::ArgAction::SetFalse)]
        persist: bool,
    },

    /// Print an installation access token
    Token {
        /// Use this key for the exchange without storing it
        #[arg(long)]
        key_file: Option<PathBuf>,
    },

    /// Report whether credentials are present
    Status,

    /// Wipe the stored token and key
    Logout,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("app-token").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_login_with_defaults() {
        let cli = parse(&["login", "--key-file", "/keys/app.pem"]).unwrap();
        assert_eq!(cli.config, None);
        assert_eq!(
            cli.command,
            Command::Login {
                key_file: PathBuf::from("/keys/app.pem"),
                persist: true,
            }
        );
    }

    #[test]
    fn parses_login_no_persist_and_global_config() {
        let cli = parse(&[
            "login",
            "--no-persist",
            "--key-file",
            "k.pem",
            "--config",
            "/etc/app-token.toml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/app-token.toml"));
        assert_eq!(
            cli.command,
            Command::Login {
                key_file: PathBuf::from("k.pem"),
                persist: false,
            }
        );
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse(&["token"]).unwrap().command, Command::Token { key_file: None });
        assert_eq!(parse(&["status"]).unwrap().command, Command::Status);
        assert_eq!(
            parse(&["--config", "c.toml", "logout"]).unwrap().command,
            Command::Logout
        );
        assert_eq!(
            parse(&["token", "--key-file", "k.pem"]).unwrap().command,
            Command::Token {
                key_file: Some(PathBuf::from("k.pem"))
            }
        );
    }

    #[test]
    fn login_requires_key_file() {
        let err = parse(&["login"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["rotate"]).is_err());
        assert!(parse(&["status", "extra"]).is_err());
        assert!(parse(&["status", "--verbose"]).is_err());
        assert!(parse(&["token", "--key-file"]).is_err());
        assert!(parse(&["status", "--no-persist"]).is_err());
        assert!(parse(&["token", "--no-persist"]).is_err());
    }
}
