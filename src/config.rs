/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{env, fmt::Display};

pub const DEFAULT_HOST: &str = "mail.nyoholding.com";
pub const DEFAULT_PORT: u16 = 465;

/// Probe session configuration, resolved once at startup.
///
/// Username, password and sender are allowed to be absent here; a missing
/// credential surfaces later as an authentication failure rather than an
/// upfront validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    /// `SMTP_PORT` is not a valid port number.
    InvalidPort(String),
}

impl Config {
    /// Resolves the configuration from the process environment.
    ///
    /// The caller is expected to have merged any `.env` override file into the
    /// environment beforehand, with already-set variables taking precedence.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("SMTP_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort(value))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            username: lookup("SMTP_USER"),
            password: lookup("SMTP_PASS"),
            sender: lookup("FROM_EMAIL"),
        })
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort(value) => {
                write!(f, "SMTP_PORT is not a valid port number: {:?}", value)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Config, ConfigError, DEFAULT_HOST, DEFAULT_PORT};

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.username, None);
        assert_eq!(config.password, None);
        assert_eq!(config.sender, None);
    }

    #[test]
    fn explicit_values() {
        let config = Config::from_lookup(|name| {
            match name {
                "SMTP_HOST" => Some("smtp.example.com"),
                "SMTP_PORT" => Some("587"),
                "SMTP_USER" => Some("user@example.com"),
                "SMTP_PASS" => Some("hunter2"),
                "FROM_EMAIL" => Some("user@example.com"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.username.as_deref(), Some("user@example.com"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert_eq!(config.sender.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn non_numeric_port_is_fatal() {
        let err = Config::from_lookup(|name| {
            (name == "SMTP_PORT").then(|| "smtp".to_string())
        })
        .unwrap_err();
        match err {
            ConfigError::InvalidPort(value) => assert_eq!(value, "smtp"),
        }
    }
}
