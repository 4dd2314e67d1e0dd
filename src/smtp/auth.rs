/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{borrow::Cow, fmt::Display};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use smtp_proto::{EhloResponse, AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

pub struct Credentials<'x> {
    username: Cow<'x, str>,
    secret: Cow<'x, str>,
}

#[derive(Debug, Clone)]
pub enum Error {
    InvalidChallenge,
}

/// Authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// Plain
    Plain,

    /// Login
    Login,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mechanism::Plain => write!(f, "PLAIN"),
            Mechanism::Login => write!(f, "LOGIN"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid server challenge"),
        }
    }
}

impl<'x> Credentials<'x> {
    /// Creates a new `Credentials` instance.
    pub fn new(
        username: impl Into<Cow<'x, str>>,
        secret: impl Into<Cow<'x, str>>,
    ) -> Credentials<'x> {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub(crate) fn encode(&self, mechanism: Mechanism, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                Mechanism::Plain => {
                    format!("\u{0}{}\u{0}{}", self.username, self.secret)
                }

                Mechanism::Login => {
                    let challenge = STANDARD.decode(challenge)?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).ok_or(Error::InvalidChallenge)?)
                        || b"username".eq_ignore_ascii_case(
                            // Because Google makes its own standards
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        &self.username
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        &self.secret
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }
            }
            .as_bytes(),
        ))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates with the advertised mechanisms, most preferred first.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials<'_>,
        capabilities: &EhloResponse<String>,
    ) -> crate::Result<()> {
        let mut mechanisms = Vec::with_capacity(2);
        for (flag, mechanism) in [(AUTH_PLAIN, Mechanism::Plain), (AUTH_LOGIN, Mechanism::Login)] {
            if capabilities.auth_mechanisms & flag != 0 {
                mechanisms.push(mechanism);
            }
        }
        if mechanisms.is_empty() {
            return Err(crate::Error::UnsupportedAuthMechanism);
        }

        let mut last_reply = None;
        for mechanism in mechanisms {
            match self.auth(mechanism, credentials).await {
                Ok(()) => return Ok(()),
                Err(crate::Error::UnexpectedReply(reply)) => {
                    last_reply = Some(reply);
                }
                Err(err) => return Err(err),
            }
        }

        match last_reply {
            Some(reply) => Err(crate::Error::AuthenticationFailed(reply)),
            None => Err(crate::Error::UnsupportedAuthMechanism),
        }
    }

    pub(crate) async fn auth(
        &mut self,
        mechanism: Mechanism,
        credentials: &Credentials<'_>,
    ) -> crate::Result<()> {
        let mut reply = match mechanism {
            Mechanism::Plain => {
                // PLAIN takes an initial response, no challenge round-trip
                self.cmd(format!(
                    "AUTH PLAIN {}\r\n",
                    credentials.encode(mechanism, "")?
                ))
                .await?
            }
            Mechanism::Login => self.cmd(b"AUTH LOGIN\r\n".as_ref()).await?,
        };

        for _ in 0..3 {
            match reply.code {
                334 => {
                    reply = self
                        .cmd(format!(
                            "{}\r\n",
                            credentials.encode(mechanism, reply.message.as_str())?
                        ))
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::UnexpectedReply(reply));
                }
            }
        }

        Err(crate::Error::UnexpectedReply(reply))
    }
}

#[cfg(test)]
mod test {
    use super::{Credentials, Mechanism};

    #[test]
    fn auth_encode() {
        // Login
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "UGFzc3dvcmQA",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );

        // Plain
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Plain, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn invalid_login_challenge() {
        assert!(Credentials::new("tim", "secret")
            .encode(Mechanism::Login, "bm9uc2Vuc2UtY2hhbGxlbmdl")
            .is_err());
    }
}
