/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! # smtp-probe
//!
//! A one-shot diagnostic tool that verifies SMTP credentials and connectivity
//! by logging into a mail server and sending a self-addressed test message.
//!
//! The probe reads its configuration from the process environment (merged with
//! an optional `.env` file, environment taking precedence), picks a transport
//! mode based on the port (`465` means implicit TLS, anything else means
//! STARTTLS), authenticates, sends the message and quits. Progress and the
//! final outcome are reported on the console; expected failures are absorbed
//! into a [`probe::Outcome`] rather than raised.
//!
//! ```text
//! SMTP_USER=user@example.com SMTP_PASS=secret FROM_EMAIL=user@example.com smtp-probe
//! ```
//!
//! This is not a mail transfer agent, a queue or a reusable delivery library;
//! it is a human-supervised connectivity probe.

pub mod config;
pub mod message;
pub mod probe;
pub mod smtp;

use std::{fmt::Display, time::Duration};

use smtp_proto::Response;

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS handshake error
    Tls(rustls::Error),

    /// Base64 decode error
    Base64(base64::DecodeError),

    /// SASL challenge error
    Auth(smtp::auth::Error),

    /// Failure parsing an SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply
    UnexpectedReply(Response<String>),

    /// The server rejected the provided credentials
    AuthenticationFailed(Response<String>),

    /// Invalid TLS name provided
    InvalidTLSName,

    /// The server does not advertise the STARTTLS extension
    MissingStartTls,

    /// The server advertises no supported authentication mechanism
    UnsupportedAuthMechanism,

    /// Connection timeout
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP session handle over an arbitrary transport.
pub struct SmtpClient<T> {
    pub stream: T,
    pub timeout: Duration,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::Base64(e) => write!(f, "Base64 decode error: {}", e),
            Error::Auth(e) => write!(f, "SMTP authentication error: {}", e),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(reply) => {
                write!(f, "Unexpected reply: {} {}", reply.code, reply.message)
            }
            Error::AuthenticationFailed(reply) => {
                write!(f, "Authentication failed: {} {}", reply.code, reply.message)
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::MissingStartTls => {
                write!(f, "The server does not advertise the STARTTLS extension")
            }
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does not support any of the available authentication methods"
            ),
            Error::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

impl From<smtp::auth::Error> for Error {
    fn from(err: smtp::auth::Error) -> Self {
        Error::Auth(err)
    }
}
