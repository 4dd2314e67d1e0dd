/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{fmt::Display, time::Duration};

use smtp_proto::{EhloResponse, EXT_START_TLS};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{
    config::Config,
    message::ProbeMessage,
    smtp::{auth::Credentials, tls::build_tls_connector, AssertReply},
    Error, SmtpClient,
};

/// Transport mode, chosen deterministically from the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Encrypted from the first byte (traditionally port 465).
    ImplicitTls,
    /// Plaintext greeting, then an in-place STARTTLS upgrade.
    StartTls,
}

impl Mode {
    pub fn for_port(port: u16) -> Self {
        if port == 465 {
            Mode::ImplicitTls
        } else {
            Mode::StartTls
        }
    }
}

/// Result of a probe run. Expected failures are absorbed here and never
/// propagated out of [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The server rejected the credentials.
    AuthFailure { code: u16, detail: String },
    /// Anything else: DNS, connect, handshake, protocol or send failure.
    GeneralFailure { detail: String },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            _ => 1,
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        match err {
            Error::AuthenticationFailed(reply) => Outcome::AuthFailure {
                code: reply.code,
                detail: reply.message.trim().to_string(),
            },
            err => Outcome::GeneralFailure {
                detail: err.to_string(),
            },
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "✅ Prueba SMTP completada"),
            Outcome::AuthFailure { code, detail } => {
                writeln!(f, "❌ Error de Autenticación (Usuario o Contraseña incorrectos)")?;
                write!(f, "Detalle: {} - {}", code, detail)
            }
            Outcome::GeneralFailure { detail } => {
                writeln!(f, "❌ Error de conexión general:")?;
                write!(f, "{}", detail)
            }
        }
    }
}

/// Runs the probe end to end and absorbs every failure into an [`Outcome`].
pub async fn run(config: &Config) -> Outcome {
    match try_run(config).await {
        Ok(()) => Outcome::Success,
        Err(err) => Outcome::from(err),
    }
}

async fn try_run(config: &Config) -> crate::Result<()> {
    let message = ProbeMessage::build(config.sender.as_deref().unwrap_or_default())?;
    let addr = format!("{}:{}", config.host, config.port);
    let timeout = Duration::from_secs(60 * 60);
    let local_host = gethostname::gethostname()
        .to_str()
        .unwrap_or("[127.0.0.1]")
        .to_string();
    let tls_connector = build_tls_connector();
    let mode = Mode::for_port(config.port);

    match mode {
        Mode::ImplicitTls => println!("Usando SSL (Puerto 465)"),
        Mode::StartTls => println!("Usando STARTTLS (Puerto {})", config.port),
    }

    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout)??;
    let client = SmtpClient { stream, timeout };

    match mode {
        Mode::ImplicitTls => {
            let mut client = client.into_tls(&tls_connector, &config.host).await?;
            client.read().await?.assert_positive_completion()?;
            let capabilities = client.ehlo(&local_host).await?;
            session(&mut client, &capabilities, config, &message).await
        }
        Mode::StartTls => {
            let mut client = client;
            client.read().await?.assert_positive_completion()?;
            let capabilities = client.ehlo(&local_host).await?;
            if !capabilities.has_capability(EXT_START_TLS) {
                return Err(Error::MissingStartTls);
            }
            let mut client = client.start_tls(&tls_connector, &config.host).await?;
            let capabilities = client.ehlo(&local_host).await?;
            session(&mut client, &capabilities, config, &message).await
        }
    }
}

/// Authenticated part of the session: login, send, QUIT.
///
/// QUIT is attempted on every exit path so the server always sees a clean
/// shutdown, success or not.
pub(crate) async fn session<T: AsyncRead + AsyncWrite + Unpin>(
    client: &mut SmtpClient<T>,
    capabilities: &EhloResponse<String>,
    config: &Config,
    message: &ProbeMessage,
) -> crate::Result<()> {
    let credentials = Credentials::new(
        config.username.clone().unwrap_or_default(),
        config.password.clone().unwrap_or_default(),
    );

    println!("\n--- Intentando Login ---");
    let outcome: crate::Result<()> = async {
        client.authenticate(&credentials, capabilities).await?;
        println!("✅ Login Exitoso!");
        client.send(message).await?;
        println!("✅ Mensaje Enviado!");
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => client.quit().await,
        Err(err) => {
            client.quit().await.ok();
            Err(err)
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use smtp_proto::{EhloResponse, AUTH_LOGIN, AUTH_PLAIN};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::{session, Mode, Outcome};
    use crate::{config::Config, message::ProbeMessage, Error, SmtpClient};

    const BODY: &str = "DATA-BODY";

    fn test_config() -> Config {
        Config {
            host: "mail.example.com".to_string(),
            port: 465,
            username: Some("probe@example.com".to_string()),
            password: Some("hunter2".to_string()),
            sender: Some("probe@example.com".to_string()),
        }
    }

    fn capabilities(auth_mechanisms: u64) -> EhloResponse<String> {
        EhloResponse {
            auth_mechanisms,
            ..Default::default()
        }
    }

    /// Scripted fake server: for each step, reads up to the terminator,
    /// checks the command prefix and writes the canned reply.
    async fn fake_server(
        mut stream: DuplexStream,
        steps: Vec<(&'static str, &'static str)>,
    ) -> Vec<String> {
        let mut received = Vec::new();
        let mut buf: Vec<u8> = Vec::new();
        for (expect, reply) in steps {
            let terminator: &[u8] = if expect == BODY { b"\r\n.\r\n" } else { b"\r\n" };
            let chunk = loop {
                if let Some(pos) = buf
                    .windows(terminator.len())
                    .position(|window| window == terminator)
                {
                    let rest = buf.split_off(pos + terminator.len());
                    break std::mem::replace(&mut buf, rest);
                }
                let mut tmp = [0u8; 1024];
                let br = stream.read(&mut tmp).await.unwrap();
                assert!(br > 0, "client closed before {:?}", expect);
                buf.extend_from_slice(&tmp[..br]);
            };
            let text = String::from_utf8_lossy(&chunk).into_owned();
            if expect != BODY {
                assert!(
                    text.starts_with(expect),
                    "expected {:?}, got {:?}",
                    expect,
                    text
                );
            }
            received.push(text);
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    }

    async fn run_session(
        steps: Vec<(&'static str, &'static str)>,
        auth_mechanisms: u64,
    ) -> (crate::Result<()>, Vec<String>) {
        let (client_stream, server_stream) = duplex(64 * 1024);
        let server = tokio::spawn(fake_server(server_stream, steps));

        let mut client = SmtpClient {
            stream: client_stream,
            timeout: Duration::from_secs(5),
        };
        let config = test_config();
        let message = ProbeMessage::build(config.sender.as_deref().unwrap()).unwrap();
        let result = session(
            &mut client,
            &capabilities(auth_mechanisms),
            &config,
            &message,
        )
        .await;
        drop(client);

        (result, server.await.unwrap())
    }

    fn success_steps() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AUTH PLAIN", "235 2.7.0 Authentication successful\r\n"),
            ("MAIL FROM:<probe@example.com>", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<probe@example.com>", "250 2.1.5 Ok\r\n"),
            ("DATA", "354 End data with <CR><LF>.<CR><LF>\r\n"),
            (BODY, "250 2.0.0 Ok: queued\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ]
    }

    #[test]
    fn mode_from_port() {
        assert_eq!(Mode::for_port(465), Mode::ImplicitTls);
        for port in [25, 587, 2525, 464, 466] {
            assert_eq!(Mode::for_port(port), Mode::StartTls);
        }
    }

    #[tokio::test]
    async fn full_success_sequence() {
        let (result, received) = run_session(success_steps(), AUTH_PLAIN | AUTH_LOGIN).await;
        result.unwrap();

        // Login precedes the send, and the session ends with QUIT
        assert!(received.first().unwrap().starts_with("AUTH PLAIN "));
        assert!(received.last().unwrap().starts_with("QUIT"));
        let body = &received[4];
        assert!(body.contains("Subject: Prueba SMTP Python"), "{}", body);
    }

    #[tokio::test]
    async fn auth_failure_stops_before_send() {
        let steps = vec![
            ("AUTH PLAIN", "535 5.7.8 auth failed\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ];
        let (result, received) = run_session(steps, AUTH_PLAIN).await;

        let outcome = Outcome::from(result.unwrap_err());
        match &outcome {
            Outcome::AuthFailure { code, detail } => {
                assert_eq!(*code, 535);
                assert!(detail.contains("auth failed"), "{}", detail);
            }
            other => panic!("expected auth failure, got {:?}", other),
        }
        let banner = outcome.to_string();
        assert!(banner.contains("535"));
        assert!(banner.contains("auth failed"));

        // No MAIL FROM was attempted; the failed login went straight to QUIT
        assert_eq!(received.len(), 2);
        assert!(received[1].starts_with("QUIT"));
    }

    #[tokio::test]
    async fn tries_next_mechanism_before_giving_up() {
        let steps = vec![
            ("AUTH PLAIN", "535 5.7.8 auth failed\r\n"),
            ("AUTH LOGIN", "535 5.7.8 auth failed\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ];
        let (result, _) = run_session(steps, AUTH_PLAIN | AUTH_LOGIN).await;
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn dropped_connection_is_a_general_failure() {
        let (client_stream, server_stream) = duplex(64 * 1024);
        drop(server_stream);

        let mut client = SmtpClient {
            stream: client_stream,
            timeout: Duration::from_secs(5),
        };
        let config = test_config();
        let message = ProbeMessage::build("probe@example.com").unwrap();
        let err = session(&mut client, &capabilities(AUTH_PLAIN), &config, &message)
            .await
            .unwrap_err();

        match Outcome::from(err) {
            Outcome::GeneralFailure { detail } => assert!(!detail.is_empty()),
            other => panic!("expected general failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_reported_not_raised() {
        // Bind an ephemeral port and drop the listener so connecting to it
        // is guaranteed to be refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config {
            host: "127.0.0.1".to_string(),
            port,
            username: None,
            password: None,
            sender: None,
        };
        match super::run(&config).await {
            Outcome::GeneralFailure { detail } => assert!(!detail.is_empty()),
            other => panic!("expected general failure, got {:?}", other),
        }
    }

    #[test]
    fn refused_error_text_survives_into_banner() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused",
        ));
        let outcome = Outcome::from(err);
        assert!(outcome.to_string().contains("Connection refused"));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn back_to_back_runs_are_independent() {
        for _ in 0..2 {
            let (result, received) = run_session(success_steps(), AUTH_PLAIN).await;
            result.unwrap();
            assert!(received.last().unwrap().starts_with("QUIT"));
        }
    }
}
