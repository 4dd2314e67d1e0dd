/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use smtp_proto::{response::parser::ResponseReceiver, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{message::ProbeMessage, SmtpClient};

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    pub(crate) async fn read(&mut self) -> crate::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }

            match parser.parse(&mut buf[..br].iter()) {
                Ok(reply) => {
                    debug!("S: {} {}", reply.code, reply.message);
                    return Ok(reply);
                }
                Err(err) => match err {
                    smtp_proto::Error::NeedsMoreData { .. } => (),
                    _ => {
                        return Err(crate::Error::UnparseableReply);
                    }
                },
            }
        }
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> crate::Result<Response<String>> {
        tokio::time::timeout(self.timeout, async {
            let bytes = cmd.as_ref();
            debug!("C: {}", String::from_utf8_lossy(bytes).trim_end());
            self.stream.write_all(bytes).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("MAIL FROM:<{}>\r\n", addr))
            .await?
            .assert_positive_completion()?;
        Ok(())
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("RCPT TO:<{}>\r\n", addr))
            .await?
            .assert_positive_completion()?;
        Ok(())
    }

    /// Sends a DATA command followed by the message body.
    pub async fn data(&mut self, message: &[u8]) -> crate::Result<()> {
        self.cmd(b"DATA\r\n".as_ref()).await?.assert_code(354)?;
        tokio::time::timeout(self.timeout, async {
            self.write_message(message).await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)??
        .assert_positive_completion()?;
        Ok(())
    }

    /// Transmits the message envelope and body.
    pub async fn send(&mut self, message: &ProbeMessage) -> crate::Result<()> {
        self.mail_from(&message.mail_from).await?;
        self.rcpt_to(&message.rcpt_to).await?;
        self.data(&message.body).await
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(&mut self) -> crate::Result<()> {
        self.cmd(b"QUIT\r\n".as_ref())
            .await?
            .assert_positive_completion()?;
        Ok(())
    }

    pub(crate) async fn write_message(&mut self, message: &[u8]) -> tokio::io::Result<()> {
        // Transparency procedure
        #[derive(Debug)]
        enum State {
            Cr,
            CrLf,
            Init,
        }

        let mut state = State::Init;
        let mut last_pos = 0;
        for (pos, byte) in message.iter().enumerate() {
            if *byte == b'.' && matches!(state, State::CrLf) {
                if let Some(bytes) = message.get(last_pos..pos) {
                    self.stream.write_all(bytes).await?;
                    self.stream.write_all(b".").await?;
                    last_pos = pos;
                }
                state = State::Init;
            } else if *byte == b'\r' {
                state = State::Cr;
            } else if *byte == b'\n' && matches!(state, State::Cr) {
                state = State::CrLf;
            } else {
                state = State::Init;
            }
        }
        if let Some(bytes) = message.get(last_pos..) {
            self.stream.write_all(bytes).await?;
        }
        self.stream.write_all("\r\n.\r\n".as_bytes()).await?;
        self.stream.flush().await
    }
}
