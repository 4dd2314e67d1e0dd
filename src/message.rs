/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use mail_builder::MessageBuilder;

pub const SUBJECT: &str = "Prueba SMTP Python";
pub const BODY: &str = "Prueba de conexión SMTP exitosa.";

/// The fixed, self-addressed test message sent by the probe.
///
/// The sender doubles as the recipient so a successful run leaves the proof
/// in the probed mailbox itself. An empty sender is accepted as-is and left
/// for the server to reject.
#[derive(Debug)]
pub struct ProbeMessage {
    pub mail_from: String,
    pub rcpt_to: String,
    pub body: Vec<u8>,
}

impl ProbeMessage {
    pub fn build(sender: &str) -> crate::Result<Self> {
        let body = MessageBuilder::new()
            .from(sender)
            .to(sender)
            .subject(SUBJECT)
            .text_body(BODY)
            .write_to_vec()?;

        Ok(ProbeMessage {
            mail_from: sender.to_string(),
            rcpt_to: sender.to_string(),
            body,
        })
    }
}
